//! Request validation against a populated catalog.

mod common;

use std::sync::Arc;

use common::{utc, Fixture};
use wms_catalog::{
    AllowAll, Authorizer, CatalogConfig, ElevationSummary, IntervalSummary, RequestResolver,
    StaticAuthorizer,
};
use wms_common::{ExceptionCode, WmsError};
use wms_protocol::{
    CapabilitiesRequest, GetLegendGraphicParameters, GetMapParameters, HierarchyType,
    NamespaceFilter,
};

const TEMPERATURE: &str = r#"{
    "title": "Temperature",
    "producer": "harmonie",
    "layer_type": "isoband",
    "styles": [{"name": "contours"}],
    "intervals": [{"start": 0, "end": 60, "default": true}]
}"#;

async fn setup(authorizer: Arc<dyn Authorizer>) -> (Fixture, RequestResolver) {
    setup_with(authorizer, |_| {}).await
}

async fn setup_with(
    authorizer: Arc<dyn Authorizer>,
    customize: impl FnOnce(&mut CatalogConfig),
) -> (Fixture, RequestResolver) {
    let fx = Fixture::new();
    fx.with_harmonie();
    fx.with_icemap();
    fx.write("fmi", "forecast/temperature.json", TEMPERATURE);
    fx.write("fmi", "maps/background.json", r#"{"layer_type": "map"}"#);
    fx.write("fmi", "maps/mask.json", r#"{"layer_type": "map", "hidden": true}"#);
    fx.write("ely", "ice.json", r#"{"layer_type": "icemap", "table": "icemap"}"#);

    let catalog = Arc::new(fx.catalog());
    catalog.refresh().await.unwrap();
    let mut config = fx.config();
    customize(&mut config);
    let resolver = RequestResolver::new(catalog, authorizer, Arc::new(config));
    (fx, resolver)
}

fn get_map(layers: &str, extra: &[(&str, &str)]) -> GetMapParameters {
    let mut pairs = vec![
        ("VERSION", "1.3.0"),
        ("LAYERS", layers),
        ("STYLES", ""),
        ("CRS", "EPSG:4326"),
        ("BBOX", "-10,50,40,75"),
        ("WIDTH", "256"),
        ("HEIGHT", "256"),
        ("FORMAT", "image/png"),
    ];
    for &(key, value) in extra {
        pairs.retain(|&(k, _)| k != key);
        pairs.push((key, value));
    }
    GetMapParameters::from_pairs(pairs)
}

fn code(result: Result<impl std::fmt::Debug, WmsError>) -> ExceptionCode {
    result.unwrap_err().exception_code()
}

// ============================================================================
// GetMap ordering
// ============================================================================

#[tokio::test]
async fn test_style_count_mismatch_reported_before_layers() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    let params = get_map("nope:a,nope:b", &[("STYLES", "x")]);
    let err = resolver.validate_get_map(&params).unwrap_err();

    assert!(matches!(
        err,
        WmsError::LayerStyleMismatch { layers: 2, styles: 1 }
    ));
    assert_eq!(err.wms_exception_code(), "NoApplicableCode");
}

#[tokio::test]
async fn test_missing_parameters() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    assert_eq!(
        code(resolver.validate_get_map(&get_map("", &[]))),
        ExceptionCode::LayerNotDefined
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map("fmi:maps:background", &[("BBOX", "")]))),
        ExceptionCode::MissingDimensionValue
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map("fmi:maps:background", &[("CRS", "")]))),
        ExceptionCode::Void
    );
    assert!(matches!(
        resolver.validate_get_map(&get_map("fmi:maps:background", &[("BBOX", "1,2,3")])),
        Err(WmsError::InvalidParameter { .. })
    ));
}

#[tokio::test]
async fn test_version_checked_before_layers() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    let params = get_map("nope:layer", &[("VERSION", "1.1.1")]);
    assert_eq!(
        code(resolver.validate_get_map(&params)),
        ExceptionCode::OperationNotSupported
    );
}

#[tokio::test]
async fn test_layer_checks_precede_format_and_bbox() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;
    let bad_format = ("FORMAT", "image/gif");

    assert_eq!(
        code(resolver.validate_get_map(&get_map("nope:layer", &[bad_format]))),
        ExceptionCode::LayerNotDefined
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map(
            "fmi:forecast:temperature",
            &[bad_format, ("STYLES", "shaded")]
        ))),
        ExceptionCode::StyleNotDefined
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map(
            "fmi:forecast:temperature",
            &[bad_format, ("CRS", "EPSG:3035")]
        ))),
        ExceptionCode::InvalidCrs
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map(
            "fmi:forecast:temperature",
            &[bad_format, ("BBOX", "40,75,-10,50")]
        ))),
        ExceptionCode::InvalidFormat
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map(
            "fmi:forecast:temperature",
            &[("BBOX", "40,75,-10,50")]
        ))),
        ExceptionCode::InvalidDimensionValue
    );
}

#[tokio::test]
async fn test_accepts_valid_request() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    let params = get_map(
        "fmi:forecast:temperature,ely:ice",
        &[("STYLES", "contours,"), ("FORMAT", "cnf"), ("TRANSPARENT", "TRUE")],
    );
    let request = resolver.validate_get_map(&params).unwrap();

    assert_eq!(request.layers.len(), 2);
    assert_eq!(request.layers[0].style, "contours");
    assert_eq!(request.layers[1].style, "default");
    assert!(request.transparent);
    assert_eq!(request.width, 256);
}

#[tokio::test]
async fn test_versions_and_formats_follow_config() {
    let (_fx, resolver) = setup_with(Arc::new(AllowAll), |config| {
        config.supported_versions = vec!["1.1.1".to_string(), "1.3.0".to_string()];
        config.map_formats = vec!["image/png".to_string()];
    })
    .await;
    let layer = "fmi:maps:background";

    assert!(resolver
        .validate_get_map(&get_map(layer, &[("VERSION", "1.1.1")]))
        .is_ok());
    assert!(resolver
        .validate_get_map(&get_map(layer, &[("FORMAT", "IMAGE/PNG")]))
        .is_ok());
    assert_eq!(
        code(resolver.validate_get_map(&get_map(layer, &[("FORMAT", "cnf")]))),
        ExceptionCode::InvalidFormat
    );
    assert_eq!(
        code(resolver.validate_get_legend_graphic(&legend(&[
            ("LAYER", layer),
            ("VERSION", "1.0.0"),
        ]))),
        ExceptionCode::OperationNotSupported
    );
}

#[tokio::test]
async fn test_hidden_layer_is_served() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;
    assert!(resolver
        .validate_get_map(&get_map("fmi:maps:mask", &[]))
        .is_ok());
}

// ============================================================================
// Dimensions
// ============================================================================

#[tokio::test]
async fn test_time_checked_against_generation() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;
    let layer = "fmi:forecast:temperature";

    assert!(resolver
        .validate_get_map(&get_map(layer, &[("TIME", "2024-01-01T18:00:00Z")]))
        .is_ok());
    assert_eq!(
        code(resolver.validate_get_map(&get_map(layer, &[("TIME", "2024-01-01T05:00:00Z")]))),
        ExceptionCode::InvalidDimensionValue
    );
    assert!(resolver
        .validate_get_map(&get_map(
            layer,
            &[
                ("TIME", "2024-01-01T05:00:00Z"),
                ("REFERENCE_TIME", "2024-01-01T00:00:00Z")
            ]
        ))
        .is_ok());
    assert_eq!(
        code(resolver.validate_get_map(&get_map(
            layer,
            &[("REFERENCE_TIME", "2024-01-01T03:00:00Z")]
        ))),
        ExceptionCode::InvalidDimensionValue
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map(layer, &[("TIME", "yesterday")]))),
        ExceptionCode::InvalidDimensionValue
    );
}

#[tokio::test]
async fn test_current_time_per_layer() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    let params = get_map(
        "fmi:forecast:temperature,fmi:maps:background",
        &[("TIME", "current")],
    );
    let request = resolver.validate_get_map(&params).unwrap();

    assert!(request.uses_current_time());
    assert_eq!(request.layers[0].current_time, Some(utc(1, 18, 0)));
    assert_eq!(request.layers[1].current_time, None);

    let request = resolver
        .validate_get_map(&get_map(
            "fmi:forecast:temperature",
            &[("REFERENCE_TIME", "2024-01-01T00:00:00Z")],
        ))
        .unwrap();
    assert_eq!(request.layers[0].current_time, Some(utc(1, 12, 0)));
}

#[tokio::test]
async fn test_time_interval_expands() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    let request = resolver
        .validate_get_map(&get_map(
            "fmi:forecast:temperature",
            &[("TIME", "2024-01-01T06:00:00Z/2024-01-01T09:00:00Z/PT1H")],
        ))
        .unwrap();

    assert_eq!(request.times.len(), 4);
    assert!(!request.uses_current_time());
    assert_eq!(request.layers[0].current_time, None);
}

#[tokio::test]
async fn test_elevation_and_interval() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;
    let layer = "fmi:forecast:temperature";

    assert!(resolver
        .validate_get_map(&get_map(layer, &[("ELEVATION", "850")]))
        .is_ok());
    assert_eq!(
        code(resolver.validate_get_map(&get_map(layer, &[("ELEVATION", "700")]))),
        ExceptionCode::InvalidDimensionValue
    );
    assert!(resolver
        .validate_get_map(&get_map("fmi:maps:background", &[("ELEVATION", "700")]))
        .is_ok());

    let request = resolver
        .validate_get_map(&get_map(
            layer,
            &[("DIM_INTERVAL_START", "0"), ("DIM_INTERVAL_END", "60")],
        ))
        .unwrap();
    assert_eq!(request.interval, Some((0, 60)));

    assert_eq!(
        code(resolver.validate_get_map(&get_map(
            layer,
            &[("DIM_INTERVAL_START", "0"), ("DIM_INTERVAL_END", "120")]
        ))),
        ExceptionCode::InvalidDimensionValue
    );
    assert_eq!(
        code(resolver.validate_get_map(&get_map(layer, &[("DIM_INTERVAL_START", "0")]))),
        ExceptionCode::MissingDimensionValue
    );
}

// ============================================================================
// Authorization and capabilities
// ============================================================================

fn fmi_only() -> Arc<dyn Authorizer> {
    Arc::new(StaticAuthorizer::new().grant("secret", "fmi:*"))
}

#[tokio::test]
async fn test_get_map_authorization() {
    let (_fx, resolver) = setup(fmi_only()).await;

    assert!(resolver
        .validate_get_map_authorization("secret", &get_map("fmi:forecast:temperature", &[]))
        .is_ok());

    let err = resolver
        .validate_get_map_authorization("secret", &get_map("fmi:forecast:temperature,ely:ice", &[]))
        .unwrap_err();
    assert_eq!(err.exception_code(), ExceptionCode::Void);
    assert_eq!(err.http_status_code(), 403);

    assert!(resolver
        .validate_get_map_authorization("other", &get_map("fmi:maps:background", &[]))
        .is_err());
}

#[tokio::test]
async fn test_capabilities_filters() {
    let (_fx, resolver) = setup(fmi_only()).await;
    let names = |request: &CapabilitiesRequest| -> Vec<String> {
        resolver
            .capabilities(request)
            .layers
            .iter()
            .map(|l| l.name.clone())
            .collect()
    };

    assert_eq!(
        names(&CapabilitiesRequest::new(HierarchyType::Flat)),
        vec!["ely:ice", "fmi:forecast:temperature", "fmi:maps:background"]
    );
    assert_eq!(
        names(&CapabilitiesRequest::new(HierarchyType::Flat).with_apikey("secret", true)),
        vec!["fmi:forecast:temperature", "fmi:maps:background"]
    );
    assert!(
        names(&CapabilitiesRequest::new(HierarchyType::Flat).with_apikey("secret", false))
            .is_empty()
    );
    assert_eq!(
        names(
            &CapabilitiesRequest::new(HierarchyType::Flat)
                .with_namespace(NamespaceFilter::parse("fmi:forecast").unwrap())
        ),
        vec!["fmi:forecast:temperature"]
    );
    assert_eq!(
        names(
            &CapabilitiesRequest::new(HierarchyType::Flat)
                .with_namespace(NamespaceFilter::parse("/ICE/").unwrap())
        ),
        vec!["ely:ice"]
    );

    let view = resolver.capabilities(&CapabilitiesRequest::new(HierarchyType::RecursiveWithTimes));
    assert_eq!(view.hierarchy, HierarchyType::RecursiveWithTimes);
    assert_eq!(view.generation, 1);
}

#[tokio::test]
async fn test_capabilities_summaries_report_dimensions() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;
    let view = resolver.capabilities(&CapabilitiesRequest::new(HierarchyType::Flat));
    let summaries = view.summaries();

    let temperature = summaries
        .iter()
        .find(|s| s.name == "fmi:forecast:temperature")
        .unwrap();
    assert_eq!(temperature.styles, vec!["contours"]);
    assert_eq!(temperature.reference_times, 2);
    assert_eq!(
        temperature.time.as_deref(),
        Some("2024-01-01T06:00:00Z/2024-01-01T18:00:00Z/PT1H")
    );
    assert_eq!(
        temperature.elevation,
        Some(ElevationSummary {
            units: Some("hPa"),
            default: 1000,
            extent: "500,850,1000".to_string(),
        })
    );
    assert_eq!(
        temperature.interval,
        Some(IntervalSummary {
            start: "0".to_string(),
            end: "60".to_string(),
            default: (0, 60),
        })
    );

    let background = summaries
        .iter()
        .find(|s| s.name == "fmi:maps:background")
        .unwrap();
    assert_eq!(background.time, None);
    assert_eq!(background.reference_times, 0);
    assert_eq!(background.elevation, None);
    assert_eq!(background.interval, None);
}

// ============================================================================
// GetLegendGraphic
// ============================================================================

fn legend(pairs: &[(&str, &str)]) -> GetLegendGraphicParameters {
    GetLegendGraphicParameters::from_pairs(pairs.iter().copied())
}

#[tokio::test]
async fn test_get_legend_graphic() {
    let (_fx, resolver) = setup(Arc::new(AllowAll)).await;

    let request = resolver
        .validate_get_legend_graphic(&legend(&[("LAYER", "fmi:forecast:temperature")]))
        .unwrap();
    assert_eq!(request.style, "default");
    assert_eq!(request.format, "image/png");
    assert_eq!(request.width, None);

    let request = resolver
        .validate_get_legend_graphic(&legend(&[
            ("LAYER", "fmi:forecast:temperature"),
            ("STYLE", "contours"),
            ("WIDTH", "120"),
        ]))
        .unwrap();
    assert_eq!(request.style, "contours");
    assert_eq!(request.width, Some(120));

    assert_eq!(
        code(resolver.validate_get_legend_graphic(&legend(&[]))),
        ExceptionCode::Void
    );
    assert_eq!(
        code(resolver.validate_get_legend_graphic(&legend(&[("LAYER", "nope:layer")]))),
        ExceptionCode::LayerNotDefined
    );
    assert_eq!(
        code(resolver.validate_get_legend_graphic(&legend(&[
            ("LAYER", "fmi:forecast:temperature"),
            ("STYLE", "shaded"),
        ]))),
        ExceptionCode::StyleNotDefined
    );
    assert_eq!(
        code(resolver.validate_get_legend_graphic(&legend(&[
            ("LAYER", "fmi:forecast:temperature"),
            ("FORMAT", "image/gif"),
        ]))),
        ExceptionCode::InvalidFormat
    );
}
