//! Configuration tree scanning.
//!
//! Layer definitions live in `<root>/customers/<customer>/products/**`. The
//! namespace of a layer is its customer followed by the directories between
//! `products/` and the file, joined by `:`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanError {
    #[error("Configuration root {0} is not a directory")]
    RootMissing(PathBuf),

    #[error("Failed to scan {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// One candidate definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSource {
    pub customer: String,
    pub namespace: String,
    /// File name without the definition suffix
    pub stem: String,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl DefinitionSource {
    /// Name used unless the definition sets its own.
    pub fn default_name(&self) -> String {
        format!("{}:{}", self.namespace, self.stem)
    }
}

/// Outcome of a scan. Per-directory errors do not abort the scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub sources: Vec<DefinitionSource>,
    pub errors: Vec<ScanError>,
}

/// Source of layer definition files.
pub trait ConfigTree: Send + Sync {
    /// List candidate definitions in a stable order.
    fn scan(&self) -> Result<ScanResult, ScanError>;
}

/// Whether a file name looks like a layer definition.
pub fn is_definition_file(name: &str, suffix: &str) -> bool {
    !name.starts_with('.')
        && !name.ends_with('~')
        && name.len() > suffix.len()
        && name.ends_with(suffix)
}

/// Definition tree on the local filesystem.
#[derive(Debug, Clone)]
pub struct FilesystemTree {
    root: PathBuf,
    suffix: String,
}

impl FilesystemTree {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    fn scan_customer(&self, customer: &str, products: &Path, result: &mut ScanResult) {
        let walker = WalkDir::new(products)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    result.errors.push(ScanError::Io {
                        path: e.path().unwrap_or(products).to_path_buf(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !is_definition_file(&file_name, &self.suffix) {
                continue;
            }
            let stem = file_name[..file_name.len() - self.suffix.len()].to_string();

            let relative_dirs = entry
                .path()
                .parent()
                .and_then(|p| p.strip_prefix(products).ok())
                .map(|rel| {
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            let namespace = std::iter::once(customer.to_string())
                .chain(relative_dirs)
                .collect::<Vec<_>>()
                .join(":");

            result.sources.push(DefinitionSource {
                customer: customer.to_string(),
                namespace,
                stem,
                path: entry.path().to_path_buf(),
                modified: entry.metadata().ok().and_then(|m| m.modified().ok()),
            });
        }
    }
}

impl ConfigTree for FilesystemTree {
    fn scan(&self) -> Result<ScanResult, ScanError> {
        let customers_dir = self.root.join("customers");
        if !customers_dir.is_dir() {
            return Err(ScanError::RootMissing(customers_dir));
        }

        let mut customers: Vec<(String, PathBuf)> = std::fs::read_dir(&customers_dir)
            .map_err(|e| ScanError::Io {
                path: customers_dir.clone(),
                message: e.to_string(),
            })?
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .filter(|(name, _)| !name.starts_with('.'))
            .collect();
        customers.sort();

        let mut result = ScanResult::default();
        for (customer, dir) in customers {
            let products = dir.join("products");
            if !products.is_dir() {
                debug!(customer = %customer, "Customer has no products directory");
                continue;
            }
            self.scan_customer(&customer, &products, &mut result);
        }

        Ok(result)
    }
}
