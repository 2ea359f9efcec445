//! Where an installation keeps its providers.

use std::path::PathBuf;

use bon::Builder;

/// Layout of an installation root
///
/// Every name is relative to the root and matched case-insensitively.
#[derive(Debug, Clone, Builder)]
pub struct InstallationOptions {
    /// Catalog file in the root directory
    #[builder(into, default = "chitin.key".to_string())]
    pub catalog_name: String,

    /// Directories scanned, non-recursively, for container files
    #[builder(default = vec![
        "modules".to_string(),
        "lips".to_string(),
        "texturepacks".to_string(),
        "rims".to_string(),
    ])]
    pub container_dirs: Vec<String>,

    /// Loose file directory, scanned recursively
    #[builder(into, default = "override".to_string())]
    pub override_dir: String,

    /// Idle read handles kept open across fetches
    #[builder(default = 16)]
    pub handle_pool_capacity: usize,

    /// Containers registered after the scanned ones, in priority order
    #[builder(default)]
    pub extra_containers: Vec<PathBuf>,
}

impl Default for InstallationOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
