//! Project configuration file.
//!
//! Product layout and naming come from `pingnoo-deploy.toml` in the project
//! root (or the file given with `--config`). Every key is optional; missing
//! keys keep their defaults and unknown keys are rejected.
//!
//! ```toml
//! registry = "registry.example.com"
//! notarize_interval_secs = 30
//! installer_dir = "installer"
//! ```

use crate::bundler::ProductSettings;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "pingnoo-deploy.toml";

/// Parse product settings from TOML text.
pub fn parse_product_settings(text: &str, path: &Path) -> Result<ProductSettings, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load product settings.
///
/// An explicit `config` must exist. Without one, `<root>/pingnoo-deploy.toml`
/// is used when present and the built-in defaults otherwise.
pub fn load_product_settings(root: &Path, config: Option<&Path>) -> Result<ProductSettings, ConfigError> {
    let path: PathBuf = match config {
        Some(path) => root.join(path),
        None => {
            let default = root.join(CONFIG_FILE_NAME);
            if !default.is_file() {
                log::debug!("no {} in {}, using defaults", CONFIG_FILE_NAME, root.display());
                return Ok(ProductSettings::default());
            }
            default
        }
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    log::debug!("loaded configuration from {}", path.display());
    parse_product_settings(&text, &path)
}
