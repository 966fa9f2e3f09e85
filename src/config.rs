use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Density the icon lookup aims for, matching a high-density default device.
pub const DEFAULT_TARGET_DENSITY: u16 = 720;

/// Longest chain of resource references followed before giving up.
pub const DEFAULT_MAX_REFERENCE_HOPS: usize = 10;

/// Fragment of the bundle icon file name picked from an `.ipa`.
pub const DEFAULT_IOS_ICON_FRAGMENT: &str = "AppIcon60x60";

/// Knobs for a single extraction.
///
/// Every key is optional in the TOML form, so a partial file only overrides
/// what it names:
///
/// ```toml
/// target_density = 480
/// ios_icon_fragment = "AppIcon76x76"
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    #[serde(default = "default_target_density")]
    pub target_density: u16,
    #[serde(default = "default_max_reference_hops")]
    pub max_reference_hops: usize,
    #[serde(default = "default_ios_icon_fragment")]
    pub ios_icon_fragment: String,
}

fn default_target_density() -> u16 {
    DEFAULT_TARGET_DENSITY
}

fn default_max_reference_hops() -> usize {
    DEFAULT_MAX_REFERENCE_HOPS
}

fn default_ios_icon_fragment() -> String {
    DEFAULT_IOS_ICON_FRAGMENT.to_string()
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            target_density: default_target_density(),
            max_reference_hops: default_max_reference_hops(),
            ios_icon_fragment: default_ios_icon_fragment(),
        }
    }
}

impl ExtractOptions {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
