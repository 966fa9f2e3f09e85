use crate::error::{Error, Result};
use image::RgbaImage;
use serde::Serialize;
use std::path::Path;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    /// Picks the platform from the package extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("apk") => Ok(Self::Android),
            Some("ipa") => Ok(Self::Ios),
            _ => Err(Error::UnknownPlatform(path.display().to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum DistributionType {
    AdHoc,
    AppStore,
    Enterprise,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IosDistributionInfo {
    pub distribution_type: DistributionType,
    pub team_name: String,
    /// Device identifiers, filled only for ad hoc profiles.
    pub allowed_devices: Vec<String>,
}

/// What the extractor learned about one package.
#[derive(Debug)]
pub struct AppMetadata {
    pub name: Option<String>,
    pub bundle_id: String,
    pub version: String,
    pub build: Option<String>,
    pub icon: Option<RgbaImage>,
    /// Size of the archive file itself.
    pub size_bytes: u64,
    pub platform: Platform,
    pub ios_info: Option<IosDistributionInfo>,
    /// Failures of optional lookups whose fields were left empty.
    pub issues: Vec<Error>,
}
