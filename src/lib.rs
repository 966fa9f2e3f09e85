//! Identity and icon metadata for Android `.apk` and iOS `.ipa` packages.
//!
//! ```no_run
//! let metadata = appmeta::extract("HelloWorld.apk")?;
//! println!("{} {}", metadata.bundle_id, metadata.version);
//! # Ok::<(), appmeta::Error>(())
//! ```

pub mod android;
pub mod archive;
pub mod config;
pub mod error;
pub mod ios;
pub mod locator;
pub mod metadata;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::ExtractOptions;
pub use error::{Error, Result};
pub use locator::Extractor;
pub use metadata::{AppMetadata, DistributionType, IosDistributionInfo, Platform};

/// Extracts metadata from the package at `path` with default options.
pub fn extract(path: impl AsRef<std::path::Path>) -> Result<AppMetadata> {
    Extractor::default().extract_path(path.as_ref())
}
