use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while pulling metadata out of a package.
///
/// Decoders report the first malformed structure they meet and stop; there is
/// no partial recovery inside a single decode.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open archive `{}`: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("AndroidManifest.xml not found")]
    ManifestNotFound,

    #[error("Info.plist not found")]
    PlistNotFound,

    #[error("icon not found")]
    IconNotFound,

    #[error("embedded.mobileprovision not found")]
    MobileProvisionNotFound,

    #[error("resources.arsc not found")]
    ResourceTableNotFound,

    #[error("malformed string pool: {0}")]
    MalformedStringPool(String),

    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("malformed resource table: {0}")]
    MalformedResourceTable(String),

    #[error("resource 0x{0:08x} not found")]
    ResourceNotFound(u32),

    #[error("reference chain starting at 0x{0:08x} does not terminate")]
    ReferenceCycle(u32),

    #[error("malformed plist: {0}")]
    MalformedPlist(String),

    #[error("malformed png: {0}")]
    MalformedPng(String),

    #[error("unsupported image format: bit depth {bit_depth}, color type {color_type}")]
    UnsupportedImageFormat { bit_depth: u8, color_type: u8 },

    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("malformed provisioning profile: {0}")]
    MalformedProvisioningProfile(String),

    #[error("unknown platform for `{0}`")]
    UnknownPlatform(String),

    #[error("invalid config: {0}")]
    InvalidConfig(#[from] toml::de::Error),

    #[error("archive entry `{name}`: {source}")]
    Entry {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
