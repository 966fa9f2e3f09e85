//! Finds the interesting entries of a package and assembles [`AppMetadata`].

use crate::android::manifest::{self, AndroidManifestView, AttributeValue};
use crate::android::table::ResourceTable;
use crate::archive::{PackageArchive, ZipPackage};
use crate::config::ExtractOptions;
use crate::error::{Error, Result};
use crate::ios::plist::PlistValue;
use crate::ios::{png, provision};
use crate::metadata::{AppMetadata, Platform};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

const ANDROID_MANIFEST: &str = "AndroidManifest.xml";
const RESOURCE_TABLE: &str = "resources.arsc";

static INFO_PLIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Payload/[^/]+/Info\.plist$").unwrap());
static MOBILE_PROVISION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Payload/[^/]+/embedded\.mobileprovision$").unwrap());

/// Entry names picked out of a single scan over the archive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LocatedEntries {
    pub manifest: Option<String>,
    pub resources: Option<String>,
    pub info_plist: Option<String>,
    pub provision: Option<String>,
    /// First entry, in archive order, whose name contains the icon fragment.
    pub icon: Option<String>,
}

impl LocatedEntries {
    pub fn scan(names: &[String], icon_fragment: &str) -> Self {
        let mut found = Self::default();
        for name in names {
            let slot = if name == ANDROID_MANIFEST {
                &mut found.manifest
            } else if name == RESOURCE_TABLE {
                &mut found.resources
            } else if INFO_PLIST.is_match(name) {
                &mut found.info_plist
            } else if MOBILE_PROVISION.is_match(name) {
                &mut found.provision
            } else if name.contains(icon_fragment) {
                &mut found.icon
            } else {
                continue;
            };
            if slot.is_none() {
                tracing::debug!("located {}", name);
                *slot = Some(name.clone());
            }
        }
        found
    }
}

/// Pulls [`AppMetadata`] out of `.apk` and `.ipa` packages.
#[derive(Clone, Debug, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Opens the package at `path`, choosing the platform from its extension.
    pub fn extract_path(&self, path: &Path) -> Result<AppMetadata> {
        let platform = Platform::from_path(path)?;
        let mut archive = ZipPackage::open(path)?;
        tracing::info!("extracting {:?} package {}", platform, path.display());
        self.extract_archive(&mut archive, platform)
    }

    pub fn extract_archive<A: PackageArchive>(
        &self,
        archive: &mut A,
        platform: Platform,
    ) -> Result<AppMetadata> {
        let entries = LocatedEntries::scan(archive.entry_names(), &self.options.ios_icon_fragment);
        match platform {
            Platform::Android => self.extract_android(archive, &entries),
            Platform::Ios => self.extract_ios(archive, &entries),
        }
    }

    fn extract_android<A: PackageArchive>(
        &self,
        archive: &mut A,
        entries: &LocatedEntries,
    ) -> Result<AppMetadata> {
        let manifest_name = entries.manifest.as_deref().ok_or(Error::ManifestNotFound)?;
        let view = manifest::decode(&archive.read_entry(manifest_name)?)?;
        let mut issues = Vec::new();

        let table = if needs_resources(&view) {
            match entries.resources.as_deref() {
                Some(name) => {
                    match archive
                        .read_entry(name)
                        .and_then(|data| ResourceTable::parse(&data))
                    {
                        Ok(table) => Some(table),
                        Err(err) => {
                            tracing::warn!("unusable resource table: {}", err);
                            issues.push(err);
                            None
                        }
                    }
                }
                None => None,
            }
        } else {
            None
        };
        let hops = self.options.max_reference_hops;
        let resolve_text = |value: &AttributeValue| -> Result<String> {
            match value {
                AttributeValue::Reference(id) => table
                    .as_ref()
                    .ok_or(Error::ResourceTableNotFound)?
                    .resolve_string((*id).into(), hops),
                other => other
                    .as_text()
                    .ok_or_else(|| Error::MalformedManifest(format!("{other:?} is not text"))),
            }
        };

        let version = resolve_text(&view.version_name)?;
        let build = match view.version_code.as_ref().map(resolve_text).transpose() {
            Ok(build) => build,
            Err(err) => {
                tracing::warn!("version code: {}", err);
                issues.push(err);
                None
            }
        };
        let name = match view.label.as_ref().map(resolve_text).transpose() {
            Ok(name) => name,
            Err(err) => {
                tracing::warn!("label: {}", err);
                issues.push(err);
                None
            }
        };

        let icon_path = match &view.icon {
            Some(AttributeValue::Reference(id)) => table
                .as_ref()
                .ok_or(Error::ResourceTableNotFound)
                .and_then(|table| {
                    table.resolve_file((*id).into(), self.options.target_density, hops)
                }),
            Some(AttributeValue::String(path)) => Ok(path.clone()),
            Some(other) => Err(Error::MalformedManifest(format!("icon attribute {other:?}"))),
            None => Err(Error::IconNotFound),
        };
        let icon = icon_path.and_then(|path| {
            tracing::debug!("android icon at {}", path);
            load_icon(archive, &path)
        });
        let icon = match icon {
            Ok(icon) => Some(icon),
            Err(err) => {
                tracing::warn!("icon: {}", err);
                issues.push(err);
                None
            }
        };

        Ok(AppMetadata {
            name,
            bundle_id: view.package,
            version,
            build,
            icon,
            size_bytes: archive.size(),
            platform: Platform::Android,
            ios_info: None,
            issues,
        })
    }

    fn extract_ios<A: PackageArchive>(
        &self,
        archive: &mut A,
        entries: &LocatedEntries,
    ) -> Result<AppMetadata> {
        let plist_name = entries.info_plist.as_deref().ok_or(Error::PlistNotFound)?;
        let plist = PlistValue::parse(&archive.read_entry(plist_name)?)?;
        let string = |key: &str| {
            plist
                .get(key)
                .and_then(PlistValue::as_str)
                .map(str::to_string)
        };
        let bundle_id = string("CFBundleIdentifier")
            .ok_or_else(|| Error::MalformedPlist("CFBundleIdentifier missing".into()))?;
        let build = string("CFBundleVersion");
        let version = string("CFBundleShortVersionString")
            .or_else(|| build.clone())
            .ok_or_else(|| Error::MalformedPlist("no bundle version".into()))?;
        let name = string("CFBundleDisplayName").or_else(|| string("CFBundleName"));
        let mut issues = Vec::new();

        let icon = entries
            .icon
            .as_deref()
            .ok_or(Error::IconNotFound)
            .and_then(|path| {
                tracing::debug!("ios icon at {}", path);
                load_icon(archive, path)
            });
        let icon = match icon {
            Ok(icon) => Some(icon),
            Err(err) => {
                tracing::warn!("icon: {}", err);
                issues.push(err);
                None
            }
        };

        let ios_info = entries
            .provision
            .as_deref()
            .ok_or(Error::MobileProvisionNotFound)
            .and_then(|path| provision::decode(&archive.read_entry(path)?));
        let ios_info = match ios_info {
            Ok(profile) => Some(profile.classify()),
            Err(err) => {
                tracing::warn!("provisioning profile: {}", err);
                issues.push(err);
                None
            }
        };

        Ok(AppMetadata {
            name,
            bundle_id,
            version,
            build,
            icon,
            size_bytes: archive.size(),
            platform: Platform::Ios,
            ios_info,
            issues,
        })
    }
}

fn needs_resources(view: &AndroidManifestView) -> bool {
    [
        Some(&view.version_name),
        view.version_code.as_ref(),
        view.label.as_ref(),
        view.icon.as_ref(),
    ]
    .into_iter()
    .flatten()
    .any(|value| matches!(value, AttributeValue::Reference(_)))
}

fn load_icon<A: PackageArchive>(archive: &mut A, path: &str) -> Result<image::RgbaImage> {
    let data = archive.read_entry(path).map_err(|err| match err {
        Error::Entry { .. } => Error::IconNotFound,
        other => other,
    })?;
    png::decode_icon(&data)
}
