//! `embedded.mobileprovision` decoding.
//!
//! The profile is a CMS `SignedData` whose encapsulated content is a plist.
//! Signatures and certificates are decoded but never verified.

use super::plist::PlistValue;
use crate::error::{Error, Result};
use crate::metadata::{DistributionType, IosDistributionInfo};
use chrono::{DateTime, Utc};
use rasn_cms::{ContentInfo, SignedData};

/// `id-signedData`, 1.2.840.113549.1.7.2.
const SIGNED_DATA: [u32; 7] = [1, 2, 840, 113549, 1, 7, 2];

fn malformed(msg: impl std::fmt::Display) -> Error {
    Error::MalformedProvisioningProfile(msg.to_string())
}

fn decode_signed_data(data: &[u8]) -> Result<SignedData> {
    let content_info = rasn::ber::decode::<ContentInfo>(data)
        .map_err(|err| malformed(format!("content info: {err}")))?;
    let content_type: &[u32] = &content_info.content_type;
    if content_type != SIGNED_DATA {
        return Err(malformed(format!(
            "content type {content_type:?} is not signed data"
        )));
    }
    rasn::ber::decode::<SignedData>(content_info.content.as_bytes())
        .map_err(|err| malformed(format!("signed data: {err}")))
}

/// Pulls the embedded plist bytes out of the CMS envelope.
pub fn extract_payload(data: &[u8]) -> Result<Vec<u8>> {
    let signed = decode_signed_data(data)?;
    tracing::debug!(
        "provisioning profile carries {} certificates and {} signers, not verified",
        signed.certificates.as_ref().map_or(0, |certs| certs.len()),
        signed.signer_infos.len()
    );
    let content = signed
        .encap_content_info
        .content
        .ok_or_else(|| malformed("signed data has no encapsulated content"))?;
    Ok(content.to_vec())
}

/// The fields of a provisioning profile plist used for classification.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisioningProfilePayload {
    pub name: Option<String>,
    pub team_name: String,
    pub provisioned_devices: Option<Vec<String>>,
    /// Only the presence of the key matters.
    pub provisions_all_devices: Option<bool>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl ProvisioningProfilePayload {
    pub fn from_plist(plist: &PlistValue) -> Result<Self> {
        if plist.as_dict().is_none() {
            return Err(malformed("payload is not a dictionary"));
        }
        let team_name = plist
            .get("TeamName")
            .and_then(PlistValue::as_str)
            .ok_or_else(|| malformed("TeamName missing"))?
            .to_string();
        let provisioned_devices = match plist.get("ProvisionedDevices") {
            Some(devices) => Some(
                devices
                    .as_array()
                    .ok_or_else(|| malformed("ProvisionedDevices is not an array"))?
                    .iter()
                    .map(|device| {
                        device
                            .as_str()
                            .map(str::to_string)
                            .ok_or_else(|| malformed(format!("device id {device:?}")))
                    })
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(Self {
            name: plist.get("Name").and_then(PlistValue::as_str).map(str::to_string),
            team_name,
            provisioned_devices,
            provisions_all_devices: plist
                .get("ProvisionsAllDevices")
                .map(|value| value.as_bool().unwrap_or(false)),
            expiration_date: plist.get("ExpirationDate").and_then(PlistValue::as_date),
        })
    }

    /// Ad hoc when devices are listed, enterprise when all devices are
    /// provisioned (whatever the flag's value), app store otherwise. The
    /// enterprise check wins over the device list.
    pub fn classify(&self) -> IosDistributionInfo {
        let mut info = IosDistributionInfo {
            distribution_type: DistributionType::AppStore,
            team_name: self.team_name.clone(),
            allowed_devices: Vec::new(),
        };
        if let Some(devices) = &self.provisioned_devices {
            info.distribution_type = DistributionType::AdHoc;
            info.allowed_devices = devices.clone();
        }
        if self.provisions_all_devices.is_some() {
            info.distribution_type = DistributionType::Enterprise;
        }
        info
    }
}

/// Decodes a whole `embedded.mobileprovision`.
pub fn decode(data: &[u8]) -> Result<ProvisioningProfilePayload> {
    let payload = extract_payload(data)?;
    let plist = PlistValue::parse(&payload).map_err(|err| malformed(format!("payload: {err}")))?;
    let profile = ProvisioningProfilePayload::from_plist(&plist)?;
    tracing::debug!(
        "provisioning profile {:?} for team {:?}, expires {:?}",
        profile.name,
        profile.team_name,
        profile.expiration_date
    );
    Ok(profile)
}
