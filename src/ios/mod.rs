//! iOS packages: property lists, CgBI icons and provisioning profiles.

pub mod plist;
pub mod png;
pub mod provision;
