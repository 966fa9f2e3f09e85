//! Android packages: binary XML manifests and `resources.arsc`.

pub mod manifest;
pub mod res;
pub mod table;
