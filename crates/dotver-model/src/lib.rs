//! Data model shared across the dotver crates.
//!
//! This crate holds the wire shapes consumed from the remote release
//! catalog, the persisted registry document, and the global.json
//! project configuration. It performs no I/O.

mod catalog;
mod global;
mod registry;

pub use catalog::{
    Channel, ChannelSummary, DownloadableFile, Release, ReleaseKind, ReleasesIndex, SdkRelease,
    SupportPhase,
};
pub use global::{GlobalConfig, GlobalSdk};
pub use registry::{ChannelEntry, Registry};
