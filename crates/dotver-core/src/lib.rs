//! Core logic for dotver: channel resolution, the cached release
//! catalog client, the registry store, and the install/uninstall/update
//! pipeline over the shared installation tree.
//!
//! Command-line handling lives in the `dotver` binary crate; everything
//! here is reusable and free of terminal concerns.

pub mod catalog;
pub mod extract;
pub mod global;
pub mod install;
pub mod resolve;
pub mod store;
pub mod uninstall;
pub mod update;

pub use catalog::{CatalogClient, CatalogError, CatalogSnapshot};
pub use extract::{ArchiveExtractor, ExtractError, TarGzExtractor};
pub use global::{GlobalConfigError, pinned_sdk_version};
pub use install::{InstallError, InstallProgress, Installer, preflight_size};
pub use resolve::{ChannelSpec, ResolveError, SpecParseError, resolve_sdk, select_artifact};
pub use store::{RegistryError, RegistryStore};
pub use uninstall::{UninstallError, Uninstaller};
pub use update::{UpdateError, UpdateOutcome, Updater};
