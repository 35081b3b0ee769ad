mod environment;
mod paths;

pub use environment::{PlatformError, archive_extension, is_supported_archive, runtime_identifier};
pub use paths::{ENV_ROOT, InstallRoot, RootError};
