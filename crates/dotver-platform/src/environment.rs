use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("this operating system is not supported")]
    UnsupportedOs,
    #[error("this processor architecture is not supported")]
    UnsupportedArch,
}

fn os_name() -> Result<&'static str, PlatformError> {
    if cfg!(target_os = "linux") {
        Ok("linux")
    } else if cfg!(target_os = "macos") {
        Ok("osx")
    } else {
        Err(PlatformError::UnsupportedOs)
    }
}

fn arch() -> Result<&'static str, PlatformError> {
    if cfg!(target_arch = "x86_64") {
        Ok("x64")
    } else if cfg!(target_arch = "aarch64") {
        Ok("arm64")
    } else if cfg!(target_arch = "x86") {
        Ok("x86")
    } else if cfg!(target_arch = "arm") {
        Ok("arm")
    } else {
        Err(PlatformError::UnsupportedArch)
    }
}

/// `<os>-<arch>` tag used to select downloadable files from the catalog.
///
/// # Errors
/// Returns an error on operating systems or architectures the toolchain
/// does not publish archives for.
pub fn runtime_identifier() -> Result<String, PlatformError> {
    Ok(format!("{}-{}", os_name()?, arch()?))
}

/// Archive suffix the current platform can extract.
///
/// # Errors
/// Returns an error on unsupported operating systems.
pub fn archive_extension() -> Result<&'static str, PlatformError> {
    // Both supported platforms ship gzipped tarballs; installer archives
    // in other formats (zip, pkg, exe) are never eligible.
    os_name().map(|_| ".tar.gz")
}

/// Whether the file name carries the archive format supported here.
#[must_use]
pub fn is_supported_archive(file_name: &str) -> bool {
    archive_extension().is_ok_and(|ext| file_name.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_identifier_is_os_dash_arch() {
        let rid = runtime_identifier().expect("test platform should be supported");
        let (os, arch) = rid.split_once('-').expect("rid should contain a dash");
        assert!(["linux", "osx"].contains(&os));
        assert!(["x64", "x86", "arm64", "arm"].contains(&arch));
    }

    #[test]
    fn only_gzipped_tarballs_are_supported() {
        assert!(is_supported_archive("dotnet-sdk-10.0.100-linux-x64.tar.gz"));
        assert!(!is_supported_archive("dotnet-sdk-10.0.100-win-x64.zip"));
        assert!(!is_supported_archive("dotnet-sdk-10.0.100-osx-arm64.pkg"));
    }
}
