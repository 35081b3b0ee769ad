use serde::Deserialize;

/// Shape of a project-level `global.json` file, read only for the pinned
/// SDK version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub sdk: Option<GlobalSdk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalSdk {
    #[serde(default)]
    pub version: Option<String>,
}

impl GlobalConfig {
    /// The pinned SDK version string, if one is present.
    #[must_use]
    pub fn pinned_version(&self) -> Option<&str> {
        self.sdk.as_ref()?.version.as_deref()
    }
}
