//! Response documents of the session service endpoints.

use serde::Deserialize;
use serde_json::Value;

pub const ENDPOINT_PROJECTS: &str = "dev/projects";
pub const ENDPOINT_LATEST_PACKAGE: &str = "v1/packages/latest";
pub const ENDPOINT_SESSION_INFO: &str = "v1/session/info";

pub const GUEST_NAME: &str = "Guest";

/// Body posted to [`ENDPOINT_LATEST_PACKAGE`].
pub fn latest_package_request(package_name: &str, variant: &str) -> String {
    serde_json::json!({ "packagename": package_name, "packagevariant": variant }).to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub package: Option<PackageVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageVersion {
    #[serde(rename = "versionnumber", default)]
    pub version_number: u32,
    #[serde(rename = "versionstring", default)]
    pub version_string: String,
}

impl PackageInfo {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The advertised version when it is newer than `local_build`. A local
    /// build number of zero marks a developer build, which never updates.
    pub fn newer_than(&self, local_build: u32) -> Option<&PackageVersion> {
        if !self.success || local_build == 0 {
            return None;
        }
        self.package
            .as_ref()
            .filter(|p| p.version_number > local_build)
    }
}

/// Raw project listing; the service owns its shape beyond the `projects`
/// array of objects with a `name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectList {
    document: Value,
}

impl ProjectList {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            document: serde_json::from_str(raw)?,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn names(&self) -> Vec<&str> {
        self.document
            .get("projects")
            .and_then(Value::as_array)
            .map(|projects| {
                projects
                    .iter()
                    .filter_map(|p| p.get("name").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct SessionInfo {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Debug, Deserialize)]
struct SessionUser {
    #[serde(default)]
    realname: Option<String>,
}

/// Display name from a `v1/session/info` response, or `None` when the
/// response is unparseable or reports failure.
pub fn session_display_name(raw: &str) -> Option<String> {
    let info: SessionInfo = serde_json::from_str(raw).ok()?;
    if !info.success {
        return None;
    }
    Some(
        info.user
            .and_then(|u| u.realname)
            .unwrap_or_else(|| GUEST_NAME.to_string()),
    )
}
