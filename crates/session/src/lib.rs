pub mod jobs;
pub mod packages;
pub mod service;
pub mod session;
pub mod settings;
pub mod status;

#[cfg(test)]
mod test_support;

pub use jobs::{BackgroundJob, JobRegistry, JobStatus};
pub use packages::{PackageInfo, PackageVersion, ProjectList};
pub use service::{RemoteService, ServiceError};
pub use session::{ClientInfo, LogoutError, Session, SessionHost, WorkspaceReset};
pub use settings::{LoginSettings, SettingsError};
pub use status::{LoginStatus, SessionPhase};
