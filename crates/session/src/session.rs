//! Connect / keep-alive / logout lifecycle against a [`RemoteService`].
//!
//! All transitions run on the owning thread except the keep-alive, which
//! only touches the atomics in [`KeepAliveState`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use foundation::time::Clock;
use parking_lot::Mutex;
use runtime::{CompletionSpawner, EventBus, Notification, TaskKind, TaskSpawner, submit_with_completion};
use tracing::{debug, info, warn};

use crate::jobs::JobRegistry;
use crate::packages::{
    ENDPOINT_LATEST_PACKAGE, ENDPOINT_PROJECTS, ENDPOINT_SESSION_INFO, GUEST_NAME, PackageInfo,
    PackageVersion, ProjectList, latest_package_request, session_display_name,
};
use crate::service::{RemoteService, ServiceError};
use crate::settings::LoginSettings;
use crate::status::{LoginStatus, SessionPhase};

/// Seconds without a successful server response before the session is
/// considered dead.
pub const SERVER_RESPONSE_TIMEOUT_SECS: f64 = 180.0;

pub fn os_name() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" => "macOS",
        "linux" => "Linux",
        "android" => "Android",
        "ios" => "iOS",
        _ => "Unknown",
    }
}

/// Identity sent on connect and used for the update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub app_name: String,
    pub version: String,
    /// Zero for developer builds.
    pub build_number: u32,
    pub os_name: String,
}

impl ClientInfo {
    pub fn new(app_name: &str, version: &str, build_number: u32) -> Self {
        Self {
            app_name: app_name.to_string(),
            version: version.to_string(),
            build_number,
            os_name: os_name().to_string(),
        }
    }

    pub fn client_id(&self) -> String {
        format!("{} / {} ({})", self.app_name, self.version, self.os_name)
    }
}

/// Owning-thread state reset when a session ends.
pub trait WorkspaceReset {
    fn clear_model_path(&mut self);
    fn init_blank_scene(&mut self);
    fn clear_render_points(&mut self);
    fn reset_gis(&mut self);
}

/// Completion context for session background work.
pub trait SessionHost: 'static {
    type Service: RemoteService;

    fn session_mut(&mut self) -> &mut Session<Self::Service>;
    fn notify(&mut self, notification: Notification);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutError {
    /// Jobs ignored cancellation past the drain timeout; the session stays
    /// connected and the workspace untouched.
    DrainTimedOut { remaining: usize },
}

impl fmt::Display for LogoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogoutError::DrainTimedOut { remaining } => {
                write!(f, "logout aborted: {remaining} job(s) still running")
            }
        }
    }
}

impl std::error::Error for LogoutError {}

/// Written by the keep-alive on a worker thread.
#[derive(Debug, Default)]
pub struct KeepAliveState {
    last_server_response: AtomicU64,
    force_logout: AtomicBool,
    last_result: Mutex<Option<ServiceError>>,
}

impl KeepAliveState {
    pub fn last_server_response(&self) -> f64 {
        f64::from_bits(self.last_server_response.load(Ordering::Acquire))
    }

    fn stamp(&self, secs: f64) {
        self.last_server_response
            .store(secs.to_bits(), Ordering::Release);
    }

    pub fn force_logout(&self) -> bool {
        self.force_logout.load(Ordering::Acquire)
    }

    fn record(&self, result: &Result<(), ServiceError>) {
        *self.last_result.lock() = result.as_ref().err().cloned();
    }
}

/// Sends one keep-alive and flags a forced logout when the server reports
/// expiry or has been silent for too long.
pub fn update_info<S: RemoteService>(
    service: &S,
    connection: &S::Connection,
    state: &KeepAliveState,
    clock: &dyn Clock,
) {
    let result = service.keep_alive(connection);
    state.record(&result);
    let now = clock.epoch_secs();

    let expired = matches!(result, Err(ServiceError::SessionExpired));
    if expired || now - SERVER_RESPONSE_TIMEOUT_SECS > state.last_server_response() {
        warn!(expired, last = state.last_server_response(), now, "session lost, forcing logout");
        state.force_logout.store(true, Ordering::Release);
    } else if result.is_ok() {
        state.stamp(now);
    } else {
        debug!(?result, "keep-alive failed");
    }
}

pub struct Session<S: RemoteService> {
    service: Arc<S>,
    client: ClientInfo,
    clock: Arc<dyn Clock>,
    pub settings: LoginSettings,
    password: String,
    phase: SessionPhase,
    status: LoginStatus,
    connection: Option<Arc<S::Connection>>,
    username: String,
    projects: Option<ProjectList>,
    available_update: Option<PackageVersion>,
    keep_alive: Arc<KeepAliveState>,
    jobs: JobRegistry,
    drain_timeout: Option<Duration>,
}

impl<S: RemoteService> Session<S> {
    pub fn new(
        service: Arc<S>,
        client: ClientInfo,
        clock: Arc<dyn Clock>,
        settings: LoginSettings,
    ) -> Self {
        Self {
            service,
            client,
            clock,
            settings,
            password: String::new(),
            phase: SessionPhase::LoggedOut,
            status: LoginStatus::NoStatus,
            connection: None,
            username: String::new(),
            projects: None,
            available_update: None,
            keep_alive: Arc::new(KeepAliveState::default()),
            jobs: JobRegistry::new(),
            drain_timeout: None,
        }
    }

    /// Bounds the logout drain. `None` waits for as long as jobs take.
    pub fn set_drain_timeout(&mut self, timeout: Option<Duration>) {
        self.drain_timeout = timeout;
    }

    pub fn set_password(&mut self, password: String) {
        zero_string(&mut self.password);
        self.password = password;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn status(&self) -> LoginStatus {
        self.status
    }

    pub fn is_logged_in(&self) -> bool {
        self.connection.is_some()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub fn projects(&self) -> Option<&ProjectList> {
        self.projects.as_ref()
    }

    pub fn available_update(&self) -> Option<&PackageVersion> {
        self.available_update.as_ref()
    }

    /// Raw result of the last connect or keep-alive; `None` means success.
    pub fn logout_reason(&self) -> Option<ServiceError> {
        self.keep_alive.last_result.lock().clone()
    }

    pub fn last_server_response(&self) -> f64 {
        self.keep_alive.last_server_response()
    }

    pub fn force_logout(&self) -> bool {
        self.keep_alive.force_logout()
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobRegistry {
        &mut self.jobs
    }

    /// Connects with the current settings and password.
    ///
    /// On success the project list and update check are fetched in the
    /// background and the display name is queried before returning.
    pub fn login<H>(&mut self, spawner: &dyn CompletionSpawner<H>) -> LoginStatus
    where
        H: SessionHost<Service = S>,
    {
        self.phase = SessionPhase::Connecting;
        self.status = LoginStatus::Pending;

        let result = self.service.connect(
            &self.settings.server_url,
            &self.client.client_id(),
            &self.settings.username,
            &self.password,
        );
        *self.keep_alive.last_result.lock() = result.as_ref().err().cloned();
        let connection = match result {
            Ok(connection) => Arc::new(connection),
            Err(err) => {
                self.status = LoginStatus::from_connect_error(&err);
                self.phase = SessionPhase::LoggedOut;
                warn!(%err, status = ?self.status, "login failed");
                return self.status;
            }
        };
        info!(server = %self.settings.server_url, "connected");

        self.spawn_project_fetch(spawner, &connection);
        self.spawn_package_check(spawner, &connection);
        self.username = self.query_display_name(&connection);

        zero_string(&mut self.password);
        if !self.settings.remember_server {
            zero_string(&mut self.settings.server_url);
        }
        if !self.settings.remember_username {
            zero_string(&mut self.settings.username);
        }

        self.connection = Some(connection);
        self.status = LoginStatus::NoStatus;
        self.phase = SessionPhase::LoggedIn;
        self.status
    }

    fn spawn_project_fetch<H>(&self, spawner: &dyn CompletionSpawner<H>, connection: &Arc<S::Connection>)
    where
        H: SessionHost<Service = S>,
    {
        let service = self.service.clone();
        let connection = connection.clone();
        submit_with_completion(
            spawner,
            TaskKind::Blocking,
            move || {
                let raw = service.query(&connection, ENDPOINT_PROJECTS, None).ok()?;
                ProjectList::parse(&raw)
                    .map_err(|err| warn!(%err, "project list unparseable"))
                    .ok()
            },
            |projects, host: &mut H| {
                let session = host.session_mut();
                if session.is_logged_in() {
                    session.projects = projects;
                }
            },
        );
    }

    fn spawn_package_check<H>(&self, spawner: &dyn CompletionSpawner<H>, connection: &Arc<S::Connection>)
    where
        H: SessionHost<Service = S>,
    {
        let service = self.service.clone();
        let connection = connection.clone();
        let body = latest_package_request(&self.client.app_name, &self.client.os_name);
        submit_with_completion(
            spawner,
            TaskKind::Blocking,
            move || {
                let raw = service
                    .query(&connection, ENDPOINT_LATEST_PACKAGE, Some(&body))
                    .ok()?;
                PackageInfo::parse(&raw).ok()
            },
            |package, host: &mut H| {
                if let Some(notification) = host.session_mut().accept_package(package) {
                    host.notify(notification);
                }
            },
        );
    }

    fn accept_package(&mut self, package: Option<PackageInfo>) -> Option<Notification> {
        if !self.is_logged_in() {
            return None;
        }
        let Some(newer) = package
            .as_ref()
            .and_then(|p| p.newer_than(self.client.build_number))
        else {
            debug!(local = self.client.build_number, "no newer package");
            return None;
        };
        info!(version = %newer.version_string, "new version available");
        self.available_update = Some(newer.clone());
        Some(Notification::NewVersionAvailable {
            version: newer.version_string.clone(),
            build_number: newer.version_number,
        })
    }

    fn query_display_name(&self, connection: &S::Connection) -> String {
        let name = self
            .service
            .query(connection, ENDPOINT_SESSION_INFO, None)
            .map_err(|err| warn!(%err, "session info query failed"))
            .ok()
            .and_then(|raw| session_display_name(&raw));
        match name {
            Some(name) => {
                self.keep_alive.stamp(self.clock.epoch_secs());
                name
            }
            None => GUEST_NAME.to_string(),
        }
    }

    /// Runs one keep-alive on the calling thread.
    pub fn update_info(&self) {
        if let Some(connection) = &self.connection {
            update_info(&*self.service, connection, &self.keep_alive, &*self.clock);
        }
    }

    /// Queues a keep-alive on a worker. Returns `false` when not connected.
    pub fn schedule_keep_alive(&self, spawner: &dyn TaskSpawner) -> bool {
        let Some(connection) = self.connection.clone() else {
            return false;
        };
        let service = self.service.clone();
        let state = self.keep_alive.clone();
        let clock = self.clock.clone();
        spawner.spawn(
            TaskKind::Blocking,
            Box::new(move || update_info(&*service, &connection, &state, &*clock)),
        );
        true
    }

    /// Ends the session: cancels and drains jobs, resets the workspace,
    /// disconnects and raises [`Notification::LoggedOut`].
    pub fn logout(
        &mut self,
        workspace: &mut dyn WorkspaceReset,
        events: &mut EventBus,
    ) -> Result<(), LogoutError> {
        self.keep_alive.force_logout.store(false, Ordering::Release);
        let Some(connection) = self.connection.clone() else {
            self.phase = SessionPhase::LoggedOut;
            return Ok(());
        };

        self.jobs.cancel_all();
        if let Err(remaining) = self.jobs.drain(self.drain_timeout) {
            events.emit(Notification::JobsStillRunning { remaining });
            return Err(LogoutError::DrainTimedOut { remaining });
        }

        workspace.clear_model_path();
        workspace.init_blank_scene();
        self.projects = None;
        self.available_update = None;
        workspace.clear_render_points();
        workspace.reset_gis();

        self.service.disconnect(&connection);
        self.connection = None;
        self.phase = SessionPhase::LoggedOut;
        info!("logged out");
        events.emit(Notification::LoggedOut);
        Ok(())
    }

    /// Acts on a forced logout raised by the keep-alive.
    pub fn poll(
        &mut self,
        workspace: &mut dyn WorkspaceReset,
        events: &mut EventBus,
    ) -> Option<Result<(), LogoutError>> {
        if !self.force_logout() {
            return None;
        }
        Some(self.logout(workspace, events))
    }
}

fn zero_string(value: &mut String) {
    let mut bytes = std::mem::take(value).into_bytes();
    bytes.fill(0);
}

#[cfg(test)]
mod tests {
    use super::{ClientInfo, LogoutError, Session};
    use crate::jobs::JobStatus;
    use crate::jobs::tests::ScriptedJob;
    use crate::service::ServiceError;
    use crate::settings::LoginSettings;
    use crate::status::{LoginStatus, SessionPhase};
    use crate::test_support::{FakeService, Host};
    use foundation::time::ManualClock;
    use pretty_assertions::assert_eq;
    use runtime::{CompletionSpawner, DeferredPool, Notification};
    use std::sync::Arc;
    use std::time::Duration;

    const INFO_OK: &str = r#"{"success":true,"user":{"realname":"Ada Lovelace"}}"#;

    fn host(service: FakeService, build_number: u32) -> (Host, Arc<FakeService>, Arc<ManualClock>) {
        let service = Arc::new(service);
        let clock = Arc::new(ManualClock::new(1000.0));
        let settings = LoginSettings {
            server_url: "https://vault.example".into(),
            username: "ada".into(),
            remember_server: true,
            remember_username: false,
        };
        let mut session = Session::new(
            service.clone(),
            ClientInfo::new("Scene Viewer", "1.2.0", build_number),
            clock.clone(),
            settings,
        );
        session.set_password("hunter2".into());
        (Host::new(session), service, clock)
    }

    fn logged_in(service: FakeService) -> (Host, Arc<FakeService>, Arc<ManualClock>) {
        let (mut h, service, clock) = host(service, 100);
        let pool = DeferredPool::<Host>::new();
        assert_eq!(h.session.login(&pool), LoginStatus::NoStatus);
        pool.run_pending();
        pool.run_completions(&mut h);
        (h, service, clock)
    }

    #[test]
    fn login_connects_and_schedules_background_fetches() {
        let service = FakeService::new()
            .respond("v1/session/info", Ok(INFO_OK.into()))
            .respond("dev/projects", Ok(r#"{"projects":[{"name":"Harbour"}]}"#.into()));
        let (mut h, service, _clock) = host(service, 100);
        let pool = DeferredPool::<Host>::new();

        assert_eq!(h.session.login(&pool), LoginStatus::NoStatus);
        assert_eq!(h.session.phase(), SessionPhase::LoggedIn);
        assert_eq!(h.session.username(), "Ada Lovelace");
        assert_eq!(h.session.last_server_response(), 1000.0);
        assert_eq!(h.session.logout_reason(), None);
        assert_eq!(pool.pending_tasks(), 2);

        let connect = service.connects.lock()[0].clone();
        assert_eq!(connect.0, "https://vault.example");
        assert!(connect.1.starts_with("Scene Viewer / 1.2.0 ("));
        assert_eq!(connect.3, "hunter2");

        // Credentials are gone, except what the user asked to remember.
        assert_eq!(h.session.settings.server_url, "https://vault.example");
        assert_eq!(h.session.settings.username, "");

        pool.run_pending();
        assert!(h.session.projects().is_none());
        assert_eq!(pool.run_completions(&mut h), 2);
        assert_eq!(h.session.projects().unwrap().names(), vec!["Harbour"]);
    }

    #[test]
    fn session_info_failure_falls_back_to_guest() {
        let service = FakeService::new().respond("v1/session/info", Err(ServiceError::ServerFailure));
        let (h, _service, _clock) = logged_in(service);
        assert_eq!(h.session.status(), LoginStatus::NoStatus);
        assert!(h.session.is_logged_in());
        assert_eq!(h.session.username(), "Guest");
        assert_eq!(h.session.last_server_response(), 0.0);
    }

    #[test]
    fn connect_failures_map_to_distinct_statuses() {
        let cases = [
            (ServiceError::ConnectionFailure, LoginStatus::ConnectionError),
            (ServiceError::AuthFailure, LoginStatus::AuthError),
            (ServiceError::OutOfSync, LoginStatus::TimeSync),
            (ServiceError::SecurityFailure, LoginStatus::SecurityError),
            (ServiceError::ParseError, LoginStatus::NegotiationError),
            (ServiceError::ProxyError, LoginStatus::ProxyError),
            (ServiceError::ProxyAuthRequired, LoginStatus::ProxyAuthRequired),
            (ServiceError::Other("boom".into()), LoginStatus::OtherError),
        ];
        for (err, expected) in cases {
            let (mut h, _service, _clock) = host(FakeService::new().refuse(err.clone()), 100);
            let pool = DeferredPool::<Host>::new();
            assert_eq!(h.session.login(&pool), expected);
            assert_eq!(h.session.phase(), SessionPhase::LoggedOut);
            assert_eq!(h.session.logout_reason(), Some(err));
            assert_eq!(pool.pending_tasks(), 0);
            // Credentials survive for a retry.
            assert_eq!(h.session.password, "hunter2");
            assert_eq!(h.session.settings.username, "ada");
        }
    }

    #[test]
    fn newer_package_raises_the_update_prompt() {
        let package = r#"{"success":true,"package":{"versionnumber":101,"versionstring":"1.3.0"}}"#;
        let (h, service, _clock) = logged_in(FakeService::new().respond("v1/packages/latest", Ok(package.into())));
        assert_eq!(
            h.events.events(),
            &[Notification::NewVersionAvailable { version: "1.3.0".into(), build_number: 101 }]
        );
        assert_eq!(h.session.available_update().unwrap().version_number, 101);

        let body = service
            .queries
            .lock()
            .iter()
            .find(|(endpoint, _)| endpoint == "v1/packages/latest")
            .and_then(|(_, body)| body.clone())
            .unwrap();
        assert!(body.contains("\"packagevariant\""));
    }

    #[test]
    fn same_or_developer_build_discards_the_package() {
        let package = r#"{"success":true,"package":{"versionnumber":100,"versionstring":"1.2.0"}}"#;
        let (h, _service, _clock) = logged_in(FakeService::new().respond("v1/packages/latest", Ok(package.into())));
        assert!(h.events.events().is_empty());
        assert!(h.session.available_update().is_none());

        let newer = r#"{"success":true,"package":{"versionnumber":999,"versionstring":"9"}}"#;
        let (mut h, _service, _clock) =
            host(FakeService::new().respond("v1/packages/latest", Ok(newer.into())), 0);
        let pool = DeferredPool::<Host>::new();
        h.session.login(&pool);
        pool.run_pending();
        pool.run_completions(&mut h);
        assert!(h.events.events().is_empty());
    }

    #[test]
    fn logout_drains_jobs_before_resetting_the_workspace() {
        let (mut h, service, _clock) = logged_in(FakeService::new());
        let log = h.workspace.log.clone();
        h.session
            .jobs_mut()
            .add(ScriptedJob::new("done", JobStatus::Completed, None, log.clone()));
        h.session
            .jobs_mut()
            .add(ScriptedJob::new("slow", JobStatus::Running, Some(3), log.clone()));

        assert_eq!(h.logout(), Ok(()));
        assert!(h.session.jobs().is_empty());
        assert_eq!(
            *log.lock(),
            vec![
                "done finished",
                "slow finished",
                "model path cleared",
                "blank scene",
                "points cleared",
                "gis reset",
            ]
        );
        assert!(!h.session.is_logged_in());
        assert!(h.session.projects().is_none());
        assert_eq!(h.session.phase(), SessionPhase::LoggedOut);
        assert_eq!(service.disconnects(), 1);
        assert_eq!(h.events.events().last(), Some(&Notification::LoggedOut));
    }

    #[test]
    fn drain_timeout_keeps_the_session_and_workspace() {
        let (mut h, service, _clock) = logged_in(FakeService::new());
        h.session.set_drain_timeout(Some(Duration::from_millis(20)));
        let log = h.workspace.log.clone();
        h.session
            .jobs_mut()
            .add(ScriptedJob::new("stuck", JobStatus::Running, None, log.clone()));

        assert_eq!(h.logout(), Err(LogoutError::DrainTimedOut { remaining: 1 }));
        assert!(h.session.is_logged_in());
        assert!(log.lock().is_empty());
        assert_eq!(service.disconnects(), 0);
        assert_eq!(
            h.events.events().last(),
            Some(&Notification::JobsStillRunning { remaining: 1 })
        );
    }

    #[test]
    fn logout_without_a_connection_does_nothing() {
        let (mut h, service, _clock) = host(FakeService::new(), 100);
        assert_eq!(h.logout(), Ok(()));
        assert!(h.workspace.log.lock().is_empty());
        assert!(h.events.events().is_empty());
        assert_eq!(service.disconnects(), 0);
    }

    #[test]
    fn silence_past_180_seconds_forces_logout() {
        let service = FakeService::new().respond("v1/session/info", Ok(INFO_OK.into()));
        let (mut h, _service, clock) = logged_in(service);

        clock.set(1100.0);
        h.session.update_info();
        assert!(!h.session.force_logout());
        assert_eq!(h.session.last_server_response(), 1100.0);

        clock.set(1280.0);
        h.session.update_info();
        assert!(!h.session.force_logout());

        clock.set(1280.0 + 181.0);
        h.session.update_info();
        assert!(h.session.force_logout());

        assert_eq!(h.poll(), Some(Ok(())));
        assert!(!h.session.force_logout());
        assert!(!h.session.is_logged_in());
        assert_eq!(h.poll(), None);
    }

    #[test]
    fn expired_session_forces_logout_immediately() {
        let service = FakeService::new().respond("v1/session/info", Ok(INFO_OK.into()));
        let (h, service, _clock) = logged_in(service);
        service.set_keep_alive(Err(ServiceError::SessionExpired));
        h.session.update_info();
        assert!(h.session.force_logout());
        assert_eq!(h.session.logout_reason(), Some(ServiceError::SessionExpired));
        assert_eq!(h.session.last_server_response(), 1000.0);
    }

    #[test]
    fn keep_alive_runs_on_a_worker() {
        let service = FakeService::new().respond("v1/session/info", Ok(INFO_OK.into()));
        let (h, service, clock) = logged_in(service);
        let pool = DeferredPool::<()>::new();
        clock.set(1050.0);
        assert!(h.session.schedule_keep_alive(&pool));
        assert_eq!(h.session.last_server_response(), 1000.0);
        pool.run_pending();
        assert_eq!(h.session.last_server_response(), 1050.0);
        assert_eq!(service.keep_alives(), 1);

        let (idle, _service, _clock) = host(FakeService::new(), 100);
        assert!(!idle.session.schedule_keep_alive(&pool));
    }

    #[test]
    fn completions_after_logout_are_ignored() {
        let service = FakeService::new()
            .respond("dev/projects", Ok(r#"{"projects":[]}"#.into()));
        let (mut h, _service, _clock) = host(service, 100);
        let pool = DeferredPool::<Host>::new();
        h.session.login(&pool);
        h.logout().unwrap();
        pool.run_pending();
        pool.run_completions(&mut h);
        assert!(h.session.projects().is_none());
    }
}
