use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use runtime::{EventBus, Notification};

use crate::service::{RemoteService, ServiceError};
use crate::session::{LogoutError, Session, SessionHost, WorkspaceReset};

pub(crate) struct FakeConnection;

/// Scripted service: unknown endpoints answer `NotAllowed`.
pub(crate) struct FakeService {
    refuse: Option<ServiceError>,
    responses: HashMap<String, Result<String, ServiceError>>,
    keep_alive: Mutex<Result<(), ServiceError>>,
    pub connects: Mutex<Vec<(String, String, String, String)>>,
    pub queries: Mutex<Vec<(String, Option<String>)>>,
    disconnects: AtomicUsize,
    keep_alives: AtomicUsize,
}

impl FakeService {
    pub(crate) fn new() -> Self {
        Self {
            refuse: None,
            responses: HashMap::new(),
            keep_alive: Mutex::new(Ok(())),
            connects: Mutex::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
            keep_alives: AtomicUsize::new(0),
        }
    }

    pub(crate) fn respond(mut self, endpoint: &str, response: Result<String, ServiceError>) -> Self {
        self.responses.insert(endpoint.to_string(), response);
        self
    }

    pub(crate) fn refuse(mut self, err: ServiceError) -> Self {
        self.refuse = Some(err);
        self
    }

    pub(crate) fn set_keep_alive(&self, result: Result<(), ServiceError>) {
        *self.keep_alive.lock() = result;
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn keep_alives(&self) -> usize {
        self.keep_alives.load(Ordering::SeqCst)
    }
}

impl RemoteService for FakeService {
    type Connection = FakeConnection;

    fn connect(
        &self,
        url: &str,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<FakeConnection, ServiceError> {
        self.connects.lock().push((
            url.to_string(),
            client_id.to_string(),
            username.to_string(),
            password.to_string(),
        ));
        match &self.refuse {
            Some(err) => Err(err.clone()),
            None => Ok(FakeConnection),
        }
    }

    fn disconnect(&self, _connection: &FakeConnection) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn keep_alive(&self, _connection: &FakeConnection) -> Result<(), ServiceError> {
        self.keep_alives.fetch_add(1, Ordering::SeqCst);
        self.keep_alive.lock().clone()
    }

    fn query(
        &self,
        _connection: &FakeConnection,
        endpoint: &str,
        body: Option<&str>,
    ) -> Result<String, ServiceError> {
        self.queries
            .lock()
            .push((endpoint.to_string(), body.map(str::to_string)));
        self.responses
            .get(endpoint)
            .cloned()
            .unwrap_or(Err(ServiceError::NotAllowed))
    }
}

#[derive(Default)]
pub(crate) struct FakeWorkspace {
    pub log: Arc<Mutex<Vec<String>>>,
}

impl WorkspaceReset for FakeWorkspace {
    fn clear_model_path(&mut self) {
        self.log.lock().push("model path cleared".into());
    }

    fn init_blank_scene(&mut self) {
        self.log.lock().push("blank scene".into());
    }

    fn clear_render_points(&mut self) {
        self.log.lock().push("points cleared".into());
    }

    fn reset_gis(&mut self) {
        self.log.lock().push("gis reset".into());
    }
}

pub(crate) struct Host {
    pub session: Session<FakeService>,
    pub events: EventBus,
    pub workspace: FakeWorkspace,
}

impl Host {
    pub(crate) fn new(session: Session<FakeService>) -> Self {
        Self {
            session,
            events: EventBus::new(),
            workspace: FakeWorkspace::default(),
        }
    }

    pub(crate) fn logout(&mut self) -> Result<(), LogoutError> {
        self.session.logout(&mut self.workspace, &mut self.events)
    }

    pub(crate) fn poll(&mut self) -> Option<Result<(), LogoutError>> {
        self.session.poll(&mut self.workspace, &mut self.events)
    }
}

impl SessionHost for Host {
    type Service = FakeService;

    fn session_mut(&mut self) -> &mut Session<FakeService> {
        &mut self.session
    }

    fn notify(&mut self, notification: Notification) {
        self.events.emit(notification);
    }
}
