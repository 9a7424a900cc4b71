//! Shared fixtures for the in-crate tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use foundation::math::{GeoZone, SRID_WGS84_GEOGRAPHIC, Vec3};
use foundation::time::ManualClock;
use parking_lot::Mutex;
use runtime::DeferredPool;
use streaming::{LoadError, ResourceLoader};

use crate::context::SceneContext;
use crate::node::{MemoryProject, MetadataValue, NodeId, ProjectStore};
use crate::render::{TextureBuilder, TextureError, TextureHandle};

/// Serves canned responses; unknown URIs fail to open.
#[derive(Debug, Default)]
pub(crate) struct FakeLoader {
    responses: Mutex<HashMap<String, Result<Vec<u8>, LoadError>>>,
    calls: AtomicUsize,
}

impl FakeLoader {
    pub(crate) fn respond(&self, uri: &str, result: Result<Vec<u8>, LoadError>) {
        self.responses.lock().insert(uri.to_string(), result);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResourceLoader for FakeLoader {
    fn load(&self, uri: &str) -> Result<Vec<u8>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .get(uri)
            .cloned()
            .unwrap_or_else(|| Err(LoadError::Open(uri.to_string())))
    }
}

/// Accepts any non-empty payload; empty input fails to decode.
#[derive(Debug, Default)]
pub(crate) struct FakeTextures {
    next: u64,
    pub(crate) live: Vec<TextureHandle>,
    pub(crate) built_from: Vec<Vec<u8>>,
}

impl TextureBuilder for FakeTextures {
    fn build_from_memory(&mut self, bytes: &[u8]) -> Result<TextureHandle, TextureError> {
        if bytes.is_empty() {
            return Err(TextureError::Decode("empty".to_string()));
        }
        self.next += 1;
        let h = TextureHandle(self.next);
        self.live.push(h);
        self.built_from.push(bytes.to_vec());
        Ok(h)
    }

    fn destroy(&mut self, texture: TextureHandle) {
        self.live.retain(|h| *h != texture);
    }
}

pub(crate) struct Harness {
    pub(crate) project: MemoryProject,
    pub(crate) pool: DeferredPool<()>,
    pub(crate) loader: Arc<FakeLoader>,
    pub(crate) textures: FakeTextures,
    pub(crate) clock: ManualClock,
    pub(crate) zone: Option<GeoZone>,
    pub(crate) camera: Vec3,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            project: MemoryProject::new("test"),
            pool: DeferredPool::new(),
            loader: Arc::new(FakeLoader::default()),
            textures: FakeTextures::default(),
            clock: ManualClock::new(1_000.0),
            zone: GeoZone::from_srid(SRID_WGS84_GEOGRAPHIC).ok(),
            camera: Vec3::zero(),
        }
    }

    pub(crate) fn ctx(&mut self) -> SceneContext<'_> {
        SceneContext {
            project: &mut self.project,
            spawner: &self.pool,
            loader: self.loader.clone(),
            textures: &mut self.textures,
            clock: &self.clock,
            zone: self.zone,
            camera_position: self.camera,
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.project.root()
    }

    pub(crate) fn add_node(
        &mut self,
        parent: NodeId,
        item_type: &str,
        name: &str,
        uri: Option<&str>,
    ) -> NodeId {
        self.project
            .create_node(parent, item_type, name, uri)
            .unwrap()
    }

    /// Bumps the node's modification stamp without changing anything visible.
    pub(crate) fn touch(&mut self, node: NodeId) {
        self.project
            .set_metadata(node, "touched", MetadataValue::Bool(true))
            .unwrap();
    }
}
