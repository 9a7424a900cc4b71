use std::sync::Arc;

use foundation::math::{GeoZone, Vec3};
use foundation::time::Clock;
use runtime::TaskSpawner;
use streaming::ResourceLoader;

use crate::node::ProjectStore;
use crate::render::TextureBuilder;

/// Owning-thread services handed to every scene item operation.
///
/// Built fresh for each pass over the tree; nothing in here outlives a frame.
pub struct SceneContext<'a> {
    pub project: &'a mut dyn ProjectStore,
    pub spawner: &'a dyn TaskSpawner,
    pub loader: Arc<dyn ResourceLoader>,
    pub textures: &'a mut dyn TextureBuilder,
    pub clock: &'a dyn Clock,
    /// Working zone of the viewer; `None` until a GIS space is chosen.
    pub zone: Option<GeoZone>,
    pub camera_position: Vec3,
}

impl SceneContext<'_> {
    pub fn now(&self) -> f64 {
        self.clock.epoch_secs()
    }
}
