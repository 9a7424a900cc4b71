//! The contract shared by every scene item.

use std::sync::Arc;

use foundation::math::{GeoZone, Mat4, Vec3, transform_point};
use streaming::{LoadStatus, LoadStatusCell};
use tracing::trace;

use crate::context::SceneContext;
use crate::folder::Folder;
use crate::node::NodeId;
use crate::render::RenderData;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub u32);

impl ItemId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ItemKind {
    Folder,
    Media,
}

impl ItemKind {
    /// Matches the node type tag stored in the project.
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("folder") {
            Some(ItemKind::Folder)
        } else if tag.eq_ignore_ascii_case("media") {
            Some(ItemKind::Media)
        } else {
            None
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            ItemKind::Folder => "folder",
            ItemKind::Media => "media",
        }
    }
}

/// State every item carries regardless of its kind.
#[derive(Debug)]
pub struct ItemBase {
    pub id: ItemId,
    pub kind: ItemKind,
    pub node: NodeId,
    pub name: String,
    pub visible: bool,
    pub selected: bool,
    pub expanded: bool,
    pub editing_name: bool,
    pub moved: bool,
    preferred_zone: Option<GeoZone>,
    current_zone: Option<GeoZone>,
    last_update: u64,
    load_status: Arc<LoadStatusCell>,
}

impl ItemBase {
    pub fn new(id: ItemId, kind: ItemKind, node: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            node,
            name: name.into(),
            visible: true,
            selected: false,
            expanded: false,
            editing_name: false,
            moved: false,
            preferred_zone: None,
            current_zone: None,
            last_update: 0,
            load_status: Arc::new(LoadStatusCell::default()),
        }
    }

    /// The first zone this item accepted. Never changes once set.
    pub fn preferred_zone(&self) -> Option<&GeoZone> {
        self.preferred_zone.as_ref()
    }

    pub fn current_zone(&self) -> Option<&GeoZone> {
        self.current_zone.as_ref()
    }

    /// Zone to switch the viewer into for "use this item's projection".
    pub fn use_projection(&self) -> Option<GeoZone> {
        self.preferred_zone
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status.get()
    }

    /// Shared with worker tasks; the only field both sides write.
    pub fn status_cell(&self) -> &Arc<LoadStatusCell> {
        &self.load_status
    }

    pub fn last_update(&self) -> u64 {
        self.last_update
    }

    /// Records that the item reflects node state up to `stamp`.
    pub fn mark_synced(&mut self, stamp: u64) {
        self.last_update = stamp;
    }

    /// Zone bookkeeping for a projection change.
    ///
    /// Without a zone, `zone` is adopted as both preferred and current only if
    /// `pivot` (a cartesian point of `zone`) lies inside its bounds, edges
    /// included. With a zone, a different SRID replaces the current zone and
    /// the same SRID changes nothing.
    pub fn assign_zone(&mut self, zone: &GeoZone, pivot: Vec3) {
        match self.current_zone {
            None => {
                let ll = zone.to_lat_long(pivot);
                if zone.bounds.contains(ll.x, ll.y) {
                    self.preferred_zone = Some(*zone);
                    self.current_zone = Some(*zone);
                } else {
                    trace!(item = self.id.0, srid = zone.srid, "pivot outside zone bounds");
                }
            }
            Some(current) if current.srid != zone.srid => self.current_zone = Some(*zone),
            Some(_) => {}
        }
    }

    /// Drops the name and both zones.
    pub fn release(&mut self) {
        self.name = String::new();
        self.preferred_zone = None;
        self.current_zone = None;
    }
}

/// One node of the scene tree.
///
/// All methods run on the owning thread. Implementations hand long work to
/// `ctx.spawner` and observe the result through their status cell.
pub trait SceneItem {
    fn base(&self) -> &ItemBase;

    fn base_mut(&mut self) -> &mut ItemBase;

    /// Contributes render submissions for this frame. Does nothing when the
    /// item is hidden and never changes the tree's shape.
    fn add_to_scene(&mut self, ctx: &mut SceneContext<'_>, render: &mut RenderData);

    /// Re-reads type-specific state from the backing node.
    fn on_node_update(&mut self, _ctx: &mut SceneContext<'_>) {}

    fn change_projection(&mut self, _ctx: &mut SceneContext<'_>, zone: &GeoZone) {
        let pivot = self.world_space_pivot();
        self.base_mut().assign_zone(zone, pivot);
    }

    /// Composes `delta` into the item's stored pose.
    fn apply_delta(&mut self, _ctx: &mut SceneContext<'_>, _delta: &Mat4) {}

    fn local_space_pivot(&self) -> Vec3 {
        Vec3::zero()
    }

    fn world_space_matrix(&self) -> Mat4 {
        Mat4::identity()
    }

    fn world_space_pivot(&self) -> Vec3 {
        self.world_space_matrix()
            .transform_point(self.local_space_pivot())
    }

    fn update_node(&mut self, ctx: &mut SceneContext<'_>) {
        sync_from_node(self, ctx);
    }

    /// Releases everything the item owns. Called once, right before the item
    /// is dropped by its parent.
    fn cleanup(&mut self, _ctx: &mut SceneContext<'_>) {
        self.base_mut().release();
    }

    fn as_folder(&self) -> Option<&Folder> {
        None
    }

    fn as_folder_mut(&mut self) -> Option<&mut Folder> {
        None
    }

    /// Point the camera should fly to, expressed in the working zone.
    fn camera_target(&self, working: Option<&GeoZone>) -> Vec3 {
        let pivot = self.world_space_pivot();
        match (self.base().current_zone(), working) {
            (Some(own), Some(working)) if working.is_projected() && own.srid != working.srid => {
                transform_point(pivot, own, working)
            }
            _ => pivot,
        }
    }
}

/// Runs `on_node_update` when the backing node changed since the last sync.
pub fn sync_from_node<I: SceneItem + ?Sized>(item: &mut I, ctx: &mut SceneContext<'_>) {
    let Some(stamp) = ctx.project.last_update(item.base().node) else {
        return;
    };
    if stamp > item.base().last_update() {
        item.on_node_update(ctx);
        // on_node_update may itself write the node; everything up to now is seen.
        let latest = ctx.project.last_update(item.base().node).unwrap_or(stamp);
        item.base_mut().mark_synced(latest);
    }
}
