//! The scene tree and the single removal routine every teardown goes through.

use std::fmt;

use foundation::math::{GeoZone, Mat4, Vec3};
use tracing::{debug, warn};

use crate::context::SceneContext;
use crate::folder::Folder;
use crate::item::{ItemId, ItemKind, SceneItem};
use crate::media::MediaItem;
use crate::node::{GeometryKind, NodeId, ProjectError, ProjectStore};
use crate::render::RenderData;
use crate::selection::SelectionSet;

#[derive(Debug)]
pub enum SceneError {
    Project(ProjectError),
    NotAFolder(ItemId),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Project(err) => write!(f, "project error: {err}"),
            SceneError::NotAFolder(id) => write!(f, "item {} is not a folder", id.0),
        }
    }
}

impl std::error::Error for SceneError {}

impl From<ProjectError> for SceneError {
    fn from(err: ProjectError) -> Self {
        SceneError::Project(err)
    }
}

/// Detaches the child at `index`, runs its cleanup and drops its node.
///
/// Every removal, user-initiated or part of a folder teardown, goes through
/// here so cleanup hooks run the same way regardless of order.
pub fn remove_item(ctx: &mut SceneContext<'_>, parent: &mut Folder, index: usize) -> bool {
    let Some(mut item) = parent.take_child(index) else {
        return false;
    };
    let id = item.base().id;
    let node = item.base().node;
    item.cleanup(ctx);
    if let Err(err) = ctx.project.remove_node(node) {
        warn!(item = id.0, %err, "scene node already gone");
    }
    debug!(item = id.0, "scene item removed");
    true
}

pub struct Scene {
    root: Folder,
    next_id: u32,
    selection: SelectionSet,
}

impl Scene {
    pub fn new(root_node: NodeId, name: impl Into<String>) -> Self {
        Self {
            root: Folder::new(ItemId(0), root_node, name),
            next_id: 1,
            selection: SelectionSet::new(),
        }
    }

    /// Mirrors the project's node tree. Nodes of unknown type are skipped
    /// along with their subtree.
    pub fn from_project(project: &dyn ProjectStore) -> Self {
        let root_node = project.root();
        let (name, children) = project
            .node(root_node)
            .map(|n| (n.name.clone(), n.children.clone()))
            .unwrap_or_default();
        let mut scene = Self::new(root_node, name);
        for child in children {
            if let Some(item) = scene.build_item(project, child) {
                scene.root.push_child(item);
            }
        }
        scene
    }

    fn build_item(&mut self, project: &dyn ProjectStore, node: NodeId) -> Option<Box<dyn SceneItem>> {
        let record = project.node(node)?;
        let Some(kind) = ItemKind::from_type_tag(&record.item_type) else {
            warn!(node = node.0, item_type = %record.item_type, "unsupported scene node type");
            return None;
        };
        let id = self.allocate_id();
        match kind {
            ItemKind::Folder => {
                let mut folder = Folder::new(id, node, record.name.clone());
                for child in record.children.clone() {
                    if let Some(item) = self.build_item(project, child) {
                        folder.push_child(item);
                    }
                }
                Some(Box::new(folder))
            }
            ItemKind::Media => Some(Box::new(MediaItem::new(id, node, record.name.clone()))),
        }
    }

    pub fn allocate_id(&mut self) -> ItemId {
        let id = ItemId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn root(&self) -> &Folder {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Folder {
        &mut self.root
    }

    pub fn find(&self, id: ItemId) -> Option<&dyn SceneItem> {
        if id == self.root.base().id {
            return Some(&self.root);
        }
        self.root.find(id)
    }

    pub fn find_mut(&mut self, id: ItemId) -> Option<&mut (dyn SceneItem + 'static)> {
        self.root.find_mut(id)
    }

    /// Items below the root.
    pub fn item_count(&self) -> usize {
        let mut n = 0;
        self.root.visit(&mut |_| n += 1);
        n
    }

    /// Creates a node under `parent`'s node and the matching item at the end
    /// of `parent`. `position` is a cartesian point of the working zone.
    pub fn create_item(
        &mut self,
        ctx: &mut SceneContext<'_>,
        parent: ItemId,
        kind: ItemKind,
        name: &str,
        uri: Option<&str>,
        position: Option<Vec3>,
    ) -> Result<ItemId, SceneError> {
        let id = self.allocate_id();
        let folder = if parent == self.root.base().id {
            &mut self.root
        } else {
            self.root
                .find_mut(parent)
                .and_then(|item| item.as_folder_mut())
                .ok_or(SceneError::NotAFolder(parent))?
        };

        let node = ctx
            .project
            .create_node(folder.base().node, kind.type_tag(), name, uri)?;
        if let (Some(p), Some(zone)) = (position, ctx.zone) {
            ctx.project
                .set_geometry(node, &zone, GeometryKind::Point, &[p])?;
        }

        let item: Box<dyn SceneItem> = match kind {
            ItemKind::Folder => Box::new(Folder::new(id, node, name)),
            ItemKind::Media => Box::new(MediaItem::new(id, node, name)),
        };
        folder.push_child(item);
        debug!(item = id.0, kind = kind.type_tag(), "scene item created");
        Ok(id)
    }

    /// Removes `id` and its subtree. Removed items leave the selection.
    pub fn remove(&mut self, ctx: &mut SceneContext<'_>, id: ItemId) -> bool {
        let Some((parent, index)) = self.root.locate_mut(id) else {
            return false;
        };
        let mut gone = vec![id];
        if let Some(folder) = parent.child(index).and_then(|c| c.as_folder()) {
            folder.visit(&mut |item| gone.push(item.base().id));
        }
        let removed = remove_item(ctx, parent, index);
        for id in gone {
            self.selection.remove(id);
        }
        removed
    }

    /// Moves `id` with its subtree under the folder `target` at `index` (clamped), in both the
    /// scene and the project.
    pub fn reparent(
        &mut self,
        ctx: &mut SceneContext<'_>,
        id: ItemId,
        target: ItemId,
        index: usize,
    ) -> Result<(), SceneError> {
        let is_descendant = self
            .root
            .find(id)
            .and_then(|item| item.as_folder())
            .is_some_and(|f| f.find(target).is_some());
        if id == target || is_descendant {
            return Err(SceneError::NotAFolder(target));
        }
        let target_is_folder = target == self.root.base().id
            || self
                .root
                .find(target)
                .is_some_and(|item| item.as_folder().is_some());
        if !target_is_folder {
            return Err(SceneError::NotAFolder(target));
        }

        let Some((parent, from)) = self.root.locate_mut(id) else {
            return Err(SceneError::NotAFolder(id));
        };
        let Some(item) = parent.take_child(from) else {
            return Err(SceneError::NotAFolder(id));
        };
        let folder = if target == self.root.base().id {
            &mut self.root
        } else {
            match self.root.find_mut(target).and_then(|t| t.as_folder_mut()) {
                Some(folder) => folder,
                None => return Err(SceneError::NotAFolder(target)),
            }
        };
        let node = item.base().node;
        let target_node = folder.base().node;
        let placed = folder.insert_child(index, item);
        ctx.project.move_node(node, target_node, placed)?;
        Ok(())
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn select(&mut self, id: ItemId, additive: bool) {
        if !additive {
            self.selection.clear();
        }
        self.selection.insert(id);
        self.root.sync_ui_state(&self.selection);
    }

    pub fn deselect(&mut self, id: ItemId) {
        self.selection.remove(id);
        self.root.sync_ui_state(&self.selection);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.root.sync_ui_state(&self.selection);
    }

    pub fn begin_rename(&mut self, id: ItemId) -> bool {
        let Some((parent, index)) = self.root.locate_mut(id) else {
            return false;
        };
        parent.begin_rename(index, &self.selection)
    }

    /// One owning-thread pass: pick up node edits, then collect submissions.
    pub fn frame(&mut self, ctx: &mut SceneContext<'_>, render: &mut RenderData) {
        self.root.update_node(ctx);
        self.root.add_to_scene(ctx, render);
    }

    /// Switches the working zone and reprojects the whole tree.
    pub fn change_projection(&mut self, ctx: &mut SceneContext<'_>, zone: GeoZone) {
        ctx.zone = Some(zone);
        self.root.change_projection(ctx, &zone);
    }

    /// Adopts `id`'s home zone as the working zone.
    pub fn use_item_projection(&mut self, ctx: &mut SceneContext<'_>, id: ItemId) -> Option<GeoZone> {
        let zone = self.find(id)?.base().use_projection()?;
        self.change_projection(ctx, zone);
        Some(zone)
    }

    /// Applies `delta` to every selected item. Returns how many were moved.
    pub fn apply_delta_to_selection(&mut self, ctx: &mut SceneContext<'_>, delta: &Mat4) -> usize {
        let ids: Vec<ItemId> = self.selection.iter().collect();
        let mut moved = 0;
        for id in ids {
            if let Some(item) = self.root.find_mut(id) {
                item.apply_delta(ctx, delta);
                item.base_mut().moved = true;
                moved += 1;
            }
        }
        moved
    }

    pub fn camera_target(&self, id: ItemId, working: Option<&GeoZone>) -> Option<Vec3> {
        Some(self.find(id)?.camera_target(working))
    }

    /// Tears down every item below the root.
    pub fn init_blank(&mut self, ctx: &mut SceneContext<'_>) {
        while !self.root.is_empty() {
            remove_item(ctx, &mut self.root, 0);
        }
        self.selection.clear();
    }
}
