//! Folders: ordered containers of child items, plus the per-item load indicator.

use foundation::math::{GeoZone, Mat4};
use streaming::LoadStatus;

use crate::context::SceneContext;
use crate::item::{ItemBase, ItemId, ItemKind, SceneItem, sync_from_node};
use crate::node::NodeId;
use crate::render::RenderData;
use crate::selection::SelectionSet;
use crate::tree::remove_item;

/// Children reserved up front so interactive edits rarely reallocate.
pub const FOLDER_INITIAL_CAPACITY: usize = 64;

/// An item that owns an ordered list of child items.
///
/// Child order is the visual stacking order and survives every insert,
/// remove and reorder.
pub struct Folder {
    base: ItemBase,
    children: Vec<Box<dyn SceneItem>>,
}

impl Folder {
    pub fn new(id: ItemId, node: NodeId, name: impl Into<String>) -> Self {
        Self {
            base: ItemBase::new(id, ItemKind::Folder, node, name),
            children: Vec::with_capacity(FOLDER_INITIAL_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &[Box<dyn SceneItem>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&dyn SceneItem> {
        self.children.get(index).map(|c| c.as_ref())
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut (dyn SceneItem + 'static)> {
        self.children.get_mut(index).map(|c| c.as_mut())
    }

    pub fn push_child(&mut self, item: Box<dyn SceneItem>) {
        self.children.push(item);
    }

    /// Inserts at `index`, clamped to the end. Returns the index used.
    pub fn insert_child(&mut self, index: usize, item: Box<dyn SceneItem>) -> usize {
        let at = index.min(self.children.len());
        self.children.insert(at, item);
        at
    }

    /// Moves the child at `from` so it ends up at `to` (clamped).
    pub fn move_child(&mut self, from: usize, to: usize) -> bool {
        if from >= self.children.len() {
            return false;
        }
        let item = self.children.remove(from);
        let to = to.min(self.children.len());
        self.children.insert(to, item);
        true
    }

    /// Destroys the subtree at `index`; later children shift down by one.
    pub fn remove_child(&mut self, ctx: &mut SceneContext<'_>, index: usize) -> bool {
        remove_item(ctx, self, index)
    }

    /// Detaches a child without running any cleanup.
    pub(crate) fn take_child(&mut self, index: usize) -> Option<Box<dyn SceneItem>> {
        if index >= self.children.len() {
            return None;
        }
        Some(self.children.remove(index))
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.children.iter().position(|c| c.base().id == id)
    }

    /// Depth-first search for `id` below this folder.
    pub fn find(&self, id: ItemId) -> Option<&dyn SceneItem> {
        for child in &self.children {
            if child.base().id == id {
                return Some(child.as_ref());
            }
            if let Some(hit) = child.as_folder().and_then(|f| f.find(id)) {
                return Some(hit);
            }
        }
        None
    }

    pub fn find_mut(&mut self, id: ItemId) -> Option<&mut (dyn SceneItem + 'static)> {
        let (parent, index) = self.locate_mut(id)?;
        parent.child_mut(index)
    }

    /// The folder directly holding `id`, and its index there.
    pub fn locate_mut(&mut self, id: ItemId) -> Option<(&mut Folder, usize)> {
        if let Some(index) = self.position(id) {
            return Some((self, index));
        }
        for child in self.children.iter_mut() {
            if let Some(hit) = child.as_folder_mut().and_then(|f| f.locate_mut(id)) {
                return Some(hit);
            }
        }
        None
    }

    /// Depth-first, parents before children.
    pub fn visit(&self, f: &mut dyn FnMut(&dyn SceneItem)) {
        for child in &self.children {
            f(child.as_ref());
            if let Some(folder) = child.as_folder() {
                folder.visit(f);
            }
        }
    }

    /// Mirrors `selection` onto the children's flags. Rename mode survives
    /// only on the sole selected item.
    pub fn sync_ui_state(&mut self, selection: &SelectionSet) {
        let sole = selection.sole();
        for child in self.children.iter_mut() {
            let base = child.base_mut();
            base.selected = selection.contains(base.id);
            base.editing_name = base.editing_name && sole == Some(base.id);
            if let Some(folder) = child.as_folder_mut() {
                folder.sync_ui_state(selection);
            }
        }
    }

    /// Enters rename mode for the child at `index` if it is the sole
    /// selection.
    pub fn begin_rename(&mut self, index: usize, selection: &SelectionSet) -> bool {
        let Some(child) = self.children.get_mut(index) else {
            return false;
        };
        let base = child.base_mut();
        if selection.sole() != Some(base.id) {
            return false;
        }
        base.editing_name = true;
        true
    }
}

impl SceneItem for Folder {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        &mut self.base
    }

    fn add_to_scene(&mut self, ctx: &mut SceneContext<'_>, render: &mut RenderData) {
        if !self.base.visible {
            return;
        }
        for child in self.children.iter_mut() {
            child.add_to_scene(ctx, render);
        }
    }

    // Projection and delta reach hidden subtrees too.
    fn change_projection(&mut self, ctx: &mut SceneContext<'_>, zone: &GeoZone) {
        for child in self.children.iter_mut() {
            child.change_projection(ctx, zone);
        }
    }

    fn apply_delta(&mut self, ctx: &mut SceneContext<'_>, delta: &Mat4) {
        for child in self.children.iter_mut() {
            child.apply_delta(ctx, delta);
        }
    }

    fn update_node(&mut self, ctx: &mut SceneContext<'_>) {
        sync_from_node(self, ctx);
        for child in self.children.iter_mut() {
            child.update_node(ctx);
        }
    }

    fn cleanup(&mut self, ctx: &mut SceneContext<'_>) {
        while !self.children.is_empty() {
            remove_item(ctx, self, 0);
        }
        self.base.release();
    }

    fn as_folder(&self) -> Option<&Folder> {
        Some(self)
    }

    fn as_folder_mut(&mut self) -> Option<&mut Folder> {
        Some(self)
    }
}

/// Tree-row status badge for an item's load state.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoadIndicator {
    pub glyph: &'static str,
    pub colour: [f32; 4],
    /// String-table key for the hover tooltip.
    pub tooltip: &'static str,
}

const SPINNER: [&str; 4] = ["\u{25B2}", "\u{25B6}", "\u{25BC}", "\u{25C0}"];
const WARNING_SIGN: &str = "\u{26A0}";
const YELLOW: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

impl LoadIndicator {
    /// `None` for settled-and-healthy states. The loading spinner advances
    /// ten frames per second of `now_secs`.
    pub fn for_status(status: LoadStatus, now_secs: f64) -> Option<Self> {
        match status {
            LoadStatus::Pending => Some(Self {
                glyph: WARNING_SIGN,
                colour: YELLOW,
                tooltip: "Pending",
            }),
            LoadStatus::Loading => {
                let frame = ((now_secs * 10.0).max(0.0) as u64 % SPINNER.len() as u64) as usize;
                Some(Self {
                    glyph: SPINNER[frame],
                    colour: YELLOW,
                    tooltip: "Loading",
                })
            }
            LoadStatus::Failed => Some(Self {
                glyph: WARNING_SIGN,
                colour: RED,
                tooltip: "ModelLoadFailure",
            }),
            LoadStatus::OpenFailure => Some(Self {
                glyph: WARNING_SIGN,
                colour: RED,
                tooltip: "ModelOpenFailure",
            }),
            LoadStatus::NotLoaded | LoadStatus::Loaded => None,
        }
    }
}
