pub mod context;
pub mod folder;
pub mod item;
pub mod media;
pub mod node;
pub mod render;
pub mod selection;
pub mod tree;

#[cfg(test)]
mod test_support;

pub use context::SceneContext;
pub use folder::{Folder, LoadIndicator};
pub use item::{ItemBase, ItemId, ItemKind, SceneItem};
pub use media::{ImageKind, MediaItem, ThumbnailSize};
pub use node::{MemoryProject, NodeId, ProjectError, ProjectStore, SceneNode};
pub use render::{DecodedTextures, RenderData, TextureBuilder, TextureHandle};
pub use selection::SelectionSet;
pub use tree::{Scene, SceneError};
