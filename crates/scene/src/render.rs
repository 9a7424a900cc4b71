//! Per-frame render submissions and owning-thread textures.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::thread::ThreadId;

use foundation::math::{Vec3, stable_total_cmp_f64};
use tracing::debug;

use crate::item::ItemId;
use crate::media::{ImageKind, ThumbnailSize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    Decode(String),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::Decode(msg) => write!(f, "texture decode failed: {msg}"),
        }
    }
}

impl std::error::Error for TextureError {}

/// Builds and destroys display textures. Only ever called from the owning
/// thread.
pub trait TextureBuilder {
    fn build_from_memory(&mut self, bytes: &[u8]) -> Result<TextureHandle, TextureError>;

    fn destroy(&mut self, texture: TextureHandle);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSubmission {
    pub item: ItemId,
    pub texture: TextureHandle,
    pub position: Vec3,
    pub ypr: Vec3,
    pub scale: Vec3,
    pub tint: [f32; 4],
    pub kind: ImageKind,
    pub size: ThumbnailSize,
    pub distance_sq: f64,
}

/// Everything the scene contributes to one frame.
#[derive(Debug, Default)]
pub struct RenderData {
    images: Vec<ImageSubmission>,
}

impl RenderData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts keeping the list ordered by ascending camera distance.
    ///
    /// Linear scan per insert, so a frame costs O(n²) in the number of visible
    /// images. Equal distances keep submission order.
    pub fn insert_image(&mut self, image: ImageSubmission) {
        let at = self
            .images
            .iter()
            .position(|existing| {
                stable_total_cmp_f64(existing.distance_sq, image.distance_sq) == Ordering::Greater
            })
            .unwrap_or(self.images.len());
        self.images.insert(at, image);
    }

    pub fn images(&self) -> &[ImageSubmission] {
        &self.images
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// CPU-side texture store backed by the `image` crate.
///
/// Bound to the thread that created it; building or destroying from any other
/// thread is a programming error and trips a debug assertion.
#[derive(Debug)]
pub struct DecodedTextures {
    owner: ThreadId,
    next: u64,
    textures: HashMap<TextureHandle, DecodedImage>,
}

impl Default for DecodedTextures {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodedTextures {
    pub fn new() -> Self {
        Self {
            owner: std::thread::current().id(),
            next: 1,
            textures: HashMap::new(),
        }
    }

    pub fn get(&self, texture: TextureHandle) -> Option<&DecodedImage> {
        self.textures.get(&texture)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn assert_owner(&self) {
        debug_assert_eq!(
            std::thread::current().id(),
            self.owner,
            "textures touched off the owning thread"
        );
    }
}

impl TextureBuilder for DecodedTextures {
    fn build_from_memory(&mut self, bytes: &[u8]) -> Result<TextureHandle, TextureError> {
        self.assert_owner();
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| TextureError::Decode(e.to_string()))?
            .to_rgba8();
        let handle = TextureHandle(self.next);
        self.next += 1;
        debug!(
            handle = handle.0,
            width = decoded.width(),
            height = decoded.height(),
            "texture built"
        );
        self.textures.insert(
            handle,
            DecodedImage {
                width: decoded.width(),
                height: decoded.height(),
                rgba: decoded.into_raw(),
            },
        );
        Ok(handle)
    }

    fn destroy(&mut self, texture: TextureHandle) {
        self.assert_owner();
        self.textures.remove(&texture);
    }
}
