//! Positioned image overlays with background loading.
//!
//! Load states: `Pending -> Loading -> {Loaded | Failed | OpenFailure}`, and
//! back from any settled state to `Pending` on URI change or refresh tick.
//!
//! A load is claimed by exactly one worker through a compare-and-swap on the
//! item's status cell. The worker moves the fetched bytes into a single-slot
//! mailbox; the owning thread takes them on its next `add_to_scene` and turns
//! them into a texture. Textures are only ever created and destroyed there.

use std::sync::Arc;

use foundation::math::{GeoZone, Mat4, Vec3};
use runtime::TaskKind;
use streaming::{LoadError, LoadStatus, LoadStatusCell, Mailbox, ResourceLoader};
use tracing::{debug, trace, warn};

use crate::context::SceneContext;
use crate::item::{ItemBase, ItemId, ItemKind, SceneItem};
use crate::node::{GeometryKind, MetadataValue, NodeId, ProjectError};
use crate::render::{ImageSubmission, RenderData, TextureHandle};

pub const META_RELOAD_RATE: &str = "reloadRate";
pub const META_IMAGE_SIZE: &str = "imagesize";
pub const META_IMAGE_TYPE: &str = "imagetype";

/// Upper bound of the auto-refresh interval (hourly).
pub const MAX_RELOAD_INTERVAL_SECS: f64 = 3600.0;

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ImageKind {
    #[default]
    Standard,
    Panorama,
    Photosphere,
}

impl ImageKind {
    const ALL: [ImageKind; 3] = [ImageKind::Standard, ImageKind::Panorama, ImageKind::Photosphere];

    pub fn name(&self) -> &'static str {
        match self {
            ImageKind::Standard => "standard",
            ImageKind::Panorama => "panorama",
            ImageKind::Photosphere => "photosphere",
        }
    }

    /// Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ThumbnailSize {
    Native,
    Small,
    #[default]
    Large,
}

impl ThumbnailSize {
    const ALL: [ThumbnailSize; 3] = [ThumbnailSize::Native, ThumbnailSize::Small, ThumbnailSize::Large];

    pub fn name(&self) -> &'static str {
        match self {
            ThumbnailSize::Native => "native",
            ThumbnailSize::Small => "small",
            ThumbnailSize::Large => "large",
        }
    }

    /// Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

pub struct MediaItem {
    base: ItemBase,
    loaded_uri: Option<String>,
    last_load_time: f64,
    reload_interval_secs: f64,
    pending: Arc<Mailbox<Vec<u8>>>,
    display_texture: Option<TextureHandle>,
    pub position: Vec3,
    /// Yaw, pitch, roll in radians.
    pub ypr: Vec3,
    pub scale: Vec3,
    pub tint: [f32; 4],
    pub image_kind: ImageKind,
    pub thumbnail_size: ThumbnailSize,
}

impl MediaItem {
    pub fn new(id: ItemId, node: NodeId, name: impl Into<String>) -> Self {
        Self {
            base: ItemBase::new(id, ItemKind::Media, node, name),
            loaded_uri: None,
            last_load_time: 0.0,
            reload_interval_secs: 0.0,
            pending: Arc::new(Mailbox::new()),
            display_texture: None,
            position: Vec3::zero(),
            ypr: Vec3::zero(),
            scale: Vec3::one(),
            tint: WHITE,
            image_kind: ImageKind::default(),
            thumbnail_size: ThumbnailSize::default(),
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.base.load_status()
    }

    pub fn loaded_uri(&self) -> Option<&str> {
        self.loaded_uri.as_deref()
    }

    pub fn last_load_time(&self) -> f64 {
        self.last_load_time
    }

    pub fn reload_interval(&self) -> f64 {
        self.reload_interval_secs
    }

    pub fn display_texture(&self) -> Option<TextureHandle> {
        self.display_texture
    }

    pub fn has_pending_bytes(&self) -> bool {
        self.pending.is_full()
    }

    fn refresh_due(&self, now: f64) -> bool {
        self.reload_interval_secs != 0.0 && self.last_load_time + self.reload_interval_secs < now
    }

    fn destroy_texture(&mut self, ctx: &mut SceneContext<'_>) {
        if let Some(texture) = self.display_texture.take() {
            ctx.textures.destroy(texture);
        }
    }

    fn submit_load(&self, ctx: &SceneContext<'_>) {
        let Some(uri) = self.loaded_uri.clone() else {
            return;
        };
        let loader = ctx.loader.clone();
        let status = self.base.status_cell().clone();
        let pending = self.pending.clone();
        let item = self.base.id;
        debug!(item = item.0, %uri, "media load scheduled");
        ctx.spawner.spawn(
            TaskKind::Blocking,
            Box::new(move || run_load(item, loader.as_ref(), &uri, &status, &pending)),
        );
    }

    pub fn set_image_kind(
        &mut self,
        ctx: &mut SceneContext<'_>,
        kind: ImageKind,
    ) -> Result<(), ProjectError> {
        self.image_kind = kind;
        self.write_metadata(ctx, META_IMAGE_TYPE, MetadataValue::String(kind.name().to_string()))
    }

    pub fn set_thumbnail_size(
        &mut self,
        ctx: &mut SceneContext<'_>,
        size: ThumbnailSize,
    ) -> Result<(), ProjectError> {
        self.thumbnail_size = size;
        self.write_metadata(ctx, META_IMAGE_SIZE, MetadataValue::String(size.name().to_string()))
    }

    /// Clamped to `[0, MAX_RELOAD_INTERVAL_SECS]`; zero disables refresh.
    pub fn set_reload_interval(
        &mut self,
        ctx: &mut SceneContext<'_>,
        secs: f64,
    ) -> Result<(), ProjectError> {
        let secs = if secs.is_nan() {
            0.0
        } else {
            secs.clamp(0.0, MAX_RELOAD_INTERVAL_SECS)
        };
        self.reload_interval_secs = secs;
        self.write_metadata(ctx, META_RELOAD_RATE, MetadataValue::Number(secs))
    }

    fn write_metadata(
        &mut self,
        ctx: &mut SceneContext<'_>,
        key: &str,
        value: MetadataValue,
    ) -> Result<(), ProjectError> {
        let node = self.base.node;
        ctx.project.set_metadata(node, key, value)?;
        self.mark_own_write(ctx);
        Ok(())
    }

    // Own writes are already applied locally.
    fn mark_own_write(&mut self, ctx: &SceneContext<'_>) {
        if let Some(stamp) = ctx.project.last_update(self.base.node) {
            self.base.mark_synced(stamp);
        }
    }
}

/// Worker side of a load. A task that loses the claim does nothing.
fn run_load(
    item: ItemId,
    loader: &dyn ResourceLoader,
    uri: &str,
    status: &LoadStatusCell,
    pending: &Mailbox<Vec<u8>>,
) {
    if !status.try_claim() {
        trace!(item = item.0, "media load already claimed");
        return;
    }

    match loader.load(uri) {
        Ok(bytes) => {
            let len = bytes.len();
            if pending.deliver(bytes).is_err() {
                debug!(item = item.0, "earlier bytes still pending; dropping fetch");
            }
            status.set(LoadStatus::Loaded);
            debug!(item = item.0, len, "media bytes fetched");
        }
        Err(LoadError::Open(msg)) => {
            warn!(item = item.0, %msg, "media open failed");
            status.set(LoadStatus::OpenFailure);
        }
        Err(LoadError::Other(msg)) => {
            warn!(item = item.0, %msg, "media load failed");
            status.set(LoadStatus::Failed);
        }
    }
}

impl SceneItem for MediaItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ItemBase {
        &mut self.base
    }

    fn on_node_update(&mut self, ctx: &mut SceneContext<'_>) {
        let node = self.base.node;
        let uri = ctx.project.uri(node).map(str::to_string);

        if uri.is_none() {
            self.base.status_cell().set(LoadStatus::Failed);
            self.destroy_texture(ctx);
            self.pending.clear();
            self.loaded_uri = None;
        }

        // Settled loads, failed ones included, retry on a new URI or a
        // refresh tick. In-flight loads are left alone.
        let now = ctx.now();
        let settled = self.base.load_status().is_settled();
        let uri_changed = uri.is_some() && uri != self.loaded_uri;
        let refresh = uri.is_some() && self.refresh_due(now);
        if settled && (uri_changed || refresh) {
            // Bytes from the previous fetch that were never shown belong to
            // the old URI. No worker holds the slot while the load is settled.
            if self.pending.clear() {
                debug!(item = self.base.id.0, "discarding unconsumed media bytes");
            }
            self.base.status_cell().set(LoadStatus::Pending);
            self.loaded_uri = uri;
            self.submit_load(ctx);
            self.last_load_time = now;
        }

        self.reload_interval_secs = ctx.project.metadata_f64(node, META_RELOAD_RATE, 0.0);

        self.ypr = Vec3::zero();
        self.scale = Vec3::one();
        self.tint = WHITE;
        self.thumbnail_size = ctx
            .project
            .metadata_str(node, META_IMAGE_SIZE)
            .and_then(ThumbnailSize::from_name)
            .unwrap_or_default();
        self.image_kind = ctx
            .project
            .metadata_str(node, META_IMAGE_TYPE)
            .and_then(ImageKind::from_name)
            .unwrap_or_default();

        if let Some(zone) = ctx.zone {
            self.change_projection(ctx, &zone);
        }
    }

    fn add_to_scene(&mut self, ctx: &mut SceneContext<'_>, render: &mut RenderData) {
        if !self.base.visible {
            return;
        }

        if let Some(texture) = self.display_texture {
            render.insert_image(ImageSubmission {
                item: self.base.id,
                texture,
                position: self.position,
                ypr: self.ypr,
                scale: self.scale,
                tint: self.tint,
                kind: self.image_kind,
                size: self.thumbnail_size,
                distance_sq: self.position.distance_squared(ctx.camera_position),
            });
        }

        if self.refresh_due(ctx.now()) {
            self.on_node_update(ctx);
        }

        if self.base.load_status() != LoadStatus::Loaded {
            return;
        }
        if let Some(bytes) = self.pending.take() {
            self.destroy_texture(ctx);
            match ctx.textures.build_from_memory(&bytes) {
                Ok(texture) => self.display_texture = Some(texture),
                Err(err) => {
                    warn!(item = self.base.id.0, %err, "media texture build failed");
                    self.base.status_cell().set(LoadStatus::Failed);
                }
            }
        }
    }

    fn change_projection(&mut self, ctx: &mut SceneContext<'_>, zone: &GeoZone) {
        match ctx.project.geometry(self.base.node, zone) {
            Ok(points) if points.len() == 1 => self.position = points[0],
            Ok(points) => trace!(item = self.base.id.0, count = points.len(), "media geometry ignored"),
            Err(err) => trace!(item = self.base.id.0, %err, "media geometry unavailable"),
        }
        let pivot = self.world_space_pivot();
        self.base.assign_zone(zone, pivot);
    }

    fn apply_delta(&mut self, ctx: &mut SceneContext<'_>, delta: &Mat4) {
        let pose = *delta * Mat4::from_trs(self.position, self.ypr, self.scale);
        let parts = pose.decompose();
        self.position = parts.position;
        self.ypr = parts.ypr;
        self.scale = parts.scale;

        let Some(zone) = ctx.zone else {
            return;
        };
        let node = self.base.node;
        match ctx
            .project
            .set_geometry(node, &zone, GeometryKind::Point, &[self.position])
        {
            Ok(()) => self.mark_own_write(ctx),
            Err(err) => warn!(item = self.base.id.0, %err, "media geometry write failed"),
        }
    }

    fn world_space_matrix(&self) -> Mat4 {
        Mat4::translation(self.position)
    }

    fn cleanup(&mut self, ctx: &mut SceneContext<'_>) {
        self.loaded_uri = None;
        self.pending.clear();
        self.destroy_texture(ctx);
        self.base.release();
    }
}
