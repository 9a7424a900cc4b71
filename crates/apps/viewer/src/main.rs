use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use foundation::math::{GeoZone, Vec3};
use foundation::time::{Clock, SystemClock};
use runtime::WorkerRuntime;
use scene::{
    DecodedTextures, LoadIndicator, MemoryProject, RenderData, Scene, SceneContext, SceneItem,
};
use streaming::{HttpLoader, ResourceLoader, UriLoader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless scene viewer: streams the media of a project")]
struct Args {
    /// Project document (JSON)
    project: PathBuf,

    /// Frames to run before exiting (default: VIEWER_FRAMES or 120)
    #[arg(long)]
    frames: Option<u32>,

    /// Working zone SRID (default: VIEWER_SRID or 4326)
    #[arg(long)]
    srid: Option<u32>,

    /// Only load file URIs
    #[arg(long)]
    offline: bool,
}

#[derive(Debug, Clone)]
struct ViewerConfig {
    workers: usize,
    frames: u32,
    frame_interval: Duration,
    http_timeout: Duration,
    srid: u32,
    idle_timeout: Duration,
}

impl ViewerConfig {
    fn from_env(args: &Args) -> Self {
        Self {
            workers: env_var_usize("VIEWER_WORKERS", 4),
            frames: args.frames.unwrap_or_else(|| env_var_u32("VIEWER_FRAMES", 120)),
            frame_interval: Duration::from_millis(env_var_u32("VIEWER_FRAME_MS", 16) as u64),
            http_timeout: Duration::from_secs(env_var_u32("VIEWER_HTTP_TIMEOUT_SECS", 30) as u64),
            srid: args.srid.unwrap_or_else(|| env_var_u32("VIEWER_SRID", 4326)),
            idle_timeout: Duration::from_secs(env_var_u32("VIEWER_IDLE_TIMEOUT_SECS", 10) as u64),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = ViewerConfig::from_env(&args);
    info!(?config, project = %args.project.display(), "starting viewer");

    let mut project = MemoryProject::load(&args.project)?;
    let zone = GeoZone::from_srid(config.srid)?;
    let http = if args.offline {
        None
    } else {
        Some(HttpLoader::new(config.http_timeout)?)
    };
    let loader: Arc<dyn ResourceLoader> = Arc::new(UriLoader::new(http));

    let runtime = WorkerRuntime::new(config.workers)?;
    let pool = runtime.pool::<()>();
    let clock = SystemClock;
    let mut textures = DecodedTextures::new();
    let mut render = RenderData::new();
    let mut scene = Scene::from_project(&project);
    info!(items = scene.item_count(), "scene built");

    for frame in 0..config.frames {
        let mut ctx = SceneContext {
            project: &mut project,
            spawner: &pool,
            loader: loader.clone(),
            textures: &mut textures,
            clock: &clock,
            zone: Some(zone),
            camera_position: Vec3::zero(),
        };
        render.clear();
        scene.frame(&mut ctx, &mut render);
        if frame % 30 == 0 {
            info!(
                frame,
                images = render.images().len(),
                in_flight = pool.in_flight(),
                "frame"
            );
        }
        std::thread::sleep(config.frame_interval);
    }

    if !pool.wait_idle(config.idle_timeout) {
        warn!(in_flight = pool.in_flight(), "loads still running at exit");
    }
    report(&scene, &clock);

    let mut ctx = SceneContext {
        project: &mut project,
        spawner: &pool,
        loader,
        textures: &mut textures,
        clock: &clock,
        zone: Some(zone),
        camera_position: Vec3::zero(),
    };
    scene.root_mut().cleanup(&mut ctx);
    info!(textures = textures.len(), "viewer stopped");
    Ok(())
}

fn report(scene: &Scene, clock: &SystemClock) {
    let now = clock.epoch_secs();
    scene.root().visit(&mut |item| {
        let base = item.base();
        match LoadIndicator::for_status(base.load_status(), now) {
            Some(indicator) => warn!(
                item = %base.name,
                status = ?base.load_status(),
                tooltip = indicator.tooltip,
                "item not ready"
            ),
            None => info!(item = %base.name, status = ?base.load_status(), "item ready"),
        }
    });
}

fn env_var_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_var_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
