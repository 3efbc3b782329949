//! Streams a synthetic tileset through the pooling engine against an
//! in-memory scene backend and reports what happened.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p strata-demo -- --geometry-pool-capacity 16 --random-colors`.

mod synthetic;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use strata_config::{CliArgs, Config};
use strata_coords::Cartographic;
use strata_scene::MemoryBackend;
use strata_tiles::{StreamingContext, TileKey, TileStreamer, TilesetOptions};
use tracing::{error, info, warn};

use synthetic::{TileStyle, imagery_image, terrain_tile, tile_transform};

/// Tiles per tileset edge.
const GRID_TILES: u32 = 4;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| PathBuf::from(".strata"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    let debug_build = cfg!(debug_assertions);
    if let Err(e) = strata_log::init_logging(Some(&log_dir), debug_build, Some(&config)) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("demo failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut backend = MemoryBackend::new();
    let mut ctx = StreamingContext::from_config(config, &mut backend)?;
    ctx.coordinates_mut()
        .set_georeference_origin(Cartographic::from_degrees(-105.27, 40.01, 1655.0));

    let origin_frame = ctx.coordinates().local_to_global();
    let mut terrain = TileStreamer::from_config(
        &mut ctx,
        TilesetOptions {
            has_imagery: true,
            tileset_material: None,
        },
        &config.streaming,
    );
    let mut overlay =
        TileStreamer::from_config(&mut ctx, TilesetOptions::default(), &config.streaming);

    // --- Load ---
    let mut rng = StdRng::seed_from_u64(7);
    let mut requested = Vec::new();
    for y in 0..GRID_TILES {
        for x in 0..GRID_TILES {
            let index = u64::from(y * GRID_TILES + x);
            let key = TileKey(index);
            let content = terrain_tile(&mut rng, TileStyle::for_index(index));
            let transform = origin_frame * tile_transform(x, y);
            if terrain.request_load(key, content, transform) {
                requested.push(key);
            } else {
                warn!(tile = %key, "load deferred");
            }
        }
    }
    let overlay_key = TileKey(0);
    overlay.request_load(
        overlay_key,
        terrain_tile(&mut rng, TileStyle::Flat),
        origin_frame,
    );

    let start = Instant::now();
    let mut frames = 0;
    let mut failed = 0;
    while terrain.loading_count() + overlay.loading_count() > 0 {
        let report = terrain.update(&ctx, &mut backend);
        failed += report.failed + overlay.update(&ctx, &mut backend).failed;
        frames += 1;
        if start.elapsed() > Duration::from_secs(10) {
            warn!("gave up waiting for tiles after {frames} frames");
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    info!(
        frames,
        loaded = terrain.loaded_count() + overlay.loaded_count(),
        failed,
        "initial load complete"
    );

    // --- Show, drape imagery ---
    let imagery = imagery_image(32);
    for &key in &requested {
        if terrain.status(key).is_none() {
            continue;
        }
        terrain.set_visible(key, true, &mut backend)?;
        if let Err(e) = terrain.attach_imagery(key, &imagery, &ctx, &mut backend) {
            warn!(tile = %key, "imagery not attached: {e}");
        }
    }
    if overlay.status(overlay_key).is_some() {
        overlay.set_visible(overlay_key, true, &mut backend)?;
    }
    print_statistics("after load", &ctx, &backend);

    // --- Origin shift ---
    backend.reset_counters();
    ctx.coordinates_mut()
        .set_georeference_origin(Cartographic::from_degrees(-105.20, 40.05, 1600.0));
    let pushed = terrain.update(&ctx, &mut backend).transforms_pushed
        + overlay.update(&ctx, &mut backend).transforms_pushed;
    let counters = backend.counters();
    info!(
        pushed,
        created = counters.created,
        destroyed = counters.destroyed,
        "origin shifted"
    );

    // --- Unload half ---
    for key in requested.iter().copied().filter(|key| key.0 % 2 == 1) {
        if terrain.status(key).is_some() {
            let _ = terrain.detach_imagery(key, &ctx, &mut backend);
            terrain.request_unload(key, &ctx, &mut backend)?;
        }
    }
    print_statistics("after unload", &ctx, &backend);

    // --- Teardown ---
    terrain.teardown(&ctx, &mut backend)?;
    overlay.teardown(&ctx, &mut backend)?;
    ctx.resources().shutdown(&mut backend);
    info!(live = backend.live_count(), "shut down");
    Ok(())
}

fn print_statistics(label: &str, ctx: &StreamingContext, backend: &MemoryBackend) {
    let stats = ctx.resources().statistics();
    println!("--- {label} ---");
    println!(
        "geometries: {}/{} in {} pools",
        stats.geometries_loaded, stats.geometries_capacity, stats.geometry_pools
    );
    println!(
        "materials:  {}/{} in {} pools, {} shared",
        stats.materials_loaded,
        stats.materials_capacity,
        stats.material_pools,
        stats.shared_materials
    );
    println!("textures:   {}/{}", stats.textures_loaded, stats.textures_capacity);
    println!("triangles:  {}", stats.triangles_loaded);
    println!("backend:    {} live resources", backend.live_count());
}
