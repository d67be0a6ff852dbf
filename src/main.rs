use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::info;

use viewer_runtime::app::ViewerSummary;
use viewer_runtime::{JsonAssetLoader, ManualClock, ViewerConfig, ViewerLauncher};

const FRAME_MILLIS: u64 = 16;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let config = ViewerConfig::from_path(&options.path)
        .with_context(|| format!("failed to load configuration {}", options.path))?;
    let root = Path::new(&options.path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let clock = Arc::new(ManualClock::new());
    let launcher = ViewerLauncher::with_clock(Arc::new(JsonAssetLoader::new(root)), clock.clone());
    let viewer = launcher
        .create_offscreen_viewer(options.width, options.height)
        .context("failed to create viewer")?;

    viewer.init(config);
    for _ in 0..options.frames {
        clock.advance_millis(FRAME_MILLIS);
        viewer.tick();
    }
    info!("ran {} tick(s)", options.frames);

    println!("{}", ViewerSummary::capture(&viewer));
    viewer.dispose();
    Ok(())
}

struct CliOptions {
    path: String,
    frames: u32,
    width: u32,
    height: u32,
}

impl CliOptions {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let Some(path) = args.next() else {
            bail!("Usage: viewer-runtime <config.json> [--frames N] [--size WIDTHxHEIGHT]");
        };
        let mut options = Self {
            path,
            frames: 1,
            width: 800,
            height: 600,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => {
                    let value = args.next().ok_or_else(|| anyhow!("--frames needs a value"))?;
                    options.frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count: {value}"))?;
                }
                "--size" => {
                    let value = args.next().ok_or_else(|| anyhow!("--size needs a value"))?;
                    let (width, height) = value
                        .split_once('x')
                        .ok_or_else(|| anyhow!("invalid size {value}; expected WIDTHxHEIGHT"))?;
                    options.width = width
                        .parse()
                        .with_context(|| format!("invalid width: {width}"))?;
                    options.height = height
                        .parse()
                        .with_context(|| format!("invalid height: {height}"))?;
                }
                other => {
                    bail!("Unknown argument: {other}. Expected --frames or --size");
                }
            }
        }
        Ok(options)
    }
}
