use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glance_core::{classify, LandmarkSet, Person};
use glance_hw::{V4lCamera, V4lProvider};
use glance_models::{OnnxFaceDetector, OnnxLandmarkEstimator};
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod view;

use config::Config;
use engine::{spawn_engine, OverlayOutput};
use view::{render_alert, render_person, ModelState, CAMERA_ACCESS_MESSAGE};

/// The detector and landmark model are configured for a single face.
const MAX_FACES: usize = 1;

#[derive(Parser)]
#[command(name = "glance", about = "Camera emotion alerts with a schedule view")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the camera and print emotion alerts as they appear
    Run {
        /// Stop after this many rendered frames (runs until Ctrl-C if unset)
        #[arg(short, long)]
        frames: Option<u64>,
    },
    /// Classify a landmark set read from a JSON file
    Classify {
        /// JSON array of {"x": .., "y": ..} keypoints
        path: PathBuf,
    },
    /// Show the person card and schedule
    Schedule {
        /// TOML schedule file (overrides GLANCE_SCHEDULE_PATH)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// List video capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Run { frames } => run(&config, frames).await?,
        Commands::Classify { path } => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let landmarks = LandmarkSet::from_json(&text).context("parsing landmarks")?;
            match classify(&landmarks) {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => bail!(
                    "need at least {} keypoints, got {}",
                    glance_core::classifier::MIN_KEYPOINTS,
                    landmarks.len()
                ),
            }
        }
        Commands::Schedule { file } => {
            let person = load_person(file.or(config.schedule_path.clone()))?;
            print!("{}", render_person(Some(&person)));
        }
        Commands::Devices => {
            let devices = V4lCamera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for dev in devices {
                println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}

fn load_person(path: Option<PathBuf>) -> Result<Person> {
    match path {
        Some(path) => Person::load(&path).with_context(|| format!("loading {}", path.display())),
        None => Ok(Person::sample()),
    }
}

/// Forward each line typed on stdin as a retry request.
///
/// Reads on a detached std thread.
fn retry_on_enter() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() || tx.blocking_send(()).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run(config: &Config, max_frames: Option<u64>) -> Result<()> {
    let person = load_person(config.schedule_path.clone())?;
    print!("{}", render_person(Some(&person)));
    println!();

    if let Some(dir) = &config.overlay_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let detector_path = config.detector_model_path();
    let landmark_path = config.landmark_model_path();
    let (det_size, det_threshold, lm_size) = (
        config.detector_input_size,
        config.detector_threshold,
        config.landmark_input_size,
    );

    tracing::info!(device = %config.camera_device, "glance starting");

    let handle = spawn_engine(
        V4lProvider::new(config.camera_device.clone()),
        config.capture_request(),
        move || {
            let detector =
                OnnxFaceDetector::load(&detector_path, det_size, det_threshold, MAX_FACES)?;
            let estimator = OnnxLandmarkEstimator::load(&landmark_path, lm_size)?;
            Ok((detector, estimator))
        },
        OverlayOutput {
            dir: config.overlay_dir.clone(),
            every: config.overlay_every,
        },
    )?;

    let mut state = handle.subscribe();
    println!("{}", state.borrow().start_label);
    let ready = state
        .wait_for(|s| s.models != ModelState::Loading)
        .await?
        .clone();
    if let Some(error) = &ready.error {
        handle.shutdown().await;
        bail!("{error}");
    }

    let mut retry = retry_on_enter();
    let started = handle
        .start_with_retry(&mut retry, |_| {
            println!("{CAMERA_ACCESS_MESSAGE}");
            println!("Press Enter to retry, or Ctrl-C to quit.");
        })
        .await;
    if let Err(e) = started {
        tracing::error!(error = %e, "start failed");
        let message = handle.snapshot().error.unwrap_or_else(|| e.to_string());
        handle.shutdown().await;
        bail!("{message}");
    }
    println!("Camera started. Press Ctrl-C to stop.");

    let mut last_alert = None;
    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = state.borrow_and_update().clone();

                if snap.alert != last_alert {
                    if let Some(alert) = &snap.alert {
                        println!("{}", render_alert(alert));
                    }
                    last_alert = snap.alert.clone();
                }
                if let Some(error) = &snap.error {
                    handle.shutdown().await;
                    bail!("{error}");
                }
                if max_frames.is_some_and(|n| snap.frames >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    handle.stop().await?;
    handle.shutdown().await;
    tracing::info!(frames = handle.snapshot().frames, "glance stopped");
    Ok(())
}
