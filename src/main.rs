use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teachable_knn::capture::{
    FeatureExtractor, FrameSource, PngDirectorySource, PooledPixelExtractor, PresentationSink,
    TracingSink,
};
use teachable_knn::classifier::Prediction;
use teachable_knn::commands::{run_console, ClassifierSession};
use teachable_knn::config::{AppConfig, ConfigLoader};
use teachable_knn::storage;

#[derive(Parser)]
#[command(
    name = "teachable-knn",
    version,
    about = "Teach a live video classifier new categories by example"
)]
struct Args {
    /// Config file (defaults to ./teachable-knn.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify frames live and take training commands on stdin
    Run {
        /// Replay the PNG files of a directory instead of using a camera
        #[arg(long, conflicts_with = "webcam")]
        frames: Option<PathBuf>,

        /// Capture from a webcam (needs the `webcam` feature)
        #[arg(long)]
        webcam: bool,

        /// Camera id or index, with --webcam
        #[arg(long, requires = "webcam")]
        camera: Option<String>,

        /// Dataset loaded at startup and written by `save`
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Neighbors consulted per prediction
        #[arg(long)]
        k: Option<usize>,

        /// Frames per second
        #[arg(long)]
        fps: Option<u32>,

        /// Log predictions instead of printing them
        #[arg(long)]
        quiet: bool,
    },
    /// Print the dimension and class counts of a saved dataset
    Inspect { path: PathBuf },
    /// List available cameras (needs the `webcam` feature)
    Cameras,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };

    teachable_knn::init_tracing(&config.log_filter);

    match args.command {
        Command::Run {
            frames,
            webcam,
            camera,
            dataset,
            k,
            fps,
            quiet,
        } => {
            if let Some(path) = dataset {
                config.dataset_path = Some(path);
            }
            if let Some(k) = k {
                config.k = k;
            }
            if let Some(fps) = fps {
                config.frame_rate = fps;
            }
            config.validate()?;

            let source = open_source(frames.as_deref(), webcam, camera)?;
            run(config, source, quiet).await
        }
        Command::Inspect { path } => inspect(&path),
        Command::Cameras => list_cameras(),
    }
}

async fn run(config: AppConfig, source: Box<dyn FrameSource>, quiet: bool) -> anyhow::Result<()> {
    let extractor: Arc<dyn FeatureExtractor> =
        Arc::new(PooledPixelExtractor::new(config.extractor.clone()));
    let sink: Arc<dyn PresentationSink> = if quiet {
        Arc::new(TracingSink)
    } else {
        Arc::new(stdout_sink())
    };

    let session = ClassifierSession::hydrate(config);
    let classes = session.registered_classes();
    if !classes.is_empty() {
        println!(
            "loaded {} classes: {}",
            classes.len(),
            classes
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!("type 'help' for commands");

    let handle = session.spawn_capture_loop(source, extractor, sink)?;
    run_console(&session).await?;
    handle.shutdown();
    Ok(())
}

/// Print a prediction line whenever the label or its probability changes
fn stdout_sink() -> impl Fn(&Prediction) + Send + Sync {
    let last: Mutex<Option<(String, String)>> = Mutex::new(None);
    move |prediction: &Prediction| {
        let current = (
            prediction.label.to_string(),
            format!("{:.2}", prediction.confidence()),
        );
        let mut last = last.lock();
        if last.as_ref() != Some(&current) {
            println!("prediction: {}  probability: {}", current.0, current.1);
            *last = Some(current);
        }
    }
}

fn open_source(
    frames: Option<&Path>,
    webcam: bool,
    camera: Option<String>,
) -> anyhow::Result<Box<dyn FrameSource>> {
    if let Some(dir) = frames {
        let source = PngDirectorySource::open(dir)
            .with_context(|| format!("opening frames in {}", dir.display()))?;
        return Ok(Box::new(source));
    }
    if webcam {
        return open_webcam(camera);
    }
    bail!("no frame source: pass --frames DIR or --webcam")
}

#[cfg(feature = "webcam")]
fn open_webcam(camera: Option<String>) -> anyhow::Result<Box<dyn FrameSource>> {
    let source = teachable_knn::capture::webcam::WebcamFrameSource::open(camera)?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "webcam"))]
fn open_webcam(_camera: Option<String>) -> anyhow::Result<Box<dyn FrameSource>> {
    bail!("this build has no webcam support; rebuild with --features webcam")
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let dataset = storage::read_dataset(path)
        .with_context(|| format!("reading dataset {}", path.display()))?;

    match dataset.dimension() {
        Some(dimension) => println!("dimension: {}", dimension),
        None => println!("dimension: unset"),
    }
    println!("examples: {}", dataset.len());
    let counts = dataset.class_counts();
    for label in dataset.labels() {
        println!("  {}: {}", label, counts.get(label).copied().unwrap_or(0));
    }
    Ok(())
}

#[cfg(feature = "webcam")]
fn list_cameras() -> anyhow::Result<()> {
    let cameras = teachable_knn::capture::webcam::get_cameras();
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{}\t{}", camera.id, camera.name);
    }
    Ok(())
}

#[cfg(not(feature = "webcam"))]
fn list_cameras() -> anyhow::Result<()> {
    bail!("this build has no webcam support; rebuild with --features webcam")
}
