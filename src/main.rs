use anyhow::{Context, Result};
use clap::Parser;
use seglens::capture;
use seglens::output::{MjpegWriter, V4L2Output};
use seglens::render::{BlendWeights, Compositor, OverlayStyle};
use seglens::segmentation::{self, BlobParams, ModelOptions};
use seglens::{Error, FramePipeline, LabelTable, PipelineConfig, StopSignal};
use std::io::BufRead;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to input image or directory of frames (empty = default camera)
    #[arg(short, long, default_value = "")]
    input: String,

    /// Path to output MJPEG stream (empty = no file output)
    #[arg(short, long, default_value = "output.mjpeg")]
    output: String,

    /// Optional v4l2loopback device for live viewing
    #[arg(long)]
    display_device: Option<String>,

    /// Use CUDA when a compatible device is available
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    cuda: bool,

    /// Decode every Nth captured frame
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    stride: u32,

    /// Label file, one `<name> <r> <g> <b>` per line
    #[arg(long, default_value = "pascal-classes.txt")]
    labels: String,

    /// Path to segmentation model (ONNX file)
    #[arg(long, default_value = "fcn8s-heavy-pascal.onnx")]
    model: String,

    /// Processing resolution width
    #[arg(long, default_value_t = 500)]
    width: u32,

    /// Processing resolution height
    #[arg(long, default_value_t = 500)]
    height: u32,

    /// Weight of the source frame in the blend
    #[arg(long, default_value_t = 0.3)]
    source_weight: f32,

    /// Weight of the label colors in the blend
    #[arg(long, default_value_t = 0.7)]
    mask_weight: f32,

    /// Camera index used when no input path is given
    #[arg(long, default_value_t = 0)]
    camera_index: u32,

    /// Frame rate of image-sequence input
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// JPEG quality of the output stream (1-100)
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Cap processing at this many frames per second
    #[arg(long)]
    max_fps: Option<u32>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    tracing::info!("seglens starting");

    let source = capture::open_source(&args.input, args.camera_index, args.fps)
        .context("Cannot open video")?;
    let properties = source.properties();
    tracing::info!(
        "Resolution of video: {}x{}, {} fps",
        properties.width,
        properties.height,
        properties.fps
    );

    let table = LabelTable::load(&args.labels).context("Failed to read label file")?;

    let model = segmentation::create_default_model(
        &args.model,
        ModelOptions {
            input_size: (args.width, args.height),
            prefer_cuda: args.cuda,
            blob: BlobParams::default(),
        },
    )
    .context("Failed to load segmentation model")?;

    let compositor = Compositor::new(
        BlendWeights {
            source: args.source_weight,
            mask: args.mask_weight,
        },
        OverlayStyle::default(),
    );
    let config = PipelineConfig {
        width: args.width,
        height: args.height,
        stride: args.stride,
        max_fps: args.max_fps,
        ..PipelineConfig::default()
    };

    let stop = StopSignal::new();
    spawn_stop_watcher(stop.clone());

    let mut pipeline =
        FramePipeline::new(source, model, &table, compositor, config).with_stop_signal(stop);

    if !args.output.is_empty() {
        let writer = MjpegWriter::create(&args.output, args.width, args.height, properties.fps)?
            .with_quality(args.jpeg_quality);
        tracing::info!(
            "Play back with: ffmpeg -framerate {} -i {}",
            writer.fps(),
            args.output
        );
        pipeline = pipeline.with_sink(Box::new(writer));
    }
    if let Some(device) = &args.display_device {
        let display = V4L2Output::new(device, args.width, args.height)
            .context("Failed to initialize v4l2loopback output")?;
        pipeline = pipeline.with_sink(Box::new(display));
    }

    tracing::info!("Enter q to stop");

    match pipeline.run() {
        Ok(counters) => {
            tracing::info!("Finished after {} frames", counters.emitted);
            Ok(())
        }
        Err(Error::InputExhausted { frames }) => Err(anyhow::anyhow!(
            "Video source ended or disconnected after {} frames",
            frames
        )),
        Err(e) => Err(e).context("Pipeline failed"),
    }
}

/// Trigger `stop` when the operator enters `q` on stdin.
fn spawn_stop_watcher(stop: StopSignal) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    stop.trigger();
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });
}
