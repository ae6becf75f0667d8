use crate::capture::FrameSource;
use crate::error::{Error, Result};
use crate::labels::LabelTable;
use crate::output::FrameSink;
use crate::render::{colorize, Compositor, Diagnostics};
use crate::segmentation::{ScoreDecoder, SegmentationModel};
use image::{imageops, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Processing resolution every frame is scaled to before inference
    pub width: u32,
    pub height: u32,
    /// Decode every `stride`-th captured frame
    pub stride: u32,
    /// Sleep out the rest of the frame budget when set
    pub max_fps: Option<u32>,
    /// Emitted frames between two timing reports
    pub stats_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            stride: 1,
            max_fps: None,
            stats_interval: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Capturing,
    Decoding,
    Rendering,
    Emitted,
    Stopped,
}

/// Cooperative stop request, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounters {
    pub captured: u64,
    pub decoded: u64,
    pub emitted: u64,
}

#[derive(Debug, Default)]
struct StageTimings {
    capture: Duration,
    inference: Duration,
    render: Duration,
    output: Duration,
}

/// Capture → infer → decode → colorize → composite → emit, one frame at a time.
pub struct FramePipeline<'a, S, M> {
    source: S,
    model: M,
    sinks: Vec<Box<dyn FrameSink + 'a>>,
    table: &'a LabelTable,
    compositor: Compositor,
    config: PipelineConfig,
    stop: StopSignal,
    state: PipelineState,
    counters: FrameCounters,
    timings: StageTimings,
}

impl<'a, S, M> FramePipeline<'a, S, M>
where
    S: FrameSource,
    M: SegmentationModel,
{
    pub fn new(
        source: S,
        model: M,
        table: &'a LabelTable,
        compositor: Compositor,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            model,
            sinks: Vec::new(),
            table,
            compositor,
            config,
            stop: StopSignal::new(),
            state: PipelineState::Idle,
            counters: FrameCounters::default(),
            timings: StageTimings::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn FrameSink + 'a>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    /// Run until stopped or until a frame fails.
    ///
    /// Returns the counters on a requested stop. End of input, inference or
    /// shape errors and sink failures end the loop with the error; frames
    /// emitted before that are kept.
    ///
    /// A frame is offered to every sink even when one of them fails, so the
    /// last frame may have reached only some sinks. The first sink error is
    /// returned and the frame is not counted as emitted.
    pub fn run(&mut self) -> Result<FrameCounters> {
        tracing::info!(
            "Starting pipeline at {}x{}, stride {}",
            self.config.width,
            self.config.height,
            self.config.stride
        );
        for (index, sink) in self.sinks.iter().enumerate() {
            let (width, height) = sink.resolution();
            if (width, height) != (self.config.width, self.config.height) {
                tracing::info!("Sink {} rescales frames to {}x{}", index, width, height);
            }
        }

        let result = loop {
            if self.stop.is_triggered() {
                tracing::info!("Stop requested");
                break Ok(self.counters);
            }
            if let Err(e) = self.step() {
                break Err(e);
            }
        };

        self.state = PipelineState::Stopped;
        tracing::info!(
            "Pipeline stopped: captured={}, decoded={}, emitted={}",
            self.counters.captured,
            self.counters.decoded,
            self.counters.emitted
        );
        result
    }

    /// Process exactly one decoded frame.
    pub fn step(&mut self) -> Result<()> {
        let loop_start = Instant::now();

        self.state = PipelineState::Capturing;
        let capture_start = Instant::now();
        let frame = self.capture()?;
        let frame = self.fit_to_processing_size(frame);
        self.timings.capture += capture_start.elapsed();

        self.state = PipelineState::Decoding;
        let infer_start = Instant::now();
        let scores = self
            .model
            .infer(&frame)
            .map_err(|e| Error::Inference(e.into()))?;
        let elapsed = infer_start.elapsed();
        self.timings.inference += elapsed;

        if scores.num_classes() > self.table.len() {
            return Err(Error::InvalidInput(format!(
                "model produced {} classes but the label table has {}",
                scores.num_classes(),
                self.table.len()
            )));
        }
        let mask = ScoreDecoder::decode(&scores)?;
        self.counters.decoded += 1;

        self.state = PipelineState::Rendering;
        let render_start = Instant::now();
        let (color_mask, active) = colorize(&mask, self.table)?;
        let diagnostics = Diagnostics {
            elapsed,
            backend: self.model.backend(),
            width: frame.width(),
            height: frame.height(),
        };
        let composite = self.compositor.composite(
            &frame,
            &color_mask,
            &active,
            self.table,
            &diagnostics,
        );
        self.timings.render += render_start.elapsed();

        let output_start = Instant::now();
        let mut first_error = None;
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(e) = sink.write_frame(&composite) {
                tracing::error!("Sink {} failed: {:#}", index, e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        self.timings.output += output_start.elapsed();
        if let Some(e) = first_error {
            return Err(Error::Sink(e.into()));
        }

        self.counters.emitted += 1;
        self.state = PipelineState::Emitted;
        tracing::debug!(
            "Frame {} emitted, {} active labels",
            self.counters.emitted,
            active.len()
        );

        let interval = self.config.stats_interval;
        if interval > 0 && self.counters.emitted % interval == 0 {
            self.log_stats();
        }

        if let Some(fps) = self.config.max_fps.filter(|fps| *fps > 0) {
            let frame_duration = Duration::from_secs_f64(1.0 / fps as f64);
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }

        Ok(())
    }

    /// Read `stride` frames and keep the last one.
    fn capture(&mut self) -> Result<RgbImage> {
        for _ in 1..self.config.stride.max(1) {
            self.read_one()?;
            tracing::trace!("Discarded frame {}", self.counters.captured);
        }
        self.read_one()
    }

    fn read_one(&mut self) -> Result<RgbImage> {
        let frame = self
            .source
            .read_frame()
            .map_err(|e| Error::Capture(e.into()))?
            .ok_or(Error::InputExhausted {
                frames: self.counters.captured,
            })?;
        self.counters.captured += 1;
        Ok(frame)
    }

    fn fit_to_processing_size(&self, frame: RgbImage) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        if frame.dimensions() == (width, height) {
            frame
        } else {
            imageops::resize(&frame, width, height, imageops::FilterType::Triangle)
        }
    }

    fn log_stats(&self) {
        let frames = self.counters.emitted as f64;
        let avg_ms = |total: Duration| total.as_secs_f64() * 1000.0 / frames;
        let capture_ms = avg_ms(self.timings.capture);
        let inference_ms = avg_ms(self.timings.inference);
        let render_ms = avg_ms(self.timings.render);
        let output_ms = avg_ms(self.timings.output);
        let total_ms = capture_ms + inference_ms + render_ms + output_ms;

        tracing::info!(
            "Frame {}: capture={:.1}ms, inference={:.1}ms, render={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
            self.counters.emitted,
            capture_ms,
            inference_ms,
            render_ms,
            output_ms,
            total_ms,
            1000.0 / total_ms
        );
    }
}
