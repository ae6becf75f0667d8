use image::{Rgb, RgbImage};
use ndarray::Array3;
use seglens::capture::{FrameSource, SourceProperties};
use seglens::output::FrameSink;
use seglens::render::{BlendWeights, Compositor, OverlayStyle};
use seglens::segmentation::{Backend, ScoreVolume, SegmentationModel};
use seglens::{Error, FramePipeline, LabelTable, PipelineConfig, PipelineState, StopSignal};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

const SIZE: u32 = 8;

/// Frames are uniform images whose red channel carries the frame number.
struct NumberedFrames {
    frames: VecDeque<RgbImage>,
}

impl NumberedFrames {
    fn new(count: u8, size: (u32, u32)) -> Self {
        Self {
            frames: (1..=count)
                .map(|n| RgbImage::from_pixel(size.0, size.1, Rgb([n, 0, 0])))
                .collect(),
        }
    }
}

impl FrameSource for NumberedFrames {
    fn read_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }

    fn properties(&self) -> SourceProperties {
        SourceProperties {
            width: SIZE,
            height: SIZE,
            fps: 30.0,
        }
    }
}

/// Predicts class `frame number % classes` everywhere and records what it saw.
struct StubModel {
    classes: usize,
    seen: Rc<RefCell<Vec<u8>>>,
    fail: bool,
}

impl StubModel {
    fn new(classes: usize) -> (Self, Rc<RefCell<Vec<u8>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let model = Self {
            classes,
            seen: seen.clone(),
            fail: false,
        };
        (model, seen)
    }
}

impl SegmentationModel for StubModel {
    fn infer(&mut self, frame: &RgbImage) -> anyhow::Result<ScoreVolume> {
        if self.fail {
            anyhow::bail!("device lost");
        }
        let number = frame.get_pixel(0, 0)[0];
        self.seen.borrow_mut().push(number);

        let winner = number as usize % self.classes;
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let scores = Array3::from_shape_fn((self.classes, h, w), |(c, _, _)| {
            if c == winner {
                1.0
            } else {
                0.0
            }
        });
        Ok(ScoreVolume::new(scores))
    }

    fn backend(&self) -> Option<Backend> {
        Some(Backend::Cpu)
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    frames: Rc<RefCell<Vec<RgbImage>>>,
}

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &RgbImage) -> anyhow::Result<()> {
        self.frames.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn resolution(&self) -> (u32, u32) {
        (SIZE, SIZE)
    }
}

struct FailingSink;

impl FrameSink for FailingSink {
    fn write_frame(&mut self, _frame: &RgbImage) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }

    fn resolution(&self) -> (u32, u32) {
        (SIZE, SIZE)
    }
}

fn table() -> LabelTable {
    "background 0 0 0\naeroplane 128 0 0\nbicycle 0 128 0"
        .parse()
        .unwrap()
}

fn config(stride: u32) -> PipelineConfig {
    PipelineConfig {
        width: SIZE,
        height: SIZE,
        stride,
        ..PipelineConfig::default()
    }
}

#[test]
fn emits_every_frame_then_reports_input_exhausted() {
    let table = table();
    let (model, seen) = StubModel::new(3);
    let sink = RecordingSink::default();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(3, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_sink(Box::new(sink.clone()));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::InputExhausted { frames: 3 }));
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(sink.frames.borrow().len(), 3);
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);

    let counters = pipeline.counters();
    assert_eq!((counters.captured, counters.decoded, counters.emitted), (3, 3, 3));
}

#[test]
fn stride_decodes_every_third_frame() {
    let table = table();
    let (model, seen) = StubModel::new(3);
    let sink = RecordingSink::default();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(9, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(3),
    )
    .with_sink(Box::new(sink.clone()));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::InputExhausted { frames: 9 }));
    assert_eq!(*seen.borrow(), vec![3, 6, 9]);
    assert_eq!(sink.frames.borrow().len(), 3);

    let counters = pipeline.counters();
    assert_eq!((counters.captured, counters.decoded), (9, 3));
}

#[test]
fn stop_before_start_emits_nothing() {
    let table = table();
    let (model, seen) = StubModel::new(3);
    let stop = StopSignal::new();
    stop.trigger();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(5, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_stop_signal(stop);

    let counters = pipeline.run().unwrap();
    assert_eq!(counters.emitted, 0);
    assert!(seen.borrow().is_empty());
    assert_eq!(pipeline.state(), PipelineState::Stopped);
}

#[test]
fn stop_is_honoured_between_frames() {
    struct StoppingSink {
        stop: StopSignal,
        written: Rc<RefCell<usize>>,
    }

    impl FrameSink for StoppingSink {
        fn write_frame(&mut self, _frame: &RgbImage) -> anyhow::Result<()> {
            *self.written.borrow_mut() += 1;
            if *self.written.borrow() == 2 {
                self.stop.trigger();
            }
            Ok(())
        }

        fn resolution(&self) -> (u32, u32) {
            (SIZE, SIZE)
        }
    }

    let table = table();
    let (model, _) = StubModel::new(3);
    let stop = StopSignal::new();
    let written = Rc::new(RefCell::new(0));

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(10, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_stop_signal(stop.clone())
    .with_sink(Box::new(StoppingSink {
        stop,
        written: written.clone(),
    }));

    let counters = pipeline.run().unwrap();
    assert_eq!(counters.emitted, 2);
    assert_eq!(*written.borrow(), 2);
}

#[test]
fn more_classes_than_labels_is_fatal() {
    let table = table();
    let (model, _) = StubModel::new(5);
    let sink = RecordingSink::default();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(3, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_sink(Box::new(sink.clone()));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(sink.frames.borrow().is_empty());
}

#[test]
fn inference_failure_is_fatal() {
    let table = table();
    let (mut model, _) = StubModel::new(3);
    model.fail = true;
    let sink = RecordingSink::default();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(3, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_sink(Box::new(sink.clone()));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::Inference(_)));
    assert!(sink.frames.borrow().is_empty());
}

#[test]
fn sink_failure_is_fatal() {
    let table = table();
    let (model, _) = StubModel::new(3);

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(3, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_sink(Box::new(FailingSink));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::Sink(_)));
    assert_eq!(pipeline.counters().emitted, 0);
}

#[test]
fn failing_sink_does_not_starve_later_sinks() {
    let table = table();
    let (model, _) = StubModel::new(3);
    let sink = RecordingSink::default();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(3, (SIZE, SIZE)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_sink(Box::new(FailingSink))
    .with_sink(Box::new(sink.clone()));

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, Error::Sink(_)));
    // The first frame still reached the healthy sink, then the loop ended
    assert_eq!(sink.frames.borrow().len(), 1);
    assert_eq!(pipeline.counters().emitted, 0);
}

#[test]
fn frames_are_scaled_to_processing_size() {
    let table = table();
    let (model, seen) = StubModel::new(3);
    let sink = RecordingSink::default();

    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(1, (40, 20)),
        model,
        &table,
        Compositor::default(),
        config(1),
    )
    .with_sink(Box::new(sink.clone()));

    pipeline.run().unwrap_err();
    assert_eq!(*seen.borrow(), vec![1]);
    assert_eq!(sink.frames.borrow()[0].dimensions(), (SIZE, SIZE));
}

#[test]
fn composite_blends_label_color_over_frame() {
    let table = table();
    let (model, _) = StubModel::new(3);
    let sink = RecordingSink::default();
    let compositor = Compositor::new(
        BlendWeights {
            source: 0.5,
            mask: 0.5,
        },
        OverlayStyle::default(),
    );

    // Frame 1 predicts class 1 (aeroplane, 128 0 0), frame 3 background
    let mut pipeline = FramePipeline::new(
        NumberedFrames::new(3, (SIZE, SIZE)),
        model,
        &table,
        compositor,
        config(1),
    )
    .with_sink(Box::new(sink.clone()));
    pipeline.run().unwrap_err();

    let frames = sink.frames.borrow();
    // 8x8 is too small for any overlay text, so every pixel is the plain blend
    assert!(frames[0].pixels().all(|p| *p == Rgb([65, 0, 0])));
    assert!(frames[2].pixels().all(|p| *p == Rgb([2, 0, 0])));
}
