use super::{FrameSource, SourceProperties};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// Frames read from still images: a single file, or every image in a
/// directory in file-name order.
pub struct ImageSequence {
    pending: VecDeque<PathBuf>,
    properties: SourceProperties,
}

impl ImageSequence {
    pub fn open(path: &Path, fps: f64) -> Result<Self> {
        let frames: Vec<PathBuf> = if path.is_dir() {
            let mut frames = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("Cannot open video {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_image(&entry_path) {
                    frames.push(entry_path);
                }
            }
            frames.sort();
            frames
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            bail!("Cannot open video {}", path.display());
        };

        let first = match frames.first() {
            Some(first) => first,
            None => bail!("No image frames found in {}", path.display()),
        };
        let (width, height) = image::image_dimensions(first)
            .with_context(|| format!("Failed to read {}", first.display()))?;

        tracing::info!(
            "Image sequence {}: {} frames at {}x{}",
            path.display(),
            frames.len(),
            width,
            height
        );

        Ok(Self {
            pending: frames.into(),
            properties: SourceProperties { width, height, fps },
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgb8();
        tracing::debug!("Read frame {}", path.display());
        Ok(Some(frame))
    }

    fn properties(&self) -> SourceProperties {
        self.properties
    }
}
