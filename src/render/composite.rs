use super::colorize::{ActiveLabelSet, ColorMask};
use super::font::{draw_text, text_height, text_width};
use crate::labels::LabelTable;
use crate::segmentation::Backend;
use image::{imageops, Rgb, RgbImage};
use std::borrow::Cow;
use std::time::Duration;

/// Linear blend weights: `frame * source + mask * mask`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub source: f32,
    pub mask: f32,
}

impl Default for BlendWeights {
    /// Dim the frame so the class colors dominate.
    fn default() -> Self {
        Self {
            source: 0.3,
            mask: 0.7,
        }
    }
}

/// Per-frame facts drawn along the bottom of the composite.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub elapsed: Duration,
    pub backend: Option<Backend>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Integer glyph scale of the 5x7 font
    pub scale: u32,
    pub margin: u32,
    pub line_spacing: u32,
    pub label_color: Rgb<u8>,
    pub info_color: Rgb<u8>,
    pub show_build_profile: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            scale: 2,
            margin: 10,
            line_spacing: 6,
            label_color: Rgb([255, 0, 0]),
            info_color: Rgb([0, 255, 0]),
            show_build_profile: true,
        }
    }
}

/// Blends the class colors over a frame and draws the text overlay.
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    weights: BlendWeights,
    style: OverlayStyle,
}

impl Compositor {
    pub fn new(weights: BlendWeights, style: OverlayStyle) -> Self {
        Self { weights, style }
    }

    /// Produce the output frame.
    ///
    /// Overlay elements that do not fit are left out; the blend itself is
    /// always produced.
    pub fn composite(
        &self,
        original: &RgbImage,
        color_mask: &ColorMask,
        active: &ActiveLabelSet,
        table: &LabelTable,
        diagnostics: &Diagnostics,
    ) -> RgbImage {
        let _span = tracing::debug_span!("composite").entered();

        let mut frame = self.blend(original, color_mask);
        let style = &self.style;
        let line_height = text_height(style.scale);

        match active.summary(table) {
            Some(names) => self.draw_line(&mut frame, 0, true, &names, style.label_color),
            None => tracing::debug!("No active labels, skipping name overlay"),
        }

        // Bottom row: run time on the left, resolution on the right
        let bottom = frame.height() as i64 - (style.margin + line_height) as i64;
        self.draw_line(
            &mut frame,
            bottom,
            false,
            &format_elapsed(diagnostics.elapsed),
            style.info_color,
        );

        let resolution = format!("{}x{}", diagnostics.width, diagnostics.height);
        let right =
            frame.width() as i64 - (style.margin + text_width(&resolution, style.scale)) as i64;
        if right >= 0 && bottom >= 0 {
            draw_text(&mut frame, right, bottom, &resolution, style.info_color, style.scale);
        } else {
            tracing::debug!("Frame too small for resolution overlay");
        }

        // Row above: build profile and backend
        let mut status = Vec::new();
        if style.show_build_profile {
            status.push(build_profile());
        }
        if let Some(backend) = diagnostics.backend {
            status.push(backend.indicator());
        }
        if !status.is_empty() {
            let row = bottom - (line_height + style.line_spacing) as i64;
            self.draw_line(&mut frame, row, false, &status.join("  "), style.info_color);
        }

        frame
    }

    fn blend(&self, original: &RgbImage, color_mask: &ColorMask) -> RgbImage {
        let (width, height) = original.dimensions();
        let mask = if color_mask.dimensions() == (width, height) {
            Cow::Borrowed(color_mask)
        } else {
            tracing::debug!(
                "Scaling color mask {:?} to frame {}x{}",
                color_mask.dimensions(),
                width,
                height
            );
            Cow::Owned(imageops::resize(
                color_mask,
                width,
                height,
                imageops::FilterType::Nearest,
            ))
        };

        let BlendWeights { source, mask: weight } = self.weights;
        let mut frame = original.clone();
        for (out, overlay) in frame.pixels_mut().zip(mask.pixels()) {
            for channel in 0..3 {
                let value = out[channel] as f32 * source + overlay[channel] as f32 * weight;
                out[channel] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
        frame
    }

    /// Draw one left-aligned line. `top` lines are measured from the top margin.
    fn draw_line(&self, frame: &mut RgbImage, y: i64, top: bool, text: &str, color: Rgb<u8>) {
        let style = &self.style;
        let y = if top { style.margin as i64 + y } else { y };
        let fits = y >= 0 && y + text_height(style.scale) as i64 <= frame.height() as i64;
        if text.is_empty() || !fits {
            tracing::debug!("Skipping overlay line {:?}", text);
            return;
        }
        draw_text(frame, style.margin as i64, y, text, color, style.scale);
    }
}

/// `run time: <seconds>s`, truncated to milliseconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    format!("run time: {}.{:03}s", millis / 1000, millis % 1000)
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "in debug"
    } else {
        "in release"
    }
}
