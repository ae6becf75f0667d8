//! Turning label masks into the frames users see.

mod colorize;
mod composite;
pub mod font;

pub use colorize::{colorize, ActiveLabelSet, ColorMask, BACKGROUND};
pub use composite::{format_elapsed, BlendWeights, Compositor, Diagnostics, OverlayStyle};
