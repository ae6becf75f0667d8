use crate::error::{Error, Result};
use crate::labels::{LabelTable, MAX_MASK_CLASSES};
use crate::segmentation::LabelMask;
use image::{Rgb, RgbImage};
use std::collections::BTreeSet;

/// Class id that is never named in the overlay.
pub const BACKGROUND: usize = 0;

/// Per-pixel label colors, same size as the label mask.
pub type ColorMask = RgbImage;

/// Distinct non-background classes present in a frame, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveLabelSet {
    ids: BTreeSet<usize>,
}

impl ActiveLabelSet {
    /// Returns `false` for background and ids already present.
    pub fn insert(&mut self, id: usize) -> bool {
        id != BACKGROUND && self.ids.insert(id)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().copied()
    }

    /// Class names joined with `" & "`, or `None` when nothing is nameable.
    pub fn summary(&self, table: &LabelTable) -> Option<String> {
        let names: Vec<&str> = self
            .iter()
            .filter_map(|id| table.name_of(id))
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            None
        } else {
            Some(names.join(" & "))
        }
    }
}

/// Map every mask pixel to its label color and collect the classes seen.
///
/// An id outside the table means the model and label file disagree; that is
/// reported once for the frame.
pub fn colorize(mask: &LabelMask, table: &LabelTable) -> Result<(ColorMask, ActiveLabelSet)> {
    let _span = tracing::debug_span!("colorize").entered();

    let mut seen = [false; MAX_MASK_CLASSES];
    for pixel in mask.pixels() {
        seen[pixel.0[0] as usize] = true;
    }

    let mut active = ActiveLabelSet::default();
    let mut palette = [Rgb([0u8; 3]); MAX_MASK_CLASSES];
    for (id, _) in seen.iter().enumerate().filter(|(_, seen)| **seen) {
        if id >= table.len() {
            return Err(Error::InvalidInput(format!(
                "class id {} has no entry in the {}-entry label table",
                id,
                table.len()
            )));
        }
        palette[id] = table.color_of(id);
        active.insert(id);
    }

    let (width, height) = mask.dimensions();
    let data: Vec<u8> = mask
        .pixels()
        .flat_map(|pixel| palette[pixel.0[0] as usize].0)
        .collect();

    let color_mask = ColorMask::from_raw(width, height, data)
        .ok_or_else(|| Error::InvalidInput("color mask buffer size mismatch".to_string()))?;

    Ok((color_mask, active))
}
