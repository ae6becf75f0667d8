use crate::error::{Error, Result};
use image::Rgb;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

/// Largest number of classes a `LabelMask` (u8 ids) can address.
pub const MAX_MASK_CLASSES: usize = 256;

/// One class of the segmentation model. The id is the position in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub color: Rgb<u8>,
}

/// Ordered class names and colors, indexed by class id.
///
/// Loaded once at startup and shared by reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<Label>,
}

impl LabelTable {
    /// Load a label file of `<name> <r> <g> <b>` lines.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Config(format!("cannot open label file {}: {}", path.display(), e))
        })?;

        let table = Self::parse(BufReader::new(file))?;
        tracing::info!("Loaded {} labels from {}", table.len(), path.display());
        for (id, label) in table.iter().enumerate() {
            tracing::debug!("Label {}: {} {:?}", id, label.name, label.color.0);
        }
        Ok(table)
    }

    /// Parse label lines leniently.
    ///
    /// Blank lines and `#` comments are skipped. A line that names a class
    /// but carries a missing or out-of-range color is skipped with a warning;
    /// the entries after it take the next lower class ids.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut labels = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let name = match tokens.next() {
                Some(name) if !name.starts_with('#') => name,
                _ => continue,
            };

            let color = match parse_color(&mut tokens) {
                Ok(color) => color,
                Err(reason) => {
                    tracing::warn!(
                        "Skipping label file line {} ('{}'): {}",
                        index + 1,
                        name,
                        reason
                    );
                    continue;
                }
            };

            labels.push(Label {
                name: name.to_string(),
                color,
            });
        }

        if labels.is_empty() {
            return Err(Error::Config("label table is empty".to_string()));
        }
        if labels.len() > MAX_MASK_CLASSES {
            tracing::warn!(
                "Label table has {} entries, only the first {} are addressable",
                labels.len(),
                MAX_MASK_CLASSES
            );
        }

        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Label> {
        self.labels.get(id)
    }

    /// Color of class `id`.
    ///
    /// # Panics
    /// If `id >= self.len()`. Callers validate ids against the table first.
    pub fn color_of(&self, id: usize) -> Rgb<u8> {
        assert!(
            id < self.labels.len(),
            "class id {} out of range for label table of {} entries",
            id,
            self.labels.len()
        );
        self.labels[id].color
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(|label| label.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }
}

fn parse_color<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<Rgb<u8>, String> {
    let mut color = [0u8; 3];
    for (component, slot) in ["r", "g", "b"].iter().zip(color.iter_mut()) {
        let token = tokens
            .next()
            .ok_or_else(|| format!("missing {} component", component))?;
        *slot = token
            .parse::<u8>()
            .map_err(|_| format!("{} component '{}' outside 0..=255", component, token))?;
    }
    Ok(Rgb(color))
}

impl FromStr for LabelTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s.as_bytes())
    }
}
