use super::types::{LabelMask, ScoreVolume};
use crate::error::{Error, Result};
use crate::labels::MAX_MASK_CLASSES;

/// Turns a score volume into a per-pixel class id mask.
pub struct ScoreDecoder;

impl ScoreDecoder {
    /// Argmax over the class axis for every pixel.
    ///
    /// Channels are scanned in increasing order and a class only replaces
    /// the current winner when its score is strictly greater, so ties go
    /// to the lowest class id (background on uniform input).
    pub fn decode(scores: &ScoreVolume) -> Result<LabelMask> {
        let _span = tracing::debug_span!("decode").entered();

        let classes = scores.num_classes();
        if classes == 0 {
            return Err(Error::InvalidInput("score volume has no classes".to_string()));
        }
        if classes > MAX_MASK_CLASSES {
            return Err(Error::InvalidInput(format!(
                "{} classes cannot be stored in an 8-bit label mask",
                classes
            )));
        }

        let (height, width) = (scores.height(), scores.width());
        let (mask_width, mask_height) = match (u32::try_from(width), u32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "score volume {}x{} is too large",
                    width, height
                )))
            }
        };

        let mut best: Vec<f32> = scores.channel(0).iter().copied().collect();
        let mut mask = vec![0u8; width * height];

        for class in 1..classes {
            let channel = scores.channel(class);
            for ((score, best), id) in channel.iter().zip(best.iter_mut()).zip(mask.iter_mut()) {
                if *score > *best {
                    *best = *score;
                    *id = class as u8;
                }
            }
        }

        LabelMask::from_raw(mask_width, mask_height, mask)
            .ok_or_else(|| Error::InvalidInput("label mask buffer size mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume(classes: usize, height: usize, width: usize, data: Vec<f32>) -> ScoreVolume {
        ScoreVolume::from_shape_vec((classes, height, width), data).unwrap()
    }

    #[test]
    fn tie_goes_to_first_class() {
        let mask = ScoreDecoder::decode(&volume(2, 1, 1, vec![0.4, 0.4])).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0, [0]);
    }

    #[test]
    fn higher_score_wins() {
        let mask = ScoreDecoder::decode(&volume(2, 1, 1, vec![0.3, 0.7])).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0, [1]);
    }

    #[test]
    fn uniform_volume_is_background() {
        let mask = ScoreDecoder::decode(&ScoreVolume::new(Array3::zeros((5, 3, 4)))).unwrap();
        assert_eq!(mask.dimensions(), (4, 3));
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn matches_argmax_per_pixel() {
        // 3 classes over a 2x3 image, each pixel picks a different winner
        let scores = Array3::from_shape_fn((3, 2, 3), |(c, r, col)| {
            let winner = (r * 3 + col) % 3;
            if c == winner {
                1.0 + r as f32
            } else {
                -(c as f32)
            }
        });
        let volume = ScoreVolume::new(scores);
        let mask = ScoreDecoder::decode(&volume).unwrap();

        for row in 0..2 {
            for col in 0..3 {
                let expected = (0..3)
                    .fold((0usize, f32::MIN), |(best_c, best_v), c| {
                        let v = volume.get(c, row, col).unwrap();
                        if v > best_v {
                            (c, v)
                        } else {
                            (best_c, best_v)
                        }
                    })
                    .0;
                assert_eq!(mask.get_pixel(col as u32, row as u32).0[0] as usize, expected);
            }
        }
    }

    #[test]
    fn later_tie_does_not_displace_winner() {
        // class 1 and class 2 both reach the max, class 1 wins
        let mask = ScoreDecoder::decode(&volume(3, 1, 1, vec![0.1, 0.9, 0.9])).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0, [1]);
    }

    #[test]
    fn nan_never_displaces_winner() {
        let mask = ScoreDecoder::decode(&volume(3, 1, 1, vec![0.2, f32::NAN, 0.1])).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0, [0]);
    }

    #[test]
    fn nan_in_background_channel_is_never_beaten() {
        let mask = ScoreDecoder::decode(&volume(3, 1, 1, vec![f32::NAN, 0.9, 5.0])).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0, [0]);
    }

    #[test]
    fn zero_classes_is_invalid() {
        let err = ScoreDecoder::decode(&ScoreVolume::new(Array3::zeros((0, 2, 2)))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn too_many_classes_is_invalid() {
        let err = ScoreDecoder::decode(&ScoreVolume::new(Array3::zeros((257, 1, 1)))).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn class_255_is_representable() {
        let mut scores = Array3::zeros((256, 1, 1));
        scores[[255, 0, 0]] = 1.0;
        let mask = ScoreDecoder::decode(&ScoreVolume::new(scores)).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0, [255]);
    }
}
