// Emotion pairs and discretized labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw valence/arousal score pair, as produced by a classifier or an
/// annotator. Values are unbounded; only their sign matters downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionPair {
    pub valence: f32,
    pub arousal: f32,
}

impl EmotionPair {
    pub fn new(valence: f32, arousal: f32) -> Self {
        EmotionPair { valence, arousal }
    }
}

/// A discretized emotion class: each axis is -1 (low), 0 (neutral) or
/// 1 (high). Labels are compared elementwise; two emotion pairs count as
/// "the same emotion" iff their labels are equal.
///
/// The undefined/initial state (which must compare unequal to every real
/// label so the first story segment always resets) is `Option::None` at the
/// use sites, not a sentinel value inside this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmotionLabel {
    pub valence: i8,
    pub arousal: i8,
}

impl EmotionLabel {
    pub fn new(valence: i8, arousal: i8) -> Self {
        EmotionLabel { valence, arousal }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:+}, {:+})", self.valence, self.arousal)
    }
}

/// Discretize one axis: strictly positive -> 1, strictly negative -> -1,
/// zero (and NaN) -> 0. Total and deterministic over all f32 values.
fn discretize_axis(value: f32) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// Map a continuous emotion pair to its discrete class label.
pub fn discretize(pair: EmotionPair) -> EmotionLabel {
    EmotionLabel {
        valence: discretize_axis(pair.valence),
        arousal: discretize_axis(pair.arousal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discretize_signs() {
        assert_eq!(
            discretize(EmotionPair::new(0.7, -0.2)),
            EmotionLabel::new(1, -1)
        );
        assert_eq!(
            discretize(EmotionPair::new(-3.0, 5.0)),
            EmotionLabel::new(-1, 1)
        );
        assert_eq!(discretize(EmotionPair::new(0.0, 0.0)), EmotionLabel::new(0, 0));
    }

    #[test]
    fn test_discretize_deterministic() {
        let pair = EmotionPair::new(0.123, -0.456);
        assert_eq!(discretize(pair), discretize(pair));
    }

    #[test]
    fn test_discretize_total_over_non_finite() {
        assert_eq!(
            discretize(EmotionPair::new(f32::NAN, f32::INFINITY)),
            EmotionLabel::new(0, 1)
        );
        assert_eq!(
            discretize(EmotionPair::new(f32::NEG_INFINITY, -0.0)),
            EmotionLabel::new(-1, 0)
        );
    }

    #[test]
    fn test_undefined_label_unequal_to_all_real_labels() {
        let undefined: Option<EmotionLabel> = None;
        for v in -1..=1 {
            for a in -1..=1 {
                assert_ne!(undefined, Some(EmotionLabel::new(v, a)));
            }
        }
    }
}
