// Emotion representation for storyscore.
//
// Emotion lives on two continuous axes — valence (negative..positive) and
// arousal (calm..excited) — produced by external classifiers or by human
// annotation. Generation only cares about coarse classes: corpus pieces are
// filtered by exact class match, and the driver resets its musical context
// whenever the class changes between story segments. `discretize` is that
// single mapping; everything downstream compares labels, never raw scores.

pub mod label;
pub mod timeline;

pub use label::{EmotionLabel, EmotionPair, discretize};
pub use timeline::{Episode, Segment, StoryTimeline, TimelineError};
