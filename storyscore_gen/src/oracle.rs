// Model oracle interfaces.
//
// The externally trained models are opaque to the decoding core: the
// language model is "a distribution over next tokens given a context" and
// the music-emotion classifier is "valence/arousal scores given a token
// sequence". Both take batches, because beam search expands many candidates
// per step and per-sequence calls would not be tractable against a real
// inference backend.
//
// Oracle outputs are validated at the boundary (batch size, distribution
// length, probability ranges) and rejected with a descriptive `OracleError`
// rather than flowing into the numeric combination — a shape mismatch there
// would corrupt scores silently.

use crate::error::OracleError;
use std::time::{Duration, Instant};
use storyscore_emotion::EmotionLabel;
use storyscore_vocab::TokenId;

/// A probability distribution over the whole vocabulary, indexed by token id.
pub type Distribution = Vec<f64>;

/// Floor applied to any probability before taking its logarithm. A
/// zero-probability emotion match or token would otherwise contribute
/// `-inf` and poison every score it touches.
pub const PROB_FLOOR: f64 = 1e-9;

/// The generative music language model.
pub trait LanguageModel {
    /// Next-token distributions for a batch of context windows. The result
    /// must contain one distribution per context, each with exactly one
    /// probability per vocabulary entry.
    fn next_token_distribution(
        &self,
        contexts: &[&[TokenId]],
    ) -> Result<Vec<Distribution>, OracleError>;
}

/// Valence/arousal scores for one token sequence: the probability that each
/// axis is in its high class, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionScores {
    pub valence_positive: f64,
    pub arousal_positive: f64,
}

/// The music-emotion classifier pair, seen as one oracle returning both axes.
pub trait MusicEmotionModel {
    fn classify(&self, sequences: &[&[TokenId]]) -> Result<Vec<EmotionScores>, OracleError>;
}

/// A single-axis classifier. Two of these (one per emotion dimension, the
/// way the trained checkpoints come) combine into a `MusicEmotionModel`
/// via [`PairedEmotionModel`].
pub trait EmotionAxisModel {
    fn classify_axis(&self, sequences: &[&[TokenId]]) -> Result<Vec<f64>, OracleError>;
}

/// Adapter joining independent valence and arousal classifiers.
pub struct PairedEmotionModel<V, A> {
    valence: V,
    arousal: A,
}

impl<V: EmotionAxisModel, A: EmotionAxisModel> PairedEmotionModel<V, A> {
    pub fn new(valence: V, arousal: A) -> Self {
        PairedEmotionModel { valence, arousal }
    }
}

impl<V: EmotionAxisModel, A: EmotionAxisModel> MusicEmotionModel for PairedEmotionModel<V, A> {
    fn classify(&self, sequences: &[&[TokenId]]) -> Result<Vec<EmotionScores>, OracleError> {
        let valence = self.valence.classify_axis(sequences)?;
        let arousal = self.arousal.classify_axis(sequences)?;
        if valence.len() != sequences.len() {
            return Err(OracleError::MalformedBatch {
                expected: sequences.len(),
                got: valence.len(),
            });
        }
        if arousal.len() != sequences.len() {
            return Err(OracleError::MalformedBatch {
                expected: sequences.len(),
                got: arousal.len(),
            });
        }
        Ok(valence
            .into_iter()
            .zip(arousal)
            .map(|(v, a)| EmotionScores {
                valence_positive: v,
                arousal_positive: a,
            })
            .collect())
    }
}

/// Check a batch of language-model distributions: one per context, each of
/// vocabulary length, all probabilities finite and non-negative.
pub fn validate_distributions(
    distributions: &[Distribution],
    batch: usize,
    vocab_size: usize,
) -> Result<(), OracleError> {
    if distributions.len() != batch {
        return Err(OracleError::MalformedBatch {
            expected: batch,
            got: distributions.len(),
        });
    }
    for distribution in distributions {
        if distribution.len() != vocab_size {
            return Err(OracleError::MalformedDistribution {
                expected: vocab_size,
                got: distribution.len(),
            });
        }
        for &p in distribution {
            if !p.is_finite() || p < 0.0 {
                return Err(OracleError::InvalidProbability { value: p });
            }
        }
    }
    Ok(())
}

/// Check a batch of emotion scores: one per sequence, all in [0, 1].
pub fn validate_scores(scores: &[EmotionScores], batch: usize) -> Result<(), OracleError> {
    if scores.len() != batch {
        return Err(OracleError::MalformedBatch {
            expected: batch,
            got: scores.len(),
        });
    }
    for s in scores {
        for value in [s.valence_positive, s.arousal_positive] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(OracleError::InvalidScore { value });
            }
        }
    }
    Ok(())
}

/// Match probability for one axis against a target class: the classifier's
/// high-class probability for a high target, its complement for a low
/// target, and closeness to an even split for a neutral target. Floored to
/// `PROB_FLOOR` so the logarithm stays finite.
fn axis_match(high_probability: f64, target_class: i8) -> f64 {
    let p = match target_class {
        1 => high_probability,
        -1 => 1.0 - high_probability,
        _ => 1.0 - (2.0 * high_probability - 1.0).abs(),
    };
    p.max(PROB_FLOOR)
}

/// Log probability that a sequence's emotion scores match the target label:
/// the sum of both axes' floored log match probabilities.
pub fn emotion_match_log_prob(scores: EmotionScores, target: EmotionLabel) -> f64 {
    axis_match(scores.valence_positive, target.valence).ln()
        + axis_match(scores.arousal_positive, target.arousal).ln()
}

/// Convert classifier scores into a raw emotion pair suitable for
/// discretization (diagnostic reporting): each axis mapped from [0, 1]
/// to [-1, 1].
pub fn scores_to_pair(scores: EmotionScores) -> storyscore_emotion::EmotionPair {
    storyscore_emotion::EmotionPair::new(
        (2.0 * scores.valence_positive - 1.0) as f32,
        (2.0 * scores.arousal_positive - 1.0) as f32,
    )
}

/// Language model wrapper enforcing a fatal inference deadline. The call
/// itself still blocks; the deadline is checked when it returns, which is
/// the strongest guarantee available for a synchronous backend.
pub struct TimedLanguageModel<'a> {
    inner: &'a dyn LanguageModel,
    limit: Duration,
}

impl<'a> TimedLanguageModel<'a> {
    pub fn new(inner: &'a dyn LanguageModel, limit: Duration) -> Self {
        TimedLanguageModel { inner, limit }
    }
}

impl LanguageModel for TimedLanguageModel<'_> {
    fn next_token_distribution(
        &self,
        contexts: &[&[TokenId]],
    ) -> Result<Vec<Distribution>, OracleError> {
        let start = Instant::now();
        let result = self.inner.next_token_distribution(contexts);
        check_deadline(start, self.limit)?;
        result
    }
}

/// Emotion model wrapper enforcing the same fatal inference deadline.
pub struct TimedEmotionModel<'a> {
    inner: &'a dyn MusicEmotionModel,
    limit: Duration,
}

impl<'a> TimedEmotionModel<'a> {
    pub fn new(inner: &'a dyn MusicEmotionModel, limit: Duration) -> Self {
        TimedEmotionModel { inner, limit }
    }
}

impl MusicEmotionModel for TimedEmotionModel<'_> {
    fn classify(&self, sequences: &[&[TokenId]]) -> Result<Vec<EmotionScores>, OracleError> {
        let start = Instant::now();
        let result = self.inner.classify(sequences);
        check_deadline(start, self.limit)?;
        result
    }
}

fn check_deadline(start: Instant, limit: Duration) -> Result<(), OracleError> {
    let elapsed = start.elapsed();
    if elapsed > limit {
        return Err(OracleError::Timeout {
            limit_ms: limit.as_millis(),
            elapsed_ms: elapsed.as_millis(),
        });
    }
    Ok(())
}
