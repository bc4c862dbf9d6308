// Deterministic stub oracles for tests.
//
// Public (not `#[cfg(test)]`) so integration tests can drive the full
// pipeline without trained models. Each stub counts its calls, which lets
// tests assert things like "an empty segment range performs no oracle
// calls".

use crate::error::OracleError;
use crate::oracle::{Distribution, EmotionScores, LanguageModel, MusicEmotionModel};
use std::sync::atomic::{AtomicUsize, Ordering};
use storyscore_vocab::TokenId;

/// Language model returning a fixed distribution for every context.
pub struct StubLanguageModel {
    distribution: Distribution,
    calls: AtomicUsize,
}

impl StubLanguageModel {
    /// Uniform distribution over the vocabulary.
    pub fn uniform(vocab_size: usize) -> Self {
        let p = 1.0 / vocab_size as f64;
        StubLanguageModel {
            distribution: vec![p; vocab_size],
            calls: AtomicUsize::new(0),
        }
    }

    /// Distribution with `mass` on `token` and the remainder uniform.
    pub fn peaked(vocab_size: usize, token: TokenId, mass: f64) -> Self {
        let rest = (1.0 - mass) / (vocab_size.saturating_sub(1).max(1)) as f64;
        let mut distribution = vec![rest; vocab_size];
        distribution[token as usize] = mass;
        StubLanguageModel {
            distribution,
            calls: AtomicUsize::new(0),
        }
    }

    /// Any fixed distribution, including deliberately malformed ones for
    /// failure-path tests.
    pub fn fixed(distribution: Distribution) -> Self {
        StubLanguageModel {
            distribution,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of batch calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LanguageModel for StubLanguageModel {
    fn next_token_distribution(
        &self,
        contexts: &[&[TokenId]],
    ) -> Result<Vec<Distribution>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(contexts.iter().map(|_| self.distribution.clone()).collect())
    }
}

/// Emotion model scoring by token membership: a sequence containing the
/// first matching override token gets that override's scores, everything
/// else gets the default.
pub struct StubEmotionModel {
    default: EmotionScores,
    overrides: Vec<(TokenId, EmotionScores)>,
    calls: AtomicUsize,
}

impl StubEmotionModel {
    pub fn constant(valence_positive: f64, arousal_positive: f64) -> Self {
        StubEmotionModel {
            default: EmotionScores {
                valence_positive,
                arousal_positive,
            },
            overrides: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sequences containing `token` score `(valence_positive,
    /// arousal_positive)` instead of the default. Earlier overrides win.
    pub fn with_override(
        mut self,
        token: TokenId,
        valence_positive: f64,
        arousal_positive: f64,
    ) -> Self {
        self.overrides.push((
            token,
            EmotionScores {
                valence_positive,
                arousal_positive,
            },
        ));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MusicEmotionModel for StubEmotionModel {
    fn classify(&self, sequences: &[&[TokenId]]) -> Result<Vec<EmotionScores>, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(sequences
            .iter()
            .map(|seq| {
                self.overrides
                    .iter()
                    .find(|(token, _)| seq.contains(token))
                    .map(|&(_, scores)| scores)
                    .unwrap_or(self.default)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_lm_counts_calls() {
        let lm = StubLanguageModel::uniform(4);
        assert_eq!(lm.calls(), 0);
        lm.next_token_distribution(&[&[0], &[1]]).unwrap();
        assert_eq!(lm.calls(), 1);
        let batch = lm.next_token_distribution(&[&[0]]).unwrap();
        assert_eq!(lm.calls(), 2);
        assert_eq!(batch[0].len(), 4);
    }

    #[test]
    fn test_stub_emotion_overrides() {
        let model = StubEmotionModel::constant(0.5, 0.5).with_override(7, 0.9, 0.9);
        let scores = model.classify(&[&[1, 2], &[1, 7]]).unwrap();
        assert_eq!(scores[0].valence_positive, 0.5);
        assert_eq!(scores[1].valence_positive, 0.9);
    }
}
