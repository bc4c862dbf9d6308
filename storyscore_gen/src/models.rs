// Built-in oracle implementations.
//
// Trained inference backends live outside this repository; these are the
// variants that let the pipeline run without them. Both follow the same
// pattern as the corpus-derived model files elsewhere in the project:
// loadable from JSON exported by the training pipeline, with a usable
// built-in default when no file exists.
//
// - `NgramLanguageModel`: order-2/1/0 token transition tables with backoff
//   and additive smoothing. A real transformer checkpoint replaces this by
//   implementing the `LanguageModel` trait against its own runtime.
// - `PitchProfileModel`: heuristic music-emotion classifier. Valence tracks
//   mean note pitch (higher register reads brighter), arousal tracks note
//   onset density (more notes per second reads more agitated). Crude, but
//   deterministic and monotone in the features it claims to measure.

use crate::error::OracleError;
use crate::oracle::{Distribution, EmotionScores, LanguageModel, MusicEmotionModel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use storyscore_vocab::{TokenId, Vocabulary, duration};

/// Transition counts from one context to each next token. Unnormalized;
/// normalization happens when a distribution is materialized.
type TransitionTable = BTreeMap<TokenId, f64>;

/// N-gram language model over token ids with backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramLanguageModel {
    pub vocab_size: usize,
    /// Order-2 transitions: "prev2,prev1" -> next-token counts.
    pub order2: BTreeMap<String, TransitionTable>,
    /// Order-1 transitions: "prev1" -> next-token counts.
    pub order1: BTreeMap<String, TransitionTable>,
    /// Order-0: overall token counts.
    pub order0: TransitionTable,
    /// Additive smoothing mass spread uniformly over the vocabulary.
    pub smoothing: f64,
}

impl NgramLanguageModel {
    /// Load from a JSON file exported by the training pipeline.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let model: NgramLanguageModel = serde_json::from_str(&data)?;
        Ok(model)
    }

    /// A default model built from the vocabulary alone: waits and notes
    /// dominate, with a mild preference for alternating between them.
    pub fn default_model(vocab: &Vocabulary) -> Self {
        let mut order0 = TransitionTable::new();
        let mut order1: BTreeMap<String, TransitionTable> = BTreeMap::new();

        let class_weight = |symbol: &str| -> f64 {
            if symbol.starts_with("n_") {
                6.0
            } else if symbol.starts_with("w_") {
                6.0
            } else if symbol.starts_with("v_") {
                1.0
            } else if symbol.starts_with("t_") {
                0.5
            } else {
                0.5
            }
        };

        for id in 0..vocab.len() as TokenId {
            let symbol = vocab.symbol(id).unwrap_or("");
            order0.insert(id, class_weight(symbol));
        }

        // After a note, prefer a wait; after a wait, prefer a note.
        for prev in 0..vocab.len() as TokenId {
            let prev_symbol = vocab.symbol(prev).unwrap_or("");
            let favored: &str = if prev_symbol.starts_with("n_") {
                "w_"
            } else if prev_symbol.starts_with("w_") {
                "n_"
            } else {
                continue;
            };
            let mut table = TransitionTable::new();
            for id in 0..vocab.len() as TokenId {
                let symbol = vocab.symbol(id).unwrap_or("");
                let base = class_weight(symbol);
                let boost = if symbol.starts_with(favored) { 3.0 } else { 1.0 };
                table.insert(id, base * boost);
            }
            order1.insert(prev.to_string(), table);
        }

        NgramLanguageModel {
            vocab_size: vocab.len(),
            order2: BTreeMap::new(),
            order1,
            order0,
            smoothing: 0.1,
        }
    }

    /// Materialize the next-token distribution for one context, backing off
    /// from order-2 through order-0.
    fn distribution(&self, context: &[TokenId]) -> Distribution {
        let table = self.lookup(context);
        let total: f64 = table.map(|t| t.values().sum()).unwrap_or(0.0);
        let denom = total + self.smoothing * self.vocab_size as f64;

        (0..self.vocab_size as TokenId)
            .map(|id| {
                let count = table.and_then(|t| t.get(&id)).copied().unwrap_or(0.0);
                (count + self.smoothing) / denom
            })
            .collect()
    }

    fn lookup(&self, context: &[TokenId]) -> Option<&TransitionTable> {
        if context.len() >= 2 {
            let key = context_key(&context[context.len() - 2..]);
            if let Some(table) = self.order2.get(&key) {
                return Some(table);
            }
        }
        if let Some(&prev) = context.last() {
            if let Some(table) = self.order1.get(&prev.to_string()) {
                return Some(table);
            }
        }
        if self.order0.is_empty() {
            None
        } else {
            Some(&self.order0)
        }
    }
}

impl LanguageModel for NgramLanguageModel {
    fn next_token_distribution(
        &self,
        contexts: &[&[TokenId]],
    ) -> Result<Vec<Distribution>, OracleError> {
        Ok(contexts.iter().map(|ctx| self.distribution(ctx)).collect())
    }
}

/// Encode a context slice as a string key (JSON object keys must be strings).
fn context_key(context: &[TokenId]) -> String {
    context
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Heuristic music-emotion classifier over decoded token text.
pub struct PitchProfileModel {
    vocab: Arc<Vocabulary>,
}

impl PitchProfileModel {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        PitchProfileModel { vocab }
    }

    fn score(&self, tokens: &[TokenId]) -> Result<EmotionScores, OracleError> {
        let text = self
            .vocab
            .decode(tokens)
            .map_err(|e| OracleError::Backend(e.to_string()))?;

        let pitches = duration::note_pitches(&text);
        let valence_positive = if pitches.is_empty() {
            0.5
        } else {
            let mean =
                pitches.iter().map(|&p| f64::from(p)).sum::<f64>() / pitches.len() as f64;
            // Middle C region is neutral; an octave away saturates.
            logistic((mean - 60.0) / 6.0)
        };

        let seconds = duration::total_duration(&text).max(0.25);
        let density = duration::note_count(&text) as f64 / seconds;
        // ~2 onsets per second is neutral.
        let arousal_positive = logistic((density - 2.0) / 1.5);

        Ok(EmotionScores {
            valence_positive,
            arousal_positive,
        })
    }
}

impl MusicEmotionModel for PitchProfileModel {
    fn classify(&self, sequences: &[&[TokenId]]) -> Result<Vec<EmotionScores>, OracleError> {
        sequences.iter().map(|seq| self.score(seq)).collect()
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Arc<Vocabulary> {
        Arc::new(
            Vocabulary::from_entries([
                ("n_48".to_string(), 0),
                ("n_72".to_string(), 1),
                ("w_4".to_string(), 2),
                ("t_120".to_string(), 3),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_default_model_distributions_are_normalized() {
        let vocab = vocab();
        let model = NgramLanguageModel::default_model(&vocab);
        for context in [&[][..], &[0][..], &[2, 0][..]] {
            let dist = model.distribution(context);
            assert_eq!(dist.len(), vocab.len());
            let sum: f64 = dist.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "sum was {sum}");
            assert!(dist.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_default_model_alternates_notes_and_waits() {
        let vocab = vocab();
        let model = NgramLanguageModel::default_model(&vocab);
        // After a note, waits outweigh notes.
        let dist = model.distribution(&[0]);
        assert!(dist[2] > dist[0]);
        // After a wait, notes outweigh waits.
        let dist = model.distribution(&[2]);
        assert!(dist[0] > dist[2]);
    }

    #[test]
    fn test_pitch_profile_valence_tracks_register() {
        let model = PitchProfileModel::new(vocab());
        // Low register piece vs high register piece, same rhythm.
        let low = model.score(&[0, 2, 0, 2]).unwrap();
        let high = model.score(&[1, 2, 1, 2]).unwrap();
        assert!(high.valence_positive > low.valence_positive);
    }

    #[test]
    fn test_pitch_profile_arousal_tracks_density() {
        let model = PitchProfileModel::new(vocab());
        // Same notes, more waiting = lower density = lower arousal.
        let dense = model.score(&[0, 1, 0, 1, 2]).unwrap();
        let sparse = model.score(&[0, 2, 2, 2, 2, 1, 2, 2, 2, 2]).unwrap();
        assert!(dense.arousal_positive > sparse.arousal_positive);
    }
}
