// Reference corpus of human-composed pieces.
//
// Each piece is a token sequence with a discretized emotion label. The
// corpus serves two roles: the baseline strategy copies matching pieces
// directly, and both strategies draw random seed prefixes from it when the
// story's emotion changes and the musical context restarts.

use crate::error::GenerateError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use storyscore_emotion::EmotionLabel;
use storyscore_vocab::TokenId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse corpus JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One human-composed reference piece.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusPiece {
    pub tokens: Vec<TokenId>,
    pub emotion: EmotionLabel,
}

/// Ordered set of reference pieces, read-only during generation.
#[derive(Debug, Clone)]
pub struct Corpus {
    pieces: Vec<CorpusPiece>,
}

impl Corpus {
    pub fn new(pieces: Vec<CorpusPiece>) -> Self {
        Corpus { pieces }
    }

    /// Load from a JSON array of pieces.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let data = std::fs::read_to_string(path)?;
        let pieces: Vec<CorpusPiece> = serde_json::from_str(&data)?;
        Ok(Corpus { pieces })
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[CorpusPiece] {
        &self.pieces
    }

    /// Indices of pieces whose label matches `target` exactly, in corpus
    /// order. Baseline cursors index into this list, so its order must be
    /// stable for a fixed corpus and target.
    pub fn matching(&self, target: EmotionLabel) -> Vec<usize> {
        self.pieces
            .iter()
            .enumerate()
            .filter(|(_, piece)| piece.emotion == target)
            .map(|(i, _)| i)
            .collect()
    }

    /// A random matching piece's first `max_len` tokens, used to seed the
    /// generation context after an emotion change.
    pub fn random_seed_prefix(
        &self,
        target: EmotionLabel,
        max_len: usize,
        rng: &mut impl Rng,
    ) -> Result<Vec<TokenId>, GenerateError> {
        let matching = self.matching(target);
        if matching.is_empty() {
            return Err(GenerateError::NoMatchingPieces(target));
        }
        let piece = &self.pieces[matching[rng.random_range(0..matching.len())]];
        let len = piece.tokens.len().min(max_len);
        Ok(piece.tokens[..len].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn corpus() -> Corpus {
        Corpus::new(vec![
            CorpusPiece {
                tokens: vec![0, 1, 2],
                emotion: EmotionLabel::new(1, 1),
            },
            CorpusPiece {
                tokens: vec![3, 4],
                emotion: EmotionLabel::new(-1, -1),
            },
            CorpusPiece {
                tokens: vec![5, 6, 7, 8],
                emotion: EmotionLabel::new(1, 1),
            },
        ])
    }

    #[test]
    fn test_matching_preserves_order() {
        assert_eq!(corpus().matching(EmotionLabel::new(1, 1)), vec![0, 2]);
        assert_eq!(corpus().matching(EmotionLabel::new(-1, -1)), vec![1]);
        assert!(corpus().matching(EmotionLabel::new(0, 0)).is_empty());
    }

    #[test]
    fn test_random_seed_prefix_respects_max_len() {
        let corpus = corpus();
        let mut rng = StdRng::seed_from_u64(7);
        let prefix = corpus
            .random_seed_prefix(EmotionLabel::new(1, 1), 2, &mut rng)
            .unwrap();
        assert_eq!(prefix.len(), 2);
    }

    #[test]
    fn test_random_seed_prefix_fails_without_matches() {
        let corpus = corpus();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            corpus.random_seed_prefix(EmotionLabel::new(0, 0), 4, &mut rng),
            Err(GenerateError::NoMatchingPieces(_))
        ));
    }
}
