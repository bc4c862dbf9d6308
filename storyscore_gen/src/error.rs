// Error taxonomy for the generation pipeline.
//
// Everything here is fatal: precondition violations abort the run with a
// message naming what is missing, oracle failures abort immediately (a
// malformed batch would silently corrupt the numeric combination downstream),
// and configuration problems are caught before generation begins. There is
// no retry anywhere — model inference and corpus sampling are deterministic
// enough that retrying would not change the outcome. Operator cancellation
// is deliberately *not* an error; the driver returns a partial result.
//
// `Segment` wraps a strategy failure with the segment index and strategy
// name, so the top-level report says where the run died.

use crate::driver::Strategy;
use storyscore_emotion::EmotionLabel;
use storyscore_vocab::VocabError;
use thiserror::Error;

/// A model oracle returned something the decoding loop cannot use.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle returned {got} results for a batch of {expected}")]
    MalformedBatch { expected: usize, got: usize },
    #[error("language model returned {got} probabilities, expected vocabulary size {expected}")]
    MalformedDistribution { expected: usize, got: usize },
    #[error("language model produced an invalid probability: {value}")]
    InvalidProbability { value: f64 },
    #[error("emotion classifier produced a score outside [0, 1]: {value}")]
    InvalidScore { value: f64 },
    #[error("inference call took {elapsed_ms} ms, exceeding the {limit_ms} ms limit")]
    Timeout { limit_ms: u128, elapsed_ms: u128 },
    #[error("model backend failure: {0}")]
    Backend(String),
}

/// A generation run failure.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no corpus pieces match emotion {0}")]
    NoMatchingPieces(EmotionLabel),
    #[error("corpus pieces matching emotion {0} contain no timed tokens")]
    NoTimedTokens(EmotionLabel),
    #[error("oracle failure: {0}")]
    Oracle(#[from] OracleError),
    #[error("vocabulary failure: {0}")]
    Vocab(#[from] VocabError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("segment {index} ({strategy} strategy) failed: {source}")]
    Segment {
        index: usize,
        strategy: Strategy,
        #[source]
        source: Box<GenerateError>,
    },
}

impl GenerateError {
    /// Wrap an error with the segment index and strategy that produced it.
    pub fn in_segment(self, index: usize, strategy: Strategy) -> Self {
        GenerateError::Segment {
            index,
            strategy,
            source: Box::new(self),
        }
    }
}
