// Story-to-music driver.
//
// Walks the story timeline segment by segment: discretizes each segment's
// emotion target, resets the musical context when the target changes (a
// fresh seed prefix drawn from matching corpus music), invokes the selected
// strategy with the segment's duration budget, and accumulates the output
// sequence and its cumulative log-probability.
//
// The driver owns all mutable generation state and threads it explicitly;
// strategies receive what they need and return what they produced. The only
// outside influence is the cancel token, polled once per segment: when set,
// the loop stops and whatever has accumulated is returned as a clean
// partial result, not an error.
//
// Strategy and oracle failures are fatal. They come back wrapped with the
// segment index and strategy name so the operator knows where the run died.

use crate::baseline::{CorpusCursor, generate_baseline};
use crate::beam::{BeamParams, beam_search};
use crate::corpus::Corpus;
use crate::error::GenerateError;
use crate::oracle::{
    LanguageModel, MusicEmotionModel, TimedEmotionModel, TimedLanguageModel, scores_to_pair,
    validate_scores,
};
use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use storyscore_emotion::{EmotionLabel, Segment, discretize};
use storyscore_vocab::{TokenId, Vocabulary};

/// Which generation strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Beam,
    Baseline,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Beam => write!(f, "beam"),
            Strategy::Baseline => write!(f, "baseline"),
        }
    }
}

impl FromStr for Strategy {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beam" => Ok(Strategy::Beam),
            "baseline" => Ok(Strategy::Baseline),
            other => Err(GenerateError::Config(format!(
                "unknown strategy {other:?} (expected \"beam\" or \"baseline\")"
            ))),
        }
    }
}

/// Everything a generation run is parameterized by.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub strategy: Strategy,
    /// Seed tokens for the very first context window.
    pub init_tokens: Vec<TokenId>,
    /// Context window carried between segments and fed to the language
    /// model.
    pub n_ctx: usize,
    /// Initial beam fan-out.
    pub top_k: usize,
    /// Beam survivors per step.
    pub beam_width: usize,
    /// Per-segment generated-token horizon.
    pub max_tokens: usize,
    /// Fatal deadline on each oracle call, when set.
    pub inference_timeout: Option<Duration>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            strategy: Strategy::Beam,
            init_tokens: Vec::new(),
            n_ctx: 32,
            top_k: 10,
            beam_width: 3,
            max_tokens: 256,
            inference_timeout: None,
        }
    }
}

impl GenerationParams {
    /// Reject configurations generation cannot run with. Called before any
    /// segment work begins.
    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.n_ctx == 0 {
            return Err(GenerateError::Config("n_ctx must be at least 1".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(GenerateError::Config(
                "max_tokens must be at least 1".to_string(),
            ));
        }
        if self.strategy == Strategy::Beam {
            if self.beam_width == 0 {
                return Err(GenerateError::Config(
                    "beam_width must be at least 1".to_string(),
                ));
            }
            if self.top_k == 0 {
                return Err(GenerateError::Config("top_k must be at least 1".to_string()));
            }
        }
        Ok(())
    }
}

/// Cooperative cancellation flag, polled at segment boundaries only —
/// never inside the beam-expansion inner loop. Cancellation granularity is
/// "between segments".
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-segment statistics, returned for the caller to print or inspect.
#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub index: usize,
    pub target: EmotionLabel,
    pub duration: f64,
    /// Whether the emotion changed and the context was reseeded.
    pub reset: bool,
    pub tokens_emitted: usize,
    pub log_prob: f64,
    /// What the music-emotion classifier heard in the generated context —
    /// diagnostic only, never steers generation.
    pub observed: EmotionLabel,
}

/// A finished (or cleanly interrupted) run.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub tokens: Vec<TokenId>,
    pub log_prob: f64,
    /// True when the run stopped early at a cancel request. The
    /// accumulated tokens are still a valid partial score.
    pub interrupted: bool,
    pub reports: Vec<SegmentReport>,
}

/// Generate music for an ordered slice of story segments.
#[allow(clippy::too_many_arguments)]
pub fn generate(
    segments: &[Segment],
    params: &GenerationParams,
    corpus: &Corpus,
    vocab: &Vocabulary,
    lm: &dyn LanguageModel,
    emotion_model: &dyn MusicEmotionModel,
    cancel: &CancelToken,
    rng: &mut impl Rng,
) -> Result<GenerationOutcome, GenerateError> {
    params.validate()?;

    // Oracle deadline, when configured, applies uniformly to every call.
    let timed_lm;
    let timed_emotion;
    let (lm, emotion_model): (&dyn LanguageModel, &dyn MusicEmotionModel) =
        if let Some(limit) = params.inference_timeout {
            timed_lm = TimedLanguageModel::new(lm, limit);
            timed_emotion = TimedEmotionModel::new(emotion_model, limit);
            (&timed_lm, &timed_emotion)
        } else {
            (lm, emotion_model)
        };

    let mut context = params.init_tokens.clone();
    let mut output = params.init_tokens.clone();
    let mut log_prob = 0.0;
    let mut cursor: Option<CorpusCursor> = None;
    let mut last_emotion: Option<EmotionLabel> = None;
    let mut reports = Vec::with_capacity(segments.len());
    let mut interrupted = false;

    for (index, segment) in segments.iter().enumerate() {
        if cancel.is_cancelled() {
            interrupted = true;
            break;
        }

        let target = discretize(segment.emotion);

        // Emotion change (or first segment): restart the musical context
        // from matching corpus music and drop any baseline continuation.
        let reset = last_emotion != Some(target);
        if reset {
            context = corpus
                .random_seed_prefix(target, params.n_ctx, rng)
                .map_err(|e| e.in_segment(index, params.strategy))?;
            cursor = None;
        }

        let (new_tokens, segment_log_prob) = match params.strategy {
            Strategy::Beam => {
                let beam_params = BeamParams {
                    beam_width: params.beam_width,
                    top_k: params.top_k,
                    n_ctx: params.n_ctx,
                    max_tokens: params.max_tokens,
                };
                let out = beam_search(
                    &context,
                    target,
                    segment.duration,
                    &beam_params,
                    lm,
                    emotion_model,
                    vocab,
                )
                .map_err(|e| e.in_segment(index, params.strategy))?;
                (out.tokens, out.log_prob)
            }
            Strategy::Baseline => {
                let out = generate_baseline(
                    corpus,
                    vocab,
                    target,
                    segment.duration,
                    cursor.take(),
                    rng,
                )
                .map_err(|e| e.in_segment(index, params.strategy))?;
                cursor = Some(out.cursor);
                (out.tokens, 0.0)
            }
        };

        // What does the generated music sound like to the classifier?
        // Recorded for the report; generation never branches on it.
        let mut window = context.clone();
        window.extend(&new_tokens);
        let observed = {
            let scores = emotion_model
                .classify(&[window.as_slice()])
                .map_err(|e| GenerateError::from(e).in_segment(index, params.strategy))?;
            validate_scores(&scores, 1)
                .map_err(|e| GenerateError::from(e).in_segment(index, params.strategy))?;
            discretize(scores_to_pair(scores[0]))
        };

        output.extend(&new_tokens);
        log_prob += segment_log_prob;

        reports.push(SegmentReport {
            index,
            target,
            duration: segment.duration,
            reset,
            tokens_emitted: new_tokens.len(),
            log_prob: segment_log_prob,
            observed,
        });

        // Carry the tail of context + new tokens into the next segment.
        let tail_start = window.len().saturating_sub(params.n_ctx);
        context = window[tail_start..].to_vec();
        last_emotion = Some(target);
    }

    Ok(GenerationOutcome {
        tokens: output,
        log_prob,
        interrupted,
        reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!("beam".parse::<Strategy>().unwrap(), Strategy::Beam);
        assert_eq!("baseline".parse::<Strategy>().unwrap(), Strategy::Baseline);
        assert!(matches!(
            "random".parse::<Strategy>(),
            Err(GenerateError::Config(_))
        ));
    }

    #[test]
    fn test_params_validation() {
        let mut params = GenerationParams::default();
        assert!(params.validate().is_ok());

        params.n_ctx = 0;
        assert!(matches!(params.validate(), Err(GenerateError::Config(_))));

        let mut params = GenerationParams {
            beam_width: 0,
            ..GenerationParams::default()
        };
        assert!(matches!(params.validate(), Err(GenerateError::Config(_))));

        // beam_width is irrelevant to the baseline strategy.
        params.strategy = Strategy::Baseline;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_cancel_token_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
