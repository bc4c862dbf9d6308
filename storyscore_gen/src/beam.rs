// Beam search over music tokens, jointly scored by the language model and
// the music-emotion classifier.
//
// Each step expands every beam entry by every vocabulary token, scores the
// candidates by running log-probability plus the log emotion-match factor,
// and prunes back to `beam_width` survivors (stable: ties keep the earlier
// candidate). The first step fans out from the seed alone, taking the top
// `top_k` single-token continuations and pruning them to `beam_width`, so
// the beam-width invariant holds from the first node on.
//
// All probability combination happens in log space; every probability is
// floored at `PROB_FLOOR` before its logarithm so a zero emotion match or
// token probability cannot poison a score with -inf.
//
// Termination is duration-based: the search stops once the best candidate's
// newly generated tokens cover the segment's duration budget, with a
// `max_tokens` horizon bounding the work per segment. Superseded nodes are
// dropped as soon as the next node exists; only the final node's best
// sequence survives.

use crate::error::GenerateError;
use crate::oracle::{
    LanguageModel, MusicEmotionModel, PROB_FLOOR, emotion_match_log_prob,
    validate_distributions, validate_scores,
};
use storyscore_emotion::EmotionLabel;
use storyscore_vocab::{TokenId, Vocabulary, duration::total_duration};

/// Beam search tuning knobs.
#[derive(Debug, Clone)]
pub struct BeamParams {
    /// Surviving candidates per step.
    pub beam_width: usize,
    /// Initial fan-out from the seed (pruned to `beam_width`).
    pub top_k: usize,
    /// Context window: tokens of each candidate fed to the language model.
    pub n_ctx: usize,
    /// Hard cap on generated tokens per segment, whatever the duration
    /// budget says.
    pub max_tokens: usize,
}

/// One step's beam: a batch of candidate sequences and their cumulative
/// log-probabilities. All sequences have the same length, one log-prob per
/// sequence; each step's node is one token longer than its predecessor's.
#[derive(Debug)]
pub struct BeamNode {
    sequences: Vec<Vec<TokenId>>,
    log_probs: Vec<f64>,
}

impl BeamNode {
    fn new(sequences: Vec<Vec<TokenId>>, log_probs: Vec<f64>) -> Self {
        debug_assert_eq!(sequences.len(), log_probs.len());
        debug_assert!(
            sequences.windows(2).all(|w| w[0].len() == w[1].len()),
            "beam sequences must share one length"
        );
        BeamNode {
            sequences,
            log_probs,
        }
    }

    pub fn width(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequence_len(&self) -> usize {
        self.sequences.first().map(Vec::len).unwrap_or(0)
    }

    pub fn sequences(&self) -> &[Vec<TokenId>] {
        &self.sequences
    }

    pub fn log_probs(&self) -> &[f64] {
        &self.log_probs
    }

    /// Index and score of the highest-scoring candidate (first on ties).
    pub fn best(&self) -> (usize, f64) {
        let mut best = 0;
        for i in 1..self.log_probs.len() {
            if self.log_probs[i] > self.log_probs[best] {
                best = i;
            }
        }
        (best, self.log_probs[best])
    }
}

/// A finished beam segment: the winning continuation (seed stripped), its
/// decoded text, and its cumulative log-probability.
#[derive(Debug, Clone)]
pub struct BeamOutput {
    pub tokens: Vec<TokenId>,
    pub text: String,
    pub log_prob: f64,
}

/// Indices of the top `k` scores, descending, ties broken by original
/// position (stable top-K).
fn stable_top_k(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    indices.truncate(k);
    indices
}

fn floored_ln(p: f64) -> f64 {
    p.max(PROB_FLOOR).ln()
}

/// Search for the continuation of `seed` that best matches `target` while
/// staying probable under the language model, bounded by the duration
/// budget.
pub fn beam_search(
    seed: &[TokenId],
    target: EmotionLabel,
    budget_seconds: f64,
    params: &BeamParams,
    lm: &dyn LanguageModel,
    emotion_model: &dyn MusicEmotionModel,
    vocab: &Vocabulary,
) -> Result<BeamOutput, GenerateError> {
    let vocab_size = vocab.len();
    if vocab_size == 0 {
        return Err(GenerateError::Config("empty vocabulary".to_string()));
    }

    // Nothing to cover: no oracle calls, no tokens.
    if budget_seconds <= 0.0 {
        return Ok(BeamOutput {
            tokens: Vec::new(),
            text: String::new(),
            log_prob: 0.0,
        });
    }

    let context_tail = |seq: &[TokenId]| -> Vec<TokenId> {
        seq[seq.len().saturating_sub(params.n_ctx)..].to_vec()
    };

    // Initial fan-out: one-token continuations of the seed, scored jointly.
    let seed_ctx = context_tail(seed);
    let distributions = lm.next_token_distribution(&[seed_ctx.as_slice()])?;
    validate_distributions(&distributions, 1, vocab_size)?;

    let candidates: Vec<Vec<TokenId>> = (0..vocab_size as TokenId)
        .map(|t| {
            let mut seq = seed.to_vec();
            seq.push(t);
            seq
        })
        .collect();
    let candidate_refs: Vec<&[TokenId]> = candidates.iter().map(Vec::as_slice).collect();
    let scores = emotion_model.classify(&candidate_refs)?;
    validate_scores(&scores, candidates.len())?;

    let combined: Vec<f64> = (0..vocab_size)
        .map(|t| floored_ln(distributions[0][t]) + emotion_match_log_prob(scores[t], target))
        .collect();

    let survivors = {
        let mut top = stable_top_k(&combined, params.top_k.max(1));
        top.truncate(params.beam_width);
        top
    };
    let mut node = BeamNode::new(
        survivors.iter().map(|&i| candidates[i].clone()).collect(),
        survivors.iter().map(|&i| combined[i]).collect(),
    );

    loop {
        let (best, _) = node.best();
        let generated = &node.sequences[best][seed.len()..];
        let text = vocab.decode(generated)?;
        if total_duration(&text) >= budget_seconds || generated.len() >= params.max_tokens {
            break;
        }

        // One language-model query per beam entry.
        let contexts: Vec<Vec<TokenId>> =
            node.sequences.iter().map(|seq| context_tail(seq)).collect();
        let context_refs: Vec<&[TokenId]> = contexts.iter().map(Vec::as_slice).collect();
        let distributions = lm.next_token_distribution(&context_refs)?;
        validate_distributions(&distributions, node.width(), vocab_size)?;

        // Cross-product expansion: every entry by every vocabulary token.
        let mut candidates: Vec<Vec<TokenId>> = Vec::with_capacity(node.width() * vocab_size);
        let mut candidate_log_ps: Vec<f64> = Vec::with_capacity(node.width() * vocab_size);
        for (i, (entry, distribution)) in node.sequences.iter().zip(&distributions).enumerate() {
            let entry_log_p = node.log_probs[i];
            for t in 0..vocab_size {
                let mut seq = entry.clone();
                seq.push(t as TokenId);
                candidates.push(seq);
                candidate_log_ps.push(entry_log_p + floored_ln(distribution[t]));
            }
        }

        // Emotion-match factor for every candidate.
        let candidate_refs: Vec<&[TokenId]> = candidates.iter().map(Vec::as_slice).collect();
        let scores = emotion_model.classify(&candidate_refs)?;
        validate_scores(&scores, candidates.len())?;
        for (log_p, &score) in candidate_log_ps.iter_mut().zip(&scores) {
            *log_p += emotion_match_log_prob(score, target);
        }

        let survivors = stable_top_k(&candidate_log_ps, params.beam_width);
        node = BeamNode::new(
            survivors.iter().map(|&i| candidates[i].clone()).collect(),
            survivors.iter().map(|&i| candidate_log_ps[i]).collect(),
        );
    }

    let (best, log_prob) = node.best();
    let tokens = node.sequences[best][seed.len()..].to_vec();
    let text = vocab.decode(&tokens)?;
    Ok(BeamOutput {
        tokens,
        text,
        log_prob,
    })
}
