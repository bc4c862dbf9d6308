// Baseline strategy: copy human-composed corpus music.
//
// Instead of sampling from the language model, the baseline walks a corpus
// piece whose emotion label matches the segment's target, emitting tokens
// until the segment's duration budget is met. A cursor (which matching
// piece, which offset) carries across consecutive segments with the same
// emotion, so the music continues instead of restarting; an emotion change
// clears the cursor and a fresh matching piece is drawn at random.
//
// When a piece runs out before the budget is met, emission wraps to the
// next matching piece (cyclically). A corpus whose matching pieces contain
// no timed tokens would wrap forever, so that is rejected up front.

use crate::corpus::Corpus;
use crate::error::GenerateError;
use rand::Rng;
use storyscore_emotion::EmotionLabel;
use storyscore_vocab::{TokenId, Vocabulary, duration::total_duration};

/// Continuation state for the baseline strategy. `piece` indexes into the
/// stable matching-piece list for the current target emotion, which is why
/// the cursor is only valid while the target is unchanged — the driver
/// clears it on every emotion change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusCursor {
    pub piece: usize,
    pub offset: usize,
}

/// One baseline segment's output.
#[derive(Debug, Clone)]
pub struct BaselineOutput {
    pub tokens: Vec<TokenId>,
    pub text: String,
    pub cursor: CorpusCursor,
}

/// Emit corpus tokens matching `target` until their musical duration
/// reaches `budget_seconds`.
pub fn generate_baseline(
    corpus: &Corpus,
    vocab: &Vocabulary,
    target: EmotionLabel,
    budget_seconds: f64,
    cursor: Option<CorpusCursor>,
    rng: &mut impl Rng,
) -> Result<BaselineOutput, GenerateError> {
    let matching = corpus.matching(target);
    if matching.is_empty() {
        return Err(GenerateError::NoMatchingPieces(target));
    }

    let (mut piece_pos, mut offset) = match cursor {
        Some(cursor) => {
            if cursor.piece >= matching.len() {
                return Err(GenerateError::Config(format!(
                    "stale baseline cursor: piece {} of {} matching",
                    cursor.piece,
                    matching.len()
                )));
            }
            (cursor.piece, cursor.offset)
        }
        None => (rng.random_range(0..matching.len()), 0),
    };

    if budget_seconds > 0.0 {
        // Wrapping across pieces only terminates if some matching token
        // advances time.
        let timed: f64 = matching
            .iter()
            .map(|&i| {
                let text = vocab.decode(&corpus.pieces()[i].tokens)?;
                Ok(total_duration(&text))
            })
            .sum::<Result<f64, GenerateError>>()?;
        if timed <= 0.0 {
            return Err(GenerateError::NoTimedTokens(target));
        }
    }

    let mut emitted: Vec<TokenId> = Vec::new();
    let mut text = String::new();

    while total_duration(&text) < budget_seconds {
        let piece = &corpus.pieces()[matching[piece_pos]];
        if offset >= piece.tokens.len() {
            piece_pos = (piece_pos + 1) % matching.len();
            offset = 0;
            continue;
        }
        emitted.push(piece.tokens[offset]);
        offset += 1;
        text = vocab.decode(&emitted)?;
    }

    Ok(BaselineOutput {
        tokens: emitted,
        text,
        cursor: CorpusCursor {
            piece: piece_pos,
            offset,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusPiece;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    // Vocab: ids 0..4 are notes, 4 is a one-sixteenth wait (0.125 s at
    // 120 BPM), 5 is a four-sixteenth wait (0.5 s).
    fn vocab() -> Vocabulary {
        Vocabulary::from_entries([
            ("n_60".to_string(), 0),
            ("n_62".to_string(), 1),
            ("n_64".to_string(), 2),
            ("n_65".to_string(), 3),
            ("w_1".to_string(), 4),
            ("w_4".to_string(), 5),
        ])
        .unwrap()
    }

    fn happy() -> EmotionLabel {
        EmotionLabel::new(1, 1)
    }

    #[test]
    fn test_no_matching_pieces_fails_without_emission() {
        let corpus = Corpus::new(vec![CorpusPiece {
            tokens: vec![0, 4],
            emotion: EmotionLabel::new(-1, -1),
        }]);
        let mut rng = StdRng::seed_from_u64(1);
        let result = generate_baseline(&corpus, &vocab(), happy(), 1.0, None, &mut rng);
        assert!(matches!(result, Err(GenerateError::NoMatchingPieces(_))));
    }

    #[test]
    fn test_budget_reached_mid_piece_leaves_cursor() {
        // Piece: 10 tokens; each w_1 is 0.125 s. Cumulative duration hits
        // the 0.5 s budget exactly at the 7th token, so exactly the first
        // 7 tokens come back and the cursor points at offset 7.
        let piece_tokens = vec![0, 4, 1, 4, 2, 4, 4, 3, 0, 4];
        let corpus = Corpus::new(vec![CorpusPiece {
            tokens: piece_tokens.clone(),
            emotion: happy(),
        }]);
        let mut rng = StdRng::seed_from_u64(1);
        let out =
            generate_baseline(&corpus, &vocab(), happy(), 0.5, None, &mut rng).unwrap();
        assert_eq!(out.tokens, piece_tokens[..7]);
        assert_eq!(out.cursor, CorpusCursor { piece: 0, offset: 7 });
    }

    #[test]
    fn test_cursor_resumes_where_it_left_off() {
        let piece_tokens = vec![0, 4, 1, 4, 2, 4, 4, 3, 0, 4];
        let corpus = Corpus::new(vec![CorpusPiece {
            tokens: piece_tokens.clone(),
            emotion: happy(),
        }]);
        let mut rng = StdRng::seed_from_u64(1);
        let first =
            generate_baseline(&corpus, &vocab(), happy(), 0.25, None, &mut rng).unwrap();
        let second = generate_baseline(
            &corpus,
            &vocab(),
            happy(),
            0.25,
            Some(first.cursor),
            &mut rng,
        )
        .unwrap();
        let mut combined = first.tokens.clone();
        combined.extend(&second.tokens);
        assert_eq!(combined, piece_tokens[..combined.len()]);
    }

    #[test]
    fn test_exhausted_piece_wraps_to_next_match() {
        // First matching piece is only 0.25 s; budget needs the second.
        let corpus = Corpus::new(vec![
            CorpusPiece {
                tokens: vec![0, 4, 4],
                emotion: happy(),
            },
            CorpusPiece {
                tokens: vec![1, 5, 5],
                emotion: happy(),
            },
        ]);
        let mut rng = StdRng::seed_from_u64(0);
        let out = generate_baseline(
            &corpus,
            &vocab(),
            happy(),
            0.5,
            Some(CorpusCursor { piece: 0, offset: 0 }),
            &mut rng,
        )
        .unwrap();
        // All of piece 0 (0.25 s), then into piece 1 until 0.5 s total.
        assert_eq!(out.tokens, vec![0, 4, 4, 1, 5]);
        assert_eq!(out.cursor, CorpusCursor { piece: 1, offset: 2 });
    }

    #[test]
    fn test_emitted_count_monotone_in_budget() {
        let corpus = Corpus::new(vec![CorpusPiece {
            tokens: vec![0, 4, 1, 4, 2, 4, 3, 4],
            emotion: happy(),
        }]);
        let cursor = Some(CorpusCursor { piece: 0, offset: 0 });
        let mut previous = 0;
        for budget in [0.0, 0.1, 0.2, 0.3, 0.4, 0.5] {
            let mut rng = StdRng::seed_from_u64(9);
            let out =
                generate_baseline(&corpus, &vocab(), happy(), budget, cursor, &mut rng)
                    .unwrap();
            assert!(out.tokens.len() >= previous, "budget {budget} emitted less");
            previous = out.tokens.len();
        }
    }

    #[test]
    fn test_zero_budget_emits_nothing() {
        let corpus = Corpus::new(vec![CorpusPiece {
            tokens: vec![0, 4],
            emotion: happy(),
        }]);
        let mut rng = StdRng::seed_from_u64(2);
        let out = generate_baseline(&corpus, &vocab(), happy(), 0.0, None, &mut rng).unwrap();
        assert!(out.tokens.is_empty());
        assert_eq!(out.cursor.offset, 0);
    }

    #[test]
    fn test_untimed_corpus_rejected() {
        // Matching pieces are all notes, no waits: duration never advances.
        let corpus = Corpus::new(vec![CorpusPiece {
            tokens: vec![0, 1, 2],
            emotion: happy(),
        }]);
        let mut rng = StdRng::seed_from_u64(3);
        let result = generate_baseline(&corpus, &vocab(), happy(), 1.0, None, &mut rng);
        assert!(matches!(result, Err(GenerateError::NoTimedTokens(_))));
    }
}
