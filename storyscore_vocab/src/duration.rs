// Musical duration accounting over token text.
//
// The token grammar encodes timing explicitly, so the duration of a piece is
// derivable from its text alone:
//
// - `t_<bpm>`   tempo change; applies to subsequent waits
// - `w_<steps>` wait; advances time by `steps` sixteenth notes
// - `n_<pitch>` note-on (no time advance)
// - `v_<vel>`   velocity change (no time advance)
// - `.`         bar marker (no time advance)
//
// Both generation strategies stop on a duration budget measured in seconds,
// recomputed from the emitted text after each token. Symbols the grammar does
// not recognize contribute zero duration, so the parser is total over
// arbitrary token text and tolerant of vocabulary extensions.

/// Tempo assumed before the first `t_` token.
pub const DEFAULT_BPM: f64 = 120.0;

/// Seconds contributed by one sixteenth-note step at the given tempo.
fn step_seconds(bpm: f64) -> f64 {
    60.0 / bpm / 4.0
}

/// Total musical duration of token text, in seconds.
pub fn total_duration(text: &str) -> f64 {
    total_duration_of_symbols(text.split_whitespace())
}

/// Total musical duration of a symbol stream, in seconds.
pub fn total_duration_of_symbols<'a>(symbols: impl IntoIterator<Item = &'a str>) -> f64 {
    let mut bpm = DEFAULT_BPM;
    let mut seconds = 0.0;

    for symbol in symbols {
        if let Some(value) = symbol.strip_prefix("t_") {
            if let Ok(new_bpm) = value.parse::<f64>() {
                if new_bpm > 0.0 {
                    bpm = new_bpm;
                }
            }
        } else if let Some(value) = symbol.strip_prefix("w_") {
            if let Ok(steps) = value.parse::<u32>() {
                seconds += f64::from(steps) * step_seconds(bpm);
            }
        }
    }

    seconds
}

/// Number of note-on tokens in token text. Used by the pitch-profile
/// emotion heuristic.
pub fn note_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|symbol| symbol.starts_with("n_"))
        .count()
}

/// MIDI pitch numbers of the note-on tokens in token text, in order.
pub fn note_pitches(text: &str) -> Vec<u8> {
    text.split_whitespace()
        .filter_map(|symbol| symbol.strip_prefix("n_"))
        .filter_map(|value| value.parse::<u8>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_at_default_tempo() {
        // 8 sixteenths at 120 BPM = 2 quarters = 1 second
        let duration = total_duration("n_60 w_4 n_62 w_4");
        assert!((duration - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_change_applies_forward() {
        // First wait at 120 BPM (0.5s), second at 60 BPM (1.0s)
        let duration = total_duration("w_4 t_60 w_4");
        assert!((duration - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_non_timing_tokens_are_free() {
        assert_eq!(total_duration("n_60 v_80 . n_64"), 0.0);
    }

    #[test]
    fn test_malformed_symbols_ignored() {
        // Unparsable steps and a zero tempo must not panic or count.
        let duration = total_duration("w_x t_0 w_4");
        assert!((duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_note_pitches() {
        assert_eq!(note_pitches("n_60 w_4 n_72 v_80"), vec![60, 72]);
        assert_eq!(note_count("n_60 w_4 n_72 v_80"), 2);
    }
}
