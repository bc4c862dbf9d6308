// Storyscore generation engine.
//
// Generates musical token sequences whose local emotional content tracks
// the emotional arc of a narrative — a tabletop RPG episode transcript —
// by combining a generative music language model with a music-emotion
// classifier in a controlled decoding loop.
//
// Architecture:
// - oracle.rs: model oracle traits (batched language model + emotion
//   classifier), output validation, match scoring, inference deadlines
// - models.rs: built-in oracle implementations (n-gram language model,
//   pitch-profile emotion heuristic), JSON-loadable with defaults
// - corpus.rs: human-composed reference pieces labeled by emotion
// - baseline.rs: baseline strategy — copy matching corpus music under a
//   duration budget, with a continuation cursor across segments
// - beam.rs: beam search jointly scored by language-model likelihood and
//   emotion match, duration-bounded
// - driver.rs: per-segment orchestration — emotion-change detection,
//   context resets and carry, strategy dispatch, cancellation, reporting
// - error.rs: the fatal-error taxonomy
// - stub.rs: deterministic stub oracles for tests
//
// The trained models themselves (transformer language model, GPT-2-style
// emotion classifiers, BERT sentence classifier) live outside this
// repository; this crate treats them as opaque scoring functions behind
// the oracle traits.

pub mod baseline;
pub mod beam;
pub mod corpus;
pub mod driver;
pub mod error;
pub mod models;
pub mod oracle;
pub mod stub;
