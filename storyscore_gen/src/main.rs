// Storyscore CLI entry point.
//
// Scores a tabletop RPG episode with generated music: loads the episode
// timeline, the token vocabulary and the reference corpus, builds the
// oracles, and runs the per-segment generation driver.
//
// Usage:
//   storyscore --episode FILE --vocab FILE --corpus FILE [--mode beam|baseline]
//     [--lm FILE] [--fst N] [--lst N] [--init TEXT] [--top-k N]
//     [--beam-width N] [--n-ctx N] [--max-tokens N] [--timeout-ms N]
//     [--seed N] [--ground] [--out FILE]
//
// Output is the decoded token text plus its cumulative log-probability;
// rendering to MIDI or audio is a downstream concern.

use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storyscore_emotion::{Episode, StoryTimeline};
use storyscore_gen::corpus::Corpus;
use storyscore_gen::driver::{CancelToken, GenerationParams, Strategy, generate};
use storyscore_gen::models::{NgramLanguageModel, PitchProfileModel};
use storyscore_vocab::Vocabulary;

struct Options {
    mode: Strategy,
    episode: PathBuf,
    vocab: PathBuf,
    corpus: PathBuf,
    lm_model: Option<PathBuf>,
    fst: usize,
    lst: Option<usize>,
    init: String,
    top_k: usize,
    beam_width: usize,
    n_ctx: usize,
    max_tokens: usize,
    timeout_ms: Option<u64>,
    seed: Option<u64>,
    ground: bool,
    out: Option<PathBuf>,
}

fn main() {
    let opt = parse_args();

    println!("=== Storyscore ===");
    println!("Mode: {}", opt.mode);
    println!("Episode: {}", opt.episode.display());
    if opt.ground {
        println!("Using ground-truth emotion annotations.");
    }
    println!();

    // Load inputs
    println!("[1/4] Loading vocabulary, episode and corpus...");
    let vocab = match Vocabulary::load(&opt.vocab) {
        Ok(v) => Arc::new(v),
        Err(e) => fatal(&format!("vocabulary {}: {e}", opt.vocab.display())),
    };
    println!("  {} tokens in vocabulary.", vocab.len());

    let episode = match Episode::load(&opt.episode) {
        Ok(ep) => ep,
        Err(e) => fatal(&format!("episode {}: {e}", opt.episode.display())),
    };
    let timeline = match StoryTimeline::from_episode(&episode, opt.ground) {
        Ok(t) => t,
        Err(e) => fatal(&format!("episode {}: {e}", opt.episode.display())),
    };
    let last = opt.lst.unwrap_or(timeline.len());
    let segments = timeline.range(opt.fst, last);
    println!(
        "  {} segments ({} selected, [{}..{})).",
        timeline.len(),
        segments.len(),
        opt.fst,
        last
    );

    let corpus = match Corpus::load(&opt.corpus) {
        Ok(c) => c,
        Err(e) => fatal(&format!("corpus {}: {e}", opt.corpus.display())),
    };
    println!("  {} reference pieces.", corpus.len());

    // Build oracles
    println!("[2/4] Building oracles...");
    let lm = match &opt.lm_model {
        Some(path) => match NgramLanguageModel::load(path) {
            Ok(m) => {
                println!("  Loaded n-gram model from {}.", path.display());
                m
            }
            Err(e) => fatal(&format!("language model {}: {e}", path.display())),
        },
        None => {
            println!("  No --lm given; using the built-in default model.");
            NgramLanguageModel::default_model(&vocab)
        }
    };
    let emotion_model = PitchProfileModel::new(Arc::clone(&vocab));

    // Generate
    println!("[3/4] Generating...");
    let init_tokens = match vocab.encode(&opt.init) {
        Ok(t) => t,
        Err(e) => fatal(&format!("--init: {e}")),
    };
    let params = GenerationParams {
        strategy: opt.mode,
        init_tokens,
        n_ctx: opt.n_ctx,
        top_k: opt.top_k,
        beam_width: opt.beam_width,
        max_tokens: opt.max_tokens,
        inference_timeout: opt.timeout_ms.map(Duration::from_millis),
    };

    let mut rng = match opt.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };
    // Ctrl-C sets the cancel token; the driver stops at the next segment
    // boundary and the partial score still gets written.
    let cancel = CancelToken::new();
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.cancel()) {
        eprintln!("Warning: no interrupt handler ({e}); Ctrl-C will discard output.");
    }

    let outcome = match generate(
        segments,
        &params,
        &corpus,
        &vocab,
        &lm,
        &emotion_model,
        &cancel,
        &mut rng,
    ) {
        Ok(outcome) => outcome,
        Err(e) => fatal(&e.to_string()),
    };

    for report in &outcome.reports {
        println!(
            "  segment {:>3}: target {} {:>5.1}s {} {:>4} tokens logp {:>8.2} heard {}",
            report.index,
            report.target,
            report.duration,
            if report.reset { "reset" } else { "cont." },
            report.tokens_emitted,
            report.log_prob,
            report.observed,
        );
    }
    if outcome.interrupted {
        println!("  Interrupted; returning the partial score.");
    }

    // Write output
    println!("[4/4] Writing output...");
    let text = match vocab.decode(&outcome.tokens) {
        Ok(t) => t,
        Err(e) => fatal(&format!("decoding output: {e}")),
    };
    match &opt.out {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &text) {
                fatal(&format!("writing {}: {e}", path.display()));
            }
            println!("  Wrote {} tokens to {}.", outcome.tokens.len(), path.display());
        }
        None => {
            println!();
            println!("{text}");
        }
    }
    println!("Score log-probability: {:.4}", outcome.log_prob);
}

fn fatal(message: &str) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();

    let mode = match parse_value::<String>(&args, "--mode") {
        Some(name) => match name.parse::<Strategy>() {
            Ok(mode) => mode,
            Err(e) => fatal(&e.to_string()),
        },
        None => Strategy::Beam,
    };

    Options {
        mode,
        episode: required_path(&args, "--episode"),
        vocab: required_path(&args, "--vocab"),
        corpus: required_path(&args, "--corpus"),
        lm_model: parse_value::<String>(&args, "--lm").map(PathBuf::from),
        fst: parse_value(&args, "--fst").unwrap_or(0),
        lst: parse_value(&args, "--lst"),
        init: parse_value(&args, "--init").unwrap_or_default(),
        top_k: parse_value(&args, "--top-k").unwrap_or(10),
        beam_width: parse_value(&args, "--beam-width").unwrap_or(3),
        n_ctx: parse_value(&args, "--n-ctx").unwrap_or(32),
        max_tokens: parse_value(&args, "--max-tokens").unwrap_or(256),
        timeout_ms: parse_value(&args, "--timeout-ms"),
        seed: parse_value(&args, "--seed"),
        ground: args.iter().any(|a| a == "--ground"),
        out: parse_value::<String>(&args, "--out").map(PathBuf::from),
    }
}

fn required_path(args: &[String], flag: &str) -> PathBuf {
    match parse_value::<String>(args, flag) {
        Some(value) => Path::new(&value).to_path_buf(),
        None => fatal(&format!("{flag} is required")),
    }
}

fn parse_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
