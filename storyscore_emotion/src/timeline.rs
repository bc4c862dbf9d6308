// Story timelines: the per-segment emotion targets a generation run walks.
//
// An episode file supplies parallel arrays: segment start times, sentence
// texts, and one valence + one arousal score sequence (classifier-predicted),
// optionally doubled with ground-truth annotation columns. The timeline
// derives each segment's duration from consecutive start times, so the last
// start time acts as a terminator: N start times yield N-1 segments.
//
// The timeline is built once, validated, and read-only during generation.

use crate::label::EmotionPair;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("failed to read episode file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse episode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("episode arrays have mismatched lengths: {0}")]
    MismatchedLengths(String),
    #[error("start times are not non-decreasing at index {index}: {prev} > {next}")]
    UnorderedStartTimes { index: usize, prev: f64, next: f64 },
    #[error("episode has no ground-truth emotion columns")]
    MissingGroundTruth,
    #[error("episode needs at least two start times to form a segment")]
    TooShort,
}

/// Raw episode data as persisted: parallel arrays indexed by sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub start_times: Vec<f64>,
    pub sentences: Vec<String>,
    /// Classifier-predicted valence score per sentence.
    pub valence: Vec<f32>,
    /// Classifier-predicted arousal score per sentence.
    pub arousal: Vec<f32>,
    /// Human-annotated ground-truth scores, when the episode carries them.
    #[serde(default)]
    pub ground_valence: Option<Vec<f32>>,
    #[serde(default)]
    pub ground_arousal: Option<Vec<f32>>,
}

impl Episode {
    pub fn load(path: &Path) -> Result<Self, TimelineError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// One timeline slice: a narrative sentence with a duration budget and an
/// emotion target.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start_time: f64,
    /// Seconds until the next sentence begins. The generation budget.
    pub duration: f64,
    pub text: String,
    pub emotion: EmotionPair,
}

/// Ordered segments with validated invariants: non-decreasing start times,
/// non-negative durations.
#[derive(Debug, Clone)]
pub struct StoryTimeline {
    segments: Vec<Segment>,
}

impl StoryTimeline {
    /// Build a timeline from episode data.
    ///
    /// `use_ground_truth` selects the annotated emotion columns instead of
    /// the classifier-predicted ones; fails if the episode has none.
    pub fn from_episode(episode: &Episode, use_ground_truth: bool) -> Result<Self, TimelineError> {
        let n = episode.start_times.len();
        if episode.sentences.len() != n
            || episode.valence.len() != n
            || episode.arousal.len() != n
        {
            return Err(TimelineError::MismatchedLengths(format!(
                "{} start times, {} sentences, {} valence, {} arousal",
                n,
                episode.sentences.len(),
                episode.valence.len(),
                episode.arousal.len()
            )));
        }
        if n < 2 {
            return Err(TimelineError::TooShort);
        }

        let (valence, arousal) = if use_ground_truth {
            let gv = episode
                .ground_valence
                .as_ref()
                .ok_or(TimelineError::MissingGroundTruth)?;
            let ga = episode
                .ground_arousal
                .as_ref()
                .ok_or(TimelineError::MissingGroundTruth)?;
            if gv.len() != n || ga.len() != n {
                return Err(TimelineError::MismatchedLengths(format!(
                    "{} start times, {} ground valence, {} ground arousal",
                    n,
                    gv.len(),
                    ga.len()
                )));
            }
            (gv, ga)
        } else {
            (&episode.valence, &episode.arousal)
        };

        let mut segments = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            let start = episode.start_times[i];
            let end = episode.start_times[i + 1];
            if end < start {
                return Err(TimelineError::UnorderedStartTimes {
                    index: i + 1,
                    prev: start,
                    next: end,
                });
            }
            segments.push(Segment {
                start_time: start,
                duration: end - start,
                text: episode.sentences[i].clone(),
                emotion: EmotionPair::new(valence[i], arousal[i]),
            });
        }

        Ok(StoryTimeline { segments })
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The inclusive-exclusive segment range `[first, last)`, clamped to the
    /// timeline. `first >= last` yields an empty slice.
    pub fn range(&self, first: usize, last: usize) -> &[Segment] {
        let last = last.min(self.segments.len());
        let first = first.min(last);
        &self.segments[first..last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode() -> Episode {
        Episode {
            start_times: vec![0.0, 4.0, 8.0, 14.0],
            sentences: vec![
                "The party enters the cave.".to_string(),
                "Torchlight flickers on wet stone.".to_string(),
                "A growl rises from the dark.".to_string(),
                "Roll for initiative.".to_string(),
            ],
            valence: vec![0.5, 0.4, -0.6, -0.8],
            arousal: vec![0.2, 0.1, 0.9, 1.0],
            ground_valence: Some(vec![1.0, 1.0, -1.0, -1.0]),
            ground_arousal: Some(vec![0.0, 0.0, 1.0, 1.0]),
        }
    }

    #[test]
    fn test_durations_derived_from_start_times() {
        let timeline = StoryTimeline::from_episode(&episode(), false).unwrap();
        assert_eq!(timeline.len(), 3);
        let durations: Vec<f64> = timeline.segments().iter().map(|s| s.duration).collect();
        assert_eq!(durations, vec![4.0, 4.0, 6.0]);
    }

    #[test]
    fn test_ground_truth_selection() {
        let timeline = StoryTimeline::from_episode(&episode(), true).unwrap();
        assert_eq!(timeline.segments()[0].emotion.valence, 1.0);

        let mut no_ground = episode();
        no_ground.ground_valence = None;
        assert!(matches!(
            StoryTimeline::from_episode(&no_ground, true),
            Err(TimelineError::MissingGroundTruth)
        ));
    }

    #[test]
    fn test_unordered_start_times_rejected() {
        let mut bad = episode();
        bad.start_times[2] = 1.0;
        assert!(matches!(
            StoryTimeline::from_episode(&bad, false),
            Err(TimelineError::UnorderedStartTimes { index: 2, .. })
        ));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut bad = episode();
        bad.valence.pop();
        assert!(matches!(
            StoryTimeline::from_episode(&bad, false),
            Err(TimelineError::MismatchedLengths(_))
        ));
    }

    #[test]
    fn test_range_clamps() {
        let timeline = StoryTimeline::from_episode(&episode(), false).unwrap();
        assert_eq!(timeline.range(2, 2).len(), 0);
        assert_eq!(timeline.range(1, 99).len(), 2);
        assert_eq!(timeline.range(5, 2).len(), 0);
    }
}
