//! Synthetic trial data producer.
//!
//! Emits a sequence of behavioural-experiment trials: each starts ten seconds
//! after the previous one ended, lasts one to ten seconds and succeeds or
//! fails at random. Every record carries the running accuracy observed before
//! it.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::{ClientError, Result},
    publisher::Publisher,
};

/// Gap between the end of one trial and the start of the next.
const INTER_TRIAL_GAP_SECS: i64 = 10;

/// One trial record as posted to the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialData {
    pub trial_id: u64,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub result: bool,
    /// Accuracy over all previous trials
    pub correct_rate: f64,
}

/// Running success statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrialStats {
    pub total_trials: u64,
    pub successful_trials: u64,
}

impl TrialStats {
    pub fn update(&mut self, result: bool) {
        self.total_trials += 1;
        if result {
            self.successful_trials += 1;
        }
    }

    /// Fraction of successful trials, 0.0 before any trial.
    pub fn accuracy(&self) -> f64 {
        if self.total_trials == 0 {
            return 0.0;
        }
        self.successful_trials as f64 / self.total_trials as f64
    }
}

impl std::fmt::Display for TrialStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Accuracy: {:.4} ({}/{})",
            self.accuracy(),
            self.successful_trials,
            self.total_trials
        )
    }
}

/// A generated trial plus how long it lasted.
#[derive(Debug, Clone)]
pub struct Trial {
    pub data: TrialData,
    pub duration: Duration,
}

/// Produces successive trials.
pub struct TrialGenerator {
    next_id: u64,
    last_end: Option<NaiveDateTime>,
    stats: TrialStats,
    rng: StdRng,
}

impl TrialGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic generator for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            next_id: 1,
            last_end: None,
            stats: TrialStats::default(),
            rng,
        }
    }

    pub fn stats(&self) -> TrialStats {
        self.stats
    }

    /// Generate the next trial and fold its result into the statistics.
    pub fn next_trial(&mut self) -> Trial {
        let start_time = match self.last_end {
            Some(end) => end + TimeDelta::seconds(INTER_TRIAL_GAP_SECS),
            None => Local::now().naive_local(),
        };
        let duration_secs: i64 = self.rng.random_range(1..=10);
        let end_time = start_time + TimeDelta::seconds(duration_secs);
        let result = self.rng.random_bool(0.5);

        let data = TrialData {
            trial_id: self.next_id,
            start_time,
            end_time,
            result,
            correct_rate: self.stats.accuracy(),
        };

        self.stats.update(result);
        self.last_end = Some(end_time);
        self.next_id += 1;

        Trial {
            data,
            duration: Duration::from_secs(duration_secs as u64),
        }
    }
}

impl Default for TrialGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Post generated trials to `stream`.
///
/// Runs `count` trials, or forever when `None`. Between posts it sleeps for
/// `interval`, or for the trial's own duration when `None`. Transport
/// failures are logged and skipped; a missing stream or a rejected payload
/// stops the run.
pub async fn run_generator(
    publisher: &Publisher,
    stream: &str,
    count: Option<u64>,
    interval: Option<Duration>,
) -> Result<TrialStats> {
    let mut generator = TrialGenerator::new();
    let mut sent = 0u64;

    while count.is_none_or(|count| sent < count) {
        let trial = generator.next_trial();
        let id = trial.data.trial_id;

        match publisher.post(stream, &trial.data).await {
            Ok(seq) => {
                info!(
                    trial_id = id,
                    seq = seq,
                    result = trial.data.result,
                    duration_secs = trial.duration.as_secs(),
                    stats = %generator.stats(),
                    "Trial sent"
                );
            }
            Err(e @ (ClientError::NotFound(_) | ClientError::BadRequest(_))) => return Err(e),
            Err(e) => {
                warn!(trial_id = id, error = %e, "Failed to send trial");
            }
        }

        sent += 1;
        if count.is_some_and(|count| sent >= count) {
            break;
        }
        tokio::time::sleep(interval.unwrap_or(trial.duration)).await;
    }

    Ok(generator.stats())
}
