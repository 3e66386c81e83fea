//! Cron job that decays realtime ranking scores.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use apalis::prelude::{Data, Error as ApalisError};
use apalis_cron::Schedule;
use metrics::histogram;
use tracing::{debug, info, warn};

use crate::cache::RealtimeScores;
use crate::config::{DecaySettings, SettingsError};

const METRIC_DECAY_MS: &str = "vetrina_decay_ms";
const FALLBACK_FACTOR: f64 = 0.97;

/// Marker struct for the cron-triggered decay job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct DecayScoresJob;

impl From<chrono::DateTime<chrono::Utc>> for DecayScoresJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the decay job worker.
#[derive(Clone)]
pub struct DecayJobContext {
    pub scores: Arc<RealtimeScores>,
    pub factor: f64,
    pub floor: f64,
    running: Arc<AtomicBool>,
}

impl DecayJobContext {
    pub fn new(scores: Arc<RealtimeScores>, settings: &DecaySettings) -> Self {
        Self {
            scores,
            factor: bounded_factor(settings.factor),
            floor: settings.floor,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A factor outside (0, 1) would grow scores or zero the whole set in one
/// cycle; such a value is replaced with the stock factor.
fn bounded_factor(factor: f64) -> f64 {
    if factor > 0.0 && factor < 1.0 {
        factor
    } else {
        warn!(factor, "decay factor outside (0, 1); using {FALLBACK_FACTOR}");
        FALLBACK_FACTOR
    }
}

/// Process one decay cycle: scale every score, prune entries at or below
/// the floor. Cycles never overlap; a tick landing while one is still
/// running is skipped, and a missed cycle self-corrects on the next run.
pub async fn process_decay_job(
    _job: DecayScoresJob,
    ctx: Data<DecayJobContext>,
) -> Result<(), ApalisError> {
    if ctx.running.swap(true, Ordering::SeqCst) {
        debug!("decay cycle still running; skipping tick");
        return Ok(());
    }

    let started = Instant::now();
    match ctx.scores.decay_once(ctx.factor, ctx.floor).await {
        Ok(pruned) => info!(pruned, factor = ctx.factor, "realtime scores decayed"),
        Err(err) => warn!(error = %err, "score decay failed; next cycle self-corrects"),
    }
    histogram!(METRIC_DECAY_MS).record(started.elapsed().as_secs_f64() * 1000.0);

    ctx.running.store(false, Ordering::SeqCst);
    Ok(())
}

/// Parse the decay schedule from settings.
pub fn decay_schedule(settings: &DecaySettings) -> Result<Schedule, SettingsError> {
    Schedule::from_str(&settings.cron).map_err(|err| SettingsError::InvalidCron {
        expression: settings.cron.clone(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_parses() {
        let schedule = decay_schedule(&DecaySettings::default()).expect("valid default");
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
    }

    #[test]
    fn malformed_schedule_is_rejected() {
        let settings = DecaySettings {
            cron: "every ten minutes".to_string(),
            ..Default::default()
        };
        assert!(decay_schedule(&settings).is_err());
    }

    #[test]
    fn out_of_range_factor_falls_back() {
        assert_eq!(bounded_factor(1.5), FALLBACK_FACTOR);
        assert_eq!(bounded_factor(0.0), FALLBACK_FACTOR);
        assert_eq!(bounded_factor(-0.5), FALLBACK_FACTOR);
        assert!((bounded_factor(0.9) - 0.9).abs() < f64::EPSILON);
    }
}
