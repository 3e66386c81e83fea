//! Background jobs: score decay and the daily featured rebuild.
//!
//! Both run as apalis cron workers on a single monitor the host spawns
//! once at startup.

mod decay;
mod featured;

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::{CronStream, Schedule};
use tokio::task::JoinHandle;
use tracing::error;

pub use decay::{DecayJobContext, DecayScoresJob, decay_schedule, process_decay_job};
pub use featured::{
    FeaturedJobContext, FeaturedRebuildJob, featured_schedule, process_featured_rebuild_job,
    rebuild_featured_category,
};

/// Spawn the cron workers for score decay and the daily featured rebuild.
pub fn spawn_job_monitor(
    decay_context: DecayJobContext,
    decay_schedule: Schedule,
    featured_context: FeaturedJobContext,
    featured_schedule: Schedule,
) -> JoinHandle<()> {
    let decay_worker = WorkerBuilder::new("decay-scores-worker")
        .data(decay_context)
        .backend(CronStream::new(decay_schedule))
        .build_fn(process_decay_job);
    let featured_worker = WorkerBuilder::new("featured-rebuild-worker")
        .data(featured_context)
        .backend(CronStream::new(featured_schedule))
        .build_fn(process_featured_rebuild_job);

    let monitor = Monitor::new().register(decay_worker).register(featured_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}
