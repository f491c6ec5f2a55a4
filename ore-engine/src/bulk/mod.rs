//! Bulk enrichment jobs
//!
//! A job fans out into targets processed by a bounded worker stream. Counters
//! live in atomics while the job runs and a timer task flushes them to the job
//! row; the row's counters never decrease. Once the job succeeds, the deferred
//! passes queued on it run, each under its own bound.
//!
//! Jobs are resumable: `reprocess_job` and `resume_incomplete_jobs` pick up
//! unfinished targets and any pass not yet `done`.

pub mod passes;
pub mod strategy;

pub use strategy::{result_intent_score, TargetOutcome, TargetProcessor};

use crate::db;
use crate::db::jobs::JobCounters;
use crate::diagnostics::LastError;
use crate::models::{
    BulkJob, BulkJobConfig, BulkResult, BulkTarget, JobStatus, PassStatus, PostPass, TargetStatus,
};
use crate::providers::ProviderSet;
use crate::waterfall::WaterfallExecutor;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use ore_common::events::{EventBus, OreEvent};
use ore_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_WORKERS: usize = 6;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_REVEAL_WORKERS: usize = 4;
pub const DEFAULT_RESEARCH_WORKERS: usize = 2;
pub const DEFAULT_RESEARCH_TOP_N: usize = 10;

#[derive(Debug, Clone)]
pub struct BulkSettings {
    pub workers: usize,
    pub flush_interval: Duration,
    pub reveal_workers: usize,
    pub research_workers: usize,
    pub research_top_n: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            reveal_workers: DEFAULT_REVEAL_WORKERS,
            research_workers: DEFAULT_RESEARCH_WORKERS,
            research_top_n: DEFAULT_RESEARCH_TOP_N,
        }
    }
}

/// In-memory counters of a running job
#[derive(Debug, Default)]
pub struct JobProgress {
    processed_targets: AtomicU64,
    enriched_contacts: AtomicU64,
    error_count: AtomicU64,
}

impl JobProgress {
    fn starting_from(counters: JobCounters) -> Self {
        Self {
            processed_targets: AtomicU64::new(counters.processed_targets),
            enriched_contacts: AtomicU64::new(counters.enriched_contacts),
            error_count: AtomicU64::new(counters.error_count),
        }
    }

    pub fn snapshot(&self) -> JobCounters {
        JobCounters {
            processed_targets: self.processed_targets.load(Ordering::Relaxed),
            enriched_contacts: self.enriched_contacts.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }
}

/// Bulk job driver
#[derive(Clone)]
pub struct BulkPipeline {
    db: SqlitePool,
    providers: ProviderSet,
    processor: Arc<TargetProcessor>,
    executor: Arc<WaterfallExecutor>,
    event_bus: EventBus,
    settings: BulkSettings,
    last_error: LastError,
    /// Counters of jobs whose driver is running in this process
    live: Arc<RwLock<HashMap<Uuid, Arc<JobProgress>>>>,
}

impl BulkPipeline {
    pub fn new(
        db: SqlitePool,
        providers: ProviderSet,
        executor: Arc<WaterfallExecutor>,
        event_bus: EventBus,
        settings: BulkSettings,
        last_error: LastError,
    ) -> Self {
        let processor = Arc::new(TargetProcessor::new(providers.clone(), executor.clone()));
        Self {
            db,
            providers,
            processor,
            executor,
            event_bus,
            settings,
            last_error,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Persist a job with its targets and start its driver
    pub async fn create_job(&self, config: BulkJobConfig) -> Result<BulkJob> {
        let config = BulkJobConfig {
            targets: config
                .targets
                .into_iter()
                .filter(|t| !t.company.trim().is_empty())
                .collect(),
            ..config
        };
        if config.targets.is_empty() {
            return Err(Error::InvalidInput("job has no targets".to_string()));
        }

        let job = BulkJob::new(config);
        let targets: Vec<BulkTarget> = job
            .config
            .targets
            .iter()
            .enumerate()
            .map(|(position, input)| BulkTarget::from_input(job.id, position as i64, input))
            .collect();
        db::jobs::create_job(&self.db, &job, &targets).await?;

        info!(job_id = %job.id, total_targets = job.total_targets, "Bulk job created");
        self.spawn_driver(job.id).await;
        Ok(job)
    }

    /// Job row with live counters overlaid while its driver runs
    pub async fn get_job_status(&self, job_id: Uuid) -> Result<Option<BulkJob>> {
        let Some(mut job) = db::jobs::load_job(&self.db, job_id).await? else {
            return Ok(None);
        };
        if let Some(progress) = self.live.read().await.get(&job_id) {
            let live = progress.snapshot();
            job.processed_targets = job.processed_targets.max(live.processed_targets);
            job.enriched_contacts = job.enriched_contacts.max(live.enriched_contacts);
            job.error_count = job.error_count.max(live.error_count);
        }
        Ok(Some(job))
    }

    pub async fn list_job_results(&self, job_id: Uuid) -> Result<Vec<BulkResult>> {
        if db::jobs::load_job(&self.db, job_id).await?.is_none() {
            return Err(Error::NotFound(format!("job {}", job_id)));
        }
        db::jobs::load_results(&self.db, job_id).await
    }

    /// Resume unfinished targets and any pass that is not `done`
    pub async fn reprocess_job(&self, job_id: Uuid) -> Result<BulkJob> {
        let job = db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;

        if self.live.read().await.contains_key(&job_id) {
            return Err(Error::Conflict(format!("job {} is already running", job_id)));
        }

        for pass in PostPass::ALL {
            if job.pass_status(pass) == PassStatus::Failed {
                db::jobs::set_pass_status(&self.db, job_id, pass, PassStatus::Pending).await?;
            }
        }
        if job.status == JobStatus::Failed {
            db::jobs::update_job_status(&self.db, job_id, JobStatus::Pending, None).await?;
        }

        info!(job_id = %job_id, "Reprocessing bulk job");
        self.spawn_driver(job_id).await;
        db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))
    }

    /// Restart every job left unfinished by a previous process
    pub async fn resume_incomplete_jobs(&self) -> Result<usize> {
        let jobs = db::jobs::list_incomplete_jobs(&self.db).await?;
        for job in &jobs {
            info!(job_id = %job.id, status = %job.status, "Resuming bulk job");
            self.spawn_driver(job.id).await;
        }
        Ok(jobs.len())
    }

    /// Wait until no driver is running (tests and shutdown)
    pub async fn wait_idle(&self) {
        while !self.live.read().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn spawn_driver(&self, job_id: Uuid) {
        {
            let mut live = self.live.write().await;
            if live.contains_key(&job_id) {
                return;
            }
            live.insert(job_id, Arc::new(JobProgress::default()));
        }

        let pipeline = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.drive(job_id).await {
                error!(job_id = %job_id, error = %e, "Bulk job driver failed");
                pipeline
                    .last_error
                    .record("bulk_job", format!("job {}: {}", job_id, e))
                    .await;
                if let Err(db_err) =
                    db::jobs::update_job_status(&pipeline.db, job_id, JobStatus::Failed, Some(&e.to_string())).await
                {
                    error!(job_id = %job_id, error = %db_err, "Failed to mark job failed");
                }
                pipeline.event_bus.emit_lossy(OreEvent::JobFailed {
                    job_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
            pipeline.live.write().await.remove(&job_id);
        });
    }

    async fn drive(&self, job_id: Uuid) -> Result<()> {
        let job = db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;

        if !job.status.is_terminal() {
            self.process_targets(&job).await?;
        }

        self.run_passes(job_id).await
    }

    async fn process_targets(&self, job: &BulkJob) -> Result<()> {
        let job_id = job.id;
        db::jobs::update_job_status(&self.db, job_id, JobStatus::Running, None).await?;

        let (processed, errors) = db::jobs::count_finished_targets(&self.db, job_id).await?;
        let enriched = db::jobs::count_contactable_results(&self.db, job_id).await?;
        let progress = Arc::new(JobProgress::starting_from(JobCounters {
            processed_targets: processed,
            enriched_contacts: enriched,
            error_count: errors,
        }));
        self.live.write().await.insert(job_id, progress.clone());

        let targets = db::jobs::load_unfinished_targets(&self.db, job_id).await?;
        self.event_bus.emit_lossy(OreEvent::JobStarted {
            job_id,
            total_targets: targets.len(),
            timestamp: Utc::now(),
        });
        info!(job_id = %job_id, remaining = targets.len(), workers = self.settings.workers, "Processing bulk targets");

        let token = CancellationToken::new();
        let flusher = self.spawn_flusher(job_id, job.total_targets, progress.clone(), token.clone());

        let outcomes: Vec<Result<()>> = stream::iter(targets)
            .map(|target| {
                let pipeline = self.clone();
                let progress = progress.clone();
                async move { pipeline.process_target(target, progress).await }
            })
            .buffer_unordered(self.settings.workers.max(1))
            .collect()
            .await;

        token.cancel();
        if let Err(e) = flusher.await {
            warn!(job_id = %job_id, error = %e, "Counter flusher task ended abnormally");
        }
        let final_counters = progress.snapshot();
        db::jobs::flush_job_counters(&self.db, job_id, final_counters).await?;

        // A target whose own status write failed leaves the job unfinished
        outcomes.into_iter().collect::<Result<Vec<()>>>()?;

        db::jobs::update_job_status(&self.db, job_id, JobStatus::Succeeded, None).await?;
        self.event_bus.emit_lossy(OreEvent::JobCompleted {
            job_id,
            processed_targets: final_counters.processed_targets,
            enriched_contacts: final_counters.enriched_contacts,
            error_count: final_counters.error_count,
            timestamp: Utc::now(),
        });
        info!(
            job_id = %job_id,
            processed_targets = final_counters.processed_targets,
            enriched_contacts = final_counters.enriched_contacts,
            error_count = final_counters.error_count,
            "Bulk job succeeded"
        );
        Ok(())
    }

    /// Run one target; only its own status writes can fail it
    async fn process_target(&self, target: BulkTarget, progress: Arc<JobProgress>) -> Result<()> {
        db::jobs::update_target_status(&self.db, target.id, TargetStatus::Processing, None).await?;

        let outcome = self.processor.process(&target).await;

        let mut stored = Ok(0u64);
        if !outcome.is_error() {
            stored = self.save_results(&outcome.results).await;
        }

        match (&stored, outcome.is_error()) {
            (Ok(contactable), false) => {
                db::jobs::update_target_status(&self.db, target.id, TargetStatus::Enriched, None).await?;
                progress.enriched_contacts.fetch_add(*contactable, Ordering::Relaxed);
            }
            (Ok(_), true) => {
                let message = outcome
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "no contact sources configured".to_string());
                warn!(target_id = %target.id, company = %target.company, error = %message, "Target failed");
                self.last_error
                    .record("bulk_target", format!("{}: {}", target.company, message))
                    .await;
                db::jobs::update_target_status(&self.db, target.id, TargetStatus::Error, Some(&message)).await?;
                progress.error_count.fetch_add(1, Ordering::Relaxed);
            }
            (Err(e), _) => {
                let message = format!("saving results failed: {}", e);
                warn!(target_id = %target.id, company = %target.company, error = %message, "Target failed");
                db::jobs::update_target_status(&self.db, target.id, TargetStatus::Error, Some(&message)).await?;
                progress.error_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        progress.processed_targets.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Save result rows, returning how many carry a phone or email
    async fn save_results(&self, results: &[BulkResult]) -> Result<u64> {
        let mut contactable = 0;
        for result in results {
            db::jobs::save_result(&self.db, result).await?;
            if result.has_contact() {
                contactable += 1;
            }
        }
        Ok(contactable)
    }

    fn spawn_flusher(
        &self,
        job_id: Uuid,
        total_targets: u64,
        progress: Arc<JobProgress>,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let db = self.db.clone();
        let event_bus = self.event_bus.clone();
        let period = self.settings.flush_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let counters = progress.snapshot();
                        if let Err(e) = db::jobs::flush_job_counters(&db, job_id, counters).await {
                            warn!(job_id = %job_id, error = %e, "Counter flush failed");
                            continue;
                        }
                        event_bus.emit_lossy(OreEvent::JobProgress {
                            job_id,
                            processed_targets: counters.processed_targets,
                            total_targets,
                            enriched_contacts: counters.enriched_contacts,
                            error_count: counters.error_count,
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
        })
    }

    /// Run every pass that is queued (or was interrupted) on the job row
    async fn run_passes(&self, job_id: Uuid) -> Result<()> {
        let job = db::jobs::load_job(&self.db, job_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("job {}", job_id)))?;
        if job.status != JobStatus::Succeeded {
            return Ok(());
        }

        for pass in PostPass::ALL {
            if !job.pass_status(pass).needs_run() {
                continue;
            }
            db::jobs::set_pass_status(&self.db, job_id, pass, PassStatus::Running).await?;

            let outcome = match pass {
                PostPass::Reveal => {
                    passes::run_reveal(
                        &self.db,
                        &self.executor,
                        self.providers.contact_directory.clone(),
                        job_id,
                        self.settings.reveal_workers,
                    )
                    .await
                }
                PostPass::DeepResearch => {
                    let top_n = job.config.research_top_n.unwrap_or(self.settings.research_top_n);
                    passes::run_deep_research(
                        &self.db,
                        &self.executor,
                        self.providers.ai_research.clone(),
                        job_id,
                        top_n,
                        self.settings.research_workers,
                    )
                    .await
                }
            };

            match outcome {
                Ok(updated_results) => {
                    db::jobs::set_pass_status(&self.db, job_id, pass, PassStatus::Done).await?;
                    info!(job_id = %job_id, pass = pass.as_str(), updated_results, "Post-processing pass done");
                    self.event_bus.emit_lossy(OreEvent::PostProcessingCompleted {
                        job_id,
                        pass: pass.as_str().to_string(),
                        updated_results,
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(job_id = %job_id, pass = pass.as_str(), error = %e, "Post-processing pass failed");
                    self.last_error
                        .record(&format!("bulk_pass:{}", pass.as_str()), format!("job {}: {}", job_id, e))
                        .await;
                    db::jobs::set_pass_status(&self.db, job_id, pass, PassStatus::Failed).await?;
                }
            }
        }

        // Reveals add phones and emails after the final target flush
        let enriched = db::jobs::count_contactable_results(&self.db, job_id).await?;
        db::jobs::flush_job_counters(
            &self.db,
            job_id,
            JobCounters {
                processed_targets: job.processed_targets,
                enriched_contacts: enriched,
                error_count: job.error_count,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_snapshot() {
        let progress = JobProgress::starting_from(JobCounters {
            processed_targets: 4,
            enriched_contacts: 2,
            error_count: 1,
        });
        progress.processed_targets.fetch_add(1, Ordering::Relaxed);
        progress.error_count.fetch_add(1, Ordering::Relaxed);
        assert_eq!(
            progress.snapshot(),
            JobCounters {
                processed_targets: 5,
                enriched_contacts: 2,
                error_count: 2,
            }
        );
    }

    #[test]
    fn test_default_settings() {
        let settings = BulkSettings::default();
        assert_eq!(settings.workers, 6);
        assert_eq!(settings.flush_interval, Duration::from_secs(2));
        assert_eq!(settings.research_top_n, 10);
    }
}
