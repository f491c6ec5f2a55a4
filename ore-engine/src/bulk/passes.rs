//! Deferred post-processing passes
//!
//! Both passes run after a job reaches `succeeded`, each under its own worker
//! bound. Provider calls share the job's pools and retry policy. Per-result
//! provider failures are logged and skipped; the pass only fails on storage
//! errors or a missing provider.

use crate::db;
use crate::models::BulkResult;
use crate::providers::{AiResearch, ContactDirectory, OutreachContext};
use crate::waterfall::WaterfallExecutor;
use futures::stream::{self, StreamExt};
use ore_common::{Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Turn directory handles into phone/email for results missing them
pub async fn run_reveal(
    pool: &SqlitePool,
    executor: &Arc<WaterfallExecutor>,
    directory: Option<Arc<dyn ContactDirectory>>,
    job_id: Uuid,
    workers: usize,
) -> Result<usize> {
    let pending: Vec<BulkResult> = db::jobs::load_results(pool, job_id)
        .await?
        .into_iter()
        .filter(BulkResult::needs_reveal)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }
    let directory = directory.ok_or_else(|| {
        Error::Config("reveal pass needs a contact directory provider".to_string())
    })?;

    info!(job_id = %job_id, results = pending.len(), "Reveal pass started");

    let outcomes: Vec<Result<bool>> = stream::iter(pending)
        .map(|result| reveal_one(pool.clone(), executor.clone(), directory.clone(), result))
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    count_updates(outcomes)
}

/// Write an outreach rationale for the top `top_n` results without one
pub async fn run_deep_research(
    pool: &SqlitePool,
    executor: &Arc<WaterfallExecutor>,
    research: Option<Arc<dyn AiResearch>>,
    job_id: Uuid,
    top_n: usize,
    workers: usize,
) -> Result<usize> {
    // load_results orders best first
    let top: Vec<BulkResult> = db::jobs::load_results(pool, job_id)
        .await?
        .into_iter()
        .take(top_n)
        .filter(|r| r.outreach_rationale.is_none())
        .collect();
    if top.is_empty() {
        return Ok(0);
    }
    let research = research.ok_or_else(|| {
        Error::Config("deep research pass needs an AI research provider".to_string())
    })?;

    info!(job_id = %job_id, results = top.len(), "Deep research pass started");

    let outcomes: Vec<Result<bool>> = stream::iter(top)
        .map(|result| research_one(pool.clone(), executor.clone(), research.clone(), result))
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    count_updates(outcomes)
}

async fn reveal_one(
    pool: SqlitePool,
    executor: Arc<WaterfallExecutor>,
    directory: Arc<dyn ContactDirectory>,
    result: BulkResult,
) -> Result<bool> {
    let Some(handle) = result.handle.as_deref() else {
        return Ok(false);
    };
    let revealed = executor
        .call_guarded(directory.name(), || directory.reveal(handle))
        .await;
    match revealed {
        Ok(revealed) if revealed.phone.is_some() || revealed.email.is_some() => {
            db::jobs::update_result_contact(
                &pool,
                result.id,
                revealed.phone.as_deref(),
                revealed.email.as_deref(),
            )
            .await?;
            Ok(true)
        }
        Ok(_) => {
            debug!(result_id = %result.id, "Reveal returned nothing");
            Ok(false)
        }
        Err(e) => {
            warn!(result_id = %result.id, provider = directory.name(), error = %e, "Reveal failed");
            Ok(false)
        }
    }
}

async fn research_one(
    pool: SqlitePool,
    executor: Arc<WaterfallExecutor>,
    research: Arc<dyn AiResearch>,
    result: BulkResult,
) -> Result<bool> {
    let context = OutreachContext {
        person_name: result.person_name.clone(),
        title: result.title.clone(),
        company: result.company.clone(),
        properties: Vec::new(),
    };
    let rationale = executor
        .call_guarded(research.name(), || research.outreach_rationale(&context))
        .await;
    match rationale {
        Ok(text) if !text.trim().is_empty() => {
            db::jobs::update_result_rationale(&pool, result.id, text.trim()).await?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) => {
            warn!(result_id = %result.id, provider = research.name(), error = %e, "Outreach rationale failed");
            Ok(false)
        }
    }
}

fn count_updates(outcomes: Vec<Result<bool>>) -> Result<usize> {
    let mut updated = 0;
    for outcome in outcomes {
        if outcome? {
            updated += 1;
        }
    }
    Ok(updated)
}

