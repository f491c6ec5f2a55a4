//! Bulk job, target and result persistence

use crate::classifier::person_key;
use crate::db::{from_json, max_lock_wait_ms, to_json};
use crate::models::{
    parse_timestamp, parse_uuid, BulkJob, BulkResult, BulkTarget, JobStatus, PassStatus, PostPass,
    TargetStatus,
};
use crate::utils::retry_on_lock;
use chrono::{DateTime, Utc};
use ore_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Counter snapshot written by the flusher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub processed_targets: u64,
    pub enriched_contacts: u64,
    pub error_count: u64,
}

fn parse_status<T: std::str::FromStr<Err = String>>(value: &str) -> Result<T> {
    value.parse().map_err(Error::Internal)
}

fn optional_timestamp(column: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(column, &v)).transpose()
}

/// Persist a new job and all of its targets in one transaction
pub async fn create_job(pool: &SqlitePool, job: &BulkJob, targets: &[BulkTarget]) -> Result<()> {
    let config = to_json("config", &job.config)?;
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO bulk_jobs (
            id, status, total_targets, processed_targets, enriched_contacts,
            error_count, reveal_status, deep_research_status, config, error,
            created_at, started_at, finished_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id.to_string())
    .bind(job.status.as_str())
    .bind(job.total_targets as i64)
    .bind(job.processed_targets as i64)
    .bind(job.enriched_contacts as i64)
    .bind(job.error_count as i64)
    .bind(job.reveal_status.as_str())
    .bind(job.deep_research_status.as_str())
    .bind(&config)
    .bind(&job.error)
    .bind(job.created_at.to_rfc3339())
    .bind(job.started_at.map(|t| t.to_rfc3339()))
    .bind(job.finished_at.map(|t| t.to_rfc3339()))
    .execute(&mut *tx)
    .await?;

    for target in targets {
        sqlx::query(
            r#"
            INSERT INTO bulk_targets (
                id, job_id, position, company, domain, location, status, error, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(target.id.to_string())
        .bind(target.job_id.to_string())
        .bind(target.position)
        .bind(&target.company)
        .bind(&target.domain)
        .bind(&target.location)
        .bind(target.status.as_str())
        .bind(&target.error)
        .bind(target.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

fn job_from_row(row: &SqliteRow) -> Result<BulkJob> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let reveal_status: String = row.get("reveal_status");
    let deep_research_status: String = row.get("deep_research_status");
    let config: String = row.get("config");
    let created_at: String = row.get("created_at");
    let count = |column: &str| row.get::<i64, _>(column).max(0) as u64;

    Ok(BulkJob {
        id: parse_uuid("id", &id)?,
        status: parse_status(&status)?,
        total_targets: count("total_targets"),
        processed_targets: count("processed_targets"),
        enriched_contacts: count("enriched_contacts"),
        error_count: count("error_count"),
        reveal_status: parse_status(&reveal_status)?,
        deep_research_status: parse_status(&deep_research_status)?,
        config: from_json("config", &config)?,
        error: row.get("error"),
        created_at: parse_timestamp("created_at", &created_at)?,
        started_at: optional_timestamp("started_at", row.get("started_at"))?,
        finished_at: optional_timestamp("finished_at", row.get("finished_at"))?,
    })
}

pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<BulkJob>> {
    let row = sqlx::query("SELECT * FROM bulk_jobs WHERE id = ?")
        .bind(job_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(job_from_row).transpose()
}

/// Jobs the service should pick up again at start
///
/// Drivers that never reached a terminal status, and succeeded jobs with a
/// deferred pass still queued or interrupted mid-run.
pub async fn list_incomplete_jobs(pool: &SqlitePool) -> Result<Vec<BulkJob>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM bulk_jobs
        WHERE status IN ('pending', 'running')
           OR (status = 'succeeded'
               AND (reveal_status IN ('pending', 'running')
                    OR deep_research_status IN ('pending', 'running')))
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(job_from_row).collect()
}

/// Move a job to `status`, stamping start/finish times
pub async fn update_job_status(
    pool: &SqlitePool,
    job_id: Uuid,
    status: JobStatus,
    error: Option<&str>,
) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = job_id.to_string();
    let now = Utc::now().to_rfc3339();

    retry_on_lock("update_job_status", max_wait_ms, || async {
        sqlx::query(
            r#"
            UPDATE bulk_jobs SET
                status = ?,
                error = ?,
                started_at = CASE WHEN ? = 'running' THEN COALESCE(started_at, ?) ELSE started_at END,
                finished_at = CASE WHEN ? IN ('succeeded', 'failed') THEN ? ELSE NULL END
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(error)
        .bind(status.as_str())
        .bind(&now)
        .bind(status.as_str())
        .bind(&now)
        .bind(&id)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

/// Write counters; stored values never decrease
pub async fn flush_job_counters(pool: &SqlitePool, job_id: Uuid, counters: JobCounters) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = job_id.to_string();

    retry_on_lock("flush_job_counters", max_wait_ms, || async {
        sqlx::query(
            r#"
            UPDATE bulk_jobs SET
                processed_targets = MAX(processed_targets, ?),
                enriched_contacts = MAX(enriched_contacts, ?),
                error_count = MAX(error_count, ?)
            WHERE id = ?
            "#,
        )
        .bind(counters.processed_targets as i64)
        .bind(counters.enriched_contacts as i64)
        .bind(counters.error_count as i64)
        .bind(&id)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn set_pass_status(
    pool: &SqlitePool,
    job_id: Uuid,
    pass: PostPass,
    status: PassStatus,
) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = job_id.to_string();
    let sql = format!("UPDATE bulk_jobs SET {} = ? WHERE id = ?", pass.status_column());

    retry_on_lock("set_pass_status", max_wait_ms, || async {
        sqlx::query(&sql)
            .bind(status.as_str())
            .bind(&id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

fn target_from_row(row: &SqliteRow) -> Result<BulkTarget> {
    let id: String = row.get("id");
    let job_id: String = row.get("job_id");
    let status: String = row.get("status");
    let updated_at: String = row.get("updated_at");

    Ok(BulkTarget {
        id: parse_uuid("id", &id)?,
        job_id: parse_uuid("job_id", &job_id)?,
        position: row.get("position"),
        company: row.get("company"),
        domain: row.get("domain"),
        location: row.get("location"),
        status: parse_status(&status)?,
        error: row.get("error"),
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub async fn load_targets(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<BulkTarget>> {
    let rows = sqlx::query("SELECT * FROM bulk_targets WHERE job_id = ? ORDER BY position")
        .bind(job_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(target_from_row).collect()
}

/// Targets not yet enriched or errored
pub async fn load_unfinished_targets(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<BulkTarget>> {
    let rows = sqlx::query(
        "SELECT * FROM bulk_targets WHERE job_id = ? AND status IN ('pending', 'processing') ORDER BY position",
    )
    .bind(job_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(target_from_row).collect()
}

/// Finished-target tallies recomputed from the target rows
pub async fn count_finished_targets(pool: &SqlitePool, job_id: Uuid) -> Result<(u64, u64)> {
    let (processed, errors): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE status IN ('enriched', 'error')),
            COUNT(*) FILTER (WHERE status = 'error')
        FROM bulk_targets WHERE job_id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok((processed.max(0) as u64, errors.max(0) as u64))
}

pub async fn update_target_status(
    pool: &SqlitePool,
    target_id: Uuid,
    status: TargetStatus,
    error: Option<&str>,
) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = target_id.to_string();
    let now = Utc::now().to_rfc3339();

    retry_on_lock("update_target_status", max_wait_ms, || async {
        sqlx::query("UPDATE bulk_targets SET status = ?, error = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(error)
            .bind(&now)
            .bind(&id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}

/// Upsert a result keyed by (target, normalized person name)
///
/// Known phone/email/handle values are never overwritten with blanks, and the
/// higher confidence and intent score win. Returns the stored row's id.
pub async fn save_result(pool: &SqlitePool, result: &BulkResult) -> Result<Uuid> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = result.id.to_string();
    let job_id = result.job_id.to_string();
    let target_id = result.target_id.to_string();
    let key = person_key(&result.person_name);
    let providers = to_json("providers", &result.providers)?;
    let created_at = result.created_at.to_rfc3339();

    let stored: String = retry_on_lock("save_result", max_wait_ms, || async {
        let row: (String,) = sqlx::query_as(
            r#"
            INSERT INTO bulk_results (
                id, job_id, target_id, person_name, person_key, title, company,
                phone, email, confidence, intent_score, providers, handle,
                outreach_rationale, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(target_id, person_key) DO UPDATE SET
                title = COALESCE(excluded.title, bulk_results.title),
                phone = COALESCE(excluded.phone, bulk_results.phone),
                email = COALESCE(excluded.email, bulk_results.email),
                confidence = MAX(bulk_results.confidence, excluded.confidence),
                intent_score = MAX(bulk_results.intent_score, excluded.intent_score),
                providers = excluded.providers,
                handle = COALESCE(excluded.handle, bulk_results.handle),
                outreach_rationale = COALESCE(excluded.outreach_rationale, bulk_results.outreach_rationale)
            RETURNING id
            "#,
        )
        .bind(&id)
        .bind(&job_id)
        .bind(&target_id)
        .bind(&result.person_name)
        .bind(&key)
        .bind(&result.title)
        .bind(&result.company)
        .bind(&result.phone)
        .bind(&result.email)
        .bind(i64::from(result.confidence))
        .bind(i64::from(result.intent_score))
        .bind(&providers)
        .bind(&result.handle)
        .bind(&result.outreach_rationale)
        .bind(&created_at)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    })
    .await?;

    parse_uuid("id", &stored)
}

fn result_from_row(row: &SqliteRow) -> Result<BulkResult> {
    let id: String = row.get("id");
    let job_id: String = row.get("job_id");
    let target_id: String = row.get("target_id");
    let providers: String = row.get("providers");
    let created_at: String = row.get("created_at");

    Ok(BulkResult {
        id: parse_uuid("id", &id)?,
        job_id: parse_uuid("job_id", &job_id)?,
        target_id: parse_uuid("target_id", &target_id)?,
        person_name: row.get("person_name"),
        title: row.get("title"),
        company: row.get("company"),
        phone: row.get("phone"),
        email: row.get("email"),
        confidence: row.get::<i64, _>("confidence").clamp(0, 100) as u8,
        intent_score: row.get::<i64, _>("intent_score").clamp(0, 100) as u8,
        providers: from_json("providers", &providers)?,
        handle: row.get("handle"),
        outreach_rationale: row.get("outreach_rationale"),
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

/// Results of a job, best first
pub async fn load_results(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<BulkResult>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM bulk_results WHERE job_id = ?
        ORDER BY intent_score DESC, confidence DESC, person_name
        "#,
    )
    .bind(job_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(result_from_row).collect()
}

/// Results with any phone or email
pub async fn count_contactable_results(pool: &SqlitePool, job_id: Uuid) -> Result<u64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bulk_results WHERE job_id = ? AND (phone IS NOT NULL OR email IS NOT NULL)",
    )
    .bind(job_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(count.max(0) as u64)
}

/// Fill in revealed contact details (existing values are kept)
pub async fn update_result_contact(
    pool: &SqlitePool,
    result_id: Uuid,
    phone: Option<&str>,
    email: Option<&str>,
) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = result_id.to_string();

    retry_on_lock("update_result_contact", max_wait_ms, || async {
        sqlx::query(
            "UPDATE bulk_results SET phone = COALESCE(phone, ?), email = COALESCE(email, ?) WHERE id = ?",
        )
        .bind(phone)
        .bind(email)
        .bind(&id)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await
}

pub async fn update_result_rationale(pool: &SqlitePool, result_id: Uuid, rationale: &str) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await;
    let id = result_id.to_string();

    retry_on_lock("update_result_rationale", max_wait_ms, || async {
        sqlx::query("UPDATE bulk_results SET outreach_rationale = ? WHERE id = ?")
            .bind(rationale)
            .bind(&id)
            .execute(pool)
            .await?;
        Ok(())
    })
    .await
}
