//! Bulk job lifecycle tests

mod helpers;

use helpers::{MockDirectory, MockResearch, TestEngine};
use ore_common::events::OreEvent;
use ore_engine::models::{BulkJobConfig, BulkTargetInput, JobStatus, PassStatus};
use ore_engine::providers::{AiResearch, ContactDirectory, ProviderSet};
use std::sync::Arc;

fn targets(names: &[String]) -> Vec<BulkTargetInput> {
    names
        .iter()
        .map(|company| BulkTargetInput {
            company: company.clone(),
            domain: None,
            location: Some("Austin, TX".to_string()),
        })
        .collect()
}

fn company_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("Target Company {}", i)).collect()
}

#[tokio::test]
async fn test_failing_targets_do_not_fail_job() {
    let names = company_names(10);
    let directory = MockDirectory::new(&[names[1].as_str(), names[4].as_str(), names[7].as_str()]);
    let env = TestEngine::new(ProviderSet {
        contact_directory: Some(directory as Arc<dyn ContactDirectory>),
        ..Default::default()
    })
    .await;

    let job = env
        .engine
        .create_bulk_enrichment_job(BulkJobConfig {
            targets: targets(&names),
            reveal: false,
            deep_research: false,
            research_top_n: None,
        })
        .await
        .unwrap();
    assert_eq!(job.total_targets, 10);

    env.engine.wait_for_jobs().await;

    let finished = env.engine.get_job_status(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.processed_targets, 10);
    assert_eq!(finished.error_count, 3);
    assert_eq!(finished.enriched_contacts, 7);
    assert!(finished.finished_at.is_some());

    let results = env.engine.list_job_results(job.id).await.unwrap();
    assert_eq!(results.len(), 7);
    assert!(results.windows(2).all(|w| w[0].intent_score >= w[1].intent_score));
}

#[tokio::test]
async fn test_passes_run_after_targets() {
    let names = company_names(3);
    let providers = ProviderSet {
        contact_directory: Some(MockDirectory::new(&[]) as Arc<dyn ContactDirectory>),
        ai_research: Some(MockResearch::with_owners(&[]) as Arc<dyn AiResearch>),
        ..Default::default()
    };
    let env = TestEngine::new(providers).await;
    let mut events = env.event_bus.subscribe();

    let job = env
        .engine
        .create_bulk_enrichment_job(BulkJobConfig {
            targets: targets(&names),
            reveal: true,
            deep_research: true,
            research_top_n: Some(2),
        })
        .await
        .unwrap();
    env.engine.wait_for_jobs().await;

    let finished = env.engine.get_job_status(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.reveal_status, PassStatus::Done);
    assert_eq!(finished.deep_research_status, PassStatus::Done);

    let results = env.engine.list_job_results(job.id).await.unwrap();
    assert!(results.iter().all(|r| r.phone.is_some()));
    assert_eq!(results.iter().filter(|r| r.outreach_rationale.is_some()).count(), 2);

    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, OreEvent::JobCompleted { .. }) {
            completed = true;
        }
    }
    assert!(completed);
}

#[tokio::test]
async fn test_reveal_pass_retries_rate_limited_reveal() {
    let directory = MockDirectory::throttling_reveals(1);
    let env = TestEngine::new(ProviderSet {
        contact_directory: Some(directory.clone() as Arc<dyn ContactDirectory>),
        ..Default::default()
    })
    .await;

    let job = env
        .engine
        .create_bulk_enrichment_job(BulkJobConfig {
            targets: targets(&company_names(1)),
            reveal: true,
            deep_research: false,
            research_top_n: None,
        })
        .await
        .unwrap();
    env.engine.wait_for_jobs().await;

    let finished = env.engine.get_job_status(job.id).await.unwrap().unwrap();
    assert_eq!(finished.reveal_status, PassStatus::Done);
    assert_eq!(directory.reveal_count(), 2);

    let results = env.engine.list_job_results(job.id).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].phone.is_some());
}

#[tokio::test]
async fn test_missing_pass_provider_fails_pass_then_reprocess_recovers() {
    let names = company_names(2);
    let env = TestEngine::new(ProviderSet {
        contact_directory: Some(MockDirectory::new(&[]) as Arc<dyn ContactDirectory>),
        ..Default::default()
    })
    .await;

    let job = env
        .engine
        .create_bulk_enrichment_job(BulkJobConfig {
            targets: targets(&names),
            reveal: false,
            deep_research: true,
            research_top_n: None,
        })
        .await
        .unwrap();
    env.engine.wait_for_jobs().await;

    let finished = env.engine.get_job_status(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.deep_research_status, PassStatus::Failed);

    let requeued = env.engine.reprocess_job(job.id).await.unwrap();
    assert_eq!(requeued.deep_research_status, PassStatus::Pending);
    env.engine.wait_for_jobs().await;

    // Still no research provider, so the pass fails again without touching targets
    let again = env.engine.get_job_status(job.id).await.unwrap().unwrap();
    assert_eq!(again.deep_research_status, PassStatus::Failed);
    assert_eq!(again.processed_targets, 2);
}

#[tokio::test]
async fn test_empty_job_rejected() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let result = env
        .engine
        .create_bulk_enrichment_job(BulkJobConfig {
            targets: targets(&["   ".to_string()]),
            reveal: true,
            deep_research: false,
            research_top_n: None,
        })
        .await;
    assert!(matches!(result, Err(ore_common::Error::InvalidInput(_))));
}

#[tokio::test]
async fn test_job_without_sources_counts_every_target_as_error() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let job = env
        .engine
        .create_bulk_enrichment_job(BulkJobConfig {
            targets: targets(&company_names(4)),
            reveal: false,
            deep_research: false,
            research_top_n: None,
        })
        .await
        .unwrap();
    env.engine.wait_for_jobs().await;

    let finished = env.engine.get_job_status(job.id).await.unwrap().unwrap();
    assert_eq!(finished.status, JobStatus::Succeeded);
    assert_eq!(finished.error_count, 4);
    assert_eq!(finished.processed_targets, 4);
}

#[tokio::test]
async fn test_results_of_unknown_job_not_found() {
    let env = TestEngine::new(ProviderSet::default()).await;
    let result = env.engine.list_job_results(uuid::Uuid::new_v4()).await;
    assert!(matches!(result, Err(ore_common::Error::NotFound(_))));
}
