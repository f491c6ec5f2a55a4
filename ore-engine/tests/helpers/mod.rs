//! Shared fixtures for ore-engine integration tests
//!
//! Mock providers count their calls so tests can assert which sources ran.

#![allow(dead_code)]

use async_trait::async_trait;
use ore_common::events::EventBus;
use ore_engine::classifier::NameKind;
use ore_engine::config::EngineConfig;
use ore_engine::providers::{
    AiResearch, ContactCandidate, ContactDirectory, DirectoryContact, EntityResearch,
    OutreachContext, OwnerCandidate, PeopleSearch, PersonRecord, ProviderError, ProviderResult,
    ProviderSet, RevealedContact,
};
use ore_engine::{AppState, Engine};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Fresh database in a temp dir (keep the TempDir alive for the test)
pub async fn temp_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = ore_engine::db::init_database_pool(&dir.path().join("ore.db"))
        .await
        .expect("Failed to init database");
    (dir, pool)
}

/// Config with fast retries and a short flush interval
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.initial_backoff = Duration::from_millis(1);
    config.retry.max_backoff = Duration::from_millis(5);
    config.bulk.flush_interval = Duration::from_millis(20);
    config
}

pub struct TestEngine {
    pub _dir: TempDir,
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub engine: Arc<Engine>,
}

impl TestEngine {
    pub async fn new(providers: ProviderSet) -> Self {
        let (dir, db) = temp_db().await;
        let event_bus = EventBus::new(256);
        let engine = Arc::new(Engine::new(db.clone(), providers, &test_config(), event_bus.clone()));
        Self {
            _dir: dir,
            db,
            event_bus,
            engine,
        }
    }

    pub fn router(&self) -> axum::Router {
        ore_engine::build_router(AppState::new(
            self.db.clone(),
            self.event_bus.clone(),
            self.engine.clone(),
        ))
    }
}

/// AI research returning a fixed owner list (or an auth failure)
pub struct MockResearch {
    owners: Vec<OwnerCandidate>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl MockResearch {
    pub fn with_owners(owners: &[(&str, u8)]) -> Arc<Self> {
        Arc::new(Self {
            owners: owners
                .iter()
                .map(|(name, confidence)| OwnerCandidate {
                    name: name.to_string(),
                    kind: NameKind::Person,
                    role: Some("Managing Member".to_string()),
                    confidence: *confidence,
                    source: "mock_research".to_string(),
                    rationale: None,
                })
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            owners: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiResearch for MockResearch {
    fn name(&self) -> &str {
        "mock_research"
    }

    async fn research_entity_ownership(
        &self,
        _name: &str,
        _jurisdiction: Option<&str>,
    ) -> ProviderResult<EntityResearch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Auth("bad key".to_string()));
        }
        Ok(EntityResearch {
            owners: self.owners.clone(),
            summary: None,
        })
    }

    async fn outreach_rationale(&self, context: &OutreachContext) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} runs {}", context.person_name, context.company))
    }
}

/// People search echoing the queried name with fixed contacts
pub struct MockPeopleSearch {
    name: String,
    contacts: Vec<ContactCandidate>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl MockPeopleSearch {
    pub fn new(name: &str, contacts: Vec<ContactCandidate>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            contacts,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Every search rejected with an auth error
    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            contacts: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeopleSearch for MockPeopleSearch {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search_people(&self, name: &str, _location: Option<&str>) -> ProviderResult<Vec<PersonRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Auth("key revoked".to_string()));
        }
        Ok(vec![PersonRecord {
            name: name.to_string(),
            age: Some(52),
            current_address: Some("12 Oak St, Austin, TX 78701".to_string()),
            contacts: self.contacts.clone(),
            confidence: 90,
            source: self.name.clone(),
            ..Default::default()
        }])
    }
}

/// Directory with one decision-maker per company; listed companies fail
pub struct MockDirectory {
    failing: HashSet<String>,
    /// Reveals still to answer with a rate limit
    throttled_reveals: AtomicUsize,
    pub calls: AtomicUsize,
    pub reveal_calls: AtomicUsize,
}

impl MockDirectory {
    pub fn new(failing: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            throttled_reveals: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            reveal_calls: AtomicUsize::new(0),
        })
    }

    /// First `times` reveals are rate limited
    pub fn throttling_reveals(times: usize) -> Arc<Self> {
        Arc::new(Self {
            failing: HashSet::new(),
            throttled_reveals: AtomicUsize::new(times),
            calls: AtomicUsize::new(0),
            reveal_calls: AtomicUsize::new(0),
        })
    }

    pub fn reveal_count(&self) -> usize {
        self.reveal_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactDirectory for MockDirectory {
    fn name(&self) -> &str {
        "mock_directory"
    }

    async fn search_investors(&self, company: &str) -> ProviderResult<Vec<DirectoryContact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(company) {
            return Err(ProviderError::Http {
                status: 500,
                body: "upstream exploded".to_string(),
            });
        }
        Ok(vec![DirectoryContact {
            name: "Jane Owner".to_string(),
            title: Some("Owner".to_string()),
            company: Some(company.to_string()),
            handle: Some(format!("handle:{}", company)),
            phone: None,
            email: Some(format!("jane@{}.com", company.to_lowercase().replace(' ', ""))),
            confidence: 80,
            source: "mock_directory".to_string(),
        }])
    }

    async fn search_people_by_company(&self, company: &str) -> ProviderResult<Vec<DirectoryContact>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(company) {
            return Err(ProviderError::Auth("rejected".to_string()));
        }
        Ok(Vec::new())
    }

    async fn reveal(&self, handle: &str) -> ProviderResult<RevealedContact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reveal_calls.fetch_add(1, Ordering::SeqCst);
        let throttled = self
            .throttled_reveals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(ProviderError::RateLimited { retry_after: None });
        }
        Ok(RevealedContact {
            phone: Some(format!("(512) 555-{:04}", handle.len())),
            email: None,
        })
    }
}
