//! Bulk enrichment jobs, targets and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("Unknown {}: {}", stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// Driver finished; individual targets may have errored
    Succeeded,
    /// Driver itself errored
    Failed,
}

string_enum!(JobStatus {
    Pending => "pending",
    Running => "running",
    Succeeded => "succeeded",
    Failed => "failed",
});

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Pending,
    Processing,
    Enriched,
    Error,
}

string_enum!(TargetStatus {
    Pending => "pending",
    Processing => "processing",
    Enriched => "enriched",
    Error => "error",
});

impl TargetStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, TargetStatus::Enriched | TargetStatus::Error)
    }
}

/// Deferred post-processing pass status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    NotRequired,
    Pending,
    Running,
    Done,
    Failed,
}

string_enum!(PassStatus {
    NotRequired => "not_required",
    Pending => "pending",
    Running => "running",
    Done => "done",
    Failed => "failed",
});

impl PassStatus {
    /// Whether `reprocess_job` should run this pass again
    pub fn needs_run(&self) -> bool {
        matches!(self, PassStatus::Pending | PassStatus::Running | PassStatus::Failed)
    }
}

/// Deferred post-processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostPass {
    /// Identity handle -> phone/email
    Reveal,
    /// AI outreach rationale for the top results
    DeepResearch,
}

string_enum!(PostPass {
    Reveal => "reveal",
    DeepResearch => "deep_research",
});

impl PostPass {
    pub const ALL: [PostPass; 2] = [PostPass::Reveal, PostPass::DeepResearch];

    /// Job column holding this pass's status
    pub fn status_column(&self) -> &'static str {
        match self {
            PostPass::Reveal => "reveal_status",
            PostPass::DeepResearch => "deep_research_status",
        }
    }
}

/// One company to enrich
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkTargetInput {
    pub company: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Request body for a new bulk job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkJobConfig {
    pub targets: Vec<BulkTargetInput>,
    /// Queue the reveal pass for results with a handle but no phone/email
    #[serde(default = "default_true")]
    pub reveal: bool,
    /// Queue the deep research pass for the top results
    #[serde(default)]
    pub deep_research: bool,
    /// Results sent to deep research (engine default when absent)
    #[serde(default)]
    pub research_top_n: Option<usize>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub total_targets: u64,
    pub processed_targets: u64,
    pub enriched_contacts: u64,
    pub error_count: u64,
    pub reveal_status: PassStatus,
    pub deep_research_status: PassStatus,
    pub config: BulkJobConfig,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BulkJob {
    pub fn pass_status(&self, pass: PostPass) -> PassStatus {
        match pass {
            PostPass::Reveal => self.reveal_status,
            PostPass::DeepResearch => self.deep_research_status,
        }
    }

    pub fn new(config: BulkJobConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            total_targets: config.targets.len() as u64,
            processed_targets: 0,
            enriched_contacts: 0,
            error_count: 0,
            reveal_status: if config.reveal {
                PassStatus::Pending
            } else {
                PassStatus::NotRequired
            },
            deep_research_status: if config.deep_research {
                PassStatus::Pending
            } else {
                PassStatus::NotRequired
            },
            config,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkTarget {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Order within the job
    pub position: i64,
    pub company: String,
    pub domain: Option<String>,
    pub location: Option<String>,
    pub status: TargetStatus,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BulkTarget {
    pub fn from_input(job_id: Uuid, position: i64, input: &BulkTargetInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            position,
            company: input.company.trim().to_string(),
            domain: input.domain.clone(),
            location: input.location.clone(),
            status: TargetStatus::Pending,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// One decision-maker found for a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkResult {
    pub id: Uuid,
    pub job_id: Uuid,
    pub target_id: Uuid,
    pub person_name: String,
    pub title: Option<String>,
    pub company: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub confidence: u8,
    pub intent_score: u8,
    pub providers: Vec<String>,
    /// Directory handle for a later reveal
    pub handle: Option<String>,
    pub outreach_rationale: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BulkResult {
    pub fn has_contact(&self) -> bool {
        self.phone.is_some() || self.email.is_some()
    }

    pub fn needs_reveal(&self) -> bool {
        self.handle.is_some() && (self.phone.is_none() || self.email.is_none())
    }
}
