//! Ownership chain resolver
//!
//! Walks nested entities down to the people behind them. The walk is an
//! explicit FIFO work queue over an arena of nodes; each node moves through
//! `Pending -> Resolving -> {Terminal | Expanded | Unresolved(reason)}`.
//!
//! Termination is guaranteed by three independent bounds:
//! - an entity already on the current ancestor path becomes `Cycle`
//! - an entity already expanded on another branch becomes `AlreadyVisited`
//! - an entity at `max_depth` becomes `DepthLimit` without a lookup
//!
//! A jurisdiction-scoped lookup that names no person (only registered agents or
//! non-person officers) gets exactly one unscoped retry. Children found by that
//! retry take the jurisdiction of the record it matched.

pub mod source;

pub use source::{OfficerLookup, OfficerSource, PositionLookup};

use crate::cache::{CacheCategory, CacheKey, TtlCache};
use crate::classifier::{
    classify, display_name, has_only_privacy_protected_officers, is_privacy_protected_officer,
    is_valid_officer_name, normalize_name, person_key, NameKind,
};
use crate::llc::Principal;
use crate::providers::{Confidence, ProviderResult};
use chrono::{DateTime, Utc};
use ore_common::events::{EventBus, OreEvent};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default walk depth (root is depth 0)
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Beneficial owners whose other offices are searched, best first
const MAX_POSITION_SEARCHES: usize = 5;

/// Why a node was not expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    Cycle,
    AlreadyVisited,
    DepthLimit,
    NoData,
    ProviderFailure,
    PrivacyProtected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Resolving,
    /// A person; the end of a branch
    Terminal,
    /// An entity whose officers were looked up
    Expanded,
    Unresolved(UnresolvedReason),
}

impl NodeState {
    pub fn is_final(&self) -> bool {
        !matches!(self, NodeState::Pending | NodeState::Resolving)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainNode {
    /// Index into `ChainResult::chain`
    pub id: usize,
    pub name: String,
    pub kind: NameKind,
    pub depth: usize,
    pub parent: Option<usize>,
    pub jurisdiction: Option<String>,
    /// Officer position on the parent ("manager", "branch parent", ...)
    pub role: Option<String>,
    pub confidence: Option<Confidence>,
    pub source: Option<String>,
    pub state: NodeState,
    pub error: Option<String>,
}

/// A person at the end of one or more branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficialOwner {
    pub name: String,
    pub confidence: Confidence,
    /// Entities that list this person
    pub via: Vec<String>,
    pub roles: Vec<String>,
    pub sources: Vec<String>,
    /// Off-chain companies listing this person as an officer
    #[serde(default)]
    pub other_companies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub root_name: String,
    pub jurisdiction: Option<String>,
    pub chain: Vec<ChainNode>,
    pub ultimate_beneficial_owners: Vec<BeneficialOwner>,
    /// Deepest depth any node reached
    pub max_depth_reached: usize,
    pub total_api_calls: u32,
    pub resolved_at: DateTime<Utc>,
    #[serde(default)]
    pub from_cache: bool,
}

impl ChainResult {
    pub fn root(&self) -> Option<&ChainNode> {
        self.chain.first()
    }

    pub fn nodes_in_state(&self, state: NodeState) -> impl Iterator<Item = &ChainNode> {
        self.chain.iter().filter(move |n| n.state == state)
    }

    /// Entity nodes that were expanded, root included
    pub fn expanded_entities(&self) -> Vec<&ChainNode> {
        self.nodes_in_state(NodeState::Expanded).collect()
    }
}

fn entity_key(name: &str) -> String {
    normalize_name(name).replace(',', "")
}

/// Every principal is a privacy agent or fails the person test
fn names_no_people(principals: &[Principal]) -> bool {
    let names: Vec<&str> = principals.iter().map(|p| p.name.as_str()).collect();
    has_only_privacy_protected_officers(&names)
}

fn names_a_person(principals: &[Principal]) -> bool {
    !principals.is_empty() && !names_no_people(principals)
}

fn has_non_agent(principals: &[Principal]) -> bool {
    principals.iter().any(|p| !is_privacy_protected_officer(&p.name))
}

/// Outcome of resolving one node's officers
enum NodeLookup {
    /// Officers plus the jurisdiction their entity children inherit
    Found {
        lookup: OfficerLookup,
        scope: Option<String>,
    },
    PrivacyProtected,
}

/// Mutable state of one walk
struct Walk {
    nodes: Vec<ChainNode>,
    queue: VecDeque<usize>,
    visited: HashSet<String>,
    ubos: Vec<BeneficialOwner>,
    ubo_index: HashMap<String, usize>,
    api_calls: u32,
    max_depth: usize,
}

impl Walk {
    fn new(max_depth: usize) -> Self {
        Self {
            nodes: Vec::new(),
            queue: VecDeque::new(),
            visited: HashSet::new(),
            ubos: Vec::new(),
            ubo_index: HashMap::new(),
            api_calls: 0,
            max_depth,
        }
    }

    fn push(&mut self, mut node: ChainNode) -> usize {
        let id = self.nodes.len();
        node.id = id;
        self.nodes.push(node);
        id
    }

    fn set_state(&mut self, id: usize, state: NodeState) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.state = state;
        }
    }

    fn is_ancestor(&self, of: usize, key: &str) -> bool {
        let mut cursor = Some(of);
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            if entity_key(&node.name) == key {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    /// Add an entity child under `parent`, queueing it when it can be expanded
    fn add_entity(
        &mut self,
        parent: usize,
        name: &str,
        jurisdiction: Option<String>,
        role: Option<String>,
        confidence: Option<Confidence>,
        source: Option<String>,
    ) {
        let depth = self.nodes[parent].depth + 1;
        let key = entity_key(name);

        let state = if self.is_ancestor(parent, &key) {
            NodeState::Unresolved(UnresolvedReason::Cycle)
        } else if self.visited.contains(&key) {
            NodeState::Unresolved(UnresolvedReason::AlreadyVisited)
        } else if depth >= self.max_depth {
            NodeState::Unresolved(UnresolvedReason::DepthLimit)
        } else {
            NodeState::Pending
        };

        let id = self.push(ChainNode {
            id: 0,
            name: name.to_string(),
            kind: NameKind::Entity,
            depth,
            parent: Some(parent),
            jurisdiction,
            role,
            confidence,
            source,
            state,
            error: None,
        });

        if state == NodeState::Pending {
            self.visited.insert(key);
            self.queue.push_back(id);
        } else {
            debug!(entity = name, depth, state = ?state, "Entity not expanded");
        }
    }

    fn add_person(&mut self, parent: usize, principal: &Principal) {
        let depth = self.nodes[parent].depth + 1;
        let via = self.nodes[parent].name.clone();
        self.push(ChainNode {
            id: 0,
            name: principal.name.clone(),
            kind: NameKind::Person,
            depth,
            parent: Some(parent),
            jurisdiction: None,
            role: principal.role.clone(),
            confidence: Some(principal.confidence),
            source: Some(principal.source.clone()),
            state: NodeState::Terminal,
            error: None,
        });

        let key = person_key(&principal.name);
        match self.ubo_index.get(&key) {
            Some(&index) => {
                let ubo = &mut self.ubos[index];
                ubo.confidence = ubo.confidence.max(principal.confidence);
                push_unique(&mut ubo.via, via);
                if let Some(role) = &principal.role {
                    push_unique(&mut ubo.roles, role.clone());
                }
                push_unique(&mut ubo.sources, principal.source.clone());
            }
            None => {
                self.ubo_index.insert(key, self.ubos.len());
                self.ubos.push(BeneficialOwner {
                    name: display_name(&principal.name),
                    confidence: principal.confidence,
                    via: vec![via],
                    roles: principal.role.iter().cloned().collect(),
                    sources: vec![principal.source.clone()],
                    other_companies: Vec::new(),
                });
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
        list.push(value);
    }
}

pub struct ChainResolver {
    source: Arc<dyn OfficerSource>,
    cache: Arc<TtlCache>,
    event_bus: EventBus,
    max_depth: usize,
}

impl ChainResolver {
    pub fn new(
        source: Arc<dyn OfficerSource>,
        cache: Arc<TtlCache>,
        event_bus: EventBus,
        max_depth: usize,
    ) -> Self {
        Self {
            source,
            cache,
            event_bus,
            max_depth: max_depth.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve the chain behind `name`
    ///
    /// `force_refresh` bypasses the chain cache only; per-entity lookups still
    /// use the `llc` cache.
    pub async fn resolve(
        &self,
        name: &str,
        jurisdiction: Option<&str>,
        force_refresh: bool,
    ) -> ChainResult {
        let key = CacheKey::new(name, jurisdiction);

        if !force_refresh {
            if let Some(cached) = self
                .cache
                .get::<ChainResult>(CacheCategory::OwnershipChain, &key)
                .await
            {
                let mut result = cached.value;
                result.from_cache = true;
                self.emit(&result);
                return result;
            }
        }

        let result = self.walk(name.trim(), jurisdiction).await;

        let root_failed = result
            .root()
            .map_or(true, |r| r.state == NodeState::Unresolved(UnresolvedReason::ProviderFailure));
        if root_failed {
            warn!(root = name, "Chain root lookup failed, result not cached");
        } else {
            self.cache.put(CacheCategory::OwnershipChain, &key, &result).await;
        }

        info!(
            root = name,
            jurisdiction = ?jurisdiction,
            nodes = result.chain.len(),
            ubos = result.ultimate_beneficial_owners.len(),
            max_depth_reached = result.max_depth_reached,
            api_calls = result.total_api_calls,
            "Ownership chain resolved"
        );
        self.emit(&result);
        result
    }

    fn emit(&self, result: &ChainResult) {
        self.event_bus.emit_lossy(OreEvent::ChainResolved {
            root_name: result.root_name.clone(),
            jurisdiction: result.jurisdiction.clone(),
            ubo_count: result.ultimate_beneficial_owners.len(),
            total_api_calls: result.total_api_calls,
            from_cache: result.from_cache,
            timestamp: self.cache.clock().now(),
        });
    }

    async fn walk(&self, root_name: &str, jurisdiction: Option<&str>) -> ChainResult {
        let mut walk = Walk::new(self.max_depth);
        let root = walk.push(ChainNode {
            id: 0,
            name: root_name.to_string(),
            kind: classify(root_name),
            depth: 0,
            parent: None,
            jurisdiction: jurisdiction.map(str::to_string),
            role: None,
            confidence: None,
            source: None,
            state: NodeState::Pending,
            error: None,
        });
        walk.visited.insert(entity_key(root_name));
        walk.queue.push_back(root);

        while let Some(id) = walk.queue.pop_front() {
            walk.set_state(id, NodeState::Resolving);
            let name = walk.nodes[id].name.clone();
            let scope = walk.nodes[id].jurisdiction.clone();

            let lookup = match self.lookup(&mut walk, &name, scope.as_deref()).await {
                Ok(lookup) => lookup,
                Err(e) => {
                    warn!(entity = %name, error = %e, "Officer lookup failed");
                    walk.set_state(id, NodeState::Unresolved(UnresolvedReason::ProviderFailure));
                    walk.nodes[id].error = Some(e.to_string());
                    continue;
                }
            };

            let (found, scope) = match lookup {
                NodeLookup::PrivacyProtected => {
                    walk.set_state(id, NodeState::Unresolved(UnresolvedReason::PrivacyProtected));
                    continue;
                }
                NodeLookup::Found { lookup, scope } => (lookup, scope),
            };

            let mut expanded_any = false;
            for principal in &found.principals {
                if !is_valid_officer_name(&principal.name) {
                    continue;
                }
                if is_privacy_protected_officer(&principal.name) {
                    debug!(entity = %name, agent = %principal.name, "Skipping registered agent");
                    continue;
                }
                expanded_any = true;
                match classify(&principal.name) {
                    NameKind::Person => walk.add_person(id, principal),
                    NameKind::Entity => walk.add_entity(
                        id,
                        &principal.name,
                        scope.clone(),
                        principal.role.clone(),
                        Some(principal.confidence),
                        Some(principal.source.clone()),
                    ),
                }
            }

            if let Some(branch) = &found.branch_parent {
                if !branch.name.trim().is_empty() {
                    expanded_any = true;
                    walk.add_entity(
                        id,
                        &branch.name,
                        branch.jurisdiction.clone().or_else(|| scope.clone()),
                        Some("branch parent".to_string()),
                        None,
                        None,
                    );
                }
            }

            let state = if expanded_any {
                NodeState::Expanded
            } else {
                NodeState::Unresolved(UnresolvedReason::NoData)
            };
            walk.set_state(id, state);
        }

        walk.ubos
            .sort_by(|a, b| b.confidence.cmp(&a.confidence).then_with(|| a.name.cmp(&b.name)));
        self.attach_positions(&mut walk, jurisdiction).await;
        let ubos = walk.ubos;

        ChainResult {
            root_name: root_name.to_string(),
            jurisdiction: jurisdiction.map(str::to_string),
            max_depth_reached: walk.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            chain: walk.nodes,
            ultimate_beneficial_owners: ubos,
            total_api_calls: walk.api_calls,
            resolved_at: self.cache.clock().now(),
            from_cache: false,
        }
    }

    /// Record the off-chain companies each top beneficial owner is an officer of
    async fn attach_positions(&self, walk: &mut Walk, jurisdiction: Option<&str>) {
        let on_chain: HashSet<String> = walk
            .nodes
            .iter()
            .filter(|n| n.kind == NameKind::Entity)
            .map(|n| entity_key(&n.name))
            .collect();

        for index in 0..walk.ubos.len().min(MAX_POSITION_SEARCHES) {
            let person = walk.ubos[index].name.clone();
            let found = match self.source.positions(&person, jurisdiction).await {
                Ok(found) => found,
                Err(e) => {
                    debug!(person = %person, error = %e, "Officer search failed");
                    continue;
                }
            };
            walk.api_calls += found.api_calls;

            let wanted = person_key(&person);
            let ubo = &mut walk.ubos[index];
            for position in found.positions {
                if person_key(&position.name) != wanted
                    || on_chain.contains(&entity_key(&position.company_name))
                {
                    continue;
                }
                push_unique(&mut ubo.other_companies, position.company_name);
            }
        }
    }

    /// Scoped lookup with a single unscoped retry when no person comes back
    ///
    /// Without a person on either side, whichever answer still lists a
    /// non-agent officer is expanded (scoped first); agents alone mean
    /// `PrivacyProtected`.
    async fn lookup(
        &self,
        walk: &mut Walk,
        name: &str,
        jurisdiction: Option<&str>,
    ) -> ProviderResult<NodeLookup> {
        let scoped = self.source.lookup(name, jurisdiction).await?;
        walk.api_calls += scoped.api_calls;
        let inherited = jurisdiction.map(str::to_string);

        if !names_no_people(&scoped.principals) {
            return Ok(NodeLookup::Found {
                lookup: scoped,
                scope: inherited,
            });
        }

        let unscoped = match jurisdiction {
            Some(_) => {
                debug!(entity = name, jurisdiction = ?jurisdiction, "No person among officers, retrying unscoped");
                match self.source.lookup(name, None).await {
                    Ok(unscoped) => {
                        walk.api_calls += unscoped.api_calls;
                        Some(unscoped)
                    }
                    Err(e) => {
                        debug!(entity = name, error = %e, "Unscoped retry failed");
                        None
                    }
                }
            }
            None => None,
        };

        let unscoped = match unscoped {
            Some(found) if names_a_person(&found.principals) => {
                let scope = found.jurisdiction.clone();
                return Ok(NodeLookup::Found { lookup: found, scope });
            }
            other => other,
        };
        if has_non_agent(&scoped.principals) {
            return Ok(NodeLookup::Found {
                lookup: scoped,
                scope: inherited,
            });
        }
        match unscoped {
            Some(unscoped) if has_non_agent(&unscoped.principals) => {
                let scope = unscoped.jurisdiction.clone();
                Ok(NodeLookup::Found {
                    lookup: unscoped,
                    scope,
                })
            }
            _ => Ok(NodeLookup::PrivacyProtected),
        }
    }
}
