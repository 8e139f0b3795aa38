//! Session state — everything one user has generated, plus their usage counters.
//!
//! A `SessionState` is owned by exactly one session and handed to the
//! orchestrator by `&mut`. `SessionStore` maps session ids to entries; each
//! entry has its own action lock, so at most one action runs per session while
//! separate sessions proceed independently. Sessions nobody touches for a
//! while are ended by `spawn_idle_sweeper`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::generation::parser::{
    pair_backstories, BackstoryView, Classification, ProjectSet,
};

/// Company name and job description as submitted for one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobContext {
    pub company_name: String,
    pub job_description: String,
}

/// Running token estimates. Only `reset_usage` ever lowers them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageCounters {
    pub tokens_consumed: u64,
    pub query_tokens: u64,
    pub response_tokens: u64,
}

impl UsageCounters {
    pub fn record_query(&mut self, tokens: u64) {
        self.query_tokens += tokens;
        self.tokens_consumed += tokens;
    }

    pub fn record_response(&mut self, tokens: u64) {
        self.response_tokens += tokens;
        self.tokens_consumed += tokens;
    }
}

/// Crude cost proxy: one token per four characters, rounded down.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

/// Where a session sits in the generation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Analyzed,
    ProjectsGenerated,
}

/// Which generated sections currently exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedFlags {
    pub projects: bool,
    pub backstories: bool,
    pub resources: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    job: Option<JobContext>,
    classification: Option<Classification>,
    projects: Option<ProjectSet>,
    backstories: Option<String>,
    resources: Option<String>,
    usage: UsageCounters,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self) -> Option<&JobContext> {
        self.job.as_ref()
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    pub fn projects(&self) -> Option<&ProjectSet> {
        self.projects.as_ref()
    }

    pub fn backstories(&self) -> Option<&str> {
        self.backstories.as_deref()
    }

    pub fn resources(&self) -> Option<&str> {
        self.resources.as_deref()
    }

    pub fn usage(&self) -> UsageCounters {
        self.usage
    }

    pub fn usage_mut(&mut self) -> &mut UsageCounters {
        &mut self.usage
    }

    pub fn stage(&self) -> Stage {
        match (&self.classification, &self.projects) {
            (_, Some(_)) => Stage::ProjectsGenerated,
            (Some(_), None) => Stage::Analyzed,
            (None, None) => Stage::Idle,
        }
    }

    pub fn flags(&self) -> GeneratedFlags {
        GeneratedFlags {
            projects: self.projects.is_some(),
            backstories: self.backstories.is_some(),
            resources: self.resources.is_some(),
        }
    }

    /// Backstories paired with project titles, or the raw text when they cannot be.
    pub fn backstory_view(&self) -> Option<BackstoryView> {
        let raw = self.backstories.as_deref()?;
        let projects = self.projects.as_ref()?;
        Some(pair_backstories(projects, raw))
    }

    /// Records a fresh analysis. Anything generated from a previous analysis
    /// no longer applies and is dropped.
    pub fn record_analysis(&mut self, job: JobContext, classification: Classification) {
        self.job = Some(job);
        self.classification = Some(classification);
        self.clear_generated();
    }

    /// Stores a new project set and drops backstories and resources built on
    /// the previous one.
    pub fn record_projects(&mut self, projects: ProjectSet) {
        self.projects = Some(projects);
        self.backstories = None;
        self.resources = None;
    }

    pub fn record_backstories(&mut self, raw: String) {
        self.backstories = Some(raw);
    }

    pub fn record_resources(&mut self, raw: String) {
        self.resources = Some(raw);
    }

    /// Zeroes the three usage counters and nothing else.
    pub fn reset_usage(&mut self) {
        self.usage = UsageCounters::default();
    }

    /// Returns the session to its initial content while keeping usage counters.
    pub fn start_over(&mut self) {
        *self = Self {
            usage: self.usage,
            ..Self::default()
        };
    }

    fn clear_generated(&mut self) {
        self.projects = None;
        self.backstories = None;
        self.resources = None;
    }
}

/// Timestamps of the last request that touched a session.
#[derive(Debug)]
struct Activity {
    updated_at: DateTime<Utc>,
    last_seen: Instant,
}

/// One registered session.
///
/// Actions serialize on `action` and run against a snapshot of `state`, which
/// is locked only to copy it out or commit a result. Reads never wait on a
/// model call in flight.
#[derive(Debug)]
pub struct SessionEntry {
    pub created_at: DateTime<Utc>,
    activity: Mutex<Activity>,
    action: Mutex<()>,
    pub state: Mutex<SessionState>,
}

impl SessionEntry {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            activity: Mutex::new(Activity {
                updated_at: now,
                last_seen: Instant::now(),
            }),
            action: Mutex::new(()),
            state: Mutex::new(SessionState::new()),
        }
    }

    pub async fn updated_at(&self) -> DateTime<Utc> {
        self.activity.lock().await.updated_at
    }

    async fn touch(&self) {
        let mut activity = self.activity.lock().await;
        activity.updated_at = Utc::now();
        activity.last_seen = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.activity.lock().await.last_seen.elapsed()
    }

    /// Held for the duration of one action; at most one per session.
    pub async fn begin_action(&self) -> MutexGuard<'_, ()> {
        self.action.lock().await
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    pub async fn commit(&self, state: SessionState) {
        *self.state.lock().await = state;
        self.touch().await;
    }

    fn is_busy(&self) -> bool {
        self.action.try_lock().is_err()
    }
}

/// Registry of live sessions keyed by id.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Arc<SessionEntry>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> (Uuid, Arc<SessionEntry>) {
        let id = Uuid::new_v4();
        let entry = Arc::new(SessionEntry::new());
        self.inner.write().await.insert(id, entry.clone());
        (id, entry)
    }

    /// Looks up a session and marks it as active.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionEntry>> {
        let entry = self.inner.read().await.get(&id).cloned()?;
        entry.touch().await;
        Some(entry)
    }

    /// Ends a session. Returns false if it did not exist.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Ends every session idle for at least `max_idle`, skipping sessions with
    /// an action in flight. Returns the ids that were removed.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<Uuid> {
        let mut sessions = self.inner.write().await;
        let mut expired = Vec::new();
        for (id, entry) in sessions.iter() {
            if !entry.is_busy() && entry.idle_for().await >= max_idle {
                expired.push(*id);
            }
        }
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }
}

/// Runs `evict_idle` every `every` until the task is aborted.
pub fn spawn_idle_sweeper(
    store: SessionStore,
    max_idle: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = store.evict_idle(max_idle).await;
            if !expired.is_empty() {
                info!("Ended {} idle sessions", expired.len());
            }
        }
    })
}
