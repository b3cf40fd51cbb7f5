//! Application state: challenge sets, matching boards, HTTP-owned runs and
//! the tracking sink.
//!
//! Built-in content is loaded first; TOML entries with the same slug replace
//! it. Entries that fail validation are logged and skipped.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_course_config_from_env, CourseConfig, ServerSettings};
use crate::domain::{AnswerPolicy, ChallengeSet};
use crate::error::ApiError;
use crate::matching::BoardSpec;
use crate::seeds::{seed_boards, seed_challenge_sets};
use crate::session::RunnerSession;
use crate::tracking::{HttpTrackingSink, NoopSink, PageTracker, StudentContext, TrackingSink};

/// How long an HTTP run may sit untouched before it is evicted.
pub const RUN_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// An HTTP-owned run and the last time a request reached it.
pub struct RunEntry {
    pub session: Arc<RunnerSession>,
    pub touched: Instant,
}

impl RunEntry {
    fn expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.touched) >= ttl
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sets: Arc<HashMap<String, Arc<ChallengeSet>>>,
    pub boards: Arc<HashMap<String, Arc<BoardSpec>>>,
    pub runs: Arc<RwLock<HashMap<Uuid, RunEntry>>>,
    pub run_ttl: Duration,
    pub default_delay: Duration,
    pub tracking: Arc<dyn TrackingSink>,
}

impl AppState {
    /// Build state from env: course config, built-in seeds, tracking sink.
    #[instrument(level = "info", skip_all)]
    pub fn new(settings: &ServerSettings) -> Self {
        let cfg = load_course_config_from_env().unwrap_or_default();
        let tracking = build_tracking_sink(settings, &cfg);
        let delay = cfg.runner.feedback_delay();
        let ttl = cfg.runner.run_idle_ttl();
        let (sets, boards) = collect_content(cfg);
        Self::from_parts(sets, boards, delay, tracking).with_run_ttl(ttl)
    }

    pub fn from_parts(
        sets: Vec<ChallengeSet>,
        boards: Vec<BoardSpec>,
        default_delay: Duration,
        tracking: Arc<dyn TrackingSink>,
    ) -> Self {
        let sets: HashMap<_, _> = sets.into_iter().map(|s| (s.slug.clone(), Arc::new(s))).collect();
        let boards: HashMap<_, _> = boards.into_iter().map(|b| (b.slug.clone(), Arc::new(b))).collect();
        for set in sets.values() {
            info!(target: "statcourse_backend", slug = %set.slug, chapter = set.chapter, items = set.len(), policy = ?set.answer_policy, "Challenge set available");
        }
        info!(target: "statcourse_backend", sets = sets.len(), boards = boards.len(), delay_ms = default_delay.as_millis() as u64, tracking = tracking.kind(), "Course content loaded");
        Self {
            sets: Arc::new(sets),
            boards: Arc::new(boards),
            runs: Arc::new(RwLock::new(HashMap::new())),
            run_ttl: RUN_IDLE_TTL,
            default_delay,
            tracking,
        }
    }

    pub fn with_run_ttl(mut self, ttl: Duration) -> Self {
        self.run_ttl = ttl;
        self
    }

    pub fn set(&self, slug: &str) -> Option<Arc<ChallengeSet>> {
        self.sets.get(slug).cloned()
    }

    pub fn board(&self, slug: &str) -> Option<Arc<BoardSpec>> {
        self.boards.get(slug).cloned()
    }

    /// Sets ordered by chapter, then slug.
    pub fn list_sets(&self) -> Vec<Arc<ChallengeSet>> {
        let mut out: Vec<_> = self.sets.values().cloned().collect();
        out.sort_by(|a, b| (a.chapter, &a.slug).cmp(&(b.chapter, &b.slug)));
        out
    }

    pub fn delay_for(&self, set: &ChallengeSet) -> Duration {
        set.feedback_delay.unwrap_or(self.default_delay)
    }

    /// New unsubscribed session for `slug` (WebSocket sessions subscribe
    /// themselves and are never registered here).
    pub fn new_session(&self, slug: &str) -> Result<RunnerSession, ApiError> {
        let set = self.set(slug).ok_or_else(|| ApiError::NotFound(format!("challenge set '{slug}'")))?;
        let delay = self.delay_for(&set);
        Ok(RunnerSession::new(set, delay))
    }

    /// Registers a new run after evicting every idle one.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_run(&self, slug: &str) -> Result<Arc<RunnerSession>, ApiError> {
        let session = Arc::new(self.new_session(slug)?);
        let now = Instant::now();
        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|_, entry| !entry.expired(now, self.run_ttl));
        if runs.len() < before {
            info!(target: "runner", evicted = before - runs.len(), "idle runs evicted");
        }
        runs.insert(session.id(), RunEntry { session: session.clone(), touched: now });
        info!(target: "runner", run_id = %session.id(), %slug, open_runs = runs.len(), "run created");
        Ok(session)
    }

    /// Looks a run up and refreshes its idle clock. An expired run is
    /// dropped and reported as missing.
    pub async fn get_run(&self, id: Uuid) -> Result<Arc<RunnerSession>, ApiError> {
        let now = Instant::now();
        let mut runs = self.runs.write().await;
        let entry = runs.get_mut(&id).ok_or_else(|| ApiError::NotFound(format!("run {id}")))?;
        if entry.expired(now, self.run_ttl) {
            runs.remove(&id);
            debug!(target: "runner", run_id = %id, "expired run dropped on access");
            return Err(ApiError::NotFound(format!("run {id}")));
        }
        entry.touched = now;
        Ok(entry.session.clone())
    }

    /// Dropping the last handle cancels any pending feedback timer.
    #[instrument(level = "debug", skip(self))]
    pub async fn remove_run(&self, id: Uuid) -> Result<(), ApiError> {
        match self.runs.write().await.remove(&id) {
            Some(_) => {
                info!(target: "runner", run_id = %id, "run removed");
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("run {id}"))),
        }
    }

    pub fn tracker(&self, context: StudentContext) -> PageTracker {
        PageTracker::new(context, self.tracking.clone())
    }
}

fn build_tracking_sink(settings: &ServerSettings, cfg: &CourseConfig) -> Arc<dyn TrackingSink> {
    if settings.tracking_disabled || cfg.tracking.disabled {
        info!(target: "tracking", "Tracking disabled by configuration.");
        return Arc::new(NoopSink);
    }
    let base = settings.track_base_url.clone().or_else(|| cfg.tracking.base_url.clone());
    let Some(base) = base else {
        info!(target: "tracking", "No tracking endpoint configured (TRACK_BASE_URL). Events are dropped.");
        return Arc::new(NoopSink);
    };
    match HttpTrackingSink::new(&base, Duration::from_millis(cfg.tracking.timeout_ms)) {
        Ok(sink) => {
            info!(target: "tracking", endpoint = %sink.endpoint(), "Tracking enabled.");
            Arc::new(sink)
        }
        Err(e) => {
            error!(target: "tracking", error = %e, "Failed to build tracking client; tracking disabled");
            Arc::new(NoopSink)
        }
    }
}

fn collect_content(cfg: CourseConfig) -> (Vec<ChallengeSet>, Vec<BoardSpec>) {
    let policy: AnswerPolicy = cfg.runner.answer_policy;
    let mut sets = HashMap::<String, ChallengeSet>::new();
    for res in seed_challenge_sets() {
        match res {
            Ok(set) => {
                sets.insert(set.slug.clone(), set);
            }
            Err(e) => error!(target: "statcourse_backend", error = %e, "Built-in challenge set invalid; skipped"),
        }
    }
    for entry in cfg.challenge_sets {
        let slug = entry.slug.clone();
        match entry.into_set(policy) {
            Ok(set) => {
                if sets.insert(slug.clone(), set).is_some() {
                    warn!(target: "statcourse_backend", %slug, "Config challenge set overrides built-in");
                }
            }
            Err(e) => error!(target: "statcourse_backend", %slug, error = %e, "Skipping invalid challenge set"),
        }
    }

    let mut boards = HashMap::<String, BoardSpec>::new();
    for res in seed_boards() {
        match res {
            Ok(b) => {
                boards.insert(b.slug.clone(), b);
            }
            Err(e) => error!(target: "statcourse_backend", error = %e, "Built-in board invalid; skipped"),
        }
    }
    for entry in cfg.boards {
        let slug = entry.slug.clone();
        match entry.into_spec() {
            Ok(b) => {
                boards.insert(slug, b);
            }
            Err(e) => error!(target: "statcourse_backend", %slug, error = %e, "Skipping invalid board"),
        }
    }
    (sets.into_values().collect(), boards.into_values().collect())
}
