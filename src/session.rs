//! Timed runner sessions: a `ChallengeRunner` plus the feedback timer that
//! auto-advances it.
//!
//! The timer is a tokio task that holds only a `Weak` handle to the session
//! and is aborted when its `FeedbackTimer` guard drops. Leaving `Feedback` by
//! any path (restart, session drop, WebSocket disconnect) therefore cancels
//! it; the generation check in `ChallengeRunner::advance_if` covers a timer
//! that already woke up and is waiting on the lock.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{ChallengeItem, ChallengeSet};
use crate::error::RunnerError;
use crate::runner::{ChallengeRunner, Phase, RunnerState, Submission, Summary};

/// Default feedback display time before auto-advance.
pub const DEFAULT_FEEDBACK_DELAY: Duration = Duration::from_millis(4000);

/// Everything a client needs to render a run, taken under one lock.
/// Holds the full item, answer included; map it before sending it out.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
  pub slug: String,
  pub state: RunnerState,
  pub challenge: Option<ChallengeItem>,
  pub feedback: Option<Submission>,
  pub summary: Option<Summary>,
}

impl SessionSnapshot {
  fn of(runner: &ChallengeRunner) -> Self {
    Self {
      slug: runner.set().slug.clone(),
      state: runner.state(),
      challenge: runner.current_item().cloned(),
      feedback: runner.last_submission().cloned(),
      summary: runner.summary().ok(),
    }
  }
}

/// Pushed to subscribers when the feedback timer moves the runner.
#[derive(Clone, Debug, PartialEq)]
pub enum RunnerEvent {
  Advanced { run_id: Uuid, snapshot: SessionSnapshot },
  Ended { run_id: Uuid, snapshot: SessionSnapshot },
}

struct FeedbackTimer {
  handle: Option<JoinHandle<()>>,
}

impl FeedbackTimer {
  /// Called from the timer task itself once it has fired.
  fn disarm(mut self) {
    self.handle.take();
  }
}

impl Drop for FeedbackTimer {
  fn drop(&mut self) {
    if let Some(handle) = self.handle.take() {
      handle.abort();
    }
  }
}

struct SessionInner {
  runner: ChallengeRunner,
  timer: Option<FeedbackTimer>,
  events: Option<mpsc::UnboundedSender<RunnerEvent>>,
}

pub struct RunnerSession {
  id: Uuid,
  delay: Duration,
  inner: Arc<Mutex<SessionInner>>,
}

fn lock(inner: &Mutex<SessionInner>) -> MutexGuard<'_, SessionInner> {
  inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RunnerSession {
  pub fn new(set: Arc<ChallengeSet>, delay: Duration) -> Self {
    Self {
      id: Uuid::new_v4(),
      delay,
      inner: Arc::new(Mutex::new(SessionInner {
        runner: ChallengeRunner::new(set),
        timer: None,
        events: None,
      })),
    }
  }

  /// Receive `RunnerEvent`s for timer-driven transitions.
  pub fn subscribe(self, events: mpsc::UnboundedSender<RunnerEvent>) -> Self {
    lock(&self.inner).events = Some(events);
    self
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn slug(&self) -> String {
    lock(&self.inner).runner.set().slug.clone()
  }

  #[allow(dead_code)]
  pub fn state(&self) -> RunnerState {
    lock(&self.inner).runner.state()
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot::of(&lock(&self.inner).runner)
  }

  #[allow(dead_code)]
  pub fn has_pending_timer(&self) -> bool {
    lock(&self.inner).timer.is_some()
  }

  pub fn start(&self) -> Result<RunnerState, RunnerError> {
    let mut inner = lock(&self.inner);
    inner.runner.start()?;
    Ok(inner.runner.state())
  }

  pub fn select(&self, choice: &str) -> Result<RunnerState, RunnerError> {
    let mut inner = lock(&self.inner);
    inner.runner.select(choice)?;
    Ok(inner.runner.state())
  }

  /// Grade the pending selection and arm the feedback timer. The snapshot
  /// is taken before the lock is released, so it always carries the grade.
  /// Must be called from within a tokio runtime.
  #[instrument(level = "debug", skip(self), fields(run_id = %self.id))]
  pub fn submit(&self) -> Result<(Option<Submission>, SessionSnapshot), RunnerError> {
    let mut inner = lock(&self.inner);
    let Some(submission) = inner.runner.submit()? else {
      return Ok((None, SessionSnapshot::of(&inner.runner)));
    };
    let generation = inner.runner.generation();
    inner.timer = Some(self.arm_timer(generation));
    info!(target: "runner", run_id = %self.id, challenge = submission.challenge_id, correct = submission.correct, "submission graded");
    Ok((Some(submission), SessionSnapshot::of(&inner.runner)))
  }

  /// Back to `Idle`; any pending feedback timer is cancelled.
  pub fn restart(&self) -> RunnerState {
    let mut inner = lock(&self.inner);
    inner.timer.take();
    inner.runner.restart();
    inner.runner.state()
  }

  fn arm_timer(&self, generation: u64) -> FeedbackTimer {
    let weak: Weak<Mutex<SessionInner>> = Arc::downgrade(&self.inner);
    let delay = self.delay;
    let run_id = self.id;
    let handle = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let Some(inner) = weak.upgrade() else {
        return;
      };
      let mut guard = lock(&inner);
      let Some(phase) = guard.runner.advance_if(generation) else {
        debug!(target: "runner", %run_id, generation, "stale feedback timer ignored");
        return;
      };
      if let Some(timer) = guard.timer.take() {
        timer.disarm();
      }
      let snapshot = SessionSnapshot::of(&guard.runner);
      let event = match phase {
        Phase::Ended => RunnerEvent::Ended { run_id, snapshot },
        _ => RunnerEvent::Advanced { run_id, snapshot },
      };
      if let Some(events) = &guard.events {
        let _ = events.send(event);
      }
    });
    FeedbackTimer { handle: Some(handle) }
  }
}
