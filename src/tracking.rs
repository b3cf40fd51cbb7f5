//! Student tracking: identity context, event payloads, and fire-and-forget
//! delivery to the external `/api/student/track` endpoint.
//!
//! Delivery never blocks the caller and its failure never reaches the user:
//! errors are logged at `warn` and the event is dropped. No retries.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::TrackingError;

pub const TRACK_PATH: &str = "/api/student/track";

/// Wire form of `action`: `page_view`, `login`, or the interaction's own name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrackingAction {
  PageView,
  Login,
  Interaction(String),
}

impl TrackingAction {
  /// Names an interaction may not use; they would read back as another action.
  pub fn is_reserved(name: &str) -> bool {
    matches!(name, "page_view" | "login")
  }
}

impl From<String> for TrackingAction {
  fn from(s: String) -> Self {
    match s.as_str() {
      "page_view" => TrackingAction::PageView,
      "login" => TrackingAction::Login,
      _ => TrackingAction::Interaction(s),
    }
  }
}

impl From<TrackingAction> for String {
  fn from(a: TrackingAction) -> Self {
    match a {
      TrackingAction::PageView => "page_view".into(),
      TrackingAction::Login => "login".into(),
      TrackingAction::Interaction(name) => name,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
  pub net_id: String,
  pub page_path: String,
  #[serde(default)]
  pub page_title: String,
  pub action: TrackingAction,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub element: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

/// Who is browsing. Built from the values the browser keeps under
/// `jakesworld_netid`, `jakesworld_session` and `jakesworld_name`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentContext {
  #[serde(default)]
  pub net_id: Option<String>,
  #[serde(default)]
  pub session_id: Option<String>,
  #[serde(default)]
  pub name: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
  v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl StudentContext {
  pub fn from_stored(net_id: Option<String>, session_id: Option<String>, name: Option<String>) -> Self {
    Self { net_id: non_blank(net_id), session_id: non_blank(session_id), name: non_blank(name) }
  }

  /// Fresh login: normalizes the NetID and opens a new tracking session.
  /// A blank NetID yields `None`.
  pub fn identify(net_id: &str, name: Option<&str>) -> Option<Self> {
    let net_id = net_id.trim().to_lowercase();
    if net_id.is_empty() {
      return None;
    }
    Some(Self {
      net_id: Some(net_id),
      session_id: Some(new_session_id()),
      name: non_blank(name.map(str::to_string)),
    })
  }

  pub fn is_identified(&self) -> bool {
    self.net_id.as_deref().is_some_and(|s| !s.trim().is_empty())
  }

  fn event(&self, path: &str, title: &str, action: TrackingAction) -> Option<TrackingEvent> {
    let net_id = self.net_id.clone().filter(|s| !s.trim().is_empty())?;
    Some(TrackingEvent {
      net_id,
      page_path: path.to_string(),
      page_title: title.to_string(),
      action,
      element: None,
      value: None,
      session_id: self.session_id.clone(),
      name: None,
    })
  }

  pub fn page_view(&self, path: &str, title: &str) -> Option<TrackingEvent> {
    self.event(path, title, TrackingAction::PageView)
  }

  pub fn login(&self, path: &str, title: &str) -> Option<TrackingEvent> {
    let mut ev = self.event(path, title, TrackingAction::Login)?;
    ev.name = self.name.clone();
    Some(ev)
  }

  pub fn interaction(
    &self,
    path: &str,
    title: &str,
    action: &str,
    element: Option<String>,
    value: Option<String>,
  ) -> Option<TrackingEvent> {
    if TrackingAction::is_reserved(action) {
      return None;
    }
    let mut ev = self.event(path, title, TrackingAction::Interaction(action.to_string()))?;
    ev.element = element;
    ev.value = value;
    Some(ev)
  }
}

/// `session_<unix millis>_<9 base-36 chars>`.
pub fn new_session_id() -> String {
  let millis = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis())
    .unwrap_or_default();
  let mut rng = rand::thread_rng();
  let suffix: String = (0..9)
    .filter_map(|_| std::char::from_digit(rng.gen_range(0..36), 36))
    .collect();
  format!("session_{millis}_{suffix}")
}

/// Destination for tracking events. `emit` must return immediately.
pub trait TrackingSink: Send + Sync {
  fn emit(&self, event: TrackingEvent);

  /// Short name for logs.
  fn kind(&self) -> &'static str {
    "custom"
  }
}

/// Used when no tracking endpoint is configured.
pub struct NoopSink;

impl TrackingSink for NoopSink {
  fn emit(&self, event: TrackingEvent) {
    debug!(target: "tracking", action = %String::from(event.action), path = %event.page_path, "tracking disabled; event dropped");
  }

  fn kind(&self) -> &'static str {
    "noop"
  }
}

#[derive(Clone)]
pub struct HttpTrackingSink {
  client: reqwest::Client,
  endpoint: String,
}

impl HttpTrackingSink {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TrackingError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let endpoint = format!("{}{}", base_url.trim_end_matches('/'), TRACK_PATH);
    Ok(Self { client, endpoint })
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  /// One POST; the response body is not inspected.
  #[instrument(level = "debug", skip(self, event), fields(path = %event.page_path))]
  pub async fn deliver(&self, event: &TrackingEvent) -> Result<(), TrackingError> {
    let resp = self.client.post(&self.endpoint).json(event).send().await?;
    if !resp.status().is_success() {
      return Err(TrackingError::Status(resp.status()));
    }
    Ok(())
  }
}

impl TrackingSink for HttpTrackingSink {
  fn emit(&self, event: TrackingEvent) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      warn!(target: "tracking", "no async runtime; tracking event dropped");
      return;
    };
    let sink = self.clone();
    runtime.spawn(async move {
      match sink.deliver(&event).await {
        Ok(()) => debug!(target: "tracking", net_id = %event.net_id, path = %event.page_path, "tracking event delivered"),
        Err(e) => warn!(target: "tracking", error = %e, path = %event.page_path, "tracking event failed"),
      }
    });
  }

  fn kind(&self) -> &'static str {
    "http"
  }
}

/// Emits one `page_view` per route change while a student is identified.
pub struct PageTracker {
  context: StudentContext,
  current: Option<(String, String)>,
  sink: Arc<dyn TrackingSink>,
}

impl PageTracker {
  pub fn new(context: StudentContext, sink: Arc<dyn TrackingSink>) -> Self {
    Self { context, current: None, sink }
  }

  pub fn context(&self) -> &StudentContext {
    &self.context
  }

  /// Replace the identity (login/logout). A login emits `login` followed by
  /// a `page_view` for the current route.
  pub fn set_context(&mut self, context: StudentContext, is_login: bool) {
    self.context = context;
    let Some((path, title)) = self.current.clone() else {
      return;
    };
    if is_login {
      if let Some(ev) = self.context.login(&path, &title) {
        info!(target: "tracking", net_id = ?self.context.net_id, "student logged in");
        self.sink.emit(ev);
      }
      if let Some(ev) = self.context.page_view(&path, &title) {
        self.sink.emit(ev);
      }
    }
  }

  /// Returns whether an event was emitted.
  pub fn navigate(&mut self, path: &str, title: &str) -> bool {
    if self.current.as_ref().is_some_and(|(p, _)| p == path) {
      return false;
    }
    self.current = Some((path.to_string(), title.to_string()));
    match self.context.page_view(path, title) {
      Some(ev) => {
        self.sink.emit(ev);
        true
      }
      None => false,
    }
  }

  pub fn interaction(&self, action: &str, element: Option<String>, value: Option<String>) -> bool {
    let (path, title) = self.current.clone().unwrap_or_default();
    match self.context.interaction(&path, &title, action, element, value) {
      Some(ev) => {
        self.sink.emit(ev);
        true
      }
      None => false,
    }
  }
}
