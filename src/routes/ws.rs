//! WebSocket upgrade + message loop.
//!
//! Each connection owns its runner sessions, matching boards and page
//! tracker. Client messages get one JSON reply each; feedback timers push
//! `advanced`/`ended` messages on their own. Closing the socket drops the
//! connection state, which cancels every pending timer.

use std::collections::HashMap;
use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::catalog::{navigation_info, page_title};
use crate::logic::*;
use crate::matching::MatchingBoard;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::{RunnerEvent, RunnerSession};
use crate::state::AppState;
use crate::tracking::{PageTracker, StudentContext};

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "statcourse_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Per-connection state.
pub struct Connection {
  state: Arc<AppState>,
  runs: HashMap<Uuid, RunnerSession>,
  boards: HashMap<String, MatchingBoard>,
  tracker: PageTracker,
  events: mpsc::UnboundedSender<RunnerEvent>,
}

impl Connection {
  pub fn new(state: Arc<AppState>, events: mpsc::UnboundedSender<RunnerEvent>) -> Self {
    let tracker = state.tracker(StudentContext::default());
    Self { state, runs: HashMap::new(), boards: HashMap::new(), tracker, events }
  }

  fn run(&self, run_id: Uuid) -> Result<&RunnerSession, ServerWsMessage> {
    self
      .runs
      .get(&run_id)
      .ok_or_else(|| ServerWsMessage::Error { message: format!("run {run_id} not found") })
  }

  fn board(&mut self, slug: &str) -> Result<&mut MatchingBoard, ServerWsMessage> {
    if !self.boards.contains_key(slug) {
      let spec = self
        .state
        .board(slug)
        .ok_or_else(|| ServerWsMessage::Error { message: format!("board '{slug}' not found") })?;
      self.boards.insert(slug.to_string(), MatchingBoard::new(spec));
    }
    self
      .boards
      .get_mut(slug)
      .ok_or_else(|| ServerWsMessage::Error { message: format!("board '{slug}' not found") })
  }

  #[instrument(level = "debug", skip(self))]
  pub fn handle(&mut self, msg: ClientWsMessage) -> ServerWsMessage {
    self.dispatch(msg).unwrap_or_else(|err| err)
  }

  fn dispatch(&mut self, msg: ClientWsMessage) -> Result<ServerWsMessage, ServerWsMessage> {
    let reply = match msg {
      ClientWsMessage::Ping => ServerWsMessage::Pong,

      ClientWsMessage::Restore { net_id, session_id, name } => {
        let student = StudentContext::from_stored(net_id, session_id, name);
        self.tracker.set_context(student.clone(), false);
        ServerWsMessage::Student { student }
      }

      ClientWsMessage::Login { net_id, name } => {
        let student = StudentContext::identify(&net_id, name.as_deref())
          .ok_or_else(|| ServerWsMessage::Error { message: "netId must not be blank".into() })?;
        self.tracker.set_context(student.clone(), true);
        ServerWsMessage::Student { student }
      }

      ClientWsMessage::Logout => {
        self.tracker.set_context(StudentContext::default(), false);
        ServerWsMessage::Student { student: StudentContext::default() }
      }

      ClientWsMessage::Navigate { path, title } => {
        let title = title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| page_title(&path));
        let tracked = self.tracker.navigate(&path, &title);
        ServerWsMessage::Navigation { navigation: navigation_info(&path), tracked }
      }

      ClientWsMessage::Interaction { action, element, value } => {
        ServerWsMessage::Tracked { emitted: self.tracker.interaction(&action, element, value) }
      }

      ClientWsMessage::StartRun { slug } => {
        let session = self
          .state
          .new_session(&slug)
          .map_err(|e| ServerWsMessage::Error { message: e.to_string() })?
          .subscribe(self.events.clone());
        session.start().map_err(err)?;
        let run = session_out(&session);
        // One live run per set; dropping the old one cancels its timer.
        let before = self.runs.len();
        self.runs.retain(|_, open| open.slug() != slug);
        info!(target: "runner", run_id = %session.id(), %slug, replaced = before - self.runs.len(), "WS run started");
        self.runs.insert(session.id(), session);
        ServerWsMessage::Run { run }
      }

      ClientWsMessage::Select { run_id, choice } => {
        let session = self.run(run_id)?;
        session.select(&choice).map_err(err)?;
        ServerWsMessage::Run { run: session_out(session) }
      }

      ClientWsMessage::Submit { run_id } => {
        let (_, snapshot) = self.run(run_id)?.submit().map_err(err)?;
        ServerWsMessage::Run { run: run_out(run_id, snapshot) }
      }

      ClientWsMessage::Restart { run_id } => {
        let session = self.run(run_id)?;
        session.restart();
        ServerWsMessage::Run { run: session_out(session) }
      }

      ClientWsMessage::Abandon { run_id } => {
        self.runs.remove(&run_id).ok_or_else(|| ServerWsMessage::Error { message: format!("run {run_id} not found") })?;
        ServerWsMessage::Abandoned { run_id }
      }

      ClientWsMessage::OpenBoard { slug } => {
        let board = self.board(&slug)?;
        ServerWsMessage::Board { board: board_out(board) }
      }

      ClientWsMessage::BoardDrop { slug, label, target } => {
        let board = self.board(&slug)?;
        let outcome = board.drop_label(&label, &target).map_err(err)?;
        ServerWsMessage::BoardDrop { outcome, state: board.state() }
      }

      ClientWsMessage::BoardReset { slug } => {
        let board = self.board(&slug)?;
        board.reset();
        ServerWsMessage::Board { board: board_out(board) }
      }
    };
    Ok(reply)
  }
}

fn err(e: impl std::fmt::Display) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

fn encode(msg: &ServerWsMessage) -> String {
  serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "statcourse_backend", "WebSocket connected");
  let (tx, mut events) = mpsc::unbounded_channel();
  let mut conn = Connection::new(state, tx);

  loop {
    let reply = tokio::select! {
      incoming = socket.recv() => match incoming {
        Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(msg) => {
            debug!(target: "statcourse_backend", "WS received: {:?}", &msg);
            conn.handle(msg)
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        },
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => continue,
        Some(Err(e)) => {
          error!(target: "statcourse_backend", error = %e, "WS receive error");
          break;
        }
      },
      Some(event) = events.recv() => event_message(event),
    };

    if let Err(e) = socket.send(Message::Text(encode(&reply))).await {
      error!(target: "statcourse_backend", error = %e, "WS send error");
      break;
    }
  }

  let open_runs = conn.runs.len();
  drop(conn);
  info!(target: "statcourse_backend", open_runs, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runner::Phase;
  use crate::state::tests::test_state;
  use crate::tracking::TrackingAction;
  use std::time::Duration;

  fn conn(delay_ms: u64) -> (Connection, mpsc::UnboundedReceiver<RunnerEvent>, Arc<crate::tracking::tests::RecordingSink>) {
    let (state, sink) = test_state(Duration::from_millis(delay_ms));
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(Arc::new(state), tx), rx, sink)
  }

  fn parse(json: &str) -> ClientWsMessage {
    serde_json::from_str(json).unwrap()
  }

  fn started_run(c: &mut Connection) -> Uuid {
    match c.handle(parse(r#"{"type":"start_run","slug":"z-score-game"}"#)) {
      ServerWsMessage::Run { run } => {
        assert_eq!(run.state.phase, Phase::Presenting(0));
        run.run_id
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn timer_pushes_advanced_event() {
    let (mut c, mut rx, _) = conn(3000);
    let id = started_run(&mut c);
    c.handle(ClientWsMessage::Select { run_id: id, choice: "Z = +1.5".into() });
    match c.handle(ClientWsMessage::Submit { run_id: id }) {
      ServerWsMessage::Run { run } => {
        let fb = run.feedback.unwrap();
        assert!(!fb.correct);
        assert_eq!(fb.expected, "Z = +2.0");
      }
      other => panic!("unexpected {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(3001)).await;
    match event_message(rx.try_recv().unwrap()) {
      ServerWsMessage::Advanced { run } => {
        assert_eq!(run.state.phase, Phase::Presenting(1));
        assert_eq!(run.challenge.unwrap().id, 2);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn abandon_and_disconnect_cancel_timers() {
    let (mut c, mut rx, _) = conn(3000);
    let a = started_run(&mut c);
    c.handle(ClientWsMessage::Select { run_id: a, choice: "Z = +2.0".into() });
    c.handle(ClientWsMessage::Submit { run_id: a });
    assert!(matches!(c.handle(ClientWsMessage::Abandon { run_id: a }), ServerWsMessage::Abandoned { .. }));

    let b = started_run(&mut c);
    c.handle(ClientWsMessage::Select { run_id: b, choice: "Z = +2.0".into() });
    c.handle(ClientWsMessage::Submit { run_id: b });
    drop(c);

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn restarting_a_set_replaces_the_open_run() {
    let (mut c, mut rx, _) = conn(3000);
    let first = started_run(&mut c);
    c.handle(ClientWsMessage::Select { run_id: first, choice: "Z = +2.0".into() });
    c.handle(ClientWsMessage::Submit { run_id: first });

    let second = started_run(&mut c);
    assert_ne!(first, second);
    assert_eq!(c.runs.len(), 1);
    assert!(c.runs.contains_key(&second));
    assert!(matches!(c.handle(ClientWsMessage::Submit { run_id: first }), ServerWsMessage::Error { .. }));

    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn unknown_run_and_bad_choice_are_errors() {
    let (mut c, _rx, _) = conn(3000);
    let missing = c.handle(ClientWsMessage::Submit { run_id: Uuid::new_v4() });
    assert!(matches!(missing, ServerWsMessage::Error { .. }));
    let id = started_run(&mut c);
    let bad = c.handle(ClientWsMessage::Select { run_id: id, choice: "Z = +7".into() });
    assert!(matches!(bad, ServerWsMessage::Error { .. }));
  }

  #[tokio::test]
  async fn board_drops_and_reset() {
    let (mut c, _rx, _) = conn(3000);
    let drop_msg = |label: &str, target: &str| ClientWsMessage::BoardDrop {
      slug: "association-types".into(),
      label: label.into(),
      target: target.into(),
    };
    c.handle(drop_msg("Mosaic", "cc-visual"));
    let again = c.handle(drop_msg("Mosaic", "cc-test"));
    assert!(matches!(again, ServerWsMessage::Error { .. }));

    match c.handle(ClientWsMessage::BoardReset { slug: "association-types".into() }) {
      ServerWsMessage::Board { board } => {
        assert!(board.state.placements.is_empty());
        assert_eq!(board.state.available.len(), 9);
      }
      other => panic!("unexpected {other:?}"),
    }
    let missing = c.handle(ClientWsMessage::OpenBoard { slug: "nope".into() });
    assert!(matches!(missing, ServerWsMessage::Error { .. }));
  }

  #[test]
  fn navigation_tracks_only_when_identified() {
    let (mut c, _rx, sink) = conn(3000);
    c.handle(parse(r#"{"type":"navigate","path":"/chapters/1"}"#));
    assert!(sink.taken().is_empty());

    c.handle(parse(r#"{"type":"restore","netId":"ab123","sessionId":"session_1_x"}"#));
    assert!(sink.taken().is_empty());

    match c.handle(parse(r#"{"type":"navigate","path":"/chapters/5/z-scores"}"#)) {
      ServerWsMessage::Navigation { navigation, tracked } => {
        assert!(tracked);
        assert_eq!(navigation.next_topic, Some("/chapters/5/empirical-rule"));
      }
      other => panic!("unexpected {other:?}"),
    }
    let events = sink.taken();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, TrackingAction::PageView);
    assert_eq!(events[0].page_path, "/chapters/5/z-scores");
  }

  #[test]
  fn login_over_ws_emits_login_and_page_view() {
    let (mut c, _rx, sink) = conn(3000);
    c.handle(parse(r#"{"type":"navigate","path":"/chapters/2/association-types"}"#));
    match c.handle(parse(r#"{"type":"login","netId":"AB123","name":"Ana"}"#)) {
      ServerWsMessage::Student { student } => assert_eq!(student.net_id.as_deref(), Some("ab123")),
      other => panic!("unexpected {other:?}"),
    }
    let actions: Vec<_> = sink.taken().into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![TrackingAction::Login, TrackingAction::PageView]);
  }
}
