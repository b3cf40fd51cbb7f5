//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Turning runner snapshots into answer-free DTOs
//!   - Replaying matching-board drops
//!   - Calculator endpoints over raw query text
//!   - Stateless tracking helpers for the REST surface

use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::calculators::{
  empirical_rule, format_display, interpret_z, parse_number, power_transform, transform_preset,
  transformation_sample, z_score, RegressionBands,
};
use crate::catalog::page_title;
use crate::error::MatchingError;
use crate::matching::{BoardSpec, MatchingBoard};
use crate::protocol::*;
use crate::session::{RunnerEvent, RunnerSession, SessionSnapshot};
use crate::state::AppState;
use crate::tracking::StudentContext;

pub fn run_out(run_id: Uuid, snap: SessionSnapshot) -> RunOut {
  RunOut {
    run_id,
    slug: snap.slug,
    state: snap.state,
    challenge: snap.challenge.as_ref().map(ChallengeOut::from),
    feedback: snap.feedback,
    summary: snap.summary,
  }
}

pub fn session_out(session: &RunnerSession) -> RunOut {
  run_out(session.id(), session.snapshot())
}

pub fn event_message(event: RunnerEvent) -> ServerWsMessage {
  match event {
    RunnerEvent::Advanced { run_id, snapshot } => ServerWsMessage::Advanced { run: run_out(run_id, snapshot) },
    RunnerEvent::Ended { run_id, snapshot } => ServerWsMessage::Ended { run: run_out(run_id, snapshot) },
  }
}

pub fn set_detail(state: &AppState, slug: &str) -> Option<SetDetailOut> {
  let set = state.set(slug)?;
  Some(SetDetailOut {
    summary: SetSummaryOut::from(set.as_ref()),
    feedback_delay_ms: state.delay_for(&set).as_millis() as u64,
    challenges: set.items().iter().map(ChallengeOut::from).collect(),
  })
}

pub fn board_out(board: &MatchingBoard) -> BoardOut {
  BoardOut { spec: board.spec().clone(), state: board.state() }
}

/// Replays the drops in order on a fresh board. The first rejected drop
/// fails the whole check.
#[instrument(level = "debug", skip(spec, placements), fields(board = %spec.slug, drops = placements.len()))]
pub fn check_board(spec: Arc<BoardSpec>, placements: &[PlacementIn]) -> Result<CheckOut, MatchingError> {
  let mut board = MatchingBoard::new(spec);
  let outcomes = placements
    .iter()
    .map(|p| board.drop_label(&p.label, &p.target))
    .collect::<Result<Vec<_>, _>>()?;
  let state = board.state();
  debug!(target: "matching", board = %state.slug, correct = state.progress.correct, total = state.progress.total, "board checked");
  Ok(CheckOut { outcomes, state })
}

fn parse_opt(v: &Option<String>) -> Option<f64> {
  v.as_deref().and_then(parse_number)
}

pub fn z_score_calc(q: &ZScoreQuery) -> ZScoreOut {
  let z = match (parse_opt(&q.x), parse_opt(&q.mean), parse_opt(&q.sd)) {
    (Some(x), Some(mean), Some(sd)) => z_score(x, mean, sd),
    _ => None,
  };
  ZScoreOut { z, display: format_display(z, 2), interpretation: z.map(interpret_z) }
}

pub fn interval_calc(q: &IntervalQuery) -> IntervalOut {
  let line = RegressionBands::example();
  let x = parse_opt(&q.x);
  let estimate = x.map(|x| line.predict(x));
  IntervalOut {
    x,
    estimate,
    confidence: x.map(|x| line.confidence(x)),
    prediction: x.map(|x| line.prediction(x)),
    display: format_display(estimate, 2),
  }
}

/// `None` for an unknown preset name.
pub fn transform_calc(q: &TransformQuery) -> Option<TransformOut> {
  let preset = transform_preset(q.preset.as_deref().unwrap_or("none"))?;
  let original = transformation_sample();
  let transformed = power_transform(&original, preset.x_power, preset.y_power);
  Some(TransformOut { preset: *preset, original, transformed })
}

pub fn empirical_calc(q: &EmpiricalQuery) -> EmpiricalOut {
  let bands = match (parse_opt(&q.mean), parse_opt(&q.sd)) {
    (Some(mean), Some(sd)) => empirical_rule(mean, sd),
    _ => None,
  };
  EmpiricalOut { bands }
}

fn title_for(path: &str, title: Option<String>) -> String {
  title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| page_title(path))
}

/// One `page_view` for a route the client just opened.
#[instrument(level = "debug", skip(state, student), fields(%path))]
pub fn track_navigate(state: &AppState, student: StudentContext, path: &str, title: Option<String>) -> bool {
  let title = title_for(path, title);
  state.tracker(student).navigate(path, &title)
}

pub fn track_interaction(
  state: &AppState,
  student: StudentContext,
  path: &str,
  title: Option<String>,
  action: &str,
  element: Option<String>,
  value: Option<String>,
) -> bool {
  let title = title_for(path, title);
  match student.interaction(path, &title, action, element, value) {
    Some(ev) => {
      state.tracking.emit(ev);
      true
    }
    None => false,
  }
}

/// `None` when the NetID is blank. Otherwise emits `login` and a
/// `page_view` for the current route.
#[instrument(level = "info", skip(state, name), fields(%path))]
pub fn track_login(
  state: &AppState,
  net_id: &str,
  name: Option<&str>,
  path: &str,
  title: Option<String>,
) -> Option<StudentContext> {
  let student = StudentContext::identify(net_id, name)?;
  let mut tracker = state.tracker(StudentContext::default());
  tracker.navigate(path, &title_for(path, title));
  tracker.set_context(student.clone(), true);
  info!(target: "tracking", net_id = ?student.net_id, "student identified");
  Some(student)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::matching::TargetFeedback;
  use crate::state::tests::test_state;
  use crate::tracking::TrackingAction;
  use std::time::Duration;

  fn q(x: &str, mean: &str, sd: &str) -> ZScoreQuery {
    ZScoreQuery { x: Some(x.into()), mean: Some(mean.into()), sd: Some(sd.into()) }
  }

  #[test]
  fn z_score_endpoint_formats_and_interprets() {
    let out = z_score_calc(&q("115", "100", "15"));
    assert_eq!(out.display, "1.00");
    assert_eq!(out.interpretation, Some("Slightly above average"));
    let bad = z_score_calc(&q("abc", "100", "15"));
    assert_eq!(bad, ZScoreOut { z: None, display: "-".into(), interpretation: None });
  }

  #[test]
  fn transform_defaults_to_identity() {
    let out = transform_calc(&TransformQuery { preset: None }).unwrap();
    assert_eq!(out.original, out.transformed);
    assert!(transform_calc(&TransformQuery { preset: Some("cube".into()) }).is_none());
  }

  #[test]
  fn check_board_replays_in_order() {
    let (state, _) = test_state(Duration::from_secs(4));
    let spec = state.board("association-types").unwrap();
    let drops = vec![
      PlacementIn { label: "Scatterplot".into(), target: "qq-visual".into() },
      PlacementIn { label: "Mosaic".into(), target: "qq-test".into() },
    ];
    let out = check_board(spec.clone(), &drops).unwrap();
    assert_eq!(out.outcomes[0].feedback, TargetFeedback::Correct);
    assert_eq!(out.outcomes[1].feedback, TargetFeedback::Incorrect);
    assert_eq!(out.state.progress.correct, 1);

    let twice = vec![
      PlacementIn { label: "Mosaic".into(), target: "cc-visual".into() },
      PlacementIn { label: "Mosaic".into(), target: "cc-test".into() },
    ];
    assert!(matches!(check_board(spec, &twice), Err(MatchingError::LabelAlreadyPlaced { .. })));
  }

  #[test]
  fn login_emits_login_and_page_view_with_catalog_title() {
    let (state, sink) = test_state(Duration::from_secs(4));
    let student = track_login(&state, " AB123 ", None, "/chapters/5/z-scores", None).unwrap();
    assert_eq!(student.net_id.as_deref(), Some("ab123"));
    let events = sink.taken();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, TrackingAction::Login);
    assert_eq!(events[1].page_title, "Z-Scores & Standardization");
    assert!(track_login(&state, "  ", None, "/", None).is_none());
  }

  #[test]
  fn anonymous_tracking_is_silent() {
    let (state, sink) = test_state(Duration::from_secs(4));
    assert!(!track_navigate(&state, StudentContext::default(), "/chapters/1", None));
    assert!(!track_interaction(&state, StudentContext::default(), "/chapters/1", None, "click", None, None));
    assert!(sink.taken().is_empty());
  }

  #[test]
  fn reserved_interaction_names_are_not_emitted() {
    let (state, sink) = test_state(Duration::from_secs(4));
    let student = StudentContext::from_stored(Some("ab123".into()), None, None);
    assert!(!track_interaction(&state, student.clone(), "/chapters/1", None, "page_view", None, None));
    assert!(!track_interaction(&state, student.clone(), "/chapters/1", None, "login", None, None));
    assert!(sink.taken().is_empty());
    assert!(track_interaction(&state, student, "/chapters/1", None, "click", None, None));
    assert_eq!(sink.taken()[0].action, TrackingAction::Interaction("click".into()));
  }

  #[tokio::test]
  async fn snapshots_hide_answers_until_feedback() {
    let (state, _) = test_state(Duration::from_secs(4));
    let run = state.create_run("z-score-game").await.unwrap();
    run.start().unwrap();
    let out = session_out(&run);
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["challenge"].get("correct_choice").is_none());
    assert!(json["feedback"].is_null());

    run.select("Z = +2.0").unwrap();
    run.submit().unwrap();
    let out = session_out(&run);
    assert_eq!(out.feedback.unwrap().expected, "Z = +2.0");
  }
}
