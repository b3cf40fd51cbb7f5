//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::catalog::{navigation_info, CHAPTERS};
use crate::error::ApiError;
use crate::logic::*;
use crate::matching::MatchingBoard;
use crate::protocol::*;
use crate::state::AppState;
use crate::tracking::TrackingEvent;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

pub async fn http_chapters() -> impl IntoResponse { Json(CHAPTERS) }

#[instrument(level = "info", skip_all, fields(path = %q.path))]
pub async fn http_navigation(Query(q): Query<NavigationQuery>) -> impl IntoResponse {
  Json(navigation_info(&q.path))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_sets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let sets: Vec<SetSummaryOut> = state.list_sets().iter().map(|s| SetSummaryOut::from(s.as_ref())).collect();
  Json(sets)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_set(
  State(state): State<Arc<AppState>>,
  Path(slug): Path<String>,
) -> Result<Json<SetDetailOut>, ApiError> {
  set_detail(&state, &slug)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("challenge set '{slug}'")))
}

#[instrument(level = "info", skip(state, body), fields(slug = %body.slug))]
pub async fn http_create_run(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateRunIn>,
) -> Result<(StatusCode, Json<RunOut>), ApiError> {
  let run = state.create_run(&body.slug).await?;
  Ok((StatusCode::CREATED, Json(session_out(&run))))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_run(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RunOut>, ApiError> {
  let run = state.get_run(id).await?;
  Ok(Json(session_out(&run)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_start_run(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RunOut>, ApiError> {
  let run = state.get_run(id).await?;
  run.start()?;
  Ok(Json(session_out(&run)))
}

#[instrument(level = "info", skip(state, body), fields(choice_len = body.choice.len()))]
pub async fn http_select(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SelectIn>,
) -> Result<Json<RunOut>, ApiError> {
  let run = state.get_run(id).await?;
  run.select(&body.choice)?;
  Ok(Json(session_out(&run)))
}

/// An empty selection leaves the run untouched (`feedback` stays null).
#[instrument(level = "info", skip(state))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RunOut>, ApiError> {
  let run = state.get_run(id).await?;
  let (graded, snapshot) = run.submit()?;
  let correct = graded.map(|s| s.correct);
  info!(target: "runner", run_id = %id, graded = correct.is_some(), ?correct, "HTTP submit");
  Ok(Json(run_out(id, snapshot)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<Json<RunOut>, ApiError> {
  let run = state.get_run(id).await?;
  run.restart();
  Ok(Json(session_out(&run)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_run(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  state.remove_run(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_board(
  State(state): State<Arc<AppState>>,
  Path(slug): Path<String>,
) -> Result<Json<BoardOut>, ApiError> {
  let spec = state.board(&slug).ok_or_else(|| ApiError::NotFound(format!("board '{slug}'")))?;
  Ok(Json(board_out(&MatchingBoard::new(spec))))
}

#[instrument(level = "info", skip(state, body), fields(drops = body.placements.len()))]
pub async fn http_check_board(
  State(state): State<Arc<AppState>>,
  Path(slug): Path<String>,
  Json(body): Json<CheckIn>,
) -> Result<Json<CheckOut>, ApiError> {
  let spec = state.board(&slug).ok_or_else(|| ApiError::NotFound(format!("board '{slug}'")))?;
  Ok(Json(check_board(spec, &body.placements)?))
}

pub async fn http_calc_z(Query(q): Query<ZScoreQuery>) -> impl IntoResponse { Json(z_score_calc(&q)) }

pub async fn http_calc_interval(Query(q): Query<IntervalQuery>) -> impl IntoResponse { Json(interval_calc(&q)) }

pub async fn http_calc_transform(Query(q): Query<TransformQuery>) -> Result<Json<TransformOut>, ApiError> {
  transform_calc(&q)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("transform preset '{}'", q.preset.unwrap_or_default())))
}

pub async fn http_calc_empirical(Query(q): Query<EmpiricalQuery>) -> impl IntoResponse { Json(empirical_calc(&q)) }

#[instrument(level = "info", skip(state, body), fields(path = %body.path))]
pub async fn http_track_navigate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NavigateIn>,
) -> impl IntoResponse {
  let emitted = track_navigate(&state, body.student, &body.path, body.title);
  Json(TrackOut { emitted })
}

#[instrument(level = "info", skip(state, body), fields(path = %body.path, action = %body.action))]
pub async fn http_track_interaction(
  State(state): State<Arc<AppState>>,
  Json(body): Json<InteractionIn>,
) -> impl IntoResponse {
  let emitted = track_interaction(&state, body.student, &body.path, body.title, &body.action, body.element, body.value);
  Json(TrackOut { emitted })
}

#[instrument(level = "info", skip(state, body), fields(path = %body.path))]
pub async fn http_track_login(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LoginIn>,
) -> Result<Json<LoginOut>, ApiError> {
  let student = track_login(&state, &body.net_id, body.name.as_deref(), &body.path, body.title)
    .ok_or_else(|| ApiError::BadRequest("netId must not be blank".into()))?;
  Ok(Json(LoginOut { student, emitted: true }))
}

/// Local stand-in for the tracking backend: logs and acknowledges.
#[instrument(level = "info", skip(body), fields(path = %body.page_path))]
pub async fn http_student_track(Json(body): Json<TrackingEvent>) -> impl IntoResponse {
  info!(target: "tracking", net_id = %body.net_id, action = %String::from(body.action), "tracking event received");
  Json(TrackAck { success: true })
}
