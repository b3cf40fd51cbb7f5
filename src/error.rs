//! Error types for the domain modules and the HTTP surface.
//!
//! Domain errors stay transport-agnostic; `ApiError` maps them to status codes
//! and a small JSON body for the REST handlers.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

/// A challenge set failed validation while loading (built-in or TOML).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChallengeSetError {
  #[error("challenge set '{0}' has no items")]
  Empty(String),
  #[error("challenge {found} is out of sequence (expected id {expected})")]
  OutOfSequence { expected: u32, found: u32 },
  #[error("challenge {id} has {count} choices (expected 2 to 4)")]
  ChoiceCount { id: u32, count: usize },
  #[error("challenge {id} repeats choice '{choice}'")]
  DuplicateChoice { id: u32, choice: String },
  #[error("challenge {id}: correct choice '{correct}' is not one of its choices")]
  CorrectNotInChoices { id: u32, correct: String },
  #[error("challenge {id} has no accepted answer")]
  NoAcceptedAnswer { id: u32 },
}

/// Invalid transition or input for the challenge runner.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
  #[error("run already started")]
  AlreadyStarted,
  #[error("no challenge is being presented (phase: {0})")]
  NotPresenting(&'static str),
  #[error("'{choice}' is not a choice for challenge {id}")]
  UnknownChoice { id: u32, choice: String },
  #[error("no feedback is pending")]
  NoFeedback,
  #[error("run has not ended")]
  NotEnded,
}

/// Invalid drop or malformed board definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchingError {
  #[error("unknown drop target '{0}'")]
  UnknownTarget(String),
  #[error("unknown label '{0}'")]
  UnknownLabel(String),
  #[error("label '{label}' is already placed on '{target}'")]
  LabelAlreadyPlaced { label: String, target: String },
  #[error("duplicate drop target '{0}'")]
  DuplicateTarget(String),
  #[error("expected answer '{answer}' for target '{target}' is missing from the label pool")]
  MissingLabel { target: String, answer: String },
}

/// Delivery failure of a tracking event. Always logged, never surfaced.
#[derive(Debug, Error)]
pub enum TrackingError {
  #[error("tracking endpoint returned status {0}")]
  Status(reqwest::StatusCode),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
}

/// Failure to read or parse the course TOML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
}

/// Error returned by REST handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0} not found")]
  NotFound(String),
  #[error(transparent)]
  Runner(#[from] RunnerError),
  #[error(transparent)]
  Matching(#[from] MatchingError),
  #[error("{0}")]
  BadRequest(String),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Runner(RunnerError::UnknownChoice { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Runner(_) => StatusCode::CONFLICT,
      ApiError::Matching(MatchingError::LabelAlreadyPlaced { .. }) => StatusCode::CONFLICT,
      ApiError::Matching(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn runner_errors_map_to_conflict_or_unprocessable() {
    assert_eq!(ApiError::from(RunnerError::NoFeedback).status(), StatusCode::CONFLICT);
    let unknown = RunnerError::UnknownChoice { id: 2, choice: "maybe".into() };
    assert_eq!(ApiError::from(unknown).status(), StatusCode::UNPROCESSABLE_ENTITY);
  }

  #[test]
  fn placed_label_is_a_conflict() {
    let err = MatchingError::LabelAlreadyPlaced { label: "Mosaic".into(), target: "cc-visual".into() };
    assert_eq!(ApiError::from(err).status(), StatusCode::CONFLICT);
    assert_eq!(ApiError::NotFound("run 7".into()).status(), StatusCode::NOT_FOUND);
  }
}
