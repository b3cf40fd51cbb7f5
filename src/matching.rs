//! Drag-and-drop matching boards (e.g. chapter 2 "association types").
//!
//! Each drop target is graded on its own against its expected label. The
//! assignment target → label is kept a partial bijection: a label placed on
//! one target cannot be dropped elsewhere, and overwriting a target hands
//! the displaced label back to the pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MatchingError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DropTarget {
  pub key: String,
  /// Row the target belongs to, e.g. "Quantitative-Quantitative".
  pub group: String,
  pub label: String,
  #[serde(skip_serializing)]
  pub expected: String,
}

/// Immutable board definition shared by every board instance.
#[derive(Clone, Debug, Serialize)]
pub struct BoardSpec {
  pub slug: String,
  pub title: String,
  pub chapter: u32,
  pub targets: Vec<DropTarget>,
  pub labels: Vec<String>,
}

impl BoardSpec {
  pub fn new(
    slug: impl Into<String>,
    title: impl Into<String>,
    chapter: u32,
    targets: Vec<DropTarget>,
    labels: Vec<String>,
  ) -> Result<Self, MatchingError> {
    for (i, t) in targets.iter().enumerate() {
      if targets[..i].iter().any(|o| o.key == t.key) {
        return Err(MatchingError::DuplicateTarget(t.key.clone()));
      }
      if !labels.contains(&t.expected) {
        return Err(MatchingError::MissingLabel { target: t.key.clone(), answer: t.expected.clone() });
      }
    }
    Ok(Self { slug: slug.into(), title: title.into(), chapter, targets, labels })
  }

  fn target(&self, key: &str) -> Option<&DropTarget> {
    self.targets.iter().find(|t| t.key == key)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFeedback {
  Correct,
  Incorrect,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DropOutcome {
  pub target: String,
  pub label: String,
  pub feedback: TargetFeedback,
  /// Label displaced from the target and returned to the pool.
  pub released: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoardProgress {
  pub placed: usize,
  pub correct: usize,
  pub total: usize,
  pub complete: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct BoardState {
  pub slug: String,
  pub placements: BTreeMap<String, String>,
  pub feedback: BTreeMap<String, TargetFeedback>,
  pub available: Vec<String>,
  pub progress: BoardProgress,
}

#[derive(Clone, Debug)]
pub struct MatchingBoard {
  spec: Arc<BoardSpec>,
  placements: BTreeMap<String, String>,
  feedback: BTreeMap<String, TargetFeedback>,
}

impl MatchingBoard {
  pub fn new(spec: Arc<BoardSpec>) -> Self {
    Self { spec, placements: BTreeMap::new(), feedback: BTreeMap::new() }
  }

  pub fn spec(&self) -> &BoardSpec {
    &self.spec
  }

  fn placed_on(&self, label: &str) -> Option<&str> {
    self
      .placements
      .iter()
      .find(|(_, l)| l.as_str() == label)
      .map(|(t, _)| t.as_str())
  }

  #[allow(dead_code)]
  pub fn is_draggable(&self, label: &str) -> bool {
    self.spec.labels.iter().any(|l| l == label) && self.placed_on(label).is_none()
  }

  pub fn available_labels(&self) -> Vec<String> {
    self
      .spec
      .labels
      .iter()
      .filter(|l| self.placed_on(l).is_none())
      .cloned()
      .collect()
  }

  #[allow(dead_code)]
  pub fn placement(&self, target: &str) -> Option<&str> {
    self.placements.get(target).map(String::as_str)
  }

  #[allow(dead_code)]
  pub fn feedback(&self, target: &str) -> Option<TargetFeedback> {
    self.feedback.get(target).copied()
  }

  pub fn drop_label(&mut self, label: &str, target: &str) -> Result<DropOutcome, MatchingError> {
    let expected = self
      .spec
      .target(target)
      .map(|t| t.expected.clone())
      .ok_or_else(|| MatchingError::UnknownTarget(target.to_string()))?;
    if !self.spec.labels.iter().any(|l| l == label) {
      return Err(MatchingError::UnknownLabel(label.to_string()));
    }
    if let Some(other) = self.placed_on(label) {
      if other != target {
        return Err(MatchingError::LabelAlreadyPlaced { label: label.to_string(), target: other.to_string() });
      }
    }

    let previous = self.placements.insert(target.to_string(), label.to_string());
    let released = previous.filter(|p| p != label);
    let feedback = if label == expected { TargetFeedback::Correct } else { TargetFeedback::Incorrect };
    self.feedback.insert(target.to_string(), feedback);
    debug!(target: "matching", board = %self.spec.slug, %target, %label, ?feedback, released = ?released, "label dropped");

    Ok(DropOutcome { target: target.to_string(), label: label.to_string(), feedback, released })
  }

  pub fn reset(&mut self) {
    self.placements.clear();
    self.feedback.clear();
  }

  pub fn progress(&self) -> BoardProgress {
    let total = self.spec.targets.len();
    let correct = self.feedback.values().filter(|f| **f == TargetFeedback::Correct).count();
    BoardProgress { placed: self.placements.len(), correct, total, complete: correct == total }
  }

  pub fn state(&self) -> BoardState {
    BoardState {
      slug: self.spec.slug.clone(),
      placements: self.placements.clone(),
      feedback: self.feedback.clone(),
      available: self.available_labels(),
      progress: self.progress(),
    }
  }
}
