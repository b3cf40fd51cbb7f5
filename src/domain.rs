//! Domain models: challenge items, validated challenge sets, and the answer
//! matching policy applied when a selection is graded.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChallengeSetError;

/// Separator for alternative accepted answers on free-text challenges.
pub const ALTERNATIVE_SEPARATOR: &str = "||";

/// How a submitted answer is compared with the expected one.
/// Both sides go through the same normalization before comparison.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPolicy {
  /// Byte-for-byte equality.
  Exact,
  /// Trim surrounding whitespace and case-fold.
  #[default]
  Normalized,
  /// Drop every whitespace character and case-fold (code-style answers).
  Compact,
}

impl AnswerPolicy {
  pub fn normalize(self, s: &str) -> String {
    match self {
      AnswerPolicy::Exact => s.to_string(),
      AnswerPolicy::Normalized => s.trim().to_lowercase(),
      AnswerPolicy::Compact => s
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase(),
    }
  }

  pub fn matches(self, given: &str, expected: &str) -> bool {
    self.normalize(given) == self.normalize(expected)
  }
}

/// One question of a challenge set.
///
/// An item with no `choices` is a free-text challenge: `correct_choice` then
/// lists the accepted answers separated by `||`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChallengeItem {
  pub id: u32,
  pub prompt: String,
  #[serde(default)]
  pub choices: Vec<String>,
  pub correct_choice: String,
  pub explanation: String,
  /// Scenario line shown above the prompt (e.g. "mean 82, sd 6").
  #[serde(default)]
  pub context: Option<String>,
  #[serde(default)]
  pub skill_focus: Option<String>,
}

impl ChallengeItem {
  pub fn is_free_text(&self) -> bool {
    self.choices.is_empty()
  }

  /// Accepted answers, in declaration order.
  pub fn accepted_answers(&self) -> Vec<&str> {
    if self.is_free_text() {
      self
        .correct_choice
        .split(ALTERNATIVE_SEPARATOR)
        .filter(|a| !a.trim().is_empty())
        .collect()
    } else {
      vec![self.correct_choice.as_str()]
    }
  }

  /// The answer revealed during feedback.
  pub fn display_answer(&self) -> &str {
    self
      .accepted_answers()
      .first()
      .copied()
      .unwrap_or(self.correct_choice.as_str())
      .trim()
  }

  pub fn is_correct(&self, given: &str, policy: AnswerPolicy) -> bool {
    self.accepted_answers().iter().any(|a| policy.matches(given, a))
  }

  /// Resolve a selection to the canonical choice text (multiple-choice only).
  pub fn find_choice(&self, selected: &str, policy: AnswerPolicy) -> Option<&str> {
    self
      .choices
      .iter()
      .find(|c| policy.matches(selected, c))
      .map(String::as_str)
  }

  fn validate(&self, expected_id: u32, policy: AnswerPolicy) -> Result<(), ChallengeSetError> {
    if self.id != expected_id {
      return Err(ChallengeSetError::OutOfSequence { expected: expected_id, found: self.id });
    }
    if self.is_free_text() {
      if self.accepted_answers().is_empty() {
        return Err(ChallengeSetError::NoAcceptedAnswer { id: self.id });
      }
      return Ok(());
    }
    if !(2..=4).contains(&self.choices.len()) {
      return Err(ChallengeSetError::ChoiceCount { id: self.id, count: self.choices.len() });
    }
    for (i, choice) in self.choices.iter().enumerate() {
      if self.choices[..i].iter().any(|c| policy.matches(c, choice)) {
        return Err(ChallengeSetError::DuplicateChoice { id: self.id, choice: choice.clone() });
      }
    }
    if !self.choices.iter().any(|c| c == &self.correct_choice) {
      return Err(ChallengeSetError::CorrectNotInChoices {
        id: self.id,
        correct: self.correct_choice.clone(),
      });
    }
    Ok(())
  }
}

/// An ordered, validated, immutable sequence of challenges.
#[derive(Clone, Debug, Serialize)]
pub struct ChallengeSet {
  pub slug: String,
  pub title: String,
  pub chapter: u32,
  pub answer_policy: AnswerPolicy,
  /// Per-set override of the feedback auto-advance delay.
  #[serde(skip)]
  pub feedback_delay: Option<Duration>,
  items: Vec<ChallengeItem>,
}

impl ChallengeSet {
  pub fn new(
    slug: impl Into<String>,
    title: impl Into<String>,
    chapter: u32,
    items: Vec<ChallengeItem>,
    answer_policy: AnswerPolicy,
  ) -> Result<Self, ChallengeSetError> {
    let slug = slug.into();
    if items.is_empty() {
      return Err(ChallengeSetError::Empty(slug));
    }
    for (i, item) in items.iter().enumerate() {
      item.validate(i as u32 + 1, answer_policy)?;
    }
    Ok(Self {
      slug,
      title: title.into(),
      chapter,
      answer_policy,
      feedback_delay: None,
      items,
    })
  }

  pub fn with_feedback_delay(mut self, delay: Duration) -> Self {
    self.feedback_delay = Some(delay);
    self
  }

  pub fn items(&self) -> &[ChallengeItem] {
    &self.items
  }

  pub fn get(&self, index: usize) -> Option<&ChallengeItem> {
    self.items.get(index)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}
