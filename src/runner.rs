//! Challenge runner: the single state machine behind every quiz/game page.
//!
//! `Idle → Presenting(i) → Feedback(i) → Presenting(i+1) | Ended`
//!
//! The runner is synchronous and clock-free; the feedback delay lives in
//! `session`, which calls `advance_if` when its timer fires. Every phase
//! transition bumps `generation` so a timer armed for one visit can never
//! advance a later one.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::domain::{ChallengeItem, ChallengeSet};
use crate::error::RunnerError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Presenting(usize),
  Feedback(usize),
  Ended,
}

impl Phase {
  pub fn name(&self) -> &'static str {
    match self {
      Phase::Idle => "idle",
      Phase::Presenting(_) => "presenting",
      Phase::Feedback(_) => "feedback",
      Phase::Ended => "ended",
    }
  }
}

// The index travels separately as `current_index`.
impl Serialize for Phase {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.name())
  }
}

/// Result of grading one submission; drives the feedback panel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Submission {
  pub challenge_id: u32,
  pub selected: String,
  pub correct: bool,
  pub expected: String,
  pub explanation: String,
  /// Fire the celebratory effect (only on a correct answer).
  pub celebrate: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  Expert,
  GreatWork,
  KeepLearning,
}

impl Verdict {
  /// Tiers scale the "5 of 6 / 4 of 6" cut-offs to any set length.
  pub fn for_score(score: usize, total: usize) -> Self {
    if total > 0 && score * 6 >= total * 5 {
      Verdict::Expert
    } else if total > 0 && score * 3 >= total * 2 {
      Verdict::GreatWork
    } else {
      Verdict::KeepLearning
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
  pub score: usize,
  pub total: usize,
  pub percentage: u32,
  pub verdict: Verdict,
}

impl Summary {
  pub fn new(score: usize, total: usize) -> Self {
    let percentage = if total == 0 {
      0
    } else {
      ((score as f64 / total as f64) * 100.0).round() as u32
    };
    Self { score, total, percentage, verdict: Verdict::for_score(score, total) }
  }
}

/// Read-only snapshot handed to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunnerState {
  pub phase: Phase,
  pub current_index: usize,
  pub selected: Option<String>,
  pub revealed: bool,
  pub score: usize,
  pub ended: bool,
  pub total: usize,
  pub generation: u64,
}

#[derive(Clone, Debug)]
pub struct ChallengeRunner {
  set: Arc<ChallengeSet>,
  phase: Phase,
  selected: Option<String>,
  score: usize,
  last_submission: Option<Submission>,
  generation: u64,
}

impl ChallengeRunner {
  pub fn new(set: Arc<ChallengeSet>) -> Self {
    Self {
      set,
      phase: Phase::Idle,
      selected: None,
      score: 0,
      last_submission: None,
      generation: 0,
    }
  }

  pub fn set(&self) -> &ChallengeSet {
    &self.set
  }

  #[allow(dead_code)]
  pub fn phase(&self) -> Phase {
    self.phase
  }

  #[allow(dead_code)]
  pub fn score(&self) -> usize {
    self.score
  }

  pub fn generation(&self) -> u64 {
    self.generation
  }

  pub fn current_index(&self) -> usize {
    match self.phase {
      Phase::Presenting(i) | Phase::Feedback(i) => i,
      Phase::Idle => 0,
      Phase::Ended => self.set.len().saturating_sub(1),
    }
  }

  /// The challenge on screen, if any.
  pub fn current_item(&self) -> Option<&ChallengeItem> {
    match self.phase {
      Phase::Presenting(i) | Phase::Feedback(i) => self.set.get(i),
      _ => None,
    }
  }

  /// Grading of the challenge currently in feedback.
  pub fn last_submission(&self) -> Option<&Submission> {
    match self.phase {
      Phase::Feedback(_) => self.last_submission.as_ref(),
      _ => None,
    }
  }

  pub fn state(&self) -> RunnerState {
    RunnerState {
      phase: self.phase,
      current_index: self.current_index(),
      selected: self.selected.clone(),
      revealed: matches!(self.phase, Phase::Feedback(_)),
      score: self.score,
      ended: self.phase == Phase::Ended,
      total: self.set.len(),
      generation: self.generation,
    }
  }

  fn transition(&mut self, next: Phase) {
    debug!(target: "runner", set = %self.set.slug, from = self.phase.name(), to = next.name(), "runner transition");
    self.phase = next;
    self.generation += 1;
  }

  pub fn start(&mut self) -> Result<(), RunnerError> {
    if self.phase != Phase::Idle {
      return Err(RunnerError::AlreadyStarted);
    }
    self.score = 0;
    self.selected = None;
    self.last_submission = None;
    self.transition(Phase::Presenting(0));
    Ok(())
  }

  /// Record the pending selection. A blank selection clears it.
  pub fn select(&mut self, choice: &str) -> Result<(), RunnerError> {
    let Phase::Presenting(i) = self.phase else {
      return Err(RunnerError::NotPresenting(self.phase.name()));
    };
    if choice.trim().is_empty() {
      self.selected = None;
      return Ok(());
    }
    let policy = self.set.answer_policy;
    let item = &self.set.items()[i];
    let selected = if item.is_free_text() {
      choice.to_string()
    } else {
      item
        .find_choice(choice, policy)
        .map(str::to_string)
        .ok_or_else(|| RunnerError::UnknownChoice { id: item.id, choice: choice.to_string() })?
    };
    self.selected = Some(selected);
    Ok(())
  }

  /// Grade the pending selection. Returns `Ok(None)` when nothing is selected.
  pub fn submit(&mut self) -> Result<Option<Submission>, RunnerError> {
    let Phase::Presenting(i) = self.phase else {
      return Err(RunnerError::NotPresenting(self.phase.name()));
    };
    let Some(selected) = self.selected.clone().filter(|s| !s.trim().is_empty()) else {
      return Ok(None);
    };
    let item = &self.set.items()[i];
    let correct = item.is_correct(&selected, self.set.answer_policy);
    let submission = Submission {
      challenge_id: item.id,
      selected,
      correct,
      expected: item.display_answer().to_string(),
      explanation: item.explanation.clone(),
      celebrate: correct,
    };
    if correct {
      self.score += 1;
    }
    self.last_submission = Some(submission.clone());
    self.transition(Phase::Feedback(i));
    Ok(Some(submission))
  }

  /// Leave feedback for the next challenge, or end after the last one.
  pub fn advance(&mut self) -> Result<Phase, RunnerError> {
    let Phase::Feedback(i) = self.phase else {
      return Err(RunnerError::NoFeedback);
    };
    self.selected = None;
    self.last_submission = None;
    let next = if i + 1 < self.set.len() { Phase::Presenting(i + 1) } else { Phase::Ended };
    self.transition(next);
    Ok(next)
  }

  /// Advance only if nothing has moved since `generation` was observed.
  pub fn advance_if(&mut self, generation: u64) -> Option<Phase> {
    if self.generation != generation {
      return None;
    }
    self.advance().ok()
  }

  pub fn restart(&mut self) {
    self.score = 0;
    self.selected = None;
    self.last_submission = None;
    self.transition(Phase::Idle);
  }

  pub fn summary(&self) -> Result<Summary, RunnerError> {
    if self.phase != Phase::Ended {
      return Err(RunnerError::NotEnded);
    }
    Ok(Summary::new(self.score, self.set.len()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::tests::mc;
  use crate::domain::AnswerPolicy;

  fn six_item_set() -> Arc<ChallengeSet> {
    let items = (1..=6).map(|id| mc(id, &format!("right {id}"), &["wrong", "other"])).collect();
    Arc::new(ChallengeSet::new("quiz", "Quiz", 5, items, AnswerPolicy::Normalized).unwrap())
  }

  fn play(runner: &mut ChallengeRunner, answers: &[bool]) {
    runner.start().unwrap();
    for (i, correct) in answers.iter().enumerate() {
      let choice = if *correct { format!("right {}", i + 1) } else { "wrong".to_string() };
      runner.select(&choice).unwrap();
      let sub = runner.submit().unwrap().expect("selection present");
      assert_eq!(sub.correct, *correct);
      assert_eq!(sub.celebrate, *correct);
      runner.advance().unwrap();
    }
  }

  #[test]
  fn alternating_answers_score_half() {
    let mut runner = ChallengeRunner::new(six_item_set());
    play(&mut runner, &[true, false, true, false, true, false]);
    assert_eq!(runner.phase(), Phase::Ended);
    let summary = runner.summary().unwrap();
    assert_eq!(summary.score, 3);
    assert_eq!(summary.percentage, 50);
    assert_eq!(summary.verdict, Verdict::KeepLearning);
  }

  #[test]
  fn score_matches_correct_count_for_every_permutation() {
    let set = six_item_set();
    for mask in 0u32..64 {
      let answers: Vec<bool> = (0..6).map(|bit| mask & (1 << bit) != 0).collect();
      let mut runner = ChallengeRunner::new(set.clone());
      play(&mut runner, &answers);
      assert_eq!(runner.summary().unwrap().score, mask.count_ones() as usize, "mask {mask:06b}");
    }
  }

  #[test]
  fn last_submission_ends_instead_of_overrunning() {
    let mut runner = ChallengeRunner::new(six_item_set());
    runner.start().unwrap();
    for i in 0..6 {
      runner.select("wrong").unwrap();
      runner.submit().unwrap();
      let next = runner.advance().unwrap();
      if i < 5 {
        assert_eq!(next, Phase::Presenting(i + 1));
      } else {
        assert_eq!(next, Phase::Ended);
      }
    }
    assert_eq!(runner.current_item(), None);
    assert_eq!(runner.advance(), Err(RunnerError::NoFeedback));
  }

  #[test]
  fn empty_submission_is_a_noop() {
    let mut runner = ChallengeRunner::new(six_item_set());
    runner.start().unwrap();
    let before = runner.state();
    assert_eq!(runner.submit().unwrap(), None);
    runner.select("   ").unwrap();
    assert_eq!(runner.submit().unwrap(), None);
    assert_eq!(runner.state(), before);
  }

  #[test]
  fn restart_from_ended_resets_everything() {
    let mut runner = ChallengeRunner::new(six_item_set());
    play(&mut runner, &[true; 6]);
    assert_eq!(runner.summary().unwrap().verdict, Verdict::Expert);
    runner.restart();
    let state = runner.state();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.score, 0);
    assert_eq!(state.current_index, 0);
    runner.restart();
    assert_eq!(runner.state().score, 0);
    assert_eq!(runner.phase(), Phase::Idle);
  }

  #[test]
  fn selection_is_checked_against_choices_and_canonicalized() {
    let mut runner = ChallengeRunner::new(six_item_set());
    assert_eq!(runner.select("wrong"), Err(RunnerError::NotPresenting("idle")));
    runner.start().unwrap();
    assert!(matches!(runner.select("nope"), Err(RunnerError::UnknownChoice { id: 1, .. })));
    runner.select("  RIGHT 1 ").unwrap();
    assert_eq!(runner.state().selected.as_deref(), Some("right 1"));
    runner.select("other").unwrap();
    assert_eq!(runner.state().selected.as_deref(), Some("other"));
  }

  #[test]
  fn stale_generation_does_not_advance() {
    let mut runner = ChallengeRunner::new(six_item_set());
    runner.start().unwrap();
    runner.select("wrong").unwrap();
    runner.submit().unwrap();
    let armed = runner.generation();
    runner.restart();
    assert_eq!(runner.advance_if(armed), None);
    assert_eq!(runner.phase(), Phase::Idle);
  }

  #[test]
  fn second_submit_during_feedback_is_rejected() {
    let mut runner = ChallengeRunner::new(six_item_set());
    runner.start().unwrap();
    runner.select("right 1").unwrap();
    assert!(runner.submit().unwrap().unwrap().correct);
    let before = runner.state();
    assert_eq!(runner.submit(), Err(RunnerError::NotPresenting("feedback")));
    assert_eq!(runner.state(), before);
    assert_eq!(runner.score(), 1);
  }

  #[test]
  fn start_twice_is_rejected() {
    let mut runner = ChallengeRunner::new(six_item_set());
    runner.start().unwrap();
    assert_eq!(runner.start(), Err(RunnerError::AlreadyStarted));
  }

  #[test]
  fn verdict_tiers_follow_six_question_cutoffs() {
    assert_eq!(Verdict::for_score(5, 6), Verdict::Expert);
    assert_eq!(Verdict::for_score(4, 6), Verdict::GreatWork);
    assert_eq!(Verdict::for_score(3, 6), Verdict::KeepLearning);
    assert_eq!(Summary::new(2, 3).percentage, 67);
  }
}
