//! Server settings (environment) and course configuration (TOML).
//!
//! The TOML file is optional. It can tune the runner, point tracking at an
//! endpoint, and add or override challenge sets and matching boards by slug.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{AnswerPolicy, ChallengeItem, ChallengeSet};
use crate::error::{ChallengeSetError, ConfigError, MatchingError};
use crate::matching::{BoardSpec, DropTarget};
use crate::session::DEFAULT_FEEDBACK_DELAY;
use crate::state::RUN_IDLE_TTL;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CourseConfig {
  #[serde(default)]
  pub runner: RunnerCfg,
  #[serde(default)]
  pub tracking: TrackingCfg,
  #[serde(default)]
  pub challenge_sets: Vec<ChallengeSetCfg>,
  #[serde(default)]
  pub boards: Vec<BoardCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RunnerCfg {
  #[serde(default = "default_delay_ms")]
  pub feedback_delay_ms: u64,
  #[serde(default)]
  pub answer_policy: AnswerPolicy,
  /// HTTP runs untouched for this long are evicted.
  #[serde(default = "default_idle_secs")]
  pub run_idle_secs: u64,
}

fn default_delay_ms() -> u64 {
  DEFAULT_FEEDBACK_DELAY.as_millis() as u64
}

fn default_idle_secs() -> u64 {
  RUN_IDLE_TTL.as_secs()
}

impl Default for RunnerCfg {
  fn default() -> Self {
    Self {
      feedback_delay_ms: default_delay_ms(),
      answer_policy: AnswerPolicy::default(),
      run_idle_secs: default_idle_secs(),
    }
  }
}

impl RunnerCfg {
  pub fn feedback_delay(&self) -> Duration {
    Duration::from_millis(self.feedback_delay_ms)
  }

  /// Zero falls back to the default; runs must expire eventually.
  pub fn run_idle_ttl(&self) -> Duration {
    match self.run_idle_secs {
      0 => RUN_IDLE_TTL,
      secs => Duration::from_secs(secs),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackingCfg {
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default = "default_tracking_timeout_ms")]
  pub timeout_ms: u64,
  #[serde(default)]
  pub disabled: bool,
}

fn default_tracking_timeout_ms() -> u64 {
  5000
}

impl Default for TrackingCfg {
  fn default() -> Self {
    Self { base_url: None, timeout_ms: default_tracking_timeout_ms(), disabled: false }
  }
}

/// Challenge set entry accepted in TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct ChallengeSetCfg {
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub chapter: u32,
  #[serde(default)]
  pub answer_policy: Option<AnswerPolicy>,
  #[serde(default)]
  pub feedback_delay_ms: Option<u64>,
  pub items: Vec<ChallengeItem>,
}

impl ChallengeSetCfg {
  /// Free-text sets default to whitespace-insensitive matching.
  pub fn into_set(self, default_policy: AnswerPolicy) -> Result<ChallengeSet, ChallengeSetError> {
    let all_free_text = !self.items.is_empty() && self.items.iter().all(ChallengeItem::is_free_text);
    let policy = self.answer_policy.unwrap_or(if all_free_text { AnswerPolicy::Compact } else { default_policy });
    let set = ChallengeSet::new(self.slug, self.title, self.chapter, self.items, policy)?;
    Ok(match self.feedback_delay_ms {
      Some(ms) => set.with_feedback_delay(Duration::from_millis(ms)),
      None => set,
    })
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BoardCfg {
  pub slug: String,
  pub title: String,
  #[serde(default)]
  pub chapter: u32,
  pub targets: Vec<DropTarget>,
  pub labels: Vec<String>,
}

impl BoardCfg {
  pub fn into_spec(self) -> Result<BoardSpec, MatchingError> {
    BoardSpec::new(self.slug, self.title, self.chapter, self.targets, self.labels)
  }
}

pub fn load_course_config(path: &str) -> Result<CourseConfig, ConfigError> {
  let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
  toml::from_str::<CourseConfig>(&s).map_err(|source| ConfigError::Parse { path: path.to_string(), source })
}

/// Load from COURSE_CONFIG_PATH. Any IO/parse error is logged and yields None.
pub fn load_course_config_from_env() -> Option<CourseConfig> {
  let path = std::env::var("COURSE_CONFIG_PATH").ok()?;
  match load_course_config(&path) {
    Ok(cfg) => {
      info!(target: "statcourse_backend", %path, sets = cfg.challenge_sets.len(), boards = cfg.boards.len(), "Loaded course config (TOML)");
      Some(cfg)
    }
    Err(e) => {
      error!(target: "statcourse_backend", %path, error = %e, "Failed to load course config");
      None
    }
  }
}

/// Process-level settings read from the environment.
#[derive(Clone, Debug)]
pub struct ServerSettings {
  pub addr: SocketAddr,
  pub static_dir: String,
  pub track_base_url: Option<String>,
  pub tracking_disabled: bool,
}

impl ServerSettings {
  pub fn from_env() -> Self {
    let port = std::env::var("PORT")
      .ok()
      .and_then(|p| p.parse::<u16>().ok())
      .unwrap_or(3000);
    let flag = |name: &str| {
      std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
    };
    Self {
      addr: SocketAddr::from(([0, 0, 0, 0], port)),
      static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".into()),
      track_base_url: std::env::var("TRACK_BASE_URL").ok().filter(|s| !s.trim().is_empty()),
      tracking_disabled: flag("TRACKING_DISABLED"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"
[runner]
feedback_delay_ms = 3000
answer_policy = "exact"
run_idle_secs = 600

[tracking]
base_url = "http://localhost:3001"

[[challenge_sets]]
slug = "median-check"
title = "Median check"
chapter = 2
feedback_delay_ms = 5000

[[challenge_sets.items]]
id = 1
prompt = "Median of 1, 3, 9?"
choices = ["3", "4.33"]
correct_choice = "3"
explanation = "Middle value of the sorted list."

[[challenge_sets]]
slug = "r-basics"
title = "R basics"

[[challenge_sets.items]]
id = 1
prompt = "Assign 5 to x"
correct_choice = "x<-5||x = 5"
explanation = "Use <- or =."

[[boards]]
slug = "pairs"
title = "Pairs"
labels = ["Mosaic", "Scatterplot"]

[[boards.targets]]
key = "cc"
group = "Categorical-Categorical"
label = "Visual"
expected = "Mosaic"
"#;

  #[test]
  fn parses_full_course_file() {
    let cfg: CourseConfig = toml::from_str(SAMPLE).unwrap();
    assert_eq!(cfg.runner.feedback_delay(), Duration::from_millis(3000));
    assert_eq!(cfg.runner.answer_policy, AnswerPolicy::Exact);
    assert_eq!(cfg.runner.run_idle_ttl(), Duration::from_secs(600));
    assert_eq!(cfg.tracking.timeout_ms, 5000);
    assert_eq!(cfg.challenge_sets.len(), 2);

    let mut sets = cfg.challenge_sets.into_iter();
    let median = sets.next().unwrap().into_set(AnswerPolicy::Exact).unwrap();
    assert_eq!(median.feedback_delay, Some(Duration::from_millis(5000)));
    assert_eq!(median.answer_policy, AnswerPolicy::Exact);

    let r = sets.next().unwrap().into_set(AnswerPolicy::Exact).unwrap();
    assert_eq!(r.answer_policy, AnswerPolicy::Compact);
    assert!(r.items()[0].is_correct("x <- 5", r.answer_policy));

    let board = cfg.boards.into_iter().next().unwrap().into_spec().unwrap();
    assert_eq!(board.targets[0].expected, "Mosaic");
  }

  #[test]
  fn defaults_apply_to_empty_file() {
    let cfg: CourseConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.runner.feedback_delay(), DEFAULT_FEEDBACK_DELAY);
    assert_eq!(cfg.runner.answer_policy, AnswerPolicy::Normalized);
    assert_eq!(cfg.runner.run_idle_ttl(), RUN_IDLE_TTL);
    assert!(cfg.tracking.base_url.is_none());

    let cfg: CourseConfig = toml::from_str("[runner]\nrun_idle_secs = 0").unwrap();
    assert_eq!(cfg.runner.run_idle_ttl(), RUN_IDLE_TTL);
  }

  #[test]
  fn missing_file_is_an_io_error() {
    let err = load_course_config("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
  }
}
