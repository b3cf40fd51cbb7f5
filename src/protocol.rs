//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Challenges leave the server without their answers; the correct answer is
//! only revealed through a graded `Submission`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calculators::{EmpiricalBand, Interval, Point, TransformPreset};
use crate::catalog::NavigationInfo;
use crate::domain::{AnswerPolicy, ChallengeItem, ChallengeSet};
use crate::matching::{BoardSpec, BoardState, DropOutcome};
use crate::runner::{RunnerState, Submission, Summary};
use crate::tracking::StudentContext;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// Values the browser kept from an earlier visit.
    Restore {
        #[serde(rename = "netId", default)]
        net_id: Option<String>,
        #[serde(rename = "sessionId", default)]
        session_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
    Login {
        #[serde(rename = "netId")]
        net_id: String,
        #[serde(default)]
        name: Option<String>,
    },
    Logout,
    Navigate {
        path: String,
        #[serde(default)]
        title: Option<String>,
    },
    Interaction {
        action: String,
        #[serde(default)]
        element: Option<String>,
        #[serde(default)]
        value: Option<String>,
    },
    StartRun {
        slug: String,
    },
    Select {
        run_id: Uuid,
        choice: String,
    },
    Submit {
        run_id: Uuid,
    },
    Restart {
        run_id: Uuid,
    },
    Abandon {
        run_id: Uuid,
    },
    OpenBoard {
        slug: String,
    },
    BoardDrop {
        slug: String,
        label: String,
        target: String,
    },
    BoardReset {
        slug: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    /// Identity to persist client-side (`jakesworld_*` keys).
    Student {
        student: StudentContext,
    },
    Navigation {
        navigation: NavigationInfo,
        tracked: bool,
    },
    Tracked {
        emitted: bool,
    },
    Run {
        run: RunOut,
    },
    /// Feedback timer moved the run to the next challenge.
    Advanced {
        run: RunOut,
    },
    /// Feedback timer finished the run.
    Ended {
        run: RunOut,
    },
    Abandoned {
        run_id: Uuid,
    },
    Board {
        board: BoardOut,
    },
    BoardDrop {
        outcome: DropOutcome,
        state: BoardState,
    },
    Error {
        message: String,
    },
}

/// A challenge as shown to the student.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ChallengeOut {
    pub id: u32,
    pub prompt: String,
    pub choices: Vec<String>,
    pub free_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_focus: Option<String>,
}

impl From<&ChallengeItem> for ChallengeOut {
    fn from(c: &ChallengeItem) -> Self {
        ChallengeOut {
            id: c.id,
            prompt: c.prompt.clone(),
            choices: c.choices.clone(),
            free_text: c.is_free_text(),
            context: c.context.clone(),
            skill_focus: c.skill_focus.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetSummaryOut {
    pub slug: String,
    pub title: String,
    pub chapter: u32,
    pub total: usize,
    pub answer_policy: AnswerPolicy,
}

impl From<&ChallengeSet> for SetSummaryOut {
    fn from(s: &ChallengeSet) -> Self {
        SetSummaryOut {
            slug: s.slug.clone(),
            title: s.title.clone(),
            chapter: s.chapter,
            total: s.len(),
            answer_policy: s.answer_policy,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SetDetailOut {
    #[serde(flatten)]
    pub summary: SetSummaryOut,
    pub feedback_delay_ms: u64,
    pub challenges: Vec<ChallengeOut>,
}

/// Snapshot of one run: state, the challenge on screen, the feedback being
/// shown (if any) and the summary once ended.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RunOut {
    pub run_id: Uuid,
    pub slug: String,
    pub state: RunnerState,
    pub challenge: Option<ChallengeOut>,
    pub feedback: Option<Submission>,
    pub summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
pub struct BoardOut {
    pub spec: BoardSpec,
    pub state: BoardState,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct CreateRunIn {
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    pub choice: String,
}

#[derive(Debug, Deserialize)]
pub struct PlacementIn {
    pub label: String,
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckIn {
    pub placements: Vec<PlacementIn>,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
    pub outcomes: Vec<DropOutcome>,
    pub state: BoardState,
}

#[derive(Debug, Deserialize)]
pub struct NavigationQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ZScoreQuery {
    pub x: Option<String>,
    pub mean: Option<String>,
    pub sd: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ZScoreOut {
    pub z: Option<f64>,
    pub display: String,
    pub interpretation: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct IntervalQuery {
    pub x: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntervalOut {
    pub x: Option<f64>,
    pub estimate: Option<f64>,
    pub confidence: Option<Interval>,
    pub prediction: Option<Interval>,
    pub display: String,
}

#[derive(Debug, Deserialize)]
pub struct TransformQuery {
    pub preset: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransformOut {
    pub preset: TransformPreset,
    pub original: Vec<Point>,
    pub transformed: Vec<Point>,
}

#[derive(Debug, Deserialize)]
pub struct EmpiricalQuery {
    pub mean: Option<String>,
    pub sd: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmpiricalOut {
    pub bands: Option<[EmpiricalBand; 3]>,
}

/// Tracking requests carry the identity the browser stored.
#[derive(Debug, Deserialize)]
pub struct NavigateIn {
    #[serde(flatten)]
    pub student: StudentContext,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InteractionIn {
    #[serde(flatten)]
    pub student: StudentContext,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
    pub action: String,
    #[serde(default)]
    pub element: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginIn {
    #[serde(rename = "netId")]
    pub net_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackOut {
    pub emitted: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginOut {
    pub student: StudentContext,
    pub emitted: bool,
}

#[derive(Debug, Serialize)]
pub struct TrackAck {
    pub success: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
