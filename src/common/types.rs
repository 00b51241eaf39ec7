//! Shared type definitions for the betround client
//!
//! Round requests and outcomes, the controller state enum and the cached
//! user mirror used by every component.

use crate::games::types::GameType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Game-specific request fields (chosen side, target number, risk tier...)
pub type Parameters = Map<String, Value>;

/// Immutable description of a round, built when the player commits a stake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRequest {
    pub user_id: String,
    pub game_type: GameType,
    pub stake: f64,
    pub parameters: Parameters,
}

impl RoundRequest {
    pub fn new(user_id: impl Into<String>, game_type: GameType, stake: f64, parameters: Parameters) -> Self {
        Self {
            user_id: user_id.into(),
            game_type,
            stake,
            parameters,
        }
    }
}

/// Which sub-request of a round is being sent
#[derive(Debug, Clone, PartialEq)]
pub enum RoundStep {
    /// Opening request (deal, spin, flip, drop, roll, start)
    Start,
    /// Follow-up action inside an open round (hit, reveal, select, draw...)
    Continue { action: String, extra: Parameters },
    /// Early withdrawal of accumulated winnings
    CashOut,
}

impl RoundStep {
    pub fn label(&self) -> &str {
        match self {
            RoundStep::Start => "start",
            RoundStep::Continue { action, .. } => action,
            RoundStep::CashOut => "cashout",
        }
    }
}

/// Backend response envelope for any bet request.
///
/// Only the common envelope fields are interpreted by the controller;
/// `result` is handed to the display layer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoundOutcome {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<f64>,

    /// Game payload. Some backends name it `game`.
    #[serde(default, alias = "game", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winnings: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_over: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Value>,
}

impl RoundOutcome {
    /// Winnings from the envelope, falling back to the payload's own field
    pub fn winnings_amount(&self) -> f64 {
        self.winnings
            .or_else(|| self.result_f64("winnings"))
            .unwrap_or(0.0)
    }

    /// Whether the server marked the round as finished.
    ///
    /// Checks the envelope `game_over`, then the payload's `game_over`,
    /// `hit_mine` and `outcome` markers. A payload with none of them is
    /// treated as still open.
    pub fn round_over(&self) -> bool {
        if let Some(flag) = self.game_over {
            return flag;
        }
        let Some(result) = self.result.as_ref() else {
            return false;
        };
        if let Some(flag) = result.get("game_over").and_then(Value::as_bool) {
            return flag;
        }
        if result.get("hit_mine").and_then(Value::as_bool) == Some(true) {
            return true;
        }
        match result.get("outcome").and_then(Value::as_str) {
            Some("continue") | None => false,
            Some(_) => true,
        }
    }

    pub fn result_f64(&self, key: &str) -> Option<f64> {
        self.result.as_ref()?.get(key)?.as_f64()
    }

    pub fn result_str(&self, key: &str) -> Option<&str> {
        self.result.as_ref()?.get(key)?.as_str()
    }

    pub fn result_bool(&self, key: &str) -> Option<bool> {
        self.result.as_ref()?.get(key)?.as_bool()
    }

    pub fn result_field(&self, key: &str) -> Option<&Value> {
        self.result.as_ref()?.get(key)
    }

    /// Server supplied human readable message, if any
    pub fn message(&self) -> Option<&str> {
        self.result_str("message")
    }
}

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    /// No stake committed
    Idle,
    /// Stake and parameters validated, commit action enabled
    Armed,
    /// Request submitted, round-initiating actions locked
    InFlight,
    /// Outcome received, reveal delay running
    Settling,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Idle => write!(f, "idle"),
            RoundState::Armed => write!(f, "armed"),
            RoundState::InFlight => write!(f, "in-flight"),
            RoundState::Settling => write!(f, "settling"),
        }
    }
}

/// Player feedback preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub sound_enabled: bool,
    pub haptics_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            haptics_enabled: true,
        }
    }
}

/// Local mirror of the server's view of the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedUser {
    pub user_id: String,
    /// May be stale between refreshes
    pub balance: f64,
    pub preferences: Preferences,
}

impl CachedUser {
    pub fn new(user_id: impl Into<String>, balance: f64) -> Self {
        Self {
            user_id: user_id.into(),
            balance,
            preferences: Preferences::default(),
        }
    }
}

/// Currency display with two decimals
pub fn format_money(amount: f64) -> String {
    format!("${:.2}", amount)
}
