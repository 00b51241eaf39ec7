//! Per-game strategy plugged into the round controller
//!
//! An adapter knows how to validate a game's parameters, how to build the
//! backend request for each step of a round, how long the reveal takes and
//! how to summarize an outcome for the player. The controller itself never
//! looks at game-specific fields.

use crate::api::models::{BetCall, BetRequestBody};
use crate::api::routes;
use crate::common::types::{format_money, Parameters, RoundOutcome, RoundRequest, RoundStep};
use crate::games::types::GameType;
use crate::notify::{Notification, SoundCue};
use serde_json::{json, Value};
use std::time::Duration;

pub trait GameAdapter: Send + Sync {
    fn game_type(&self) -> GameType;

    /// Check game parameters before a round starts
    fn validate(&self, _stake: f64, _parameters: &Parameters) -> Result<(), String> {
        Ok(())
    }

    /// Build the backend request for one step of the round.
    ///
    /// `token` is the previous step's payload, passed back verbatim.
    fn build_call(&self, request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall;

    /// Games whose rounds span several requests
    fn is_multi_step(&self) -> bool {
        false
    }

    /// Actions accepted by `continue_round`
    fn continuation_actions(&self) -> &'static [&'static str] {
        &[]
    }

    /// Check a continuation's extra fields against the open round's token
    fn validate_continuation(&self, _action: &str, _extra: &Parameters, _token: Option<&Value>) -> Result<(), String> {
        Ok(())
    }

    /// Additional stake a continuation commits (blackjack double)
    fn extra_stake(&self, _action: &str, _stake: f64) -> f64 {
        0.0
    }

    fn supports_cash_out(&self) -> bool {
        false
    }

    /// Payload counter that must be positive before cashing out
    fn progress_field(&self) -> Option<&'static str> {
        None
    }

    /// How long the outcome is revealed before the round settles
    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        None
    }

    /// One player-facing line for a successful step
    fn summarize(&self, request: &RoundRequest, step: &RoundStep, outcome: &RoundOutcome) -> Notification;
}

/// Request for the generic bet endpoint
pub(crate) fn generic_call(request: &RoundRequest, game_data: Parameters) -> BetCall {
    let body = BetRequestBody::new(request, game_data);
    BetCall {
        path: routes::BET.to_string(),
        body: serde_json::to_value(body).unwrap_or(Value::Null),
    }
}

/// Game data for generic multi-step games: `{action, ...fields, game_state}`
pub(crate) fn action_data(action: &str, fields: &Parameters, token: Option<&Value>) -> Parameters {
    let mut data = Parameters::new();
    data.insert("action".to_string(), json!(action));
    for (key, value) in fields {
        data.insert(key.clone(), value.clone());
    }
    if let Some(token) = token {
        data.insert("game_state".to_string(), token.clone());
    }
    data
}

/// Request for a dedicated per-action endpoint
pub(crate) fn dedicated_call(game: GameType, action: &str, body: Value) -> BetCall {
    BetCall {
        path: routes::game_action(game, action),
        body,
    }
}

/// Win/loss summary used by the instant games
pub(crate) fn win_loss(outcome: &RoundOutcome, win: impl FnOnce(f64) -> String, loss: impl FnOnce() -> String) -> Notification {
    let winnings = outcome.winnings_amount();
    if winnings > 0.0 {
        Notification::success(win(winnings))
            .with_sound(SoundCue::Win)
            .with_haptic()
    } else {
        Notification::info(loss()).with_sound(SoundCue::Lose)
    }
}

pub(crate) fn money(amount: f64) -> String {
    format_money(amount)
}

/// Display helper for payload values that may be numbers or strings
pub(crate) fn shown(outcome: &RoundOutcome, key: &str) -> String {
    match outcome.result_field(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
        None => "?".to_string(),
    }
}
