//! Seams between the round controller and its collaborators
//!
//! The backend, the balance source and the presentation layer are all
//! reached through these traits so the controller can be driven by a
//! scripted backend in tests.

use crate::api::client::TransportError;
use crate::api::models::BetCall;
use crate::common::types::{RoundOutcome, RoundStep};
use crate::games::types::GameType;
use async_trait::async_trait;

/// Sends bet requests to the backend
#[async_trait]
pub trait BetTransport: Send + Sync {
    /// Issue one bet request and return the decoded response envelope.
    ///
    /// A response with `success: false` is still `Ok`; only transport and
    /// decoding failures are errors.
    async fn send_bet(&self, call: &BetCall) -> Result<RoundOutcome, TransportError>;
}

/// Reads the authoritative balance for a player
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn fetch_balance(&self, user_id: &str) -> Result<f64, TransportError>;
}

/// Receives every successful outcome for rendering
pub trait OutcomeDisplay: Send + Sync {
    fn present(&self, game: GameType, step: &RoundStep, outcome: &RoundOutcome);
}

/// Display that renders nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDisplay;

impl OutcomeDisplay for NoopDisplay {
    fn present(&self, _game: GameType, _step: &RoundStep, _outcome: &RoundOutcome) {}
}
