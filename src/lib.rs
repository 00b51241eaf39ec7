//! Betround - client-side bet round lifecycle
//!
//! One controller sequences bet rounds for every casino game: it validates
//! the stake locally, sends one authoritative request per round step, locks
//! out re-entrant actions while a request is pending and reconciles the
//! server's outcome into the cached balance and player feedback.

pub mod api;
pub mod balance;
pub mod clock;
pub mod common;
pub mod controller;
pub mod errors;
pub mod games;
pub mod notify;
pub mod session;
pub mod stats;

pub use api::{HttpTransport, TransportError};
pub use balance::{BalanceStore, RefreshHandle};
pub use clock::{Clock, InstantClock, TokioClock};
pub use common::config::{ClientConfig, ConfigLoader};
pub use common::traits::{BalanceSource, BetTransport, OutcomeDisplay};
pub use common::types::{CachedUser, Parameters, RoundOutcome, RoundRequest, RoundState, RoundStep};
pub use controller::{ActiveRound, ArmedBet, BetRoundController};
pub use errors::{BetRoundError, BetRoundResult, RoundError};
pub use games::{adapter_for, GameAdapter, GameType};
pub use notify::{FanoutSink, Notification, NotificationSink, RecordingSink, Severity, SoundCue, ToastBoard, TracingSink};
pub use session::{Session, UserIdentity};
pub use stats::StatsStore;
