//! Single-request games with an animated reveal
//!
//! Coinflip, crash, plinko, roll, roulette and wheel settle in one request
//! to the generic bet endpoint. Each holds the outcome in `Settling` for its
//! reveal animation before the round returns to idle.

use crate::api::models::BetCall;
use crate::common::types::{Parameters, RoundOutcome, RoundRequest, RoundStep};
use crate::games::adapter::{generic_call, money, shown, win_loss, GameAdapter};
use crate::games::types::{
    from_parameters, CoinFlipParams, CrashParams, GameType, PlinkoParams, RollParams, RouletteParams,
    WheelParams,
};
use crate::notify::{Notification, SoundCue};
use serde_json::Value;
use std::time::Duration;

fn reveal_for(delay: Duration) -> Option<Duration> {
    (!delay.is_zero()).then_some(delay)
}

pub struct CoinFlipGame {
    reveal: Duration,
}

impl CoinFlipGame {
    pub const DEFAULT_REVEAL: Duration = Duration::from_millis(2000);

    pub fn new(reveal: Duration) -> Self {
        Self { reveal }
    }
}

impl Default for CoinFlipGame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REVEAL)
    }
}

impl GameAdapter for CoinFlipGame {
    fn game_type(&self) -> GameType {
        GameType::CoinFlip
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        from_parameters::<CoinFlipParams>(parameters)
            .map(|_| ())
            .map_err(|_| "Please select heads or tails".to_string())
    }

    fn build_call(&self, request: &RoundRequest, _step: &RoundStep, _token: Option<&Value>) -> BetCall {
        generic_call(request, request.parameters.clone())
    }

    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        reveal_for(self.reveal)
    }

    fn summarize(&self, _request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let landed = shown(outcome, "result");
        win_loss(
            outcome,
            |won| format!("🎉 It landed on {}! You won {}!", landed, money(won)),
            || format!("😔 It landed on {}. Better luck next time!", landed),
        )
    }
}

pub struct CrashGame {
    reveal: Duration,
}

impl CrashGame {
    pub const DEFAULT_REVEAL: Duration = Duration::from_millis(3000);
    pub const MIN_TARGET: f64 = 1.01;

    pub fn new(reveal: Duration) -> Self {
        Self { reveal }
    }
}

impl Default for CrashGame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REVEAL)
    }
}

impl GameAdapter for CrashGame {
    fn game_type(&self) -> GameType {
        GameType::Crash
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        let params: CrashParams = from_parameters(parameters)?;
        if !params.target_multiplier.is_finite() || params.target_multiplier < Self::MIN_TARGET {
            return Err(format!("Auto cashout must be at least {}x", Self::MIN_TARGET));
        }
        Ok(())
    }

    fn build_call(&self, request: &RoundRequest, _step: &RoundStep, _token: Option<&Value>) -> BetCall {
        generic_call(request, request.parameters.clone())
    }

    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        reveal_for(self.reveal)
    }

    fn summarize(&self, request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let target = outcome
            .result_f64("cash_out_at")
            .or_else(|| request.parameters.get("target_multiplier").and_then(Value::as_f64))
            .unwrap_or(CrashGame::MIN_TARGET);
        let crash_point = shown(outcome, "crash_point");
        let notification = win_loss(
            outcome,
            |won| format!("🚀 Cashed out at {:.2}x! Won {}", target, money(won)),
            || format!("💥 Crashed at {}x before your cash out at {:.2}x", crash_point, target),
        );
        if outcome.winnings_amount() > 0.0 {
            notification
        } else {
            notification.with_sound(SoundCue::Crash)
        }
    }
}

pub struct PlinkoGame {
    reveal: Duration,
}

impl PlinkoGame {
    pub const DEFAULT_REVEAL: Duration = Duration::from_millis(3000);
    pub const ROWS: std::ops::RangeInclusive<u32> = 8..=16;

    pub fn new(reveal: Duration) -> Self {
        Self { reveal }
    }
}

impl Default for PlinkoGame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REVEAL)
    }
}

impl GameAdapter for PlinkoGame {
    fn game_type(&self) -> GameType {
        GameType::Plinko
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        let params: PlinkoParams = from_parameters(parameters)?;
        if !Self::ROWS.contains(&params.rows) {
            return Err(format!(
                "Rows must be between {} and {}",
                Self::ROWS.start(),
                Self::ROWS.end()
            ));
        }
        Ok(())
    }

    fn build_call(&self, request: &RoundRequest, _step: &RoundStep, _token: Option<&Value>) -> BetCall {
        generic_call(request, request.parameters.clone())
    }

    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        reveal_for(self.reveal)
    }

    fn summarize(&self, _request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let multiplier = shown(outcome, "multiplier");
        win_loss(
            outcome,
            |won| format!("🎯 Ball landed on {}x! Won {}", multiplier, money(won)),
            || format!("Ball landed on {}x", multiplier),
        )
    }
}

pub struct RollGame {
    reveal: Duration,
}

impl RollGame {
    pub const DEFAULT_REVEAL: Duration = Duration::from_millis(1500);

    pub fn new(reveal: Duration) -> Self {
        Self { reveal }
    }
}

impl Default for RollGame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REVEAL)
    }
}

impl GameAdapter for RollGame {
    fn game_type(&self) -> GameType {
        GameType::Roll
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        let params: RollParams = from_parameters(parameters)?;
        // win chance must stay strictly between 0% and 100%
        if !(params.target_number > 1.0 && params.target_number < 99.0) {
            return Err("Target must be between 1 and 99".to_string());
        }
        Ok(())
    }

    fn build_call(&self, request: &RoundRequest, _step: &RoundStep, _token: Option<&Value>) -> BetCall {
        generic_call(request, request.parameters.clone())
    }

    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        reveal_for(self.reveal)
    }

    fn summarize(&self, _request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let roll = shown(outcome, "roll");
        win_loss(
            outcome,
            |won| format!("🎲 Rolled {}! Won {}", roll, money(won)),
            || format!("🎲 Rolled {}. Better luck next time!", roll),
        )
    }
}

pub struct RouletteGame {
    reveal: Duration,
}

impl RouletteGame {
    pub const DEFAULT_REVEAL: Duration = Duration::from_millis(3000);

    pub fn new(reveal: Duration) -> Self {
        Self { reveal }
    }
}

impl Default for RouletteGame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REVEAL)
    }
}

impl GameAdapter for RouletteGame {
    fn game_type(&self) -> GameType {
        GameType::Roulette
    }

    /// The stake is the sum of all chips on the table
    fn validate(&self, stake: f64, parameters: &Parameters) -> Result<(), String> {
        let params: RouletteParams = from_parameters(parameters)?;
        if params.bets.is_empty() {
            return Err("Please place a bet first".to_string());
        }
        if params
            .bets
            .values()
            .any(|bet| !bet.amount.is_finite() || bet.amount <= 0.0)
        {
            return Err("Every bet needs a positive amount".to_string());
        }
        if (params.total() - stake).abs() > 1e-6 {
            return Err(format!(
                "Stake {} does not match chips on the table {}",
                money(stake),
                money(params.total())
            ));
        }
        Ok(())
    }

    fn build_call(&self, request: &RoundRequest, _step: &RoundStep, _token: Option<&Value>) -> BetCall {
        generic_call(request, request.parameters.clone())
    }

    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        reveal_for(self.reveal)
    }

    fn summarize(&self, _request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let number = shown(outcome, "winning_number");
        win_loss(
            outcome,
            |won| format!("🎉 Winner! Number {}! Won {}", number, money(won)),
            || format!("💸 Number {}. Better luck next time!", number),
        )
    }
}

pub struct WheelGame {
    reveal: Duration,
}

impl WheelGame {
    pub const DEFAULT_REVEAL: Duration = Duration::from_millis(4000);

    pub fn new(reveal: Duration) -> Self {
        Self { reveal }
    }
}

impl Default for WheelGame {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REVEAL)
    }
}

impl GameAdapter for WheelGame {
    fn game_type(&self) -> GameType {
        GameType::Wheel
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        from_parameters::<WheelParams>(parameters).map(|_| ())
    }

    fn build_call(&self, request: &RoundRequest, _step: &RoundStep, _token: Option<&Value>) -> BetCall {
        generic_call(request, request.parameters.clone())
    }

    fn reveal_delay(&self, _outcome: &RoundOutcome) -> Option<Duration> {
        reveal_for(self.reveal)
    }

    fn summarize(&self, _request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let multiplier = shown(outcome, "multiplier");
        win_loss(
            outcome,
            |won| format!("🎡 Wheel stopped on {}x! Won {}", multiplier, money(won)),
            || format!("🎡 Wheel stopped on segment {}", shown(outcome, "winning_segment")),
        )
    }
}
