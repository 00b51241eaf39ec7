//! Games whose rounds span several requests
//!
//! Mines and tower use the generic bet endpoint with an `action` field and
//! can be cashed out part way. Blackjack, poker and lottery talk to
//! dedicated per-action endpoints. Every continuation carries the previous
//! payload back as `game_state`.

use crate::api::models::BetCall;
use crate::common::types::{Parameters, RoundOutcome, RoundRequest, RoundStep};
use crate::games::adapter::{action_data, dedicated_call, generic_call, money, shown, GameAdapter};
use crate::games::types::{from_parameters, GameType, MinesParams, TowerDifficulty, TowerParams};
use crate::notify::{Notification, SoundCue};
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn with_token(mut body: Value, token: Option<&Value>) -> Value {
    if let (Some(map), Some(token)) = (body.as_object_mut(), token) {
        map.insert("game_state".to_string(), token.clone());
    }
    body
}

/// Build a generic-endpoint call for start / continue / cashout steps
fn stepped_call(request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall {
    let data = match step {
        RoundStep::Start => action_data("start", &request.parameters, None),
        RoundStep::Continue { action, extra } => action_data(action, extra, token),
        RoundStep::CashOut => action_data("cashout", &Parameters::new(), token),
    };
    generic_call(request, data)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MinesGame;

impl MinesGame {
    pub const GRID_SIZE: u64 = 25;
}

impl GameAdapter for MinesGame {
    fn game_type(&self) -> GameType {
        GameType::Mines
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        let params: MinesParams = from_parameters(parameters)?;
        if params.mines_count == 0 || u64::from(params.mines_count) >= Self::GRID_SIZE {
            return Err(format!("Mines must be between 1 and {}", Self::GRID_SIZE - 1));
        }
        Ok(())
    }

    fn build_call(&self, request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall {
        stepped_call(request, step, token)
    }

    fn is_multi_step(&self) -> bool {
        true
    }

    fn continuation_actions(&self) -> &'static [&'static str] {
        &["reveal"]
    }

    fn validate_continuation(&self, _action: &str, extra: &Parameters, _token: Option<&Value>) -> Result<(), String> {
        match extra.get("cell_index").and_then(Value::as_u64) {
            Some(cell) if cell < Self::GRID_SIZE => Ok(()),
            _ => Err(format!("cell_index must be below {}", Self::GRID_SIZE)),
        }
    }

    fn supports_cash_out(&self) -> bool {
        true
    }

    fn progress_field(&self) -> Option<&'static str> {
        Some("gems_found")
    }

    fn summarize(&self, request: &RoundRequest, step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        match step {
            RoundStep::Start => Notification::info("💎 Find gems and avoid mines!"),
            RoundStep::Continue { .. } if outcome.result_bool("hit_mine") == Some(true) => {
                Notification::error(format!("💥 BOOM! You hit a mine! Lost {}", money(request.stake)))
                    .with_sound(SoundCue::Explosion)
                    .with_haptic()
            }
            RoundStep::Continue { .. } if outcome.round_over() => {
                Notification::success(format!("🎉 All gems found! Won {}!", money(outcome.winnings_amount())))
                    .with_sound(SoundCue::Jackpot)
                    .with_haptic()
            }
            RoundStep::Continue { .. } => {
                let multiplier = outcome.result_f64("multiplier").unwrap_or(1.0);
                Notification::success(format!("💎 Gem found! Multiplier: {:.2}x", multiplier))
                    .with_sound(SoundCue::SafeClick)
            }
            RoundStep::CashOut => {
                Notification::success(format!("💰 Cashed out! Won {}!", money(outcome.winnings_amount())))
                    .with_sound(SoundCue::Win)
                    .with_haptic()
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TowerGame;

impl TowerGame {
    pub const LEVELS: u64 = 10;
}

impl GameAdapter for TowerGame {
    fn game_type(&self) -> GameType {
        GameType::Tower
    }

    fn validate(&self, _stake: f64, parameters: &Parameters) -> Result<(), String> {
        from_parameters::<TowerParams>(parameters).map(|_| ())
    }

    fn build_call(&self, request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall {
        stepped_call(request, step, token)
    }

    fn is_multi_step(&self) -> bool {
        true
    }

    fn continuation_actions(&self) -> &'static [&'static str] {
        &["select"]
    }

    /// Only the level above the last cleared one may be picked. The token's
    /// `level` counts cleared levels and is absent before the first pick.
    fn validate_continuation(&self, _action: &str, extra: &Parameters, token: Option<&Value>) -> Result<(), String> {
        let level = extra.get("level").and_then(Value::as_u64);
        let block = extra.get("block").and_then(Value::as_u64);
        let level = match (level, block) {
            (Some(level), Some(block)) if level < Self::LEVELS && block < TowerDifficulty::Hard.blocks_per_level() => level,
            _ => {
                return Err(format!(
                    "select needs a level below {} and a block below {}",
                    Self::LEVELS,
                    TowerDifficulty::Hard.blocks_per_level()
                ))
            }
        };
        let current = token.and_then(|token| token.get("level")).and_then(Value::as_u64).unwrap_or(0);
        if level != current {
            return Err(format!("Pick a block on level {}", current + 1));
        }
        Ok(())
    }

    fn supports_cash_out(&self) -> bool {
        true
    }

    fn progress_field(&self) -> Option<&'static str> {
        Some("level")
    }

    fn summarize(&self, request: &RoundRequest, step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let level = shown(outcome, "level");
        match step {
            RoundStep::Start => Notification::info("🏗️ Start climbing! Pick a safe block."),
            RoundStep::Continue { .. } if outcome.round_over() && outcome.winnings_amount() > 0.0 => {
                Notification::success(format!("🎉 You reached the top! Won {}!", money(outcome.winnings_amount())))
                    .with_sound(SoundCue::Jackpot)
                    .with_haptic()
            }
            RoundStep::Continue { .. } if outcome.round_over() => {
                Notification::error(format!("💥 The block gave way! Lost {}", money(request.stake)))
                    .with_sound(SoundCue::Fall)
                    .with_haptic()
            }
            RoundStep::Continue { .. } => {
                Notification::success(format!("✅ Safe! Now on level {}", level)).with_sound(SoundCue::Climb)
            }
            RoundStep::CashOut => Notification::success(format!(
                "💰 Cashed out at level {}! Won {}!",
                level,
                money(outcome.winnings_amount())
            ))
            .with_sound(SoundCue::Win)
            .with_haptic(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BlackjackGame;

impl GameAdapter for BlackjackGame {
    fn game_type(&self) -> GameType {
        GameType::Blackjack
    }

    fn build_call(&self, request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall {
        match step {
            RoundStep::Start => dedicated_call(
                GameType::Blackjack,
                "deal",
                json!({"user_id": request.user_id, "bet_amount": request.stake}),
            ),
            // double goes through the generic endpoint with the running state
            RoundStep::Continue { action, extra } if action == "double" => {
                generic_call(request, action_data(action, extra, token))
            }
            RoundStep::Continue { action, .. } => dedicated_call(
                GameType::Blackjack,
                action,
                with_token(json!({"user_id": request.user_id}), token),
            ),
            // Never sent: no cash-out for this game, the controller answers NotCashable
            RoundStep::CashOut => dedicated_call(
                GameType::Blackjack,
                "stand",
                with_token(json!({"user_id": request.user_id}), token),
            ),
        }
    }

    fn is_multi_step(&self) -> bool {
        true
    }

    fn continuation_actions(&self) -> &'static [&'static str] {
        &["hit", "stand", "double"]
    }

    fn extra_stake(&self, action: &str, stake: f64) -> f64 {
        if action == "double" {
            stake
        } else {
            0.0
        }
    }

    fn summarize(&self, request: &RoundRequest, _step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        let winnings = outcome.winnings_amount();
        match outcome.result_str("result") {
            Some("blackjack") => Notification::success(format!("🃏 BLACKJACK! You won {}!", money(winnings)))
                .with_sound(SoundCue::Blackjack)
                .with_haptic(),
            Some("push") => Notification::info("🤝 Push! Your bet is returned."),
            Some("bust") => Notification::error(format!("💥 Bust! You lost {}", money(request.stake)))
                .with_sound(SoundCue::Bust),
            Some("dealer_win") => {
                Notification::error(format!("Dealer wins. You lost {}", money(request.stake))).with_sound(SoundCue::Lose)
            }
            Some(_) if winnings > 0.0 => Notification::success(format!("🎉 You won {}!", money(winnings)))
                .with_sound(SoundCue::Win)
                .with_haptic(),
            _ => {
                let total = outcome
                    .result_field("player_value")
                    .or_else(|| outcome.result_field("player_total"))
                    .map(Value::to_string)
                    .unwrap_or_else(|| "?".to_string());
                Notification::info(format!("Your total: {}. Hit or Stand?", total))
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PokerGame;

impl PokerGame {
    fn hand_name(outcome: &RoundOutcome, key: &str) -> String {
        outcome
            .result_field(key)
            .and_then(|rank| rank.get(1))
            .and_then(Value::as_str)
            .unwrap_or("a hand")
            .to_string()
    }
}

impl GameAdapter for PokerGame {
    fn game_type(&self) -> GameType {
        GameType::Poker
    }

    fn build_call(&self, request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall {
        match step {
            RoundStep::Start => dedicated_call(
                GameType::Poker,
                "start",
                json!({"user_id": request.user_id, "bet_amount": request.stake}),
            ),
            RoundStep::Continue { action, .. } => dedicated_call(
                GameType::Poker,
                action,
                with_token(json!({"user_id": request.user_id}), token),
            ),
            // Never sent: no cash-out for this game, the controller answers NotCashable
            RoundStep::CashOut => dedicated_call(
                GameType::Poker,
                "finish",
                with_token(json!({"user_id": request.user_id}), token),
            ),
        }
    }

    fn is_multi_step(&self) -> bool {
        true
    }

    fn continuation_actions(&self) -> &'static [&'static str] {
        &["finish"]
    }

    fn summarize(&self, _request: &RoundRequest, step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        if matches!(step, RoundStep::Start) && !outcome.round_over() {
            return Notification::info("🃏 Cards dealt. Finish the hand when ready.");
        }
        let player = Self::hand_name(outcome, "player_hand_rank");
        let dealer = Self::hand_name(outcome, "dealer_hand_rank");
        match outcome.result_str("result") {
            Some("win") => Notification::success(format!(
                "You win! {} beats {}. Winnings: {}",
                player,
                dealer,
                money(outcome.winnings_amount())
            ))
            .with_sound(SoundCue::Win)
            .with_haptic(),
            Some("lose") => {
                Notification::info(format!("You lose! {} beats {}.", dealer, player)).with_sound(SoundCue::Lose)
            }
            _ => Notification::info(format!("It's a tie! Both have {}. Bet returned.", player)),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LotteryGame;

impl LotteryGame {
    pub const PICKS: usize = 6;
    pub const HIGHEST: u64 = 49;
}

impl GameAdapter for LotteryGame {
    fn game_type(&self) -> GameType {
        GameType::Lottery
    }

    fn build_call(&self, request: &RoundRequest, step: &RoundStep, token: Option<&Value>) -> BetCall {
        match step {
            RoundStep::Start => dedicated_call(
                GameType::Lottery,
                "start",
                json!({"user_id": request.user_id, "bet_amount": request.stake}),
            ),
            RoundStep::Continue { action, extra } => {
                let mut body = json!({"user_id": request.user_id});
                if let (Some(map), Some(numbers)) = (body.as_object_mut(), extra.get("numbers")) {
                    map.insert("numbers".to_string(), numbers.clone());
                }
                dedicated_call(GameType::Lottery, action, with_token(body, token))
            }
            // Never sent: no cash-out for this game, the controller answers NotCashable
            RoundStep::CashOut => dedicated_call(
                GameType::Lottery,
                "draw",
                with_token(json!({"user_id": request.user_id}), token),
            ),
        }
    }

    fn is_multi_step(&self) -> bool {
        true
    }

    fn continuation_actions(&self) -> &'static [&'static str] {
        &["select", "draw"]
    }

    fn validate_continuation(&self, action: &str, extra: &Parameters, _token: Option<&Value>) -> Result<(), String> {
        if action != "select" {
            return Ok(());
        }
        let picks: Vec<u64> = extra
            .get("numbers")
            .and_then(Value::as_array)
            .map(|numbers| numbers.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        let distinct: BTreeSet<u64> = picks.iter().copied().collect();
        if picks.len() != Self::PICKS
            || distinct.len() != Self::PICKS
            || distinct.iter().any(|n| *n == 0 || *n > Self::HIGHEST)
        {
            return Err(format!(
                "Please select exactly {} different numbers from 1 to {}",
                Self::PICKS,
                Self::HIGHEST
            ));
        }
        Ok(())
    }

    fn summarize(&self, _request: &RoundRequest, step: &RoundStep, outcome: &RoundOutcome) -> Notification {
        match step {
            RoundStep::Start => Notification::info(format!("🎟️ Ticket bought. Pick {} numbers.", Self::PICKS)),
            RoundStep::Continue { action, .. } if action == "select" && !outcome.round_over() => {
                Notification::info("Numbers locked in. Ready to draw!")
            }
            _ => {
                let matches = outcome.result_f64("matches").unwrap_or(0.0) as u64;
                if matches > 0 {
                    Notification::success(format!(
                        "Congratulations! You matched {} numbers! Winnings: {}",
                        matches,
                        money(outcome.winnings_amount())
                    ))
                    .with_sound(SoundCue::Win)
                    .with_haptic()
                } else {
                    Notification::info("No matches this time. Better luck next draw!").with_sound(SoundCue::Lose)
                }
            }
        }
    }
}
