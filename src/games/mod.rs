pub mod adapter;
pub mod instant;
pub mod multi_step;
pub mod types;

pub use adapter::GameAdapter;
pub use instant::{CoinFlipGame, CrashGame, PlinkoGame, RollGame, RouletteGame, WheelGame};
pub use multi_step::{BlackjackGame, LotteryGame, MinesGame, PokerGame, TowerGame};
pub use types::*;

use crate::common::config::TimingConfig;
use std::sync::Arc;

/// Adapter for `game`, with reveal timing taken from `timing`
pub fn adapter_for(game: GameType, timing: &TimingConfig) -> Arc<dyn GameAdapter> {
    match game {
        GameType::CoinFlip => Arc::new(CoinFlipGame::new(timing.reveal_for(game, CoinFlipGame::DEFAULT_REVEAL))),
        GameType::Crash => Arc::new(CrashGame::new(timing.reveal_for(game, CrashGame::DEFAULT_REVEAL))),
        GameType::Plinko => Arc::new(PlinkoGame::new(timing.reveal_for(game, PlinkoGame::DEFAULT_REVEAL))),
        GameType::Roll => Arc::new(RollGame::new(timing.reveal_for(game, RollGame::DEFAULT_REVEAL))),
        GameType::Roulette => Arc::new(RouletteGame::new(timing.reveal_for(game, RouletteGame::DEFAULT_REVEAL))),
        GameType::Wheel => Arc::new(WheelGame::new(timing.reveal_for(game, WheelGame::DEFAULT_REVEAL))),
        GameType::Mines => Arc::new(MinesGame),
        GameType::Tower => Arc::new(TowerGame),
        GameType::Blackjack => Arc::new(BlackjackGame),
        GameType::Poker => Arc::new(PokerGame),
        GameType::Lottery => Arc::new(LotteryGame),
    }
}
