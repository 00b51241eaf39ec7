//! Backend endpoint paths
//!
//! Paths are relative so they resolve under the configured base URL.

use crate::games::types::GameType;

/// Generic bet endpoint shared by most games
pub const BET: &str = "api/game/bet";

/// Balance query
pub const USER_BALANCE: &str = "api/user/balance";

/// Dedicated per-action endpoint, e.g. `api/blackjack/hit`
pub fn game_action(game: GameType, action: &str) -> String {
    format!("api/{}/{}", game, action)
}
