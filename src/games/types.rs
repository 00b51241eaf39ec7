use crate::common::types::Parameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    CoinFlip,
    Crash,
    Blackjack,
    Mines,
    Plinko,
    Poker,
    Roll,
    Roulette,
    Tower,
    Wheel,
    Lottery,
}

impl GameType {
    pub const ALL: [GameType; 11] = [
        GameType::CoinFlip,
        GameType::Crash,
        GameType::Blackjack,
        GameType::Mines,
        GameType::Plinko,
        GameType::Poker,
        GameType::Roll,
        GameType::Roulette,
        GameType::Tower,
        GameType::Wheel,
        GameType::Lottery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::CoinFlip => "coinflip",
            GameType::Crash => "crash",
            GameType::Blackjack => "blackjack",
            GameType::Mines => "mines",
            GameType::Plinko => "plinko",
            GameType::Poker => "poker",
            GameType::Roll => "roll",
            GameType::Roulette => "roulette",
            GameType::Tower => "tower",
            GameType::Wheel => "wheel",
            GameType::Lottery => "lottery",
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        GameType::ALL
            .into_iter()
            .find(|game| game.as_str() == needle)
            .ok_or_else(|| format!("unknown game '{}'", s))
    }
}

/// Coin flip choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoinChoice {
    Heads,
    Tails,
}

impl fmt::Display for CoinChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinChoice::Heads => write!(f, "heads"),
            CoinChoice::Tails => write!(f, "tails"),
        }
    }
}

impl FromStr for CoinChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heads" => Ok(CoinChoice::Heads),
            "tails" => Ok(CoinChoice::Tails),
            other => Err(format!("expected heads or tails, got '{}'", other)),
        }
    }
}

/// Risk tier for plinko and wheel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => Err(format!("expected low, medium or high, got '{}'", other)),
        }
    }
}

/// Tower difficulty (blocks per level: easy 2, medium 3, hard 4)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TowerDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl TowerDifficulty {
    pub fn blocks_per_level(&self) -> u64 {
        match self {
            TowerDifficulty::Easy => 2,
            TowerDifficulty::Medium => 3,
            TowerDifficulty::Hard => 4,
        }
    }
}

impl FromStr for TowerDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(TowerDifficulty::Easy),
            "medium" => Ok(TowerDifficulty::Medium),
            "hard" => Ok(TowerDifficulty::Hard),
            other => Err(format!("expected easy, medium or hard, got '{}'", other)),
        }
    }
}

/// Chips placed on one roulette bet cell
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RouletteBet {
    pub amount: f64,
    pub payout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinFlipParams {
    pub choice: CoinChoice,
}

/// Auto cash-out target for crash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrashParams {
    pub target_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlinkoParams {
    pub risk: RiskLevel,
    pub rows: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RollParams {
    pub target_number: f64,
    pub roll_under: bool,
}

/// Bets keyed by cell (`red`, `odd`, `number_17`...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouletteParams {
    pub bets: BTreeMap<String, RouletteBet>,
}

impl RouletteParams {
    pub fn total(&self) -> f64 {
        self.bets.values().map(|bet| bet.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WheelParams {
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MinesParams {
    pub mines_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TowerParams {
    pub difficulty: TowerDifficulty,
}

/// Convert typed game parameters into the request mapping
pub fn to_parameters<T: Serialize>(params: &T) -> Parameters {
    match serde_json::to_value(params) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => Parameters::new(),
    }
}

/// Read typed game parameters back out of a request mapping
pub fn from_parameters<T: serde::de::DeserializeOwned>(parameters: &Parameters) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::Object(parameters.clone())).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_names_round_trip() {
        for game in GameType::ALL {
            assert_eq!(game.as_str().parse::<GameType>().unwrap(), game);
            assert_eq!(serde_json::to_value(game).unwrap(), game.as_str());
        }
        assert!("slots".parse::<GameType>().is_err());
    }

    #[test]
    fn test_typed_params_become_request_fields() {
        let params = to_parameters(&RollParams {
            target_number: 49.5,
            roll_under: true,
        });
        assert_eq!(params["target_number"], 49.5);
        assert_eq!(params["roll_under"], true);

        let back: RollParams = from_parameters(&params).unwrap();
        assert!(back.roll_under);
    }

    #[test]
    fn test_roulette_total() {
        let mut bets = BTreeMap::new();
        bets.insert("red".to_string(), RouletteBet { amount: 5.0, payout: 2.0 });
        bets.insert("number_7".to_string(), RouletteBet { amount: 2.5, payout: 36.0 });
        assert_eq!(RouletteParams { bets }.total(), 7.5);
    }
}
