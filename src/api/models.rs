//! Wire models for the betting backend

use crate::common::types::{Parameters, RoundRequest};
use crate::games::types::GameType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A fully built request: where to POST and what to send
#[derive(Debug, Clone, PartialEq)]
pub struct BetCall {
    pub path: String,
    pub body: Value,
}

/// Body of the generic bet endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BetRequestBody {
    pub user_id: String,
    pub game_type: GameType,
    pub bet_amount: f64,
    pub game_data: Parameters,
}

impl BetRequestBody {
    pub fn new(request: &RoundRequest, game_data: Parameters) -> Self {
        Self {
            user_id: request.user_id.clone(),
            game_type: request.game_type,
            bet_amount: request.stake,
            game_data,
        }
    }
}

/// Body of the balance query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceRequest {
    pub user_id: String,
}

/// Balance query response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
