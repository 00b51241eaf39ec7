//! Local per-game statistics
//!
//! Win/loss tallies kept in a JSON file next to the player's config. They
//! are bookkeeping for display only; balances always come from the server.

use crate::common::types::RoundOutcome;
use crate::errors::{BetRoundResult, StorageError};
use crate::games::types::GameType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Running totals for one game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameTally {
    pub rounds: u64,
    pub wins: u64,
    pub losses: u64,
    pub total_staked: f64,
    pub total_won: f64,
    pub biggest_win: f64,
    pub last_played: Option<DateTime<Utc>>,
}

impl GameTally {
    pub fn net(&self) -> f64 {
        self.total_won - self.total_staked
    }

    pub fn win_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            self.wins as f64 / self.rounds as f64
        }
    }
}

#[derive(Debug)]
pub struct StatsStore {
    path: PathBuf,
    tallies: BTreeMap<String, GameTally>,
}

impl StatsStore {
    /// Open the stats file at `path`; a missing file starts empty
    pub fn open<P: AsRef<Path>>(path: P) -> BetRoundResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tallies = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::CorruptedData(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::ReadFailed(format!("{}: {}", path.display(), e)).into()),
        };
        Ok(Self { path, tallies })
    }

    /// Count a finished round
    pub fn record(&mut self, game: GameType, stake: f64, outcome: &RoundOutcome, at: DateTime<Utc>) {
        let winnings = outcome.winnings_amount();
        let tally = self.tallies.entry(game.as_str().to_string()).or_default();
        tally.rounds += 1;
        tally.total_staked += stake;
        tally.total_won += winnings;
        if winnings > 0.0 {
            tally.wins += 1;
            tally.biggest_win = tally.biggest_win.max(winnings);
        } else {
            tally.losses += 1;
        }
        tally.last_played = Some(at);
        debug!("Recorded {} round: stake {:.2}, winnings {:.2}", game, stake, winnings);
    }

    pub fn get(&self, game: GameType) -> Option<&GameTally> {
        self.tallies.get(game.as_str())
    }

    pub fn games(&self) -> impl Iterator<Item = (&str, &GameTally)> {
        self.tallies.iter().map(|(game, tally)| (game.as_str(), tally))
    }

    pub fn save(&self) -> BetRoundResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::WriteFailed(format!("{}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(&self.tallies)?;
        std::fs::write(&self.path, json)
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", self.path.display(), e)))?;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tallies.clear();
    }
}
