//! Betround CLI
//!
//! Plays one round of any game against a backend, for manual testing.

use betround::common::config::{ClientConfig, ConfigLoader};
use betround::common::traits::OutcomeDisplay;
use betround::common::types::{format_money, Parameters, RoundOutcome, RoundStep};
use betround::games::types::{
    to_parameters, CoinChoice, CoinFlipParams, CrashParams, MinesParams, PlinkoParams, RiskLevel, RollParams,
    RouletteBet, RouletteParams, TowerDifficulty, TowerParams, WheelParams,
};
use betround::{BetRoundController, BetRoundResult, GameType, Notification, NotificationSink, Session, Severity, StatsStore, UserIdentity};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "betround")]
#[command(about = "Play casino bet rounds against a betting backend", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Player id
    #[arg(long)]
    user_id: Option<String>,

    /// Settle immediately without waiting out reveal animations
    #[arg(long)]
    skip_reveal: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the player's balance
    Balance,
    /// Show local win/loss statistics
    Stats,
    Coinflip {
        #[arg(long)]
        stake: f64,
        #[arg(long, default_value = "heads")]
        choice: CoinChoice,
    },
    Crash {
        #[arg(long)]
        stake: f64,
        /// Auto cash-out multiplier
        #[arg(long, default_value_t = 2.0)]
        target: f64,
    },
    Plinko {
        #[arg(long)]
        stake: f64,
        #[arg(long, default_value = "medium")]
        risk: RiskLevel,
        #[arg(long, default_value_t = 16)]
        rows: u32,
    },
    Roll {
        #[arg(long)]
        stake: f64,
        #[arg(long, default_value_t = 50.0)]
        target: f64,
        /// Win when the roll is over the target
        #[arg(long)]
        over: bool,
    },
    Roulette {
        #[arg(long)]
        stake: f64,
        /// Bet as TYPE=AMOUNT:PAYOUT, e.g. red=5:2 (repeatable)
        #[arg(long = "bet", value_parser = parse_roulette_bet, required = true)]
        bets: Vec<(String, RouletteBet)>,
    },
    Wheel {
        #[arg(long)]
        stake: f64,
        #[arg(long, default_value = "medium")]
        risk: RiskLevel,
    },
    Mines {
        #[arg(long)]
        stake: f64,
        #[arg(long, default_value_t = 3)]
        mines: u32,
        /// Cell to reveal, 0-24 (repeatable)
        #[arg(long = "reveal")]
        cells: Vec<u32>,
        #[arg(long)]
        cash_out: bool,
    },
    Tower {
        #[arg(long)]
        stake: f64,
        #[arg(long, default_value = "medium")]
        difficulty: TowerDifficulty,
        /// Block to pick on each level from the bottom (repeatable)
        #[arg(long = "pick")]
        picks: Vec<u32>,
        #[arg(long)]
        cash_out: bool,
    },
    Blackjack {
        #[arg(long)]
        stake: f64,
        /// Actions after the deal: hit, stand or double (repeatable)
        #[arg(long = "action")]
        actions: Vec<String>,
    },
    Poker {
        #[arg(long)]
        stake: f64,
    },
    Lottery {
        #[arg(long)]
        stake: f64,
        /// Six different numbers from 1 to 49
        #[arg(long, value_delimiter = ',')]
        numbers: Vec<u32>,
    },
}

fn parse_roulette_bet(raw: &str) -> Result<(String, RouletteBet), String> {
    let (bet_type, rest) = raw.split_once('=').ok_or("expected TYPE=AMOUNT:PAYOUT")?;
    let (amount, payout) = rest.split_once(':').ok_or("expected TYPE=AMOUNT:PAYOUT")?;
    Ok((
        bet_type.to_string(),
        RouletteBet {
            amount: amount.parse().map_err(|_| format!("invalid amount '{}'", amount))?,
            payout: payout.parse().map_err(|_| format!("invalid payout '{}'", payout))?,
        },
    ))
}

/// Prints notifications to the terminal
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: Notification) {
        let marker = match notification.severity {
            Severity::Success => "✅",
            Severity::Error => "❌",
            Severity::Info => "ℹ️ ",
        };
        println!("{} {}", marker, notification.message);
    }
}

/// Prints the server's own message for each outcome
struct ConsoleDisplay;

impl OutcomeDisplay for ConsoleDisplay {
    fn present(&self, game: GameType, step: &RoundStep, outcome: &RoundOutcome) {
        if let Some(message) = outcome.message() {
            println!("   [{} {}] {}", game, step.label(), message);
        }
    }
}

fn load_config(args: &Args) -> BetRoundResult<ClientConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::new().with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load()?;
    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
    if args.skip_reveal {
        config.timing.skip_reveal = true;
    }
    betround::common::config::validate(&config)?;
    Ok(config)
}

/// Single-step game selection: (game, stake, parameters)
fn instant_round(command: &Command) -> Option<(GameType, f64, Parameters)> {
    let round = match command {
        Command::Coinflip { stake, choice } => (GameType::CoinFlip, *stake, to_parameters(&CoinFlipParams { choice: *choice })),
        Command::Crash { stake, target } => (
            GameType::Crash,
            *stake,
            to_parameters(&CrashParams {
                target_multiplier: *target,
            }),
        ),
        Command::Plinko { stake, risk, rows } => (
            GameType::Plinko,
            *stake,
            to_parameters(&PlinkoParams { risk: *risk, rows: *rows }),
        ),
        Command::Roll { stake, target, over } => (
            GameType::Roll,
            *stake,
            to_parameters(&RollParams {
                target_number: *target,
                roll_under: !*over,
            }),
        ),
        Command::Roulette { stake, bets } => (
            GameType::Roulette,
            *stake,
            to_parameters(&RouletteParams {
                bets: bets.iter().cloned().collect::<BTreeMap<_, _>>(),
            }),
        ),
        Command::Wheel { stake, risk } => (GameType::Wheel, *stake, to_parameters(&WheelParams { risk: *risk })),
        _ => return None,
    };
    Some(round)
}

fn fields(value: serde_json::Value) -> Parameters {
    value.as_object().cloned().unwrap_or_default()
}

/// Run a round to completion, returning the last outcome if the round ended
async fn play(controller: &BetRoundController, command: &Command) -> Option<RoundOutcome> {
    if let Some((_, stake, parameters)) = instant_round(command) {
        return controller.submit_round(stake, parameters).await.ok();
    }

    let (stake, parameters, continuations, cash_out): (f64, Parameters, Vec<(&str, Parameters)>, bool) = match command {
        Command::Mines {
            stake,
            mines,
            cells,
            cash_out,
        } => (
            *stake,
            to_parameters(&MinesParams { mines_count: *mines }),
            cells.iter().map(|cell| ("reveal", fields(json!({ "cell_index": cell })))).collect(),
            *cash_out,
        ),
        Command::Tower {
            stake,
            difficulty,
            picks,
            cash_out,
        } => (
            *stake,
            to_parameters(&TowerParams {
                difficulty: *difficulty,
            }),
            picks
                .iter()
                .enumerate()
                .map(|(level, block)| ("select", fields(json!({ "level": level, "block": block }))))
                .collect(),
            *cash_out,
        ),
        Command::Blackjack { stake, actions } => (
            *stake,
            Parameters::new(),
            actions.iter().map(|action| (action.as_str(), Parameters::new())).collect(),
            false,
        ),
        Command::Poker { stake } => (*stake, Parameters::new(), vec![("finish", Parameters::new())], false),
        Command::Lottery { stake, numbers } => (
            *stake,
            Parameters::new(),
            vec![
                ("select", fields(json!({ "numbers": numbers }))),
                ("draw", Parameters::new()),
            ],
            false,
        ),
        _ => return None,
    };

    let mut last = controller.submit_round(stake, parameters).await.ok()?;
    for (action, extra) in continuations {
        if controller.active_round().is_none() {
            break;
        }
        last = controller.continue_round(action, extra).await.ok()?;
    }
    if cash_out && controller.is_cashable() {
        last = controller.cash_out().await.ok()?;
    }
    if controller.active_round().is_some() {
        warn!("Round left open; no further actions given");
        return None;
    }
    Some(last)
}

fn game_of(command: &Command) -> Option<GameType> {
    match command {
        Command::Balance | Command::Stats => None,
        Command::Mines { .. } => Some(GameType::Mines),
        Command::Tower { .. } => Some(GameType::Tower),
        Command::Blackjack { .. } => Some(GameType::Blackjack),
        Command::Poker { .. } => Some(GameType::Poker),
        Command::Lottery { .. } => Some(GameType::Lottery),
        other => instant_round(other).map(|(game, _, _)| game),
    }
}

fn stake_of(command: &Command) -> f64 {
    match command {
        Command::Mines { stake, .. }
        | Command::Tower { stake, .. }
        | Command::Blackjack { stake, .. }
        | Command::Poker { stake }
        | Command::Lottery { stake, .. } => *stake,
        other => instant_round(other).map(|(_, stake, _)| stake).unwrap_or(0.0),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "betround=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Command::Stats = args.command {
        let stats = StatsStore::open(&config.stats.path)?;
        for (game, tally) in stats.games() {
            println!(
                "{:<10} rounds {:>4}  wins {:>4}  win rate {:>5.1}%  net {}",
                game,
                tally.rounds,
                tally.wins,
                tally.win_rate() * 100.0,
                format_money(tally.net())
            );
        }
        return Ok(());
    }

    let identity = UserIdentity::resolve(args.user_id.as_deref(), &config)?;
    let session = Session::connect(config, identity, Arc::new(ConsoleSink))?.with_display(Arc::new(ConsoleDisplay));
    let user = session.load_user().await?;
    println!("💰 Balance: {}", format_money(user.balance));

    let Some(game) = game_of(&args.command) else {
        return Ok(());
    };

    let controller = session.open_game(game);
    info!("Playing {} as user {}", game, session.user_id());
    let finished = play(&controller, &args.command).await;

    if let (Some(outcome), true) = (&finished, session.config().stats.enabled) {
        let mut stats = StatsStore::open(&session.config().stats.path)?;
        stats.record(game, stake_of(&args.command), outcome, Utc::now());
        stats.save()?;
    }

    println!("💰 Balance: {}", format_money(session.balance().balance()));
    Ok(())
}
