//! Bet round lifecycle controller
//!
//! One controller drives every round of one game. It validates input
//! locally, sends exactly one backend request per round step, refuses
//! re-entrant calls while a request is pending and reconciles the server's
//! outcome into the balance cache, the display and a single notification.
//!
//! ```text
//! Idle -> Armed -> InFlight -> Settling -> Idle
//!                     |                 \-> Armed (multi-step round open)
//!                     \-> Idle / Armed on error
//! ```
//!
//! The state lives behind a `std::sync::Mutex` that is only held between
//! awaits, so the in-flight guard is decided before the first suspension
//! point and a second call fails synchronously.

use crate::api::models::BetCall;
use crate::balance::BalanceStore;
use crate::clock::{Clock, TokioClock};
use crate::common::traits::{BetTransport, NoopDisplay, OutcomeDisplay};
use crate::common::types::{Parameters, RoundOutcome, RoundRequest, RoundState, RoundStep};
use crate::errors::RoundError;
use crate::games::adapter::GameAdapter;
use crate::games::types::GameType;
use crate::notify::{Notification, NotificationSink};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stake and parameters the player committed, kept for a retry
#[derive(Debug, Clone, PartialEq)]
pub struct ArmedBet {
    pub stake: f64,
    pub parameters: Parameters,
}

/// Snapshot of an open multi-step round
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRound {
    pub round_id: Uuid,
    pub game_type: GameType,
    pub stake: f64,
    /// Previous step's payload, sent back as `game_state`
    pub token: Option<Value>,
    /// Successful non-terminal continuations so far
    pub continuations: u32,
    pub cashable: bool,
}

#[derive(Debug)]
struct OpenRound {
    id: Uuid,
    request: RoundRequest,
    token: Option<Value>,
    continuations: u32,
}

#[derive(Debug)]
struct Inner {
    state: RoundState,
    armed: Option<ArmedBet>,
    round: Option<OpenRound>,
}

impl Inner {
    fn busy(&self) -> bool {
        matches!(self.state, RoundState::InFlight | RoundState::Settling)
    }
}

/// A request that passed local checks and is about to be sent
struct Dispatch {
    request: RoundRequest,
    step: RoundStep,
    call: BetCall,
}

pub struct BetRoundController {
    adapter: Arc<dyn GameAdapter>,
    transport: Arc<dyn BetTransport>,
    balance: BalanceStore,
    sink: Arc<dyn NotificationSink>,
    display: Arc<dyn OutcomeDisplay>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl BetRoundController {
    pub fn new(
        adapter: Arc<dyn GameAdapter>,
        transport: Arc<dyn BetTransport>,
        balance: BalanceStore,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            adapter,
            transport,
            balance,
            sink,
            display: Arc::new(NoopDisplay),
            clock: Arc::new(TokioClock),
            inner: Mutex::new(Inner {
                state: RoundState::Idle,
                armed: None,
                round: None,
            }),
        }
    }

    pub fn with_display(mut self, display: Arc<dyn OutcomeDisplay>) -> Self {
        self.display = display;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn game_type(&self) -> GameType {
        self.adapter.game_type()
    }

    pub fn state(&self) -> RoundState {
        self.lock().state
    }

    /// Selection kept from the last `arm` or rejected submission
    pub fn armed(&self) -> Option<ArmedBet> {
        self.lock().armed.clone()
    }

    pub fn active_round(&self) -> Option<ActiveRound> {
        let inner = self.lock();
        let cashable = self.cashable(&inner);
        inner.round.as_ref().map(|round| ActiveRound {
            round_id: round.id,
            game_type: round.request.game_type,
            stake: round.request.stake,
            token: round.token.clone(),
            continuations: round.continuations,
            cashable,
        })
    }

    pub fn is_cashable(&self) -> bool {
        let inner = self.lock();
        self.cashable(&inner)
    }

    /// Record a stake and parameters without sending anything.
    ///
    /// Invalid input is reported and leaves the state unchanged.
    pub fn arm(&self, stake: f64, parameters: Parameters) -> Result<(), RoundError> {
        let checked = {
            let mut inner = self.lock();
            self.check_new_round(&inner, stake, &parameters).map(|()| {
                inner.armed = Some(ArmedBet { stake, parameters });
                if inner.state == RoundState::Idle {
                    inner.state = RoundState::Armed;
                }
            })
        };
        checked.map_err(|error| self.report(error))
    }

    /// Start a round with `stake`.
    ///
    /// Local checks run before any network traffic; a passing request is
    /// sent exactly once.
    pub async fn submit_round(&self, stake: f64, parameters: Parameters) -> Result<RoundOutcome, RoundError> {
        let dispatch = {
            let mut inner = self.lock();
            match self.check_new_round(&inner, stake, &parameters) {
                Ok(()) => {
                    let user_id = self.balance.get().user_id;
                    let request = RoundRequest::new(user_id, self.game_type(), stake, parameters.clone());
                    let call = self.adapter.build_call(&request, &RoundStep::Start, None);
                    inner.armed = Some(ArmedBet { stake, parameters });
                    inner.state = RoundState::InFlight;
                    Ok(Dispatch {
                        request,
                        step: RoundStep::Start,
                        call,
                    })
                }
                Err(error) => Err(error),
            }
        };

        match dispatch {
            Ok(dispatch) => self.dispatch(dispatch).await,
            Err(error) => Err(self.report(error)),
        }
    }

    /// Send a follow-up action inside the open round
    pub async fn continue_round(&self, action: &str, extra: Parameters) -> Result<RoundOutcome, RoundError> {
        let dispatch = {
            let mut inner = self.lock();
            self.check_continuation(&inner, action, &extra).map(|(request, token)| {
                let step = RoundStep::Continue {
                    action: action.to_string(),
                    extra,
                };
                let call = self.adapter.build_call(&request, &step, token.as_ref());
                inner.state = RoundState::InFlight;
                Dispatch { request, step, call }
            })
        };

        match dispatch {
            Ok(dispatch) => self.dispatch(dispatch).await,
            Err(error) => Err(self.report(error)),
        }
    }

    /// Withdraw the accumulated winnings and end the round
    pub async fn cash_out(&self) -> Result<RoundOutcome, RoundError> {
        let dispatch = {
            let mut inner = self.lock();
            self.check_cash_out(&inner).map(|(request, token)| {
                let call = self.adapter.build_call(&request, &RoundStep::CashOut, token.as_ref());
                inner.state = RoundState::InFlight;
                Dispatch {
                    request,
                    step: RoundStep::CashOut,
                    call,
                }
            })
        };

        match dispatch {
            Ok(dispatch) => self.dispatch(dispatch).await,
            Err(error) => Err(self.report(error)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_new_round(&self, inner: &Inner, stake: f64, parameters: &Parameters) -> Result<(), RoundError> {
        if inner.busy() || inner.round.is_some() {
            return Err(RoundError::RoundAlreadyInFlight);
        }
        if !stake.is_finite() || stake <= 0.0 {
            return Err(RoundError::InvalidStake);
        }
        let balance = self.balance.balance();
        if stake > balance {
            return Err(RoundError::InsufficientBalance { stake, balance });
        }
        self.adapter
            .validate(stake, parameters)
            .map_err(RoundError::InvalidParameters)
    }

    /// Returns the open round's request and token when the action may be sent
    fn check_continuation(
        &self,
        inner: &Inner,
        action: &str,
        extra: &Parameters,
    ) -> Result<(RoundRequest, Option<Value>), RoundError> {
        if inner.busy() {
            return Err(RoundError::RoundAlreadyInFlight);
        }
        let round = inner.round.as_ref().ok_or(RoundError::NoActiveRound)?;
        if !self.adapter.continuation_actions().contains(&action) {
            return Err(RoundError::InvalidParameters(format!(
                "'{}' is not an action for {}",
                action,
                self.game_type()
            )));
        }
        self.adapter
            .validate_continuation(action, extra, round.token.as_ref())
            .map_err(RoundError::InvalidParameters)?;

        let extra_stake = self.adapter.extra_stake(action, round.request.stake);
        let balance = self.balance.balance();
        if extra_stake > balance {
            return Err(RoundError::InsufficientBalance {
                stake: extra_stake,
                balance,
            });
        }
        Ok((round.request.clone(), round.token.clone()))
    }

    fn check_cash_out(&self, inner: &Inner) -> Result<(RoundRequest, Option<Value>), RoundError> {
        if inner.busy() {
            return Err(RoundError::RoundAlreadyInFlight);
        }
        match inner.round.as_ref() {
            Some(round) if self.cashable(inner) => Ok((round.request.clone(), round.token.clone())),
            _ => Err(RoundError::NotCashable),
        }
    }

    fn cashable(&self, inner: &Inner) -> bool {
        if !self.adapter.supports_cash_out() {
            return false;
        }
        let Some(round) = inner.round.as_ref() else {
            return false;
        };
        if round.continuations == 0 {
            return false;
        }
        match (self.adapter.progress_field(), round.token.as_ref()) {
            (Some(field), Some(token)) => token
                .get(field)
                .and_then(Value::as_f64)
                .map(|progress| progress > 0.0)
                .unwrap_or(true),
            _ => true,
        }
    }

    /// Send one request and resolve it
    async fn dispatch(&self, dispatch: Dispatch) -> Result<RoundOutcome, RoundError> {
        let Dispatch { request, step, call } = dispatch;
        debug!(
            "{} round step '{}' -> {} (stake {:.2})",
            request.game_type,
            step.label(),
            call.path,
            request.stake
        );

        let pending = PendingRequest {
            controller: self,
            opening: matches!(step, RoundStep::Start),
            resolved: false,
        };
        let response = self.transport.send_bet(&call).await;
        pending.resolve();

        match response {
            Err(e) => {
                warn!("{} request failed: {}", request.game_type, e);
                Err(self.fail(&step, RoundError::NetworkError(e.to_string())))
            }
            Ok(outcome) if !outcome.success => {
                let message = outcome
                    .error
                    .clone()
                    .or_else(|| outcome.message().map(str::to_string))
                    .unwrap_or_else(|| "Bet failed".to_string());
                warn!("{} round rejected by server: {}", request.game_type, message);
                Err(self.fail(&step, RoundError::ServerRejected(message)))
            }
            Ok(outcome) => {
                self.settle(&request, &step, &outcome).await;
                Ok(outcome)
            }
        }
    }

    /// Apply a successful outcome
    async fn settle(&self, request: &RoundRequest, step: &RoundStep, outcome: &RoundOutcome) {
        match outcome.new_balance {
            Some(new_balance) => self.balance.apply_round_balance(new_balance),
            None => warn!("{} outcome carried no new_balance; cached balance kept", request.game_type),
        }

        self.display.present(request.game_type, step, outcome);

        let over = !self.adapter.is_multi_step() || matches!(step, RoundStep::CashOut) || outcome.round_over();
        let next = if over { RoundState::Idle } else { RoundState::Armed };
        let delay = self.adapter.reveal_delay(outcome);

        {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if over {
                inner.round = None;
                inner.armed = None;
            } else if let Some(round) = inner.round.as_mut() {
                round.token = outcome.result.clone();
                if matches!(step, RoundStep::Continue { .. }) {
                    round.continuations += 1;
                }
            } else {
                inner.round = Some(OpenRound {
                    id: Uuid::new_v4(),
                    request: request.clone(),
                    token: outcome.result.clone(),
                    continuations: 0,
                });
            }
            inner.state = if delay.is_some() { RoundState::Settling } else { next };
        }

        info!(
            "{} round step '{}' settled: winnings {:.2}, balance {:.2}{}",
            request.game_type,
            step.label(),
            outcome.winnings_amount(),
            self.balance.balance(),
            if over { "" } else { " (round open)" }
        );
        let reveal = Reveal {
            controller: self,
            next,
            summary: Some(self.adapter.summarize(request, step, outcome)),
        };
        if let Some(delay) = delay {
            debug!("{} revealing for {:?}", request.game_type, delay);
            self.clock.sleep(delay).await;
        }
        drop(reveal);
    }

    /// Reset state after a failed request and report the error
    fn fail(&self, step: &RoundStep, error: RoundError) -> RoundError {
        {
            let mut inner = self.lock();
            inner.state = match (step, &error) {
                (RoundStep::Start, RoundError::NetworkError(_)) => {
                    inner.armed = None;
                    RoundState::Idle
                }
                _ => RoundState::Armed,
            };
        }
        self.report(error)
    }

    fn report(&self, error: RoundError) -> RoundError {
        if error.is_local() {
            debug!("{} round refused: {}", self.game_type(), error);
        }
        self.sink.notify(Notification::error(error.to_string()));
        error
    }
}

/// Restores a resting state if the request future is dropped before the
/// response arrives. A dropped opening request is treated like a network
/// failure; a dropped continuation leaves the open round as it was.
struct PendingRequest<'a> {
    controller: &'a BetRoundController,
    opening: bool,
    resolved: bool,
}

impl PendingRequest<'_> {
    fn resolve(mut self) {
        self.resolved = true;
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        let mut inner = self.controller.lock();
        if inner.state != RoundState::InFlight {
            return;
        }
        warn!("{} request abandoned before a response", self.controller.game_type());
        inner.state = if self.opening {
            inner.armed = None;
            RoundState::Idle
        } else {
            RoundState::Armed
        };
    }
}

/// Ends the settling phase: final state, then the one summary notification.
/// Runs on drop so an abandoned reveal still completes the round.
struct Reveal<'a> {
    controller: &'a BetRoundController,
    next: RoundState,
    summary: Option<Notification>,
}

impl Drop for Reveal<'_> {
    fn drop(&mut self) {
        self.controller.lock().state = self.next;
        if let Some(summary) = self.summary.take() {
            self.controller.sink.notify(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::TransportError;
    use crate::clock::InstantClock;
    use crate::common::traits::BalanceSource;
    use crate::common::types::CachedUser;
    use crate::games::types::{to_parameters, CoinChoice, CoinFlipParams, MinesParams};
    use crate::games::{BlackjackGame, CoinFlipGame, LotteryGame, MinesGame, PokerGame};
    use crate::notify::{RecordingSink, Severity};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<Result<RoundOutcome, TransportError>>>,
        calls: Mutex<Vec<BetCall>>,
        gate: Option<Arc<Notify>>,
    }

    impl MockTransport {
        fn scripted(responses: Vec<Result<RoundOutcome, TransportError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> Vec<BetCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BetTransport for MockTransport {
        async fn send_bet(&self, call: &BetCall) -> Result<RoundOutcome, TransportError> {
            self.calls.lock().unwrap().push(call.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Decode("no scripted response".into())))
        }
    }

    struct FixedSource;

    #[async_trait]
    impl BalanceSource for FixedSource {
        async fn fetch_balance(&self, _user_id: &str) -> Result<f64, TransportError> {
            Ok(0.0)
        }
    }

    struct Harness {
        controller: Arc<BetRoundController>,
        transport: Arc<MockTransport>,
        balance: BalanceStore,
        sink: Arc<RecordingSink>,
        clock: InstantClock,
    }

    fn harness(adapter: Arc<dyn GameAdapter>, balance: f64, transport: MockTransport) -> Harness {
        let transport = Arc::new(transport);
        let store = BalanceStore::new(CachedUser::new("42", balance), Arc::new(FixedSource));
        let sink = Arc::new(RecordingSink::new());
        let clock = InstantClock::new();
        let controller = BetRoundController::new(adapter, transport.clone(), store.clone(), sink.clone())
            .with_clock(Arc::new(clock.clone()));
        Harness {
            controller: Arc::new(controller),
            transport,
            balance: store,
            sink,
            clock,
        }
    }

    /// Holds every reveal until released
    struct GatedClock {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Clock for GatedClock {
        async fn sleep(&self, _duration: Duration) {
            self.gate.notified().await;
        }
    }

    fn gated_reveal_harness(transport: MockTransport, gate: Arc<Notify>) -> Harness {
        let h = harness(coinflip(), 100.0, transport);
        let controller = BetRoundController::new(coinflip(), h.transport.clone(), h.balance.clone(), h.sink.clone())
            .with_clock(Arc::new(GatedClock { gate }));
        Harness {
            controller: Arc::new(controller),
            ..h
        }
    }

    fn coinflip() -> Arc<dyn GameAdapter> {
        Arc::new(CoinFlipGame::default())
    }

    fn heads() -> Parameters {
        to_parameters(&CoinFlipParams {
            choice: CoinChoice::Heads,
        })
    }

    fn outcome(value: Value) -> Result<RoundOutcome, TransportError> {
        Ok(serde_json::from_value(value).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_stakes_never_reach_transport() {
        let h = harness(coinflip(), 100.0, MockTransport::default());

        for stake in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let result = h.controller.submit_round(stake, heads()).await;
            assert_eq!(result, Err(RoundError::InvalidStake));
        }

        assert!(h.transport.calls().is_empty());
        assert_eq!(h.sink.count(), 4);
        assert_eq!(h.controller.state(), RoundState::Idle);
    }

    #[tokio::test]
    async fn test_stake_above_balance_is_refused() {
        let h = harness(coinflip(), 100.0, MockTransport::default());

        let result = h.controller.submit_round(200.0, heads()).await;

        assert_eq!(
            result,
            Err(RoundError::InsufficientBalance {
                stake: 200.0,
                balance: 100.0
            })
        );
        assert!(h.transport.calls().is_empty());
        assert_eq!(h.balance.balance(), 100.0);
        assert_eq!(h.sink.notifications()[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_bad_parameters_are_refused_locally() {
        let h = harness(coinflip(), 100.0, MockTransport::default());

        let result = h.controller.submit_round(10.0, Parameters::new()).await;

        assert!(matches!(result, Err(RoundError::InvalidParameters(_))));
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_winning_round_applies_server_balance() {
        let h = harness(
            coinflip(),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 115.0,
                "result": {"result": "heads", "outcome": "win", "winnings": 25.0}
            }))]),
        );

        let result = h.controller.submit_round(10.0, heads()).await.unwrap();

        assert_eq!(result.new_balance, Some(115.0));
        assert_eq!(h.balance.balance(), 115.0);
        assert_eq!(h.transport.calls().len(), 1);
        assert_eq!(h.transport.calls()[0].body["game_data"]["choice"], "heads");

        let notes = h.sink.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Success);
        assert_eq!(h.controller.state(), RoundState::Idle);
        assert_eq!(h.clock.requested(), vec![CoinFlipGame::DEFAULT_REVEAL]);
    }

    #[tokio::test]
    async fn test_balance_comes_from_server_not_winnings() {
        let h = harness(
            coinflip(),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 90.0,
                "winnings": 50.0,
                "result": {"outcome": "win"}
            }))]),
        );

        h.controller.submit_round(10.0, heads()).await.unwrap();
        assert_eq!(h.balance.balance(), 90.0);
    }

    #[tokio::test]
    async fn test_server_rejection_keeps_balance_and_arms() {
        let h = harness(
            coinflip(),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": false,
                "error": "round already settled"
            }))]),
        );

        let result = h.controller.submit_round(10.0, heads()).await;

        assert_eq!(result, Err(RoundError::ServerRejected("round already settled".into())));
        assert_eq!(h.balance.balance(), 100.0);
        let notes = h.sink.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "round already settled");
        assert_eq!(notes[0].severity, Severity::Error);
        assert_eq!(h.controller.state(), RoundState::Armed);
        assert_eq!(h.controller.armed().map(|bet| bet.stake), Some(10.0));
    }

    #[tokio::test]
    async fn test_network_failure_returns_to_idle() {
        let h = harness(
            coinflip(),
            100.0,
            MockTransport::scripted(vec![Err(TransportError::Decode("connection reset".into()))]),
        );

        let result = h.controller.submit_round(10.0, heads()).await;

        assert!(matches!(result, Err(RoundError::NetworkError(_))));
        assert_eq!(h.balance.balance(), 100.0);
        assert_eq!(h.sink.count(), 1);
        assert_eq!(h.controller.state(), RoundState::Idle);
        assert!(h.controller.armed().is_none());
    }

    #[tokio::test]
    async fn test_double_submission_sends_one_request() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            coinflip(),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 90.0,
                "result": {"outcome": "loss"}
            }))])
            .gated(gate.clone()),
        );

        let first = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.submit_round(10.0, heads()).await })
        };
        while h.transport.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(h.controller.state(), RoundState::InFlight);

        let second = h.controller.submit_round(10.0, heads()).await;
        assert_eq!(second, Err(RoundError::RoundAlreadyInFlight));

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(h.transport.calls().len(), 1);
        assert_eq!(h.balance.balance(), 90.0);
        assert_eq!(h.controller.state(), RoundState::Idle);
    }

    #[tokio::test]
    async fn test_arm_validates_without_sending() {
        let h = harness(coinflip(), 100.0, MockTransport::default());

        assert_eq!(h.controller.arm(-1.0, heads()), Err(RoundError::InvalidStake));
        assert_eq!(h.controller.state(), RoundState::Idle);

        h.controller.arm(5.0, heads()).unwrap();
        assert_eq!(h.controller.state(), RoundState::Armed);
        assert!(h.transport.calls().is_empty());
        assert_eq!(h.sink.count(), 1);
    }

    fn mines_start() -> Result<RoundOutcome, TransportError> {
        outcome(json!({
            "success": true,
            "new_balance": 90.0,
            "result": {"outcome": "continue", "gems_found": 0, "multiplier": 1.0, "mines_count": 3}
        }))
    }

    fn mines_gem(gems: u32, multiplier: f64) -> Result<RoundOutcome, TransportError> {
        outcome(json!({
            "success": true,
            "new_balance": 90.0,
            "result": {"outcome": "continue", "gems_found": gems, "multiplier": multiplier, "mines_count": 3}
        }))
    }

    fn reveal(cell: u32) -> Parameters {
        json!({"cell_index": cell}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_mines_round_threads_token_and_cashes_out() {
        let h = harness(
            Arc::new(MinesGame),
            100.0,
            MockTransport::scripted(vec![
                mines_start(),
                mines_gem(1, 1.14),
                mines_gem(2, 1.31),
                mines_gem(3, 1.52),
                outcome(json!({
                    "success": true,
                    "new_balance": 105.2,
                    "winnings": 15.2,
                    "result": {"outcome": "win", "gems_found": 3, "winnings": 15.2}
                })),
            ]),
        );
        let params = to_parameters(&MinesParams { mines_count: 3 });

        h.controller.submit_round(10.0, params).await.unwrap();
        assert_eq!(h.controller.state(), RoundState::Armed);
        let round_id = h.controller.active_round().unwrap().round_id;

        for (i, cell) in [4, 11, 17].into_iter().enumerate() {
            h.controller.continue_round("reveal", reveal(cell)).await.unwrap();
            let active = h.controller.active_round().unwrap();
            assert_eq!(active.continuations, i as u32 + 1);
            assert_eq!(active.round_id, round_id);
        }
        assert!(h.controller.is_cashable());

        let cashed = h.controller.cash_out().await.unwrap();
        assert_eq!(cashed.winnings, Some(15.2));
        assert_eq!(h.balance.balance(), 105.2);
        assert!(h.controller.active_round().is_none());
        assert_eq!(h.controller.state(), RoundState::Idle);

        let calls = h.transport.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].body["game_data"]["action"], "start");
        assert_eq!(calls[1].body["game_data"]["game_state"]["gems_found"], 0);
        assert_eq!(calls[2].body["game_data"]["game_state"]["gems_found"], 1);
        assert_eq!(calls[3].body["game_data"]["game_state"]["gems_found"], 2);
        assert_eq!(calls[4].body["game_data"]["action"], "cashout");
        assert_eq!(calls[4].body["game_data"]["game_state"]["gems_found"], 3);
        assert_eq!(h.sink.count(), 5);
        assert!(h.clock.requested().is_empty());
    }

    #[tokio::test]
    async fn test_cash_out_right_after_start_is_refused() {
        let h = harness(Arc::new(MinesGame), 100.0, MockTransport::scripted(vec![mines_start()]));

        h.controller
            .submit_round(10.0, to_parameters(&MinesParams { mines_count: 3 }))
            .await
            .unwrap();

        assert_eq!(h.controller.cash_out().await, Err(RoundError::NotCashable));
        assert_eq!(h.transport.calls().len(), 1);
        assert_eq!(h.controller.state(), RoundState::Armed);
    }

    #[tokio::test]
    async fn test_hitting_a_mine_ends_the_round() {
        let h = harness(
            Arc::new(MinesGame),
            100.0,
            MockTransport::scripted(vec![
                mines_start(),
                outcome(json!({
                    "success": true,
                    "new_balance": 90.0,
                    "result": {"outcome": "loss", "hit_mine": true, "gems_found": 0}
                })),
            ]),
        );

        h.controller
            .submit_round(10.0, to_parameters(&MinesParams { mines_count: 3 }))
            .await
            .unwrap();
        h.controller.continue_round("reveal", reveal(0)).await.unwrap();

        assert!(h.controller.active_round().is_none());
        assert_eq!(h.controller.state(), RoundState::Idle);
        assert_eq!(
            h.controller.continue_round("reveal", reveal(1)).await,
            Err(RoundError::NoActiveRound)
        );
    }

    #[tokio::test]
    async fn test_open_round_blocks_new_submission() {
        let h = harness(Arc::new(MinesGame), 100.0, MockTransport::scripted(vec![mines_start()]));
        let params = to_parameters(&MinesParams { mines_count: 3 });

        h.controller.submit_round(10.0, params.clone()).await.unwrap();
        assert_eq!(
            h.controller.submit_round(10.0, params).await,
            Err(RoundError::RoundAlreadyInFlight)
        );
        assert_eq!(h.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_continuation_keeps_round() {
        let h = harness(
            Arc::new(MinesGame),
            100.0,
            MockTransport::scripted(vec![
                mines_start(),
                Err(TransportError::Decode("timeout".into())),
            ]),
        );

        h.controller
            .submit_round(10.0, to_parameters(&MinesParams { mines_count: 3 }))
            .await
            .unwrap();
        let before = h.controller.active_round().unwrap();

        let result = h.controller.continue_round("reveal", reveal(2)).await;
        assert!(matches!(result, Err(RoundError::NetworkError(_))));
        assert_eq!(h.controller.state(), RoundState::Armed);
        assert_eq!(h.controller.active_round(), Some(before));
    }

    #[tokio::test]
    async fn test_unknown_action_is_refused() {
        let h = harness(Arc::new(MinesGame), 100.0, MockTransport::scripted(vec![mines_start()]));
        h.controller
            .submit_round(10.0, to_parameters(&MinesParams { mines_count: 3 }))
            .await
            .unwrap();

        let result = h.controller.continue_round("hit", Parameters::new()).await;
        assert!(matches!(result, Err(RoundError::InvalidParameters(_))));
        assert_eq!(h.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_blackjack_double_needs_balance() {
        let h = harness(
            Arc::new(BlackjackGame),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 40.0,
                "game": {"player_value": 11, "game_over": false}
            }))]),
        );

        h.controller.submit_round(60.0, Parameters::new()).await.unwrap();
        assert_eq!(h.transport.calls()[0].path, "api/blackjack/deal");

        let result = h.controller.continue_round("double", Parameters::new()).await;
        assert_eq!(
            result,
            Err(RoundError::InsufficientBalance {
                stake: 60.0,
                balance: 40.0
            })
        );
        assert!(!h.controller.is_cashable());
        assert_eq!(h.controller.cash_out().await, Err(RoundError::NotCashable));
    }

    #[tokio::test]
    async fn test_reveal_delay_uses_injected_clock() {
        let h = harness(
            Arc::new(CoinFlipGame::new(Duration::from_millis(10))),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 95.0,
                "result": {"outcome": "loss"}
            }))]),
        );

        h.controller.submit_round(5.0, heads()).await.unwrap();
        assert_eq!(h.clock.requested(), vec![Duration::from_millis(10)]);
        assert_eq!(h.controller.state(), RoundState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_does_not_wedge_controller() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            coinflip(),
            100.0,
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 110.0,
                "result": {"outcome": "win"}
            }))])
            .gated(gate.clone()),
        );

        let abandoned = tokio::time::timeout(Duration::from_secs(5), h.controller.submit_round(10.0, heads())).await;
        assert!(abandoned.is_err());
        assert_eq!(h.controller.state(), RoundState::Idle);
        assert!(h.controller.armed().is_none());
        assert_eq!(h.balance.balance(), 100.0);

        gate.notify_one();
        h.controller.submit_round(10.0, heads()).await.unwrap();
        assert_eq!(h.transport.calls().len(), 2);
        assert_eq!(h.balance.balance(), 110.0);
        assert_eq!(h.controller.state(), RoundState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_continuation_keeps_round_open() {
        let gate = Arc::new(Notify::new());
        let h = harness(
            Arc::new(MinesGame),
            100.0,
            MockTransport::scripted(vec![mines_start(), mines_gem(1, 1.14)]).gated(gate.clone()),
        );

        gate.notify_one();
        h.controller
            .submit_round(10.0, to_parameters(&MinesParams { mines_count: 3 }))
            .await
            .unwrap();
        let before = h.controller.active_round().unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_secs(5), h.controller.continue_round("reveal", reveal(3))).await;
        assert!(abandoned.is_err());
        assert_eq!(h.controller.state(), RoundState::Armed);
        assert_eq!(h.controller.active_round(), Some(before));

        gate.notify_one();
        h.controller.continue_round("reveal", reveal(3)).await.unwrap();
        assert_eq!(h.controller.active_round().unwrap().continuations, 1);
    }

    #[tokio::test]
    async fn test_calls_are_refused_while_settling() {
        let gate = Arc::new(Notify::new());
        let h = gated_reveal_harness(
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 95.0,
                "result": {"outcome": "loss"}
            }))]),
            gate.clone(),
        );

        let round = {
            let controller = h.controller.clone();
            tokio::spawn(async move { controller.submit_round(5.0, heads()).await })
        };
        while h.controller.state() != RoundState::Settling {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.balance.balance(), 95.0);
        assert_eq!(h.sink.count(), 0);
        assert_eq!(
            h.controller.submit_round(5.0, heads()).await,
            Err(RoundError::RoundAlreadyInFlight)
        );
        assert_eq!(h.controller.cash_out().await, Err(RoundError::RoundAlreadyInFlight));

        gate.notify_one();
        assert!(round.await.unwrap().is_ok());
        assert_eq!(h.controller.state(), RoundState::Idle);
        assert_eq!(h.transport.calls().len(), 1);
        assert_eq!(h.sink.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_reveal_still_settles() {
        let h = gated_reveal_harness(
            MockTransport::scripted(vec![outcome(json!({
                "success": true,
                "new_balance": 95.0,
                "result": {"outcome": "loss"}
            }))]),
            Arc::new(Notify::new()),
        );

        let abandoned = tokio::time::timeout(Duration::from_secs(5), h.controller.submit_round(5.0, heads())).await;
        assert!(abandoned.is_err());
        assert_eq!(h.controller.state(), RoundState::Idle);
        assert_eq!(h.balance.balance(), 95.0);
        assert_eq!(h.sink.count(), 1);
    }

    #[tokio::test]
    async fn test_cash_out_refused_for_games_without_it() {
        for adapter in [Arc::new(PokerGame) as Arc<dyn GameAdapter>, Arc::new(LotteryGame)] {
            let h = harness(
                adapter,
                100.0,
                MockTransport::scripted(vec![outcome(json!({
                    "success": true,
                    "new_balance": 90.0,
                    "result": {"outcome": "continue"}
                }))]),
            );

            h.controller.submit_round(10.0, Parameters::new()).await.unwrap();
            assert!(h.controller.active_round().is_some());
            assert_eq!(h.controller.cash_out().await, Err(RoundError::NotCashable));
            assert_eq!(h.transport.calls().len(), 1);
        }
    }
}
