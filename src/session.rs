//! Session context
//!
//! Owns the player identity, configuration, balance cache, transport and
//! notification sink, and builds one controller per opened game.

use crate::api::client::HttpTransport;
use crate::balance::{BalanceStore, RefreshHandle};
use crate::clock::{Clock, TokioClock};
use crate::common::config::ClientConfig;
use crate::common::traits::{BalanceSource, BetTransport, NoopDisplay, OutcomeDisplay};
use crate::common::types::CachedUser;
use crate::controller::BetRoundController;
use crate::errors::{BetRoundResult, ConfigurationError};
use crate::games::{adapter_for, GameType};
use crate::notify::{FanoutSink, Notification, NotificationSink, ToastBoard};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Opaque player id supplied by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity(String);

impl UserIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    /// Read the `user_id` query parameter of a launch URL
    pub fn from_url(launch_url: &str) -> Option<Self> {
        let url = Url::parse(launch_url).ok()?;
        url.query_pairs()
            .find(|(key, value)| key == "user_id" && !value.is_empty())
            .map(|(_, value)| Self(value.into_owned()))
    }

    /// Pick the identity from, in order: `explicit`, the configured launch
    /// URL, the configured user id.
    pub fn resolve(explicit: Option<&str>, config: &ClientConfig) -> Result<Self, ConfigurationError> {
        if let Some(user_id) = explicit.filter(|id| !id.is_empty()) {
            return Ok(Self::new(user_id));
        }
        if let Some(identity) = config.session.launch_url.as_deref().and_then(Self::from_url) {
            return Ok(identity);
        }
        config
            .session
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(Self::new)
            .ok_or_else(|| ConfigurationError::MissingRequired("session.user_id".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct Session {
    config: ClientConfig,
    identity: UserIdentity,
    transport: Arc<dyn BetTransport>,
    balance: BalanceStore,
    sink: Arc<dyn NotificationSink>,
    display: Arc<dyn OutcomeDisplay>,
    clock: Arc<dyn Clock>,
    refresh: Option<RefreshHandle>,
}

impl Session {
    /// Session talking HTTP to `config.api.base_url`
    pub fn connect(
        config: ClientConfig,
        identity: UserIdentity,
        sink: Arc<dyn NotificationSink>,
    ) -> BetRoundResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config.api.base_url, config.api.request_timeout())?);
        info!("Session for user {} against {}", identity.as_str(), transport.base_url());
        Ok(Self::with_parts(config, identity, transport.clone(), transport, sink))
    }

    /// Session over caller-supplied backends
    pub fn with_parts(
        config: ClientConfig,
        identity: UserIdentity,
        transport: Arc<dyn BetTransport>,
        source: Arc<dyn BalanceSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let mut user = CachedUser::new(identity.as_str(), 0.0);
        user.preferences.haptics_enabled = config.notifications.haptics;
        Self {
            balance: BalanceStore::new(user, source),
            config,
            identity,
            transport,
            sink,
            display: Arc::new(NoopDisplay),
            clock: Arc::new(TokioClock),
            refresh: None,
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

    /// Replace the sink; controllers and refresh loops started later use it
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Toast, haptic and sound sink bound to this session's player preferences
    pub fn fanout_sink(&self) -> FanoutSink {
        FanoutSink::new(
            ToastBoard::new(self.config.notifications.toast_duration()),
            self.balance.clone(),
        )
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> &str {
        self.identity.as_str()
    }

    pub fn balance(&self) -> &BalanceStore {
        &self.balance
    }

    /// Fetch the player's balance. Failures are reported to the sink.
    pub async fn load_user(&self) -> BetRoundResult<CachedUser> {
        match self.balance.refresh().await {
            Ok(user) => Ok(user),
            Err(e) => {
                self.sink.notify(Notification::error("Failed to load user data"));
                Err(e.into())
            }
        }
    }

    /// Start the periodic balance refresh; replaces a running one
    pub fn start_refresh(&mut self) {
        let period = self.config.session.refresh_interval();
        self.refresh = Some(self.balance.spawn_refresh_loop(period, self.sink.clone()));
    }

    pub fn stop_refresh(&mut self) {
        if let Some(handle) = self.refresh.take() {
            handle.cancel();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh.as_ref().map(RefreshHandle::is_running).unwrap_or(false)
    }

    /// Controller for one game, sharing this session's balance and sink
    pub fn open_game(&self, game: GameType) -> BetRoundController {
        if self.balance.balance() <= 0.0 {
            warn!("Opening {} with an empty or unloaded balance", game);
        }
        BetRoundController::new(
            adapter_for(game, &self.config.timing),
            self.transport.clone(),
            self.balance.clone(),
            self.sink.clone(),
        )
        .with_display(self.display.clone())
        .with_clock(self.clock.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::TransportError;
    use crate::api::models::BetCall;
    use crate::common::types::RoundOutcome;
    use crate::notify::RecordingSink;
    use async_trait::async_trait;
    use std::time::{Duration, Instant};

    struct Offline;

    #[async_trait]
    impl BetTransport for Offline {
        async fn send_bet(&self, _call: &BetCall) -> Result<RoundOutcome, TransportError> {
            Err(TransportError::Rejected("offline".into()))
        }
    }

    #[async_trait]
    impl BalanceSource for Offline {
        async fn fetch_balance(&self, _user_id: &str) -> Result<f64, TransportError> {
            Ok(75.0)
        }
    }

    fn offline_session(config: ClientConfig) -> Session {
        Session::with_parts(
            config,
            UserIdentity::new("42"),
            Arc::new(Offline),
            Arc::new(Offline),
            Arc::new(RecordingSink::new()),
        )
    }

    #[test]
    fn test_identity_from_launch_url() {
        let identity = UserIdentity::from_url("https://casino.example/play?game=mines&user_id=12345").unwrap();
        assert_eq!(identity.as_str(), "12345");
        assert!(UserIdentity::from_url("https://casino.example/play?user_id=").is_none());
        assert!(UserIdentity::from_url("not a url").is_none());
    }

    #[test]
    fn test_identity_precedence() {
        let mut config = ClientConfig::default();
        assert!(matches!(
            UserIdentity::resolve(None, &config),
            Err(ConfigurationError::MissingRequired(_))
        ));

        config.session.user_id = Some("from-config".to_string());
        assert_eq!(UserIdentity::resolve(None, &config).unwrap().as_str(), "from-config");

        config.session.launch_url = Some("https://casino.example/?user_id=from-url".to_string());
        assert_eq!(UserIdentity::resolve(None, &config).unwrap().as_str(), "from-url");

        assert_eq!(UserIdentity::resolve(Some("cli"), &config).unwrap().as_str(), "cli");
    }

    #[tokio::test]
    async fn test_load_user_and_open_game() {
        let mut config = ClientConfig::default();
        config.notifications.haptics = false;
        let session = offline_session(config);

        let user = session.load_user().await.unwrap();
        assert_eq!(user.balance, 75.0);
        assert!(!user.preferences.haptics_enabled);

        let controller = session.open_game(GameType::Tower);
        assert_eq!(controller.game_type(), GameType::Tower);
    }

    #[test]
    fn test_fanout_sink_uses_configured_toast_lifetime() {
        let mut config = ClientConfig::default();
        config.notifications.toast_duration_ms = 500;
        let session = offline_session(config);
        let sink = session.fanout_sink();

        let now = Instant::now();
        sink.notify(Notification::info("hello"));
        assert_eq!(sink.toasts().visible(now).len(), 1);
        assert!(sink.toasts().visible(now + Duration::from_secs(1)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_can_be_started_and_stopped() {
        let mut session = offline_session(ClientConfig::default());
        session.start_refresh();
        assert!(session.is_refreshing());
        session.stop_refresh();
        assert!(!session.is_refreshing());
    }
}
