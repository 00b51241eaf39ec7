//! Player feedback: toasts, haptics and sound cues
//!
//! Notifications are fire-and-forget. A sink never returns an error and
//! never influences the round controller; failures of the underlying
//! devices are logged and dropped.

use crate::balance::BalanceStore;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Short sound effects a game can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Win,
    Lose,
    Jackpot,
    Explosion,
    SafeClick,
    Blackjack,
    Bust,
    Crash,
    Climb,
    Fall,
    Notification,
}

impl SoundCue {
    /// Asset name under the sounds directory
    pub fn asset(&self) -> &'static str {
        match self {
            SoundCue::Win => "win",
            SoundCue::Lose => "lose",
            SoundCue::Jackpot => "jackpot",
            SoundCue::Explosion => "explosion",
            SoundCue::SafeClick => "safe_click",
            SoundCue::Blackjack => "blackjack",
            SoundCue::Bust => "bust",
            SoundCue::Crash => "crash",
            SoundCue::Climb => "climb",
            SoundCue::Fall => "fall",
            SoundCue::Notification => "notification",
        }
    }

    /// Playback volume in 0..=1
    pub fn volume(&self) -> f32 {
        match self {
            SoundCue::Explosion => 0.7,
            SoundCue::Jackpot => 0.6,
            SoundCue::Win | SoundCue::Lose | SoundCue::Crash => 0.5,
            SoundCue::SafeClick | SoundCue::Climb => 0.4,
            _ => 0.3,
        }
    }
}

/// One piece of user feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<SoundCue>,
    #[serde(default)]
    pub haptic: bool,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Error)
    }

    fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            sound: None,
            haptic: false,
        }
    }

    pub fn with_sound(mut self, cue: SoundCue) -> Self {
        self.sound = Some(cue);
        self
    }

    pub fn with_haptic(mut self) -> Self {
        self.haptic = true;
        self
    }
}

/// Destination for notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Failure reported by a feedback device
#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("feedback device unavailable: {0}")]
    Unavailable(String),

    #[error("playback blocked by host environment")]
    Blocked,
}

/// Platform vibration / haptic engine
pub trait HapticDevice: Send + Sync {
    fn impact(&self) -> Result<(), FeedbackError>;
}

/// Platform audio playback
pub trait SoundPlayer: Send + Sync {
    fn play(&self, cue: SoundCue, volume: f32) -> Result<(), FeedbackError>;
}

/// A toast currently or previously on screen
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub expires_at: Instant,
}

struct ToastQueue {
    next_id: u64,
    toasts: VecDeque<Toast>,
}

/// Transient toasts with a fixed auto-dismiss delay
#[derive(Clone)]
pub struct ToastBoard {
    lifetime: Duration,
    queue: Arc<Mutex<ToastQueue>>,
}

impl ToastBoard {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            lifetime,
            queue: Arc::new(Mutex::new(ToastQueue {
                next_id: 0,
                toasts: VecDeque::new(),
            })),
        }
    }

    /// Post a toast at `now`, returning its id
    pub fn post(&self, message: &str, severity: Severity, now: Instant) -> u64 {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.toasts.retain(|toast| toast.expires_at > now);
        queue.next_id += 1;
        let id = queue.next_id;
        queue.toasts.push_back(Toast {
            id,
            message: message.to_string(),
            severity,
            expires_at: now + self.lifetime,
        });
        id
    }

    /// Toasts held in the queue, expired or not
    pub fn queued(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).toasts.len()
    }

    /// Toasts still visible at `now`; expired ones are dropped
    pub fn visible(&self, now: Instant) -> Vec<Toast> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.toasts.retain(|toast| toast.expires_at > now);
        queue.toasts.iter().cloned().collect()
    }
}

impl Default for ToastBoard {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000))
    }
}

/// Renders a toast and triggers haptics and sound when the player allows it
pub struct FanoutSink {
    toasts: ToastBoard,
    balance: BalanceStore,
    haptics: Option<Arc<dyn HapticDevice>>,
    sounds: Option<Arc<dyn SoundPlayer>>,
}

impl FanoutSink {
    pub fn new(toasts: ToastBoard, balance: BalanceStore) -> Self {
        Self {
            toasts,
            balance,
            haptics: None,
            sounds: None,
        }
    }

    pub fn with_haptics(mut self, device: Arc<dyn HapticDevice>) -> Self {
        self.haptics = Some(device);
        self
    }

    pub fn with_sounds(mut self, player: Arc<dyn SoundPlayer>) -> Self {
        self.sounds = Some(player);
        self
    }

    pub fn toasts(&self) -> &ToastBoard {
        &self.toasts
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, notification: Notification) {
        self.toasts
            .post(&notification.message, notification.severity, Instant::now());

        let preferences = self.balance.get().preferences;

        if notification.haptic && preferences.haptics_enabled {
            if let Some(device) = &self.haptics {
                if let Err(e) = device.impact() {
                    debug!("Haptic feedback failed: {}", e);
                }
            }
        }

        if let (Some(cue), true) = (notification.sound, preferences.sound_enabled) {
            if let Some(player) = &self.sounds {
                if let Err(e) = player.play(cue, cue.volume()) {
                    debug!("Sound cue {} failed: {}", cue.asset(), e);
                }
            }
        }
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error => error!(target: "betround::notify", "{}", notification.message),
            _ => info!(target: "betround::notify", "{}", notification.message),
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::BalanceSource;
    use crate::common::types::CachedUser;
    use crate::api::client::TransportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoSource;

    #[async_trait]
    impl BalanceSource for NoSource {
        async fn fetch_balance(&self, _user_id: &str) -> Result<f64, TransportError> {
            Err(TransportError::Rejected("offline".into()))
        }
    }

    #[derive(Default)]
    struct CountingPlayer {
        plays: AtomicUsize,
    }

    impl SoundPlayer for CountingPlayer {
        fn play(&self, _cue: SoundCue, _volume: f32) -> Result<(), FeedbackError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Err(FeedbackError::Blocked)
        }
    }

    struct BrokenHaptics;

    impl HapticDevice for BrokenHaptics {
        fn impact(&self) -> Result<(), FeedbackError> {
            Err(FeedbackError::Unavailable("no vibration motor".into()))
        }
    }

    fn store() -> BalanceStore {
        BalanceStore::new(CachedUser::new("42", 100.0), Arc::new(NoSource))
    }

    #[test]
    fn test_toasts_expire_after_lifetime() {
        let board = ToastBoard::new(Duration::from_secs(3));
        let start = Instant::now();
        board.post("first", Severity::Info, start);
        board.post("second", Severity::Error, start + Duration::from_secs(2));

        assert_eq!(board.visible(start + Duration::from_millis(2500)).len(), 2);

        let later = board.visible(start + Duration::from_secs(3));
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].message, "second");

        assert!(board.visible(start + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn test_posting_drops_expired_toasts() {
        let board = ToastBoard::new(Duration::from_secs(3));
        let start = Instant::now();
        for second in 0..1000 {
            board.post("balance refreshed", Severity::Info, start + Duration::from_secs(second));
            assert!(board.queued() <= 3);
        }
        assert_eq!(board.queued(), 3);
    }

    #[test]
    fn test_fanout_queue_does_not_grow_unread() {
        let sink = FanoutSink::new(ToastBoard::new(Duration::from_millis(1)), store());
        for _ in 0..100 {
            sink.notify(Notification::info("tick"));
        }
        std::thread::sleep(Duration::from_millis(5));
        sink.notify(Notification::info("tick"));
        assert_eq!(sink.toasts().queued(), 1);
    }

    #[test]
    fn test_fanout_swallows_device_failures() {
        let player = Arc::new(CountingPlayer::default());
        let sink = FanoutSink::new(ToastBoard::default(), store())
            .with_sounds(player.clone())
            .with_haptics(Arc::new(BrokenHaptics));

        sink.notify(Notification::success("You won $15.00!").with_sound(SoundCue::Win).with_haptic());

        assert_eq!(player.plays.load(Ordering::SeqCst), 1);
        assert_eq!(sink.toasts().visible(Instant::now()).len(), 1);
    }

    #[test]
    fn test_fanout_respects_muted_sound() {
        let balance = store();
        balance.update(|user| user.preferences.sound_enabled = false);
        let player = Arc::new(CountingPlayer::default());
        let sink = FanoutSink::new(ToastBoard::default(), balance).with_sounds(player.clone());

        sink.notify(Notification::error("Lost").with_sound(SoundCue::Lose));

        assert_eq!(player.plays.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.notify(Notification::info("a"));
        sink.notify(Notification::error("b"));
        let seen = sink.notifications();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].severity, Severity::Error);
    }
}
