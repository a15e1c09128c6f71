use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Exponential backoff with a ceiling and a bounded number of attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `retry` (zero-based): `min(base * 2^retry, max)`
    ///
    /// # Examples
    ///
    /// ```
    /// use broadside::network::ReconnectPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = ReconnectPolicy::default();
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
    /// assert_eq!(policy.delay_for(4), Duration::from_millis(16000));
    /// assert_eq!(policy.delay_for(9), Duration::from_secs(30));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Lifecycle of the physical connection to the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
        };
        f.write_str(status)
    }
}

/// What the driver should do after the connection closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// The close was requested locally; stay down
    Stop,
    /// Try again after the given delay
    Reconnect(Duration),
    /// Retries exhausted; stay down until a manual reconnect
    GiveUp,
}

/// Pure reconnect state machine for one relay connection.
///
/// The async driver feeds it socket events and obeys the returned actions,
/// which keeps every backoff decision testable without a socket or a clock.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    policy: ReconnectPolicy,
    status: ConnectionStatus,
    peer_connected: bool,
    retry_count: u32,
    latency: Option<Duration>,
    intentional_close: bool,
}

impl ConnectionState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            status: ConnectionStatus::Disconnected,
            peer_connected: false,
            retry_count: 0,
            latency: None,
            intentional_close: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn peer_connected(&self) -> bool {
        self.peer_connected
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// First connection attempt
    pub fn on_connecting(&mut self) {
        self.intentional_close = false;
        if self.status == ConnectionStatus::Disconnected {
            self.status = ConnectionStatus::Connecting;
        }
    }

    /// Socket opened; retries start over
    pub fn on_open(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.retry_count = 0;
    }

    /// Socket closed or failed to open.
    ///
    /// The delay is computed from the retry count before it is incremented, so
    /// the n-th consecutive retry waits `min(base * 2^(n-1), max)`.
    pub fn on_close(&mut self) -> CloseAction {
        self.peer_connected = false;

        if self.intentional_close {
            self.status = ConnectionStatus::Disconnected;
            return CloseAction::Stop;
        }

        if self.retry_count >= self.policy.max_retries {
            warn!(retries = self.retry_count, "Reconnect attempts exhausted");
            self.status = ConnectionStatus::Disconnected;
            return CloseAction::GiveUp;
        }

        let delay = self.policy.delay_for(self.retry_count);
        self.retry_count += 1;
        self.status = ConnectionStatus::Reconnecting;
        debug!(retry = self.retry_count, delay = ?delay, "Scheduling reconnect");
        CloseAction::Reconnect(delay)
    }

    /// Caller-initiated close; the following close event must not reconnect
    pub fn disconnect(&mut self) {
        self.intentional_close = true;
        self.peer_connected = false;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Explicit retry after giving up: resets the counter and retries at once.
    ///
    /// Returns false when already connected.
    pub fn manual_reconnect(&mut self) -> bool {
        if self.is_connected() {
            return false;
        }
        self.intentional_close = false;
        self.retry_count = 0;
        self.status = ConnectionStatus::Reconnecting;
        true
    }

    pub fn set_peer_connected(&mut self, connected: bool) {
        self.peer_connected = connected;
    }

    /// Record a heartbeat reply; `now_ms` and `echoed_ms` are unix milliseconds
    pub fn record_pong(&mut self, now_ms: u64, echoed_ms: u64) -> Duration {
        let latency = Duration::from_millis(now_ms.saturating_sub(echoed_ms));
        self.latency = Some(latency);
        latency
    }
}
