//! Connection lifecycle and keep-alive timing.
//!
//! [`LinkLifecycle`] decides when a network-style transport should join its
//! lower link, open its stream, or give up. It holds no I/O; the transport
//! reports what its lower link says and performs the returned [`LinkAction`].
//!
//! Timing rules:
//! - once `now` reaches `next_attempt_at`, the next poll starts over as if
//!   the link were idle;
//! - each join attempt pushes `next_attempt_at` out by the connect timeout;
//! - an open stream pushes it out by the idle timeout, and every
//!   [`refresh_idle`](LinkLifecycle::refresh_idle) does so again.

use tracing::{debug, warn};

use crate::time::Timestamp;

/// Coarse state of a network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing attempted yet.
    #[default]
    Idle,
    /// Joining the lower link or opening the stream.
    Connecting,
    /// Stream open, data can flow.
    Connected,
    /// The lower link or stream went away; a new attempt follows.
    Disconnected,
    /// The link can never come up (no hardware).
    Failed,
}

impl ConnectionState {
    /// Short lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        }
    }
}

/// Status reported by a transport's lower link (e.g. the WiFi radio).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not doing anything.
    Idle,
    /// Joined and ready for a stream.
    Connected,
    /// Join in progress, or dropped.
    Disconnected,
    /// The last join failed.
    ConnectFailed,
    /// A joined link dropped.
    ConnectionLost,
    /// No network hardware present.
    NoHardware,
    /// A status code this client does not handle.
    Other(u8),
}

/// What the transport should do after a [`LinkLifecycle::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Nothing changed.
    None,
    /// Drop any open stream and start joining the lower link.
    BeginJoin,
    /// The lower link is up: open the stream and report the result through
    /// [`LinkLifecycle::stream_opened`].
    OpenStream,
    /// Give up for good.
    Halt,
}

/// Reconnect and idle-reset state machine for network transports.
#[derive(Debug, Clone)]
pub struct LinkLifecycle {
    state: ConnectionState,
    last_status: Option<LinkStatus>,
    next_attempt_at: Timestamp,
    idle_deadline: Option<Timestamp>,
    connect_timeout_ms: u64,
    idle_timeout_ms: u64,
    attempts: u64,
}

impl LinkLifecycle {
    /// Create a lifecycle that attempts to connect on its first poll.
    pub fn new(connect_timeout_ms: u64, idle_timeout_ms: u64) -> Self {
        LinkLifecycle {
            state: ConnectionState::Idle,
            last_status: None,
            next_attempt_at: Timestamp::ZERO,
            idle_deadline: None,
            connect_timeout_ms,
            idle_timeout_ms,
            attempts: 0,
        }
    }

    /// Advance the state machine with the lower link's current status.
    pub fn poll(&mut self, now: Timestamp, status: LinkStatus) -> LinkAction {
        if self.state == ConnectionState::Failed {
            return LinkAction::Halt;
        }

        let mut status = status;
        if now >= self.next_attempt_at {
            self.last_status = None;
            status = LinkStatus::Idle;
        }

        if self.last_status == Some(status) {
            return LinkAction::None;
        }
        self.last_status = Some(status);

        match status {
            LinkStatus::Idle | LinkStatus::ConnectFailed | LinkStatus::ConnectionLost => {
                self.state = ConnectionState::Connecting;
                self.next_attempt_at = now.after_ms(self.connect_timeout_ms);
                self.idle_deadline = None;
                self.attempts += 1;
                debug!(
                    "LinkLifecycle: attempt {} at {}, next attempt at {}",
                    self.attempts, now, self.next_attempt_at
                );
                LinkAction::BeginJoin
            }
            LinkStatus::Connected => LinkAction::OpenStream,
            LinkStatus::Disconnected => {
                if self.state == ConnectionState::Connected {
                    self.state = ConnectionState::Disconnected;
                }
                LinkAction::None
            }
            LinkStatus::NoHardware => {
                warn!("LinkLifecycle: no network hardware, giving up");
                self.state = ConnectionState::Failed;
                LinkAction::Halt
            }
            LinkStatus::Other(code) => {
                warn!("LinkLifecycle: unhandled link status {}", code);
                LinkAction::None
            }
        }
    }

    /// Report the result of an [`LinkAction::OpenStream`].
    pub fn stream_opened(&mut self, now: Timestamp, ok: bool) {
        if ok {
            self.state = ConnectionState::Connected;
            self.set_idle_deadline(now);
        } else {
            debug!("LinkLifecycle: stream open failed at {}", now);
            self.state = ConnectionState::Connecting;
            self.next_attempt_at = now.after_ms(self.connect_timeout_ms);
        }
    }

    /// The stream hit EOF or a write failed. The next poll starts over.
    pub fn link_lost(&mut self) {
        if self.state == ConnectionState::Failed {
            return;
        }
        self.state = ConnectionState::Disconnected;
        self.idle_deadline = None;
        self.next_attempt_at = Timestamp::ZERO;
    }

    /// Push the idle deadline out from `now`. Ignored unless connected.
    pub fn refresh_idle(&mut self, now: Timestamp) {
        if self.state == ConnectionState::Connected {
            self.set_idle_deadline(now);
        }
    }

    fn set_idle_deadline(&mut self, now: Timestamp) {
        let deadline = now.after_ms(self.idle_timeout_ms);
        self.idle_deadline = Some(deadline);
        self.next_attempt_at = deadline;
    }

    /// Whether a connected link has gone past its idle deadline.
    pub fn is_idle_expired(&self, now: Timestamp) -> bool {
        self.state == ConnectionState::Connected
            && self.idle_deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn next_attempt_at(&self) -> Timestamp {
        self.next_attempt_at
    }

    pub fn idle_deadline(&self) -> Option<Timestamp> {
        self.idle_deadline
    }

    /// Join attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

/// Fires every `interval_ms`, starting at `t = interval_ms`.
#[derive(Debug, Clone)]
pub struct HeartbeatTimer {
    interval_ms: u64,
    last_sent: Timestamp,
}

impl HeartbeatTimer {
    pub fn new(interval_ms: u64) -> Self {
        HeartbeatTimer {
            interval_ms,
            last_sent: Timestamp::ZERO,
        }
    }

    /// Whether a heartbeat is due at `now`.
    pub fn due(&self, now: Timestamp) -> bool {
        now >= self.last_sent.after_ms(self.interval_ms)
    }

    /// Record a heartbeat attempt. Call whether or not the send succeeded.
    pub fn mark_sent(&mut self, now: Timestamp) {
        self.last_sent = now;
    }

    pub fn last_sent(&self) -> Timestamp {
        self.last_sent
    }
}
