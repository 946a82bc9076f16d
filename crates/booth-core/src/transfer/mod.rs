//! File transfer engine for Transfer Booth.
//!
//! This module holds the externally observable transfer model and its
//! supporting pieces:
//!
//! - [`TransferInfo`] and [`TransferState`] - the state of one transfer
//! - [`TransferHandle`] - shared, mutation-checked access to that state
//! - [`SpeedTracker`] - rolling-window throughput measurement
//! - [`session`] - the sender/receiver wire protocol state machines
//! - [`manager`] - listener, per-transfer lifecycle and acceptance slots
//!
//! ## State machine
//!
//! ```text
//! PENDING → CONNECTING → TRANSFERRING ⇄ PAUSED / PAUSED_BY_PEER
//! AWAITING_ACCEPTANCE → TRANSFERRING | REJECTED        (receiver)
//! any non-terminal → COMPLETED | FAILED | CANCELLED
//! ```
//!
//! `COMPLETED`, `FAILED`, `CANCELLED` and `REJECTED` are terminal; no
//! transition ever leaves a terminal state.

pub mod manager;
pub mod session;

pub use manager::TransferManager;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// All possible states of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Queued, not yet connected
    Pending,
    /// Incoming transfer waiting for the user's decision
    AwaitingAcceptance,
    /// Rejected by the receiver (or acceptance timed out)
    Rejected,
    /// Sender is opening the connection
    Connecting,
    /// Data is flowing
    Transferring,
    /// Paused by local intent
    Paused,
    /// Paused by the remote side
    PausedByPeer,
    /// Finished successfully
    Completed,
    /// Failed with an error
    Failed,
    /// Cancelled by either side
    Cancelled,
}

impl TransferState {
    /// Whether this state is terminal. No transitions leave a terminal
    /// state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Rejected
        )
    }

    /// Whether the transfer is paused from either side.
    #[must_use]
    pub const fn is_paused(self) -> bool {
        matches!(self, Self::Paused | Self::PausedByPeer)
    }
}

/// Direction of a transfer, from the local device's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Local device is the sender
    Sending,
    /// Local device is the receiver
    Receiving,
}

impl TransferDirection {
    /// Whether the local device is the sender.
    #[must_use]
    pub const fn is_sending(self) -> bool {
        matches!(self, Self::Sending)
    }
}

/// Full externally observable state of a single file transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferInfo {
    /// Transfer identifier (UUID string)
    pub transfer_id: String,
    /// File name
    pub file_name: String,
    /// Total file size in bytes
    pub file_size: u64,
    /// Bytes transferred so far (includes any resumed offset)
    pub transferred_bytes: u64,
    /// Current state
    pub state: TransferState,
    /// Direction from the local device's point of view
    pub direction: TransferDirection,
    /// Peer's device id
    pub peer_device_id: String,
    /// Peer's display name (upgraded to the real name once verified)
    pub peer_device_name: String,
    /// Current throughput in bytes per second
    pub speed_bps: f64,
    /// Progress percentage in `[0, 100]`
    pub progress_percent: f64,
    /// Estimated seconds remaining at the current speed
    pub eta_seconds: f64,
    /// Error description once the transfer has failed
    pub error_message: Option<String>,
}

impl TransferInfo {
    /// Create a new transfer record in the `Pending` state.
    #[must_use]
    pub fn new(
        transfer_id: String,
        file_name: String,
        file_size: u64,
        direction: TransferDirection,
        peer_device_id: String,
        peer_device_name: String,
    ) -> Self {
        Self {
            transfer_id,
            file_name,
            file_size,
            transferred_bytes: 0,
            state: TransferState::Pending,
            direction,
            peer_device_id,
            peer_device_name,
            speed_bps: 0.0,
            progress_percent: 0.0,
            eta_seconds: 0.0,
            error_message: None,
        }
    }
}

/// Shared handle to one transfer's state.
///
/// The handle is shared between the session task driving the wire, the
/// manager (which mutates state on user commands) and event emission.
/// Locking is internal and never held across await points; terminal
/// states are enforced here so that no caller can transition out of one.
#[derive(Debug, Clone)]
pub struct TransferHandle {
    inner: Arc<Mutex<TransferInfo>>,
}

impl TransferHandle {
    /// Wrap a transfer record in a shared handle.
    #[must_use]
    pub fn new(info: TransferInfo) -> Self {
        Self {
            inner: Arc::new(Mutex::new(info)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TransferInfo> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot the current state for serialization or event emission.
    #[must_use]
    pub fn snapshot(&self) -> TransferInfo {
        self.lock().clone()
    }

    /// The transfer id.
    #[must_use]
    pub fn transfer_id(&self) -> String {
        self.lock().transfer_id.clone()
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> TransferState {
        self.lock().state
    }

    /// Attempt a state transition.
    ///
    /// Returns `false` without mutating if the transfer is already in a
    /// terminal state or already in `state`.
    pub fn set_state(&self, state: TransferState) -> bool {
        let mut info = self.lock();
        if info.state.is_terminal() || info.state == state {
            return false;
        }
        info.state = state;
        true
    }

    /// Mark the transfer failed with an error message.
    ///
    /// Has no effect if the transfer already reached a terminal state.
    pub fn fail(&self, message: &str) -> bool {
        let mut info = self.lock();
        if info.state.is_terminal() {
            return false;
        }
        info.state = TransferState::Failed;
        info.error_message = Some(message.to_string());
        true
    }

    /// Mark the transfer completed, settling the progress fields.
    ///
    /// Has no effect if the transfer already reached a terminal state.
    pub fn complete(&self) -> bool {
        let mut info = self.lock();
        if info.state.is_terminal() {
            return false;
        }
        info.state = TransferState::Completed;
        info.progress_percent = 100.0;
        info.speed_bps = 0.0;
        info.eta_seconds = 0.0;
        true
    }

    /// Reset the transferred byte counter (used when resuming from an
    /// offset).
    pub fn set_transferred(&self, bytes: u64) {
        self.lock().transferred_bytes = bytes;
    }

    /// Account for newly transferred bytes.
    pub fn add_transferred(&self, bytes: u64) {
        self.lock().transferred_bytes += bytes;
    }

    /// Replace the peer's display name (after identity verification).
    pub fn set_peer_name(&self, name: &str) {
        self.lock().peer_device_name = name.to_string();
    }

    /// Refresh the derived progress fields from the byte counters and the
    /// given speed, returning a snapshot for emission.
    #[must_use]
    pub fn update_progress(&self, speed_bps: f64) -> TransferInfo {
        let mut info = self.lock();
        info.speed_bps = speed_bps;
        info.progress_percent = if info.file_size > 0 {
            (info.transferred_bytes as f64 / info.file_size as f64) * 100.0
        } else {
            100.0
        };
        let remaining = info.file_size.saturating_sub(info.transferred_bytes);
        info.eta_seconds = if speed_bps > 0.0 {
            remaining as f64 / speed_bps
        } else {
            0.0
        };
        info.clone()
    }
}

/// Rolling average speed calculator.
///
/// Keeps samples inside a sliding window and reports throughput over it.
#[derive(Debug)]
pub struct SpeedTracker {
    window: Duration,
    samples: VecDeque<(Instant, u64)>,
}

impl SpeedTracker {
    /// Create a tracker with the default 2 second window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(2))
    }

    /// Create a tracker with a specific window.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Record a transferred byte count.
    pub fn record(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back((now, bytes));

        if let Some(cutoff) = now.checked_sub(self.window) {
            while self
                .samples
                .front()
                .is_some_and(|(at, _)| *at < cutoff)
            {
                self.samples.pop_front();
            }
        }
    }

    /// Current speed in bytes per second, `0.0` until enough samples
    /// accumulate.
    #[must_use]
    pub fn speed_bps(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }

        let first = self.samples.front().map(|(at, _)| *at);
        let last = self.samples.back().map(|(at, _)| *at);
        let (Some(first), Some(last)) = (first, last) else {
            return 0.0;
        };

        let elapsed = last.duration_since(first).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }

        let total: u64 = self.samples.iter().skip(1).map(|(_, b)| *b).sum();
        total as f64 / elapsed
    }
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle() -> TransferHandle {
        TransferHandle::new(TransferInfo::new(
            "t-1".to_string(),
            "foo.bin".to_string(),
            1000,
            TransferDirection::Sending,
            "peer".to_string(),
            "Peer".to_string(),
        ))
    }

    #[test]
    fn test_state_wire_names() {
        let json = serde_json::to_string(&TransferState::AwaitingAcceptance).expect("serialize");
        assert_eq!(json, "\"awaiting_acceptance\"");

        let state: TransferState = serde_json::from_str("\"paused_by_peer\"").expect("parse");
        assert_eq!(state, TransferState::PausedByPeer);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TransferState::Completed.is_terminal());
        assert!(TransferState::Failed.is_terminal());
        assert!(TransferState::Cancelled.is_terminal());
        assert!(TransferState::Rejected.is_terminal());
        assert!(!TransferState::Transferring.is_terminal());
        assert!(!TransferState::Paused.is_terminal());
    }

    #[test]
    fn test_terminal_state_cannot_transition() {
        let handle = test_handle();
        assert!(handle.set_state(TransferState::Cancelled));
        assert!(!handle.set_state(TransferState::Transferring));
        assert!(!handle.fail("too late"));
        assert!(!handle.complete());
        assert_eq!(handle.state(), TransferState::Cancelled);
        assert!(handle.snapshot().error_message.is_none());
    }

    #[test]
    fn test_fail_records_message() {
        let handle = test_handle();
        assert!(handle.fail("connection reset"));

        let info = handle.snapshot();
        assert_eq!(info.state, TransferState::Failed);
        assert_eq!(info.error_message.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_complete_settles_progress() {
        let handle = test_handle();
        handle.set_transferred(1000);
        assert!(handle.complete());

        let info = handle.snapshot();
        assert_eq!(info.state, TransferState::Completed);
        assert!((info.progress_percent - 100.0).abs() < f64::EPSILON);
        assert!(info.speed_bps.abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_progress_bounds() {
        let handle = test_handle();
        handle.set_transferred(250);

        let info = handle.update_progress(500.0);
        assert!((info.progress_percent - 25.0).abs() < f64::EPSILON);
        assert!((info.eta_seconds - 1.5).abs() < f64::EPSILON);
        assert!(info.transferred_bytes <= info.file_size);
    }

    #[test]
    fn test_update_progress_zero_size_file() {
        let handle = TransferHandle::new(TransferInfo::new(
            "t-2".to_string(),
            "empty.bin".to_string(),
            0,
            TransferDirection::Receiving,
            "peer".to_string(),
            "Peer".to_string(),
        ));

        let info = handle.update_progress(0.0);
        assert!((info.progress_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_speed_tracker_empty_is_zero() {
        let tracker = SpeedTracker::new();
        assert!(tracker.speed_bps().abs() < f64::EPSILON);
    }

    #[test]
    fn test_speed_tracker_measures_throughput() {
        let mut tracker = SpeedTracker::with_window(Duration::from_secs(10));
        tracker.record(0);
        std::thread::sleep(Duration::from_millis(50));
        tracker.record(50_000);
        std::thread::sleep(Duration::from_millis(50));
        tracker.record(50_000);

        let speed = tracker.speed_bps();
        assert!(speed > 0.0, "speed should be positive, got {speed}");
    }

    #[test]
    fn test_speed_tracker_drops_old_samples() {
        let mut tracker = SpeedTracker::with_window(Duration::from_millis(20));
        tracker.record(1_000_000);
        std::thread::sleep(Duration::from_millis(40));
        tracker.record(10);
        // The old sample fell out of the window, leaving a single sample
        assert!(tracker.speed_bps().abs() < f64::EPSILON);
    }
}
