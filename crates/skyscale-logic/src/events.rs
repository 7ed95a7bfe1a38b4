//! Safety event log - bounded, severity-tagged diagnostic history.
//!
//! Every guard and monitor reports notable findings as a [`SafetyEvent`].
//! The log keeps the most recent `capacity` events and evicts the oldest
//! first. [`SafetyStatistics`] is kept separately: clearing the log never
//! rewinds the counters.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Impact of an event, ordered from benign to unrecoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SafetySeverity {
    /// Noteworthy but benign (verbose clamp logging).
    Info,
    /// A corrected, non-destructive anomaly.
    Warning,
    /// A value had to be discarded or zeroed.
    Error,
    /// State integrity required active recovery.
    Critical,
    /// Cannot be remediated here; the host decides whether to halt.
    Fatal,
}

impl SafetySeverity {
    pub fn label(self) -> &'static str {
        match self {
            SafetySeverity::Info => "INFO",
            SafetySeverity::Warning => "WARNING",
            SafetySeverity::Error => "ERROR",
            SafetySeverity::Critical => "CRITICAL",
            SafetySeverity::Fatal => "FATAL",
        }
    }

    /// Critical and Fatal events count toward the critical counter.
    pub fn is_critical(self) -> bool {
        self >= SafetySeverity::Critical
    }
}

impl std::fmt::Display for SafetySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One immutable diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub severity: SafetySeverity,
    pub message: String,
    /// Name of the actor/entity the event concerns, if any.
    pub subject: Option<String>,
    /// Simulation time in seconds when the event was recorded.
    pub timestamp: f64,
}

/// Running counters for the life of the subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyStatistics {
    pub total_events: u64,
    pub critical_events: u64,
    pub recovery_operations: u64,
    pub desync_events: u64,
    pub consensus_failures: u64,
    /// Timestamp of the most recent event, if any was logged.
    pub last_event_time: Option<f64>,
}

/// FIFO-evicting event buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyEventLog {
    events: VecDeque<SafetyEvent>,
    capacity: usize,
}

impl SafetyEventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, event: SafetyEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    /// The newest `count` events, oldest first.
    pub fn recent(&self, count: usize) -> Vec<SafetyEvent> {
        let skip = self.events.len().saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// All retained events at or above `min` severity, oldest first.
    pub fn with_severity(&self, min: SafetySeverity) -> Vec<SafetyEvent> {
        self.events
            .iter()
            .filter(|e| e.severity >= min)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &SafetyEvent> {
        self.events.iter()
    }
}

impl SafetyStatistics {
    /// Fold one event into the counters.
    pub fn record(&mut self, event: &SafetyEvent) {
        self.total_events += 1;
        if event.severity.is_critical() {
            self.critical_events += 1;
        }
        self.last_event_time = Some(event.timestamp);
    }
}

/// Forward an event to the `log` facade on the channel matching its severity.
///
/// Info events marked `verbose` go to the debug channel so routine clamp
/// chatter stays out of normal output.
pub fn dispatch_to_log(event: &SafetyEvent, verbose: bool) {
    let subject = event.subject.as_deref().unwrap_or("-");
    match event.severity {
        SafetySeverity::Info if verbose => {
            log::debug!("[safety] {} ({})", event.message, subject)
        }
        SafetySeverity::Info => log::info!("[safety] {} ({})", event.message, subject),
        SafetySeverity::Warning => log::warn!("[safety] {} ({})", event.message, subject),
        SafetySeverity::Error => log::error!("[safety] {} ({})", event.message, subject),
        SafetySeverity::Critical | SafetySeverity::Fatal => log::error!(
            "[safety] {}: {} ({}) at t={:.3}",
            event.severity,
            event.message,
            subject,
            event.timestamp
        ),
    }
}
