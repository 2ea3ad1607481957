//! State machine behind automatic downloads.
//!
//! ```text
//! Idle --start--> Waiting(delay) --fire--> Firing --rearm--> Waiting(interval) --fire--> ...
//!   \                                         \
//!    `--(auto off / unknown unit)--> Stopped    `--(auto off / unknown unit / stop)--> Stopped
//! ```
//!
//! The machine only decides; arming an actual timer is the caller's job.
//! Every transition reads the configuration passed in, so changed settings
//! apply from the next transition on.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::DownloadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for the first download after start.
    InitialDelay,
    /// Waiting between downloads.
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting { phase: WaitPhase, delay: Duration },
    /// The timer fired and the attempt is in progress.
    Firing,
    Stopped,
}

#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SchedulerState::Waiting { .. } | SchedulerState::Firing
        )
    }

    /// Arm for the first download. Returns the delay to wait, or `None` if
    /// automatic downloads are off (or already scheduled).
    pub fn start(&mut self, config: &DownloadConfig) -> Option<Duration> {
        if self.is_active() {
            debug!("Scheduler already running ({:?})", self.state);
            return None;
        }
        self.arm(config, WaitPhase::InitialDelay)
    }

    /// The timer expired. Returns `false` if nothing was waiting, in which
    /// case no attempt should be made.
    pub fn fire(&mut self) -> bool {
        match self.state {
            SchedulerState::Waiting { phase, .. } => {
                debug!("Scheduler fired ({:?})", phase);
                self.state = SchedulerState::Firing;
                true
            }
            other => {
                debug!("Ignoring timer expiry in state {:?}", other);
                false
            }
        }
    }

    /// The attempt finished. Returns the interval to wait, or `None` when
    /// the schedule ends.
    pub fn rearm(&mut self, config: &DownloadConfig) -> Option<Duration> {
        if self.state != SchedulerState::Firing {
            debug!("Not re-arming from state {:?}", self.state);
            return None;
        }
        self.arm(config, WaitPhase::Interval)
    }

    /// Cancel the schedule. Safe to call in any state.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Stopped {
            debug!("Scheduler stopped (was {:?})", self.state);
        }
        self.state = SchedulerState::Stopped;
    }

    fn arm(&mut self, config: &DownloadConfig, phase: WaitPhase) -> Option<Duration> {
        if !config.auto {
            info!("Automatic download disabled");
            self.state = SchedulerState::Stopped;
            return None;
        }

        let (delay, unit) = match phase {
            WaitPhase::InitialDelay => (config.initial_delay(), &config.delay_unit),
            WaitPhase::Interval => (config.interval_duration(), &config.interval_unit),
        };

        match delay {
            Some(delay) => {
                debug!("Next download in {}s ({:?})", delay.as_secs(), phase);
                self.state = SchedulerState::Waiting { phase, delay };
                Some(delay)
            }
            None => {
                warn!("Unknown time unit '{}', automatic download stopped", unit);
                self.state = SchedulerState::Stopped;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChoiceValue;

    fn config(delay: u32, delay_unit: &str, interval: u32, interval_unit: &str) -> DownloadConfig {
        DownloadConfig {
            delay,
            delay_unit: delay_unit.into(),
            interval,
            interval_unit: interval_unit.into(),
            ..DownloadConfig::default()
        }
    }

    #[test]
    fn test_start_waits_initial_delay() {
        let mut scheduler = Scheduler::new();
        let delay = scheduler.start(&config(5, "minutes", 1, "hours"));

        assert_eq!(delay, Some(Duration::from_secs(300)));
        assert_eq!(
            scheduler.state(),
            SchedulerState::Waiting {
                phase: WaitPhase::InitialDelay,
                delay: Duration::from_secs(300)
            }
        );
    }

    #[test]
    fn test_fire_then_rearm_uses_interval() {
        let cfg = config(5, "seconds", 2, "hours");
        let mut scheduler = Scheduler::new();
        scheduler.start(&cfg);

        assert!(scheduler.fire());
        assert_eq!(scheduler.state(), SchedulerState::Firing);
        assert_eq!(scheduler.rearm(&cfg), Some(Duration::from_secs(7200)));

        assert!(scheduler.fire());
        assert_eq!(scheduler.rearm(&cfg), Some(Duration::from_secs(7200)));
        assert_eq!(
            scheduler.state(),
            SchedulerState::Waiting {
                phase: WaitPhase::Interval,
                delay: Duration::from_secs(7200)
            }
        );
    }

    #[test]
    fn test_disabled_auto_download_stops() {
        let mut cfg = config(5, "minutes", 60, "minutes");
        cfg.auto = false;
        let mut scheduler = Scheduler::new();

        assert_eq!(scheduler.start(&cfg), None);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_disabling_between_fires_stops() {
        let mut cfg = config(1, "seconds", 1, "seconds");
        let mut scheduler = Scheduler::new();
        scheduler.start(&cfg);
        scheduler.fire();

        cfg.auto = false;
        assert_eq!(scheduler.rearm(&cfg), None);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_unknown_unit_stops() {
        let mut scheduler = Scheduler::new();
        assert_eq!(scheduler.start(&config(5, "weeks", 1, "hours")), None);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        let mut scheduler = Scheduler::new();
        let mut cfg = config(5, "minutes", 1, "hours");
        cfg.interval_unit = ChoiceValue::Index(9);
        scheduler.start(&cfg);
        scheduler.fire();
        assert_eq!(scheduler.rearm(&cfg), None);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_stop_is_idempotent_and_blocks_rearm() {
        let cfg = config(1, "seconds", 1, "seconds");
        let mut scheduler = Scheduler::new();
        scheduler.start(&cfg);
        scheduler.fire();

        scheduler.stop();
        scheduler.stop();

        assert_eq!(scheduler.rearm(&cfg), None);
        assert!(!scheduler.fire());
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[test]
    fn test_start_while_waiting_is_noop() {
        let cfg = config(1, "seconds", 1, "seconds");
        let mut scheduler = Scheduler::new();
        assert!(scheduler.start(&cfg).is_some());
        assert!(scheduler.start(&cfg).is_none());
    }

    #[test]
    fn test_restart_after_stop() {
        let cfg = config(3, "seconds", 1, "seconds");
        let mut scheduler = Scheduler::new();
        scheduler.stop();
        assert_eq!(scheduler.start(&cfg), Some(Duration::from_secs(3)));
    }
}
