//! Drives the download schedule on the GLib main loop.
//!
//! The pure [`Scheduler`] decides, this service owns the single timer
//! source and dispatches cycles to a blocking worker. A scheduled cycle
//! re-arms only after it has finished, so scheduled attempts never overlap;
//! the controller's in-flight guard covers manual downloads.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use arachne_cdl_core::download::SkipReason;
use arachne_cdl_core::schedule::SchedulerState;
use arachne_cdl_core::{Config, DownloadController, Outcome, Scheduler, Trigger};

use super::config_manager::ConfigManager;

pub struct DownloadService {
    controller: Arc<DownloadController>,
    settings: Arc<ConfigManager>,
    scheduler: RefCell<Scheduler>,
    /// Pending timer. Taken by the callback before it returns, so a stored
    /// id always refers to a live source.
    timer: RefCell<Option<glib::SourceId>>,
}

impl DownloadService {
    pub fn new(controller: Arc<DownloadController>, settings: Arc<ConfigManager>) -> Rc<Self> {
        Rc::new(Self {
            controller,
            settings,
            scheduler: RefCell::new(Scheduler::new()),
            timer: RefCell::new(None),
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.borrow().state()
    }

    /// Begin automatic downloads according to the current configuration.
    pub fn start(self: &Rc<Self>) {
        let config = self.settings.config();
        let delay = self.scheduler.borrow_mut().start(&config.download);
        if let Some(delay) = delay {
            info!("First download in {}s", delay.as_secs());
            self.arm(delay);
        }
    }

    /// Cancel the schedule. Idempotent; a cycle already running completes
    /// but is not followed by another.
    pub fn stop(&self) {
        self.cancel_timer();
        self.scheduler.borrow_mut().stop();
    }

    /// Run a manual download on a worker without touching the schedule.
    pub fn download_now(self: &Rc<Self>) {
        let controller = Arc::clone(&self.controller);
        glib::spawn_future_local(async move {
            run_cycle(controller, Trigger::Manual).await;
        });
    }

    /// React to a reloaded configuration. Only switching automatic
    /// downloads on or off acts immediately; everything else applies from
    /// the next transition.
    pub fn reconfigure(self: &Rc<Self>, old: &Config, new: &Config) {
        if old.download.auto == new.download.auto {
            return;
        }
        if new.download.auto {
            if !self.scheduler.borrow().is_active() {
                info!("Automatic download enabled");
                self.start();
            }
        } else {
            info!("Automatic download disabled");
            self.stop();
        }
    }

    fn arm(self: &Rc<Self>, delay: Duration) {
        self.cancel_timer();

        let weak = Rc::downgrade(self);
        let id = glib::timeout_add_local(delay, move || {
            if let Some(this) = weak.upgrade() {
                this.timer.borrow_mut().take();
                this.on_timer();
            }
            glib::ControlFlow::Break
        });
        *self.timer.borrow_mut() = Some(id);
    }

    fn cancel_timer(&self) {
        if let Some(id) = self.timer.borrow_mut().take() {
            id.remove();
            debug!("Download timer cancelled");
        }
    }

    fn on_timer(self: &Rc<Self>) {
        if !self.scheduler.borrow_mut().fire() {
            return;
        }

        let controller = Arc::clone(&self.controller);
        let this = Rc::clone(self);
        glib::spawn_future_local(async move {
            run_cycle(controller, Trigger::Scheduled).await;
            this.rearm();
        });
    }

    fn rearm(self: &Rc<Self>) {
        let config = self.settings.config();
        let next = self.scheduler.borrow_mut().rearm(&config.download);
        if let Some(delay) = next {
            self.arm(delay);
        }
    }
}

async fn run_cycle(controller: Arc<DownloadController>, trigger: Trigger) {
    match gio::spawn_blocking(move || controller.run(trigger)).await {
        Ok(outcome) => log_outcome(trigger, &outcome),
        Err(_) => error!("{:?} download worker panicked", trigger),
    }
}

fn log_outcome(trigger: Trigger, outcome: &Outcome) {
    match outcome {
        Outcome::Applied(applied) => debug!("{:?} download finished: {}", trigger, applied),
        Outcome::Skipped(SkipReason::NotAllowed) => {
            debug!("{:?} download skipped by policy", trigger)
        }
        Outcome::Skipped(SkipReason::Busy) => {
            debug!("{:?} download skipped, another one is running", trigger)
        }
        // Already reported by the controller.
        Outcome::Failed(_) => {}
    }
}
