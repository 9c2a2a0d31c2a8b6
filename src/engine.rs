//! Focus-driven suspend/resume state machine.
//!
//! The engine owns no timer and no socket. Callers feed it window snapshots
//! and focus changes; it answers with a [`TimerCommand`] for the debounce
//! timer and drives a [`DescendantSource`] and a [`ProcessSignaller`].

use ahash::AHashSet as HashSet;
use tracing::{debug, info, warn};

use crate::ipc::{FocusChange, WindowInfo};
use crate::process::{DescendantSource, HarvestError, Pid, ProcessSignaller};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    Running,
    /// Unfocused; waiting for the debounce timer.
    Pending,
    /// Stopped. `roots` are the window pids seen at suspension time and
    /// `stopped` every pid that was sent SIGSTOP.
    Suspended { roots: Vec<Pid>, stopped: Vec<Pid> },
}

/// What the caller should do with the debounce timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    Arm,
    Cancel,
    Keep,
}

#[derive(Debug, Clone)]
pub struct TrackedApp {
    pub id: String,
    pub state: AppState,
}

impl TrackedApp {
    pub fn is_suspended(&self) -> bool {
        matches!(self.state, AppState::Suspended { .. })
    }
}

pub struct SuspensionEngine<D, S> {
    apps: Vec<TrackedApp>,
    source: D,
    signaller: S,
    self_pid: Pid,
    timer_armed: bool,
}

impl<D: DescendantSource, S: ProcessSignaller> SuspensionEngine<D, S> {
    pub fn new(app_ids: impl IntoIterator<Item = impl Into<String>>, source: D, signaller: S) -> Self {
        let mut apps: Vec<TrackedApp> = Vec::new();
        for id in app_ids {
            let id = id.into();
            if apps.iter().any(|a| a.id == id) {
                continue;
            }
            apps.push(TrackedApp {
                id,
                state: AppState::Running,
            });
        }
        Self {
            apps,
            source,
            signaller,
            self_pid: std::process::id(),
            timer_armed: false,
        }
    }

    /// Overrides the pid that is never stopped.
    pub fn with_self_pid(mut self, pid: Pid) -> Self {
        self.self_pid = pid;
        self
    }

    pub fn apps(&self) -> &[TrackedApp] {
        &self.apps
    }

    pub fn app(&self, id: &str) -> Option<&TrackedApp> {
        self.apps.iter().find(|a| a.id == id)
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.app(id).is_some()
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn signaller(&self) -> &S {
        &self.signaller
    }

    pub fn source(&self) -> &D {
        &self.source
    }

    /// Arms the timer when a tracked application already has a window.
    pub fn on_startup(&mut self, windows: &[WindowInfo]) -> TimerCommand {
        let present = windows.iter().any(|w| self.is_tracked(&w.app_id));
        if !present {
            debug!("No tracked application on screen at startup");
            return TimerCommand::Keep;
        }
        self.arm()
    }

    pub fn on_focus(&mut self, change: &FocusChange) -> Result<TimerCommand, HarvestError> {
        let Some(index) = self.apps.iter().position(|a| a.id == change.app_id) else {
            if self.apps.iter().any(|a| !a.is_suspended()) {
                return Ok(self.arm());
            }
            return Ok(TimerCommand::Keep);
        };

        debug!("Tracked application {} focused", change.app_id);
        let result = if self.apps[index].is_suspended() {
            self.resume_app(index)
        } else {
            Ok(())
        };
        for app in &mut self.apps {
            if app.state == AppState::Pending {
                app.state = AppState::Running;
            }
        }
        self.timer_armed = false;
        result.map(|()| TimerCommand::Cancel)
    }

    /// Suspends every tracked application that is on screen and unfocused.
    ///
    /// Returns the number of applications suspended by this call.
    pub fn on_debounce_expired(&mut self, windows: &[WindowInfo]) -> Result<usize, HarvestError> {
        self.timer_armed = false;
        let mut suspended = 0;

        for index in 0..self.apps.len() {
            if self.apps[index].is_suspended() {
                continue;
            }

            let id = self.apps[index].id.clone();
            let own: Vec<&WindowInfo> = windows.iter().filter(|w| w.app_id == id).collect();
            if own.is_empty() {
                debug!("{} has no window, leaving it alone", id);
                self.apps[index].state = AppState::Running;
                continue;
            }
            if own.iter().any(|w| w.focused) {
                self.apps[index].state = AppState::Running;
                continue;
            }

            let mut roots: Vec<Pid> = Vec::with_capacity(own.len());
            for w in &own {
                if !roots.contains(&w.pid) {
                    roots.push(w.pid);
                }
            }

            let pids: Vec<Pid> = self
                .source
                .descendants_of(&roots)?
                .into_iter()
                .filter(|&pid| pid != self.self_pid)
                .collect();
            let delivered = self.signaller.stop(&pids);
            info!(
                "Suspended {} ({} of {} processes stopped)",
                id,
                delivered,
                pids.len()
            );

            self.apps[index].state = AppState::Suspended {
                roots,
                stopped: pids,
            };
            suspended += 1;
        }
        Ok(suspended)
    }

    /// Resumes every suspended application.
    ///
    /// Every application is attempted; the first harvest error is returned
    /// after the rest have been handled.
    pub fn resume_all(&mut self) -> Result<(), HarvestError> {
        let mut first_error = None;
        for index in 0..self.apps.len() {
            if !self.apps[index].is_suspended() {
                continue;
            }
            if let Err(e) = self.resume_app(index) {
                first_error.get_or_insert(e);
            }
        }
        self.timer_armed = false;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn arm(&mut self) -> TimerCommand {
        for app in &mut self.apps {
            if app.state == AppState::Running {
                app.state = AppState::Pending;
            }
        }
        self.timer_armed = true;
        TimerCommand::Arm
    }

    /// Continues everything stopped for the app plus whatever now descends
    /// from its roots. On harvest failure only the recorded set is continued.
    fn resume_app(&mut self, index: usize) -> Result<(), HarvestError> {
        let AppState::Suspended { roots, stopped } =
            std::mem::replace(&mut self.apps[index].state, AppState::Running)
        else {
            return Ok(());
        };
        let id = &self.apps[index].id;

        let (found, result) = match self.source.descendants_of(&roots) {
            Ok(pids) => (pids, Ok(())),
            Err(e) => {
                warn!("Harvest failed while resuming {}: {}; resuming recorded processes only", id, e);
                (Vec::new(), Err(e))
            }
        };

        let mut seen = HashSet::new();
        let pids: Vec<Pid> = stopped
            .into_iter()
            .chain(roots)
            .chain(found)
            .filter(|&p| p != self.self_pid && seen.insert(p))
            .collect();
        let resumed = self.signaller.resume(&pids);
        info!("Resumed {} ({} of {} processes)", id, resumed, pids.len());
        result
    }
}
