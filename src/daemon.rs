//! Event loop: compositor events, the debounce timer and termination signals.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep, Instant, Sleep};
use tracing::{debug, error, info, trace};

use sway_freezer::engine::{SuspensionEngine, TimerCommand};
use sway_freezer::ipc::{Event, EventKind, IpcClient};
use sway_freezer::process::{DescendantSource, HarvestError, Harvester, NixSignaller, ProcessSignaller};

use crate::config::Config;

/// Re-armable one-shot timer.
pub struct Debounce {
    sleep: Pin<Box<Sleep>>,
    delay: Duration,
    armed: bool,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            sleep: Box::pin(sleep(delay)),
            delay,
            armed: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Restarts the full delay from now.
    pub fn arm(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.delay);
        self.armed = true;
    }

    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn apply(&mut self, command: TimerCommand) {
        match command {
            TimerCommand::Arm => self.arm(),
            TimerCommand::Cancel => self.cancel(),
            TimerCommand::Keep => {}
        }
    }

    /// Completes once the armed delay has elapsed. Pends forever when idle.
    pub async fn expired(&mut self) {
        if !self.armed {
            std::future::pending::<()>().await;
        }
        self.sleep.as_mut().await;
        self.armed = false;
    }
}

/// Resumes every suspended application when dropped, whatever the exit path.
pub struct ResumeGuard<D: DescendantSource, S: ProcessSignaller> {
    engine: SuspensionEngine<D, S>,
}

impl<D: DescendantSource, S: ProcessSignaller> ResumeGuard<D, S> {
    pub fn new(engine: SuspensionEngine<D, S>) -> Self {
        Self { engine }
    }

    /// Resumes everything now and reports harvest failures to the caller.
    pub fn finish(mut self) -> Result<(), HarvestError> {
        self.engine.resume_all()
    }
}

impl<D: DescendantSource, S: ProcessSignaller> Deref for ResumeGuard<D, S> {
    type Target = SuspensionEngine<D, S>;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl<D: DescendantSource, S: ProcessSignaller> DerefMut for ResumeGuard<D, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.engine
    }
}

impl<D: DescendantSource, S: ProcessSignaller> Drop for ResumeGuard<D, S> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.resume_all() {
            error!("Resume on exit incomplete: {}", e);
        }
    }
}

/// Runs until the compositor shuts down or a termination signal arrives.
pub async fn run(config: &Config, socket: &Path) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    let mut commands = IpcClient::connect(socket).await?;
    let mut events = IpcClient::connect(socket).await?;
    events
        .subscribe(&[EventKind::Window, EventKind::Shutdown])
        .await
        .context("Failed to subscribe to compositor events")?;

    let harvester = Harvester::new(config.harvest_config());
    let mut engine = ResumeGuard::new(SuspensionEngine::new(
        config.apps.iter().cloned(),
        harvester,
        NixSignaller,
    ));
    let mut timer = Debounce::new(config.delay());

    info!(
        "Tracking {:?} with a {}s debounce",
        config.apps, config.delay_seconds
    );

    let windows = commands
        .get_tree()
        .await
        .context("Failed to fetch window tree")?
        .windows();
    timer.apply(engine.on_startup(&windows));

    loop {
        tokio::select! {
            event = events.next_event() => {
                match event.context("Compositor event stream failed")? {
                    Event::Window(window) => {
                        let Some(change) = window.focus_change() else {
                            trace!("Ignoring window event {:?}", window.change);
                            continue;
                        };
                        debug!("Focus moved to {}", change.app_id);
                        timer.apply(engine.on_focus(&change)?);
                    }
                    Event::Shutdown => {
                        info!("Compositor shutting down, exiting...");
                        break;
                    }
                    Event::Other(kind) => trace!("Ignoring event type {:#x}", kind),
                }
            }
            () = timer.expired(), if timer.is_armed() => {
                let windows = commands
                    .get_tree()
                    .await
                    .context("Failed to fetch window tree")?
                    .windows();
                let suspended = engine.on_debounce_expired(&windows)?;
                debug!("Debounce elapsed, {} application(s) suspended", suspended);
            }
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                break;
            }
        }
    }

    engine
        .finish()
        .context("Failed to resume every suspended process")
}
