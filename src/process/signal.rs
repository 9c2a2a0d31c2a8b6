//! Pause/resume capability over a set of processes.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as NixPid;
use tracing::{debug, warn};

use super::Pid;

/// Delivers stop/continue to a set of processes.
///
/// Failures on individual pids are not errors: the pass continues with the
/// remaining processes. Both methods return how many signals were delivered.
pub trait ProcessSignaller {
    fn stop(&mut self, pids: &[Pid]) -> usize;
    fn resume(&mut self, pids: &[Pid]) -> usize;
}

/// `kill(2)`-backed signaller: `SIGSTOP` to pause, `SIGCONT` to resume.
#[derive(Debug, Default, Clone, Copy)]
pub struct NixSignaller;

impl NixSignaller {
    fn send(pids: &[Pid], signal: Signal) -> usize {
        let mut delivered = 0;
        for &pid in pids {
            let Ok(raw) = i32::try_from(pid) else {
                warn!("pid {} out of range, not sending {}", pid, signal);
                continue;
            };
            match kill(NixPid::from_raw(raw), signal) {
                Ok(()) => delivered += 1,
                Err(Errno::ESRCH) => debug!("pid {} exited before {}", pid, signal),
                Err(e) => warn!("kill({}, {}) failed: {}", pid, signal, e),
            }
        }
        delivered
    }
}

impl ProcessSignaller for NixSignaller {
    fn stop(&mut self, pids: &[Pid]) -> usize {
        Self::send(pids, Signal::SIGSTOP)
    }

    fn resume(&mut self, pids: &[Pid]) -> usize {
        Self::send(pids, Signal::SIGCONT)
    }
}
