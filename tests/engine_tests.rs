//! Integration tests for the suspension state machine.
//!
//! Process trees come from an in-memory adjacency map and signals are
//! recorded instead of delivered.

use sway_freezer::engine::{AppState, SuspensionEngine, TimerCommand};
use sway_freezer::ipc::{FocusChange, WindowInfo};
use sway_freezer::process::{
    AdjacencyMap, DescendantSource, HarvestError, Pid, ProcessSignaller,
};

/// Descendant source backed by a fixed map; counts harvest passes.
struct FixedTree {
    map: AdjacencyMap,
    passes: usize,
}

impl DescendantSource for FixedTree {
    fn descendants_of(&mut self, roots: &[Pid]) -> Result<Vec<Pid>, HarvestError> {
        self.passes += 1;
        Ok(self.map.descendants_of(roots))
    }
}

#[derive(Default)]
struct RecordingSignaller {
    stopped: Vec<Pid>,
    resumed: Vec<Pid>,
}

impl ProcessSignaller for RecordingSignaller {
    fn stop(&mut self, pids: &[Pid]) -> usize {
        self.stopped.extend_from_slice(pids);
        pids.len()
    }

    fn resume(&mut self, pids: &[Pid]) -> usize {
        self.resumed.extend_from_slice(pids);
        pids.len()
    }
}

type Engine = SuspensionEngine<FixedTree, RecordingSignaller>;

/// firefox: two windows (100, 200); 100 → 101 → 102, 200 → 201.
/// foot: one window (300) with a shell 301.
fn engine() -> Engine {
    let map = AdjacencyMap::from_links([(101, 100), (102, 101), (201, 200), (301, 300)]);
    SuspensionEngine::new(
        ["firefox"],
        FixedTree { map, passes: 0 },
        RecordingSignaller::default(),
    )
    .with_self_pid(1)
}

fn window(app_id: &str, pid: Pid, focused: bool) -> WindowInfo {
    WindowInfo {
        app_id: app_id.to_string(),
        pid,
        focused,
    }
}

fn focus(app_id: &str) -> FocusChange {
    FocusChange {
        app_id: app_id.to_string(),
        pid: None,
    }
}

fn firefox_unfocused() -> Vec<WindowInfo> {
    vec![
        window("firefox", 100, false),
        window("firefox", 200, false),
        window("foot", 300, true),
    ]
}

fn sorted(v: &[Pid]) -> Vec<Pid> {
    let mut v = v.to_vec();
    v.sort_unstable();
    v
}

#[test]
fn test_unfocus_then_debounce_suspends_each_descendant_once() {
    let mut e = engine();

    assert_eq!(e.on_focus(&focus("firefox")).unwrap(), TimerCommand::Cancel);
    assert_eq!(e.on_focus(&focus("foot")).unwrap(), TimerCommand::Arm);
    assert_eq!(e.app("firefox").unwrap().state, AppState::Pending);
    assert!(e.timer_armed());

    assert_eq!(e.on_debounce_expired(&firefox_unfocused()).unwrap(), 1);

    let stopped = &e.signaller().stopped;
    assert_eq!(sorted(stopped), vec![100, 101, 102, 200, 201]);
    assert_eq!(e.source().passes, 1);
    assert_eq!(
        e.app("firefox").unwrap().state,
        AppState::Suspended {
            roots: vec![100, 200],
            stopped: stopped.clone(),
        }
    );
    assert!(e.signaller().resumed.is_empty());
}

#[test]
fn test_refocus_while_pending_never_signals() {
    let mut e = engine();

    assert_eq!(e.on_focus(&focus("foot")).unwrap(), TimerCommand::Arm);
    assert_eq!(e.on_focus(&focus("firefox")).unwrap(), TimerCommand::Cancel);
    assert_eq!(e.app("firefox").unwrap().state, AppState::Running);
    assert!(!e.timer_armed());

    assert!(e.signaller().stopped.is_empty());
    assert!(e.signaller().resumed.is_empty());
    assert_eq!(e.source().passes, 0);
}

#[test]
fn test_refocus_while_suspended_resumes_each_descendant_once() {
    let mut e = engine();
    e.on_focus(&focus("foot")).unwrap();
    e.on_debounce_expired(&firefox_unfocused()).unwrap();

    assert_eq!(e.on_focus(&focus("firefox")).unwrap(), TimerCommand::Cancel);

    let resumed = &e.signaller().resumed;
    assert_eq!(sorted(resumed), vec![100, 101, 102, 200, 201]);
    assert_eq!(e.app("firefox").unwrap().state, AppState::Running);

    // A second focus event for the same app sends nothing more.
    e.on_focus(&focus("firefox")).unwrap();
    assert_eq!(e.signaller().resumed.len(), 5);
}

#[test]
fn test_resume_all_on_exit() {
    let mut e = engine();
    e.on_focus(&focus("foot")).unwrap();
    e.on_debounce_expired(&firefox_unfocused()).unwrap();

    e.resume_all().unwrap();
    assert_eq!(sorted(&e.signaller().resumed), vec![100, 101, 102, 200, 201]);
    assert!(e.apps().iter().all(|a| !a.is_suspended()));

    // Nothing left to resume the second time.
    e.resume_all().unwrap();
    assert_eq!(e.signaller().resumed.len(), 5);
}

#[test]
fn test_resume_reharvests_stored_roots() {
    let mut e = engine();
    e.on_focus(&focus("foot")).unwrap();
    e.on_debounce_expired(&firefox_unfocused()).unwrap();
    assert_eq!(e.source().passes, 1);

    // The compositor is not consulted: resume walks the roots recorded at
    // suspension time.
    e.on_focus(&focus("firefox")).unwrap();
    assert_eq!(e.source().passes, 2);
    assert_eq!(sorted(&e.signaller().resumed), vec![100, 101, 102, 200, 201]);
}

#[test]
fn test_untracked_or_closed_app_not_suspended() {
    let mut e = engine();
    e.on_focus(&focus("foot")).unwrap();

    // firefox has no window left.
    let windows = vec![window("foot", 300, true)];
    assert_eq!(e.on_debounce_expired(&windows).unwrap(), 0);
    assert_eq!(e.app("firefox").unwrap().state, AppState::Running);
    assert!(e.signaller().stopped.is_empty());
    assert!(!e.is_tracked("foot"));
}

#[test]
fn test_one_focused_window_keeps_app_running() {
    let mut e = engine();
    e.on_focus(&focus("foot")).unwrap();

    let windows = vec![window("firefox", 100, false), window("firefox", 200, true)];
    assert_eq!(e.on_debounce_expired(&windows).unwrap(), 0);
    assert!(e.signaller().stopped.is_empty());
}

#[test]
fn test_multiple_tracked_apps_suspend_independently() {
    let map = AdjacencyMap::from_links([(101, 100), (301, 300)]);
    let mut e = SuspensionEngine::new(
        ["firefox", "foot"],
        FixedTree { map, passes: 0 },
        RecordingSignaller::default(),
    )
    .with_self_pid(1);

    assert_eq!(e.on_focus(&focus("mpv")).unwrap(), TimerCommand::Arm);
    let windows = vec![
        window("firefox", 100, false),
        window("foot", 300, false),
        window("mpv", 500, true),
    ];
    assert_eq!(e.on_debounce_expired(&windows).unwrap(), 2);
    assert_eq!(e.source().passes, 2);
    assert_eq!(sorted(&e.signaller().stopped), vec![100, 101, 300, 301]);

    // Focusing foot resumes only foot.
    e.on_focus(&focus("foot")).unwrap();
    assert_eq!(sorted(&e.signaller().resumed), vec![300, 301]);
    assert!(e.app("firefox").unwrap().is_suspended());
}

#[test]
fn test_self_pid_excluded_from_stop() {
    // The freezer was launched from a tracked terminal.
    let map = AdjacencyMap::from_links([(301, 300), (302, 301)]);
    let mut e = SuspensionEngine::new(
        ["foot"],
        FixedTree { map, passes: 0 },
        RecordingSignaller::default(),
    )
    .with_self_pid(302);

    e.on_focus(&focus("firefox")).unwrap();
    e.on_debounce_expired(&[window("foot", 300, false)]).unwrap();
    assert_eq!(sorted(&e.signaller().stopped), vec![300, 301]);
}

#[test]
fn test_ignored_focus_events_leave_timer_alone() {
    let mut e = engine();
    e.on_focus(&focus("foot")).unwrap();
    e.on_debounce_expired(&firefox_unfocused()).unwrap();

    // Everything tracked is already suspended.
    assert_eq!(e.on_focus(&focus("mpv")).unwrap(), TimerCommand::Keep);
    assert!(!e.timer_armed());
}
