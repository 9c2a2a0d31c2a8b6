//! Typed views of the compositor payloads this tool reads.
//!
//! Only the fields needed to find windows, their pids and focus are decoded;
//! everything else in the JSON is ignored.

use serde::Deserialize;
use std::collections::VecDeque;

use crate::process::Pid;

use super::frame::EVENT_FLAG;

/// Request types understood by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CommandType {
    Subscribe = 2,
    GetTree = 4,
}

impl CommandType {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Event streams a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Window,
    Shutdown,
}

impl EventKind {
    /// Name used in the subscribe payload.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Window => "window",
            EventKind::Shutdown => "shutdown",
        }
    }

    /// Frame type of the pushed events.
    pub fn frame_type(self) -> u32 {
        match self {
            EventKind::Window => EVENT_FLAG | 3,
            EventKind::Shutdown => EVENT_FLAG | 6,
        }
    }

    pub fn from_frame_type(kind: u32) -> Option<Self> {
        [EventKind::Window, EventKind::Shutdown]
            .into_iter()
            .find(|k| k.frame_type() == kind)
    }
}

/// Reply to `SUBSCRIBE` and `RUN_COMMAND`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandReply {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowProperties {
    #[serde(default)]
    pub class: Option<String>,
}

/// A node of the compositor's layout tree (root, output, workspace or view).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub pid: Option<i32>,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub window_properties: Option<WindowProperties>,
    #[serde(default)]
    pub nodes: Vec<TreeNode>,
    #[serde(default)]
    pub floating_nodes: Vec<TreeNode>,
}

impl TreeNode {
    /// Identifier used to match tracked applications: the Wayland `app_id`,
    /// or the X11 class for XWayland windows.
    pub fn identifier(&self) -> Option<&str> {
        self.app_id.as_deref().or_else(|| {
            self.window_properties
                .as_ref()
                .and_then(|p| p.class.as_deref())
        })
    }

    pub fn process_id(&self) -> Option<Pid> {
        self.pid.and_then(|p| Pid::try_from(p).ok()).filter(|p| *p > 0)
    }

    /// Every view in the tree, tiled and floating, breadth-first.
    pub fn windows(&self) -> Vec<WindowInfo> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([self]);

        while let Some(node) = queue.pop_front() {
            queue.extend(node.nodes.iter());
            queue.extend(node.floating_nodes.iter());

            let (Some(app_id), Some(pid)) = (node.identifier(), node.process_id()) else {
                continue;
            };
            out.push(WindowInfo {
                app_id: app_id.to_string(),
                pid,
                focused: node.focused,
            });
        }
        out
    }
}

/// A view found in the layout tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub app_id: String,
    pub pid: Pid,
    pub focused: bool,
}

/// Payload of a `window` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowEvent {
    pub change: String,
    pub container: TreeNode,
}

impl WindowEvent {
    /// The newly focused application, if this is a focus change.
    pub fn focus_change(&self) -> Option<FocusChange> {
        if self.change != "focus" {
            return None;
        }
        Some(FocusChange {
            app_id: self.container.identifier()?.to_string(),
            pid: self.container.process_id(),
        })
    }
}

/// Focus moved to the window of `app_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusChange {
    pub app_id: String,
    pub pid: Option<Pid>,
}

/// A decoded event frame.
#[derive(Debug, Clone)]
pub enum Event {
    Window(WindowEvent),
    Shutdown,
    Other(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREE: &str = r#"{
        "id": 1, "type": "root", "nodes": [
            {"id": 2, "type": "output", "nodes": [
                {"id": 3, "type": "workspace", "nodes": [
                    {"id": 4, "app_id": "firefox", "pid": 1200, "focused": false, "nodes": []},
                    {"id": 5, "app_id": null, "pid": 1300, "focused": true, "nodes": [],
                     "window_properties": {"class": "Steam"}}
                ], "floating_nodes": [
                    {"id": 6, "app_id": "pavucontrol", "pid": 1400, "focused": false, "nodes": []}
                ]}
            ]}
        ]
    }"#;

    #[test]
    fn test_windows_include_tiled_floating_and_xwayland() {
        let tree: TreeNode = serde_json::from_str(TREE).unwrap();
        let windows = tree.windows();

        assert_eq!(windows.len(), 3);
        assert!(windows.contains(&WindowInfo {
            app_id: "firefox".into(),
            pid: 1200,
            focused: false
        }));
        assert!(windows.contains(&WindowInfo {
            app_id: "Steam".into(),
            pid: 1300,
            focused: true
        }));
        assert!(windows.iter().any(|w| w.app_id == "pavucontrol"));
    }

    #[test]
    fn test_focus_change_only_for_focus_events() {
        let focus: WindowEvent = serde_json::from_str(
            r#"{"change": "focus", "container": {"app_id": "foot", "pid": 77, "nodes": []}}"#,
        )
        .unwrap();
        assert_eq!(
            focus.focus_change(),
            Some(FocusChange {
                app_id: "foot".into(),
                pid: Some(77)
            })
        );

        let title: WindowEvent = serde_json::from_str(
            r#"{"change": "title", "container": {"app_id": "foot", "pid": 77}}"#,
        )
        .unwrap();
        assert_eq!(title.focus_change(), None);
    }

    #[test]
    fn test_focus_change_without_identifier_is_ignored() {
        let event: WindowEvent = serde_json::from_str(
            r#"{"change": "focus", "container": {"app_id": null, "pid": 5}}"#,
        )
        .unwrap();
        assert_eq!(event.focus_change(), None);
    }

    #[test]
    fn test_event_kind_frame_types() {
        assert_eq!(EventKind::Window.frame_type(), 0x8000_0003);
        assert_eq!(
            EventKind::from_frame_type(0x8000_0006),
            Some(EventKind::Shutdown)
        );
        assert_eq!(EventKind::from_frame_type(0x8000_0000), None);
    }
}
