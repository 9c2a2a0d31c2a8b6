//! Process table enumeration.
//!
//! Every numeric directory under the proc root is a candidate process. The
//! listing is a racy snapshot: entries may vanish before they are read.

use std::fs;
use std::io;
use std::path::Path;

use super::Pid;

/// Process entry representing a directory in the proc filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcEntry {
    pub pid: Pid,
}

/// Scans `root` for directories with numeric names.
pub fn collect_proc_entries(root: &Path) -> io::Result<Vec<ProcEntry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)? {
        // A directory entry that errors mid-listing belongs to a process that
        // just went away.
        let Ok(entry) = entry else { continue };
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(pid) = parse_pid(name) {
            out.push(ProcEntry { pid });
        }
    }
    Ok(out)
}

fn parse_pid(name: &str) -> Option<Pid> {
    if name.is_empty() || !name.bytes().all(|c| c.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
