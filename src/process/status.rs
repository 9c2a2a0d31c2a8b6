//! Parsing of `/proc/<pid>/status` prefixes.

use super::Pid;

/// Extracts the `PPid:` field from a (possibly truncated) status buffer.
///
/// Kernel threads and init report a parent of 0; that value is returned as-is
/// and left to the caller to skip.
pub fn parse_ppid(status: &[u8]) -> Option<Pid> {
    status
        .split(|&b| b == b'\n')
        .find_map(|line| line.strip_prefix(b"PPid:"))
        .and_then(|rest| std::str::from_utf8(rest).ok())
        .and_then(|v| v.trim().parse().ok())
}
