// src/process_tree.rs

//! Descendant discovery for supervised processes.
//!
//! Student submissions routinely spawn helpers (a server launching a worker,
//! a shell script launching the real binary). Killing only the direct child
//! would leave those running across test cases, so `stop` walks the process
//! table first.

use std::collections::VecDeque;

use sysinfo::{Pid, System};

/// All descendants of `root`, parents before children.
pub fn descendants(system: &System, root: Pid) -> Vec<Pid> {
    let mut found = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(parent) = queue.pop_front() {
        for (pid, process) in system.processes() {
            if process.parent() == Some(parent) && *pid != root && !found.contains(pid) {
                found.push(*pid);
                queue.push_back(*pid);
            }
        }
    }

    found
}

/// Kill every descendant of `root_pid`, deepest first.
///
/// Best-effort: processes that vanish in between are skipped. Returns how
/// many kill signals were delivered. `root_pid` itself is left alone.
pub fn kill_descendants(root_pid: u32) -> usize {
    let mut system = System::new();
    system.refresh_processes();

    let tree = descendants(&system, Pid::from_u32(root_pid));

    tree.iter()
        .rev()
        .filter_map(|pid| system.process(*pid))
        .filter(|process| process.kill())
        .count()
}
