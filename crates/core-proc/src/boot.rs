//! Boot-time process registration with named dependencies.
//!
//! Boot code registers processes up front, then starts them in dependency
//! order: a process starts only once every named dependency is running or
//! ready. The starter loops at most `2N` rounds; anything still unstarted
//! after that is reported, and boot carries on regardless.

use crate::{Pid, ProcessEntry, ProcessPriority, ProcessState, ProcessTable};

struct BootProcessDef {
    name: String,
    entry: Option<ProcessEntry>,
    priority: ProcessPriority,
    dependencies: Vec<String>,
    pid: Pid,
    started: bool,
}

#[derive(Default)]
pub struct BootProcessSet {
    defs: Vec<BootProcessDef>,
}

/// Outcome of [`BootProcessSet::start_all`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BootStartReport {
    pub started: Vec<String>,
    pub failed: Vec<String>,
}

impl BootStartReport {
    pub fn all_started(&self) -> bool {
        self.failed.is_empty()
    }
}

impl BootProcessSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        entry: ProcessEntry,
        priority: ProcessPriority,
        dependencies: &[&str],
    ) {
        let name = name.into();
        tracing::debug!(
            target: "boot",
            name = %name,
            deps = dependencies.len(),
            "boot process registered"
        );
        self.defs.push(BootProcessDef {
            name,
            entry: Some(entry),
            priority,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            pid: 0,
            started: false,
        });
    }

    fn dependency_satisfied(&self, table: &ProcessTable, dep: &str) -> bool {
        match self.defs.iter().find(|d| d.name == dep) {
            Some(def) => {
                if !def.started || def.pid == 0 {
                    return false;
                }
                matches!(
                    table.state_of(def.pid),
                    ProcessState::Running | ProcessState::Ready
                )
            }
            // not one of ours: assume an external service, satisfied
            None => true,
        }
    }

    /// Start everything in dependency order. At most `2N` rounds; a round
    /// that starts nothing while unstarted processes remain ends the loop.
    pub fn start_all(&mut self, table: &mut ProcessTable) -> BootStartReport {
        let max_rounds = self.defs.len() * 2;
        let mut report = BootStartReport::default();

        for _ in 0..max_rounds {
            let mut started_this_round = 0;
            for i in 0..self.defs.len() {
                if self.defs[i].started {
                    continue;
                }
                let deps_ok = self.defs[i]
                    .dependencies
                    .clone()
                    .iter()
                    .all(|d| self.dependency_satisfied(table, d));
                if !deps_ok {
                    continue;
                }
                let def = &mut self.defs[i];
                let Some(entry) = def.entry.take() else {
                    continue;
                };
                let pid = table.create(def.name.clone(), entry, def.priority);
                if pid == 0 {
                    tracing::warn!(target: "boot", name = %def.name, "process creation failed");
                    continue;
                }
                def.pid = pid;
                def.started = true;
                started_this_round += 1;
                report.started.push(def.name.clone());
                tracing::info!(target: "boot", name = %def.name, pid, "boot process started");
            }
            if started_this_round == 0 {
                break;
            }
        }

        for def in &self.defs {
            if !def.started {
                tracing::warn!(target: "boot", name = %def.name, "boot process failed to start");
                report.failed.push(def.name.clone());
            }
        }
        report
    }

    pub fn pid_of(&self, name: &str) -> Pid {
        self.defs
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.pid)
            .unwrap_or(0)
    }
}
