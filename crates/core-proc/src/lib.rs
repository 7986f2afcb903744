//! Process table and cooperative scheduler.
//!
//! A fixed pool of process control blocks and a scheduler that runs entry
//! points synchronously: on each tick the highest-priority ready process is
//! marked running and its entry invoked to completion (or until it yields).
//! Real hardware may put a preemptive RTOS underneath, but everything above
//! this layer relies only on the cooperative semantics modeled here.

use std::time::{Duration, Instant};

use core_vfs::NodeId;

mod boot;

pub use boot::{BootProcessSet, BootStartReport};

/// Fixed PCB pool size.
pub const MAX_PROCESSES: usize = 16;

/// Scheduler time slice.
pub const SCHEDULE_QUANTUM: Duration = Duration::from_millis(10);

/// Process identifier. Zero is reserved for "none" and never allocated.
pub type Pid = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Waiting,
    Blocked,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessPriority {
    Low,
    Normal,
    High,
}

/// Entry point invoked synchronously by the scheduler. Captures its own
/// arguments.
pub type ProcessEntry = Box<dyn FnMut() + 'static>;

pub struct ProcessControlBlock {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: ProcessPriority,
    pub name: String,
    pub entry: Option<ProcessEntry>,
    pub runtime: Duration,
    pub active: bool,
    /// Working directory pinned by this process, if any. The owner is
    /// responsible for releasing it on termination.
    pub cwd: Option<NodeId>,
}

impl ProcessControlBlock {
    fn vacant() -> Self {
        Self {
            pid: 0,
            state: ProcessState::Terminated,
            priority: ProcessPriority::Normal,
            name: String::new(),
            entry: None,
            runtime: Duration::ZERO,
            active: false,
            cwd: None,
        }
    }
}

pub struct ProcessTable {
    slots: Vec<ProcessControlBlock>,
    next_pid: Pid,
    count: usize,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_PROCESSES)
                .map(|_| ProcessControlBlock::vacant())
                .collect(),
            next_pid: 1,
            count: 0,
        }
    }

    /// Allocate a PCB. Returns 0 when the table is full. Pids increase
    /// monotonically across the table's lifetime; slots of terminated
    /// processes are reused.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        entry: ProcessEntry,
        priority: ProcessPriority,
    ) -> Pid {
        if self.count >= MAX_PROCESSES {
            tracing::warn!(target: "sched", "process table full");
            return 0;
        }
        let Some(slot) = self.slots.iter_mut().find(|s| !s.active) else {
            return 0;
        };
        let pid = self.next_pid;
        self.next_pid += 1;
        let name = name.into();
        tracing::debug!(target: "sched", pid, name = %name, ?priority, "process created");
        *slot = ProcessControlBlock {
            pid,
            state: ProcessState::Ready,
            priority,
            name,
            entry: Some(entry),
            runtime: Duration::ZERO,
            active: true,
            cwd: None,
        };
        self.count += 1;
        pid
    }

    /// Terminate and free the slot. Unknown pids are ignored.
    pub fn terminate(&mut self, pid: Pid) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| s.active && s.pid == pid) else {
            tracing::debug!(target: "sched", pid, "terminate: pid not found");
            return false;
        };
        tracing::debug!(target: "sched", pid, name = %slot.name, "process terminated");
        slot.state = ProcessState::Terminated;
        slot.active = false;
        slot.entry = None;
        self.count -= 1;
        true
    }

    pub fn set_state(&mut self, pid: Pid, state: ProcessState) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.active && s.pid == pid) {
            slot.state = state;
        }
    }

    pub fn state_of(&self, pid: Pid) -> ProcessState {
        self.slots
            .iter()
            .find(|s| s.active && s.pid == pid)
            .map(|s| s.state)
            .unwrap_or(ProcessState::Terminated)
    }

    pub fn get(&self, pid: Pid) -> Option<&ProcessControlBlock> {
        self.slots.iter().find(|s| s.active && s.pid == pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut ProcessControlBlock> {
        self.slots.iter_mut().find(|s| s.active && s.pid == pid)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Active PCBs in table order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessControlBlock> {
        self.slots.iter().filter(|s| s.active)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ProcessControlBlock> {
        self.iter().find(|p| p.name == name)
    }

    /// Highest-priority ready pid, ties broken by table order.
    fn next_ready(&self) -> Pid {
        let mut best: Option<(&ProcessControlBlock, Pid)> = None;
        for pcb in self.iter() {
            if pcb.state == ProcessState::Ready {
                match best {
                    Some((b, _)) if pcb.priority <= b.priority => {}
                    _ => best = Some((pcb, pcb.pid)),
                }
            }
        }
        best.map(|(_, pid)| pid).unwrap_or(0)
    }
}

pub struct Scheduler {
    current: Pid,
    slice_started: Instant,
    quantum: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_quantum(SCHEDULE_QUANTUM)
    }

    pub fn with_quantum(quantum: Duration) -> Self {
        Self {
            current: 0,
            slice_started: Instant::now(),
            quantum,
        }
    }

    pub fn current(&self) -> Pid {
        self.current
    }

    /// One scheduling decision. The running process keeps the CPU inside
    /// its quantum; otherwise it is marked ready and the highest-priority
    /// ready process runs — its entry point is called synchronously here.
    pub fn run(&mut self, table: &mut ProcessTable) {
        if self.current != 0 {
            if let Some(pcb) = table.get(self.current) {
                if pcb.state == ProcessState::Running {
                    if self.slice_started.elapsed() < self.quantum {
                        return;
                    }
                    table.set_state(self.current, ProcessState::Ready);
                }
            }
        }

        let next = table.next_ready();
        if next == 0 {
            self.current = 0;
            return;
        }

        if self.current != next {
            table.set_state(next, ProcessState::Running);
            self.current = next;
            self.slice_started = Instant::now();

            // run the entry synchronously; it returns (or yields) before we
            // regain control
            let mut entry = table.get_mut(next).and_then(|pcb| pcb.entry.take());
            if let Some(f) = entry.as_mut() {
                tracing::trace!(target: "sched", pid = next, "entering process");
                f();
            }
            let elapsed = self.slice_started.elapsed();
            if let Some(pcb) = table.get_mut(next) {
                pcb.runtime += elapsed;
                if pcb.entry.is_none() {
                    pcb.entry = entry;
                }
                // entry returned: back to ready unless it changed itself
                if pcb.state == ProcessState::Running {
                    pcb.state = ProcessState::Ready;
                }
            }
            self.current = 0;
        }
    }

    /// Give up the CPU: mark the current process ready and immediately
    /// re-enter the scheduler.
    pub fn yield_now(&mut self, table: &mut ProcessTable) {
        if self.current != 0 {
            table.set_state(self.current, ProcessState::Ready);
            self.current = 0;
        }
        self.run(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn noop() -> ProcessEntry {
        Box::new(|| {})
    }

    #[test]
    fn pids_are_monotonic_and_slots_reused() {
        let mut table = ProcessTable::new();
        let a = table.create("a", noop(), ProcessPriority::Normal);
        let b = table.create("b", noop(), ProcessPriority::Normal);
        assert!(a > 0 && b == a + 1);
        assert!(table.terminate(a));
        let c = table.create("c", noop(), ProcessPriority::Normal);
        assert_eq!(c, b + 1, "pid counter never reuses values");
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn full_table_returns_zero() {
        let mut table = ProcessTable::new();
        for i in 0..MAX_PROCESSES {
            assert_ne!(table.create(format!("p{i}"), noop(), ProcessPriority::Low), 0);
        }
        assert_eq!(table.create("extra", noop(), ProcessPriority::High), 0);
    }

    #[test]
    fn scheduler_prefers_higher_priority() {
        let mut table = ProcessTable::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (name, prio) in [
            ("low", ProcessPriority::Low),
            ("high", ProcessPriority::High),
            ("normal", ProcessPriority::Normal),
        ] {
            let order = Rc::clone(&order);
            table.create(
                name,
                Box::new(move || order.borrow_mut().push(name)),
                prio,
            );
        }
        let mut sched = Scheduler::with_quantum(Duration::ZERO);
        sched.run(&mut table);
        sched.run(&mut table);
        sched.run(&mut table);
        // every process re-queues as ready, so high keeps winning
        assert_eq!(&*order.borrow(), &["high", "high", "high"]);
    }

    #[test]
    fn terminated_process_stops_being_scheduled() {
        let mut table = ProcessTable::new();
        let hits = Rc::new(RefCell::new(0));
        let hits2 = Rc::clone(&hits);
        let pid = table.create(
            "worker",
            Box::new(move || *hits2.borrow_mut() += 1),
            ProcessPriority::Normal,
        );
        let mut sched = Scheduler::with_quantum(Duration::ZERO);
        sched.run(&mut table);
        assert_eq!(*hits.borrow(), 1);
        table.terminate(pid);
        sched.run(&mut table);
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(table.state_of(pid), ProcessState::Terminated);
    }

    #[test]
    fn yield_reenters_scheduler() {
        let mut table = ProcessTable::new();
        let hits = Rc::new(RefCell::new(0));
        let hits2 = Rc::clone(&hits);
        table.create(
            "spinner",
            Box::new(move || *hits2.borrow_mut() += 1),
            ProcessPriority::Normal,
        );
        let mut sched = Scheduler::with_quantum(Duration::from_secs(60));
        sched.run(&mut table);
        sched.yield_now(&mut table);
        assert_eq!(*hits.borrow(), 2);
    }
}
