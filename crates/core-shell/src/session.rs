//! The session: every runtime subsystem wired together, plus key-event
//! dispatch and command execution.

use core_config::Config;
use core_events::hotkey::HotkeyTable;
use core_events::{EventKind, EventQueue, KeyCode, KeyEvent, QueuedEvent};
use core_modes::Modes;
use core_proc::{ProcessTable, Scheduler};
use core_term::{Display, TermId, TerminalState, WindowManager};
use core_vfs::Vfs;

use std::time::Duration;

use crate::parse::{self, CommandTokens};
use crate::registry::BuiltinRegistry;
use crate::{codes, shell_error};

/// Requested machine state, set by `shutdown`/`reboot` and consumed by the
/// platform loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PowerState {
    #[default]
    Running,
    Shutdown,
    Reboot,
}

pub struct Session {
    pub vfs: Vfs,
    pub display: Box<dyn Display>,
    pub wm: WindowManager,
    pub procs: ProcessTable,
    pub sched: Scheduler,
    pub queue: EventQueue,
    pub hotkeys: HotkeyTable,
    pub modes: Modes,
    pub config: Config,
    pub registry: BuiltinRegistry,
    pub power: PowerState,
}

impl Session {
    /// Assemble a session over an already-mounted VFS. Loads the config
    /// file and installs hotkeys.
    pub fn new(mut vfs: Vfs, display: Box<dyn Display>) -> Self {
        let config = Config::load(&mut vfs);
        let mut hotkeys = HotkeyTable::new();
        config.apply_hotkeys(&mut hotkeys);
        let sched = Scheduler::with_quantum(Duration::from_millis(config.scheduler.quantum_ms));
        Self {
            vfs,
            display,
            wm: WindowManager::new(),
            procs: ProcessTable::new(),
            sched,
            queue: EventQueue::new(),
            hotkeys,
            modes: Modes::new(),
            config,
            registry: BuiltinRegistry::with_defaults(),
            power: PowerState::Running,
        }
    }

    pub fn prompt(&self) -> String {
        self.config.prompt.clone()
    }

    /// Split borrow used throughout the builtins: the VFS and one terminal.
    pub fn vfs_term(&mut self, tid: TermId) -> (&mut Vfs, &mut TerminalState) {
        (&mut self.vfs, self.wm.terminal_mut(tid))
    }

    pub fn term_mut(&mut self, tid: TermId) -> &mut TerminalState {
        self.wm.terminal_mut(tid)
    }

    // ---- window actions ------------------------------------------------

    pub fn open_terminal(&mut self) -> Option<TermId> {
        let greeting = self.config.greeting.clone();
        let prompt = self.config.prompt.clone();
        self.wm
            .new_terminal(&mut self.vfs, self.display.as_mut(), &greeting, &prompt)
    }

    pub fn close_terminal(&mut self) {
        self.wm.close_terminal(&mut self.vfs, self.display.as_mut());
    }

    /// Start the interactive session on the active terminal: first-boot
    /// setup when no user exists, the login prompt otherwise.
    pub fn begin_auth(&mut self) {
        let Some(tid) = self.active_tid() else { return };
        let term = self.wm.terminal_mut(tid);
        self.modes.firstboot.begin_if_needed(&mut self.vfs, term);
        if !self.modes.firstboot.is_active() {
            let term = self.wm.terminal_mut(tid);
            self.modes.login.begin_if_needed(&mut self.vfs, term);
        }
    }

    fn active_tid(&self) -> Option<TermId> {
        let tid = self.wm.active_id();
        self.wm.terminal(tid).active.then_some(tid)
    }

    // ---- event plumbing ------------------------------------------------

    /// Producer side of the keyboard ring (called by the input driver).
    pub fn push_key(&mut self, evt: KeyEvent) {
        self.queue.push(QueuedEvent::key(evt));
    }

    /// Drain the ring. Key events go through the full dispatch chain;
    /// pre-classified hotkey records fire their action directly.
    pub fn pump(&mut self) {
        while let Some(queued) = self.queue.pop() {
            match queued.kind {
                EventKind::KeyPressed => self.process_key(queued.event),
                EventKind::Hotkey => {
                    if let Some(action) = queued.action {
                        self.execute_action(&action);
                    }
                }
            }
        }
    }

    /// Full dispatch for one key event: hotkeys first (a match consumes the
    /// event), then the modal interceptors in fixed order, then the line
    /// editor.
    pub fn process_key(&mut self, evt: KeyEvent) {
        if let Some(action) = self.hotkeys.find_action(evt).map(String::from) {
            tracing::debug!(target: "input", %action, "hotkey fired");
            self.execute_action(&action);
            return;
        }

        let Some(tid) = self.active_tid() else { return };
        let prompt = self.config.prompt.clone();

        if self.wm.terminal(tid).image_view.is_some() {
            // image view swallows everything; Esc leaves it
            if evt.code == KeyCode::Esc {
                let term = self.wm.terminal_mut(tid);
                term.image_view = None;
                term.clear();
                term.write_str(&prompt);
            }
            return;
        }
        if self.modes.login.is_active() {
            let term = self.wm.terminal_mut(tid);
            self.modes.login.handle_key(term, evt, &prompt);
            return;
        }
        if self.modes.firstboot.is_active() {
            let term = self.wm.terminal_mut(tid);
            self.modes
                .firstboot
                .handle_key(&mut self.vfs, term, evt, &prompt);
            return;
        }
        if self.modes.passwd.is_active() {
            let term = self.wm.terminal_mut(tid);
            self.modes
                .passwd
                .handle_key(&mut self.vfs, term, evt, &prompt);
            return;
        }
        if self.modes.nano.is_active() {
            let term = self.wm.terminal_mut(tid);
            self.modes
                .nano
                .handle_key(&mut self.vfs, term, evt, &prompt);
            return;
        }

        match evt.code {
            KeyCode::Enter => {
                let line = self.wm.terminal_mut(tid).commit_input();
                self.execute_command_line(tid, &line);
                let term = self.wm.terminal(tid);
                let quiet = !term.active
                    || term.image_view.is_some()
                    || self.modes.any_active()
                    || self.power != PowerState::Running;
                if !quiet {
                    self.wm.terminal_mut(tid).write_str(&prompt);
                }
            }
            KeyCode::Backspace => self.wm.terminal_mut(tid).handle_backspace(),
            KeyCode::Up => self.wm.terminal_mut(tid).history_up(&prompt),
            KeyCode::Down => self.wm.terminal_mut(tid).history_down(&prompt),
            KeyCode::Left => self.wm.terminal_mut(tid).handle_arrow_left(),
            KeyCode::Right => self.wm.terminal_mut(tid).handle_arrow_right(),
            KeyCode::Tab | KeyCode::Esc | KeyCode::CapsLock => {}
            _ => {
                if let Some(c) = evt.to_char() {
                    self.wm.terminal_mut(tid).handle_key(c);
                }
            }
        }
    }

    /// Hotkey actions by name.
    pub fn execute_action(&mut self, name: &str) {
        match name {
            "terminal" => {
                self.open_terminal();
            }
            "close_terminal" => self.close_terminal(),
            "select_left" => self.wm.select_left(),
            "select_right" => self.wm.select_right(),
            "select_up" => self.wm.select_up(),
            "select_down" => self.wm.select_down(),
            other => {
                tracing::warn!(target: "input", action = other, "unknown action");
            }
        }
    }

    // ---- command execution ---------------------------------------------

    /// Parse and run one command line. Single commands report nonzero exit
    /// codes to the user; pipeline stages report through their own
    /// diagnostics.
    pub fn execute_command_line(&mut self, tid: TermId, line: &str) -> i32 {
        let tokens = parse::tokenize(line);
        if tokens.is_empty() {
            return codes::OK;
        }
        if tokens.has_pipe {
            return self.execute_pipeline(tid, &tokens);
        }
        let code = self.dispatch(tid, &tokens.tokens);
        if code != codes::OK {
            self.wm
                .terminal_mut(tid)
                .write_line(&format!("Command failed with code {code}"));
        }
        code
    }

    /// Find the builtin and invoke it. Unknown names report
    /// `command not found` and return the generic error code.
    pub fn dispatch(&mut self, tid: TermId, argv: &[String]) -> i32 {
        let Some(name) = argv.first() else {
            return codes::ERR;
        };
        let Some(handler) = self.registry.find(name).map(|b| b.handler) else {
            let term = self.wm.terminal_mut(tid);
            shell_error(term, format!("command not found: {name}"));
            return codes::ERR;
        };
        tracing::debug!(target: "shell", cmd = %name, argc = argv.len(), "dispatch");
        handler(self, tid, argv)
    }

    /// Two-stage pipeline: run the left stage with terminal output
    /// captured, hand the bytes to the right stage as `pipe_input`, run
    /// the right stage, clear. Stages run sequentially — the right stage
    /// sees the left stage's complete output.
    pub fn execute_pipeline(&mut self, tid: TermId, tokens: &CommandTokens) -> i32 {
        let (lhs, rhs) = tokens.stages();
        if lhs.is_empty() || rhs.is_empty() {
            let term = self.wm.terminal_mut(tid);
            shell_error(term, "Invalid pipe syntax");
            return codes::ERR;
        }
        let (lhs, rhs) = (lhs.to_vec(), rhs.to_vec());

        self.wm.terminal_mut(tid).capture_start();
        let left_code = self.dispatch(tid, &lhs);
        let captured = self.wm.terminal_mut(tid).capture_stop();
        tracing::trace!(target: "shell", bytes = captured.len(), left_code, "pipeline hand-off");

        self.wm.terminal_mut(tid).pipe_input = Some(captured);
        let right_code = self.dispatch(tid, &rhs);
        self.wm.terminal_mut(tid).pipe_input = None;
        right_code
    }

    /// One cooperative scheduler tick.
    pub fn scheduler_tick(&mut self) {
        self.sched.run(&mut self.procs);
    }
}
