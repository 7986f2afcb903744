use std::time::Duration;

use core_config::Config;
use core_proc::Scheduler;
use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const RELOAD: Builtin = Builtin {
    name: "reload",
    help: "Re-read system configuration",
    handler: cmd_reload,
};

fn cmd_reload(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() > 1 {
        shell_error(session.term_mut(tid), "reload: too many arguments");
        return codes::EINVAL;
    }
    session.config = Config::load(&mut session.vfs);
    session.config.apply_hotkeys(&mut session.hotkeys);
    session.sched =
        Scheduler::with_quantum(Duration::from_millis(session.config.scheduler.quantum_ms));
    tracing::info!(target: "config", "configuration reloaded");
    session.term_mut(tid).write_line("Configuration reloaded.");
    codes::OK
}
