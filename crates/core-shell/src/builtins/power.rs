use core_term::TermId;

use crate::registry::Builtin;
use crate::session::{PowerState, Session};
use crate::{codes, shell_error};

pub const SHUTDOWN: Builtin = Builtin {
    name: "shutdown",
    help: "Shut the system down",
    handler: cmd_shutdown,
};

pub const REBOOT: Builtin = Builtin {
    name: "reboot",
    help: "Restart the system",
    handler: cmd_reboot,
};

fn cmd_shutdown(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() > 1 {
        shell_error(session.term_mut(tid), "shutdown: too many arguments");
        return codes::EINVAL;
    }
    session.term_mut(tid).write_line("Shutting down...");
    tracing::info!(target: "shell", "shutdown requested");
    session.power = PowerState::Shutdown;
    codes::OK
}

fn cmd_reboot(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() > 1 {
        shell_error(session.term_mut(tid), "reboot: too many arguments");
        return codes::EINVAL;
    }
    session.term_mut(tid).write_line("Rebooting...");
    tracing::info!(target: "shell", "reboot requested");
    session.power = PowerState::Reboot;
    codes::OK
}
