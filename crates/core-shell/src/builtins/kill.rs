use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const KILL: Builtin = Builtin {
    name: "kill",
    help: "Terminate a process",
    handler: cmd_kill,
};

fn cmd_kill(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() < 2 {
        shell_error(session.term_mut(tid), "kill: missing process ID");
        return codes::EINVAL;
    }
    if argv.len() > 2 {
        shell_error(session.term_mut(tid), "kill: too many arguments");
        return codes::EINVAL;
    }
    let Ok(pid) = argv[1].parse::<u32>() else {
        shell_error(session.term_mut(tid), format!("kill: {}: invalid process ID", argv[1]));
        return codes::EINVAL;
    };
    if pid == 0 {
        shell_error(session.term_mut(tid), "kill: 0: invalid process ID");
        return codes::EINVAL;
    }

    // drop the working-directory pin before the slot is recycled
    if let Some(pcb) = session.procs.get_mut(pid) {
        if let Some(cwd) = pcb.cwd.take() {
            session.vfs.release(cwd);
        }
    }
    if session.procs.terminate(pid) {
        codes::OK
    } else {
        shell_error(session.term_mut(tid), format!("kill: {pid}: no such process"));
        codes::ENOENT
    }
}
