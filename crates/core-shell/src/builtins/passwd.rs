use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const PASSWD: Builtin = Builtin {
    name: "passwd",
    help: "Change the password",
    handler: cmd_passwd,
};

fn cmd_passwd(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() > 1 {
        shell_error(session.term_mut(tid), "passwd: too many arguments");
        return codes::EINVAL;
    }
    let started = session
        .modes
        .passwd
        .begin(&mut session.vfs, session.wm.terminal_mut(tid));
    if !started {
        shell_error(session.term_mut(tid), "passwd: no user configured");
        return codes::ERR;
    }
    codes::OK
}
