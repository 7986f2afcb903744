use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::codes;

pub const EXIT: Builtin = Builtin {
    name: "exit",
    help: "Close this terminal",
    handler: cmd_exit,
};

fn cmd_exit(session: &mut Session, _tid: TermId, _argv: &[String]) -> i32 {
    session.close_terminal();
    codes::OK
}
