use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const CLEAR: Builtin = Builtin {
    name: "clear",
    help: "Clear terminal screen and history",
    handler: cmd_clear,
};

fn cmd_clear(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let term = session.term_mut(tid);
    if argv.len() > 1 {
        shell_error(term, "clear: too many arguments");
        return codes::EINVAL;
    }
    term.clear();
    term.fastfetch.clear();
    term.clear_history();
    codes::OK
}
