use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::codes;

pub const HELP: Builtin = Builtin {
    name: "help",
    help: "List available commands",
    handler: cmd_help,
};

fn cmd_help(session: &mut Session, tid: TermId, _argv: &[String]) -> i32 {
    let listing: Vec<(String, String)> = session
        .registry
        .iter()
        .map(|b| (b.name.to_string(), b.help.to_string()))
        .collect();
    let term = session.term_mut(tid);
    term.write_line("Available commands:");
    for (name, help) in listing {
        term.write_line(&format!("  {name} - {help}"));
    }
    codes::OK
}
