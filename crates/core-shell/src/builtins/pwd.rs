use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const PWD: Builtin = Builtin {
    name: "pwd",
    help: "Print working directory",
    handler: cmd_pwd,
};

fn cmd_pwd(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);
    if argv.len() > 1 {
        shell_error(term, "pwd: too many arguments");
        return codes::EINVAL;
    }
    let path = match term.cwd {
        Some(cwd) => match vfs.node_path(cwd) {
            Ok(p) => p.to_string(),
            Err(_) => {
                shell_error(term, "pwd: failed to get path");
                return codes::ERR;
            }
        },
        None => "/".to_string(),
    };
    term.write_line(&path);
    codes::OK
}
