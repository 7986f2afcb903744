use core_modes::auth;
use core_term::TermId;
use core_vfs::NodeType;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const CD: Builtin = Builtin {
    name: "cd",
    help: "Change directory",
    handler: cmd_cd,
};

fn cmd_cd(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() > 2 {
        shell_error(term, "cd: too many arguments");
        return codes::EINVAL;
    }

    if argv.len() == 1 {
        let Some(root) = vfs.resolve("/") else {
            shell_error(term, "cd: root directory not found");
            return codes::ENOENT;
        };
        if let Some(old) = term.cwd.take() {
            vfs.release(old);
        }
        term.cwd = Some(root);
        return codes::OK;
    }

    let mut path = argv[1].clone();
    // ~ expands to the configured user's home
    if path == "~" || path.starts_with("~/") {
        let home = match auth::read_entry(vfs) {
            Some(entry) => format!("/home/{}", entry.username),
            None => "/home".to_string(),
        };
        path = format!("{home}{}", &path[1..]);
    }

    let Some(new_cwd) = vfs.resolve_at(term.cwd, &path) else {
        shell_error(term, format!("cd: {path}: no such file or directory"));
        return codes::ENOENT;
    };
    if vfs.node_type(new_cwd) != Ok(NodeType::Directory) {
        shell_error(term, format!("cd: {path}: not a directory"));
        vfs.release(new_cwd);
        return codes::ENOTDIR;
    }
    if let Some(old) = term.cwd.take() {
        vfs.release(old);
    }
    term.cwd = Some(new_cwd);
    codes::OK
}
