use core_term::TermId;
use core_vfs::{NodeType, VfsError};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const TOUCH: Builtin = Builtin {
    name: "touch",
    help: "Create empty files",
    handler: cmd_touch,
};

fn cmd_touch(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        shell_error(term, "touch: missing file operand");
        return codes::EINVAL;
    }

    for path in &argv[1..] {
        // existing entries are left untouched
        if let Some(node) = vfs.resolve_at(term.cwd, path) {
            vfs.release(node);
            continue;
        }
        let (parent, name) = match vfs.resolve_parent(term.cwd, path) {
            Ok(pair) => pair,
            Err(VfsError::NotFound) => {
                shell_error(term, format!("touch: {path}: no such file or directory"));
                return codes::ENOENT;
            }
            Err(_) => {
                shell_error(term, format!("touch: {path}: invalid path"));
                return codes::EINVAL;
            }
        };
        let created = vfs.dir_create_node(parent, &name, NodeType::File);
        vfs.release(parent);
        match created {
            Ok(node) => vfs.release(node),
            Err(_) => {
                shell_error(term, format!("touch: {path}: failed to create file"));
                return codes::ERR;
            }
        }
    }
    codes::OK
}
