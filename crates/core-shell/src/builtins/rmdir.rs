use core_term::{TermId, TerminalState};
use core_vfs::{NodeId, NodeType, Vfs, VfsError};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const RMDIR: Builtin = Builtin {
    name: "rmdir",
    help: "Remove empty directories",
    handler: cmd_rmdir,
};

/// 1 = empty, 0 = occupied, negative exit code on error.
fn dir_is_empty(vfs: &mut Vfs, term: &mut TerminalState, dir: NodeId) -> Result<bool, i32> {
    let iter = match vfs.dir_iter_create(dir) {
        Ok(it) => it,
        Err(_) => {
            shell_error(term, "rmdir: directory iteration not supported");
            return Err(codes::ERR);
        }
    };
    let first = vfs.dir_iter_next(iter);
    vfs.dir_iter_destroy(iter);
    match first {
        Ok(None) => Ok(true),
        Ok(Some(_)) => Ok(false),
        Err(_) => {
            shell_error(term, "rmdir: error reading directory");
            Err(codes::ERR)
        }
    }
}

fn cmd_rmdir(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        shell_error(term, "rmdir: missing operand");
        return codes::EINVAL;
    }

    for path in &argv[1..] {
        let (parent, name) = match vfs.resolve_parent(term.cwd, path) {
            Ok(pair) => pair,
            Err(VfsError::NotFound) => {
                shell_error(term, format!("rmdir: {path}: no such file or directory"));
                return codes::ENOENT;
            }
            Err(_) => {
                shell_error(term, format!("rmdir: {path}: invalid path"));
                return codes::EINVAL;
            }
        };

        let Some(node) = vfs.resolve_at(Some(parent), &name) else {
            vfs.release(parent);
            shell_error(term, format!("rmdir: {path}: no such file or directory"));
            return codes::ENOENT;
        };
        if vfs.node_type(node) != Ok(NodeType::Directory) {
            vfs.release(node);
            vfs.release(parent);
            shell_error(term, format!("rmdir: {path}: not a directory"));
            return codes::ENOTDIR;
        }

        match dir_is_empty(vfs, term, node) {
            Ok(true) => {}
            Ok(false) => {
                vfs.release(node);
                vfs.release(parent);
                shell_error(term, format!("rmdir: {path}: directory not empty"));
                return codes::ERR;
            }
            Err(code) => {
                vfs.release(node);
                vfs.release(parent);
                return code;
            }
        }

        let removed = vfs.dir_remove_node(parent, &name);
        vfs.release(node);
        vfs.release(parent);
        if removed.is_err() {
            shell_error(term, format!("rmdir: {path}: failed to remove"));
            return codes::ERR;
        }
    }
    codes::OK
}
