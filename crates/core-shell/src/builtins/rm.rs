use core_term::{TermId, TerminalState};
use core_vfs::{NodeId, NodeType, Vfs, VfsError};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const RM: Builtin = Builtin {
    name: "rm",
    help: "Remove files",
    handler: cmd_rm,
};

fn remove_entry(
    vfs: &mut Vfs,
    term: &mut TerminalState,
    parent: NodeId,
    name: &str,
    recursive: bool,
    force: bool,
) -> i32 {
    let Some(node) = vfs.resolve_at(Some(parent), name) else {
        if force {
            return codes::OK;
        }
        shell_error(term, format!("rm: {name}: no such file or directory"));
        return codes::ENOENT;
    };

    if vfs.node_type(node) == Ok(NodeType::Directory) {
        if !recursive {
            shell_error(term, format!("rm: {name}: is a directory"));
            vfs.release(node);
            return codes::EINVAL;
        }
        let result = remove_dir_contents(vfs, term, node, force);
        if result != codes::OK {
            vfs.release(node);
            return result;
        }
    }

    let removed = vfs.dir_remove_node(parent, name);
    vfs.release(node);
    match removed {
        Ok(()) => codes::OK,
        Err(_) if force => codes::OK,
        Err(_) => {
            shell_error(term, format!("rm: {name}: failed to remove"));
            codes::ERR
        }
    }
}

fn remove_dir_contents(vfs: &mut Vfs, term: &mut TerminalState, dir: NodeId, force: bool) -> i32 {
    let iter = match vfs.dir_iter_create(dir) {
        Ok(it) => it,
        Err(_) => {
            shell_error(term, "rm: directory iteration not supported");
            return codes::ERR;
        }
    };
    let mut names = Vec::new();
    loop {
        match vfs.dir_iter_next(iter) {
            Ok(Some(name)) => names.push(name),
            Ok(None) => break,
            Err(_) => {
                vfs.dir_iter_destroy(iter);
                shell_error(term, "rm: error reading directory");
                return codes::ERR;
            }
        }
    }
    vfs.dir_iter_destroy(iter);

    for name in names {
        let result = remove_entry(vfs, term, dir, &name, true, force);
        if result != codes::OK {
            return result;
        }
    }
    codes::OK
}

fn rm_path(vfs: &mut Vfs, term: &mut TerminalState, path: &str, recursive: bool, force: bool) -> i32 {
    let (parent, name) = match vfs.resolve_parent(term.cwd, path) {
        Ok(pair) => pair,
        Err(VfsError::NotFound) => {
            if force {
                return codes::OK;
            }
            shell_error(term, format!("rm: {path}: no such file or directory"));
            return codes::ENOENT;
        }
        Err(_) => {
            shell_error(term, format!("rm: {path}: invalid path"));
            return codes::EINVAL;
        }
    };
    let result = remove_entry(vfs, term, parent, &name, recursive, force);
    vfs.release(parent);
    result
}

fn cmd_rm(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        shell_error(term, "rm: missing operand");
        return codes::EINVAL;
    }

    let mut recursive = false;
    let mut force = false;
    let mut parsing_opts = true;
    let mut paths_found = false;

    for arg in &argv[1..] {
        if parsing_opts && arg == "--" {
            parsing_opts = false;
            continue;
        }
        if parsing_opts && arg.starts_with('-') && arg.len() > 1 {
            match arg.as_str() {
                "-r" | "-R" => recursive = true,
                "-f" => force = true,
                "-rf" | "-fr" | "-Rf" | "-fR" => {
                    recursive = true;
                    force = true;
                }
                _ => {
                    shell_error(term, format!("rm: invalid option -- {arg}"));
                    return codes::EINVAL;
                }
            }
            continue;
        }
        parsing_opts = false;
        paths_found = true;
        let result = rm_path(vfs, term, arg, recursive, force);
        if result != codes::OK {
            return result;
        }
    }

    if !paths_found {
        shell_error(term, "rm: missing operand");
        return codes::EINVAL;
    }
    codes::OK
}
