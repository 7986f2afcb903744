use core_term::{TermId, TerminalState};
use core_vfs::{NodeType, Vfs};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const MKDIR: Builtin = Builtin {
    name: "mkdir",
    help: "Create directories",
    handler: cmd_mkdir,
};

/// Directory names may not carry an extension; a leading dot (hidden name)
/// is fine.
fn name_has_extension(name: &str) -> bool {
    match name.rfind('.') {
        Some(0) | None => false,
        Some(_) => true,
    }
}

fn mkdir_single(vfs: &mut Vfs, term: &mut TerminalState, path: &str, parents: bool) -> i32 {
    if path.is_empty() {
        shell_error(term, "mkdir: missing operand");
        return codes::EINVAL;
    }

    let mut current = if path.starts_with('/') {
        match vfs.resolve("/") {
            Some(root) => root,
            None => {
                shell_error(term, "mkdir: no filesystem mounted");
                return codes::ERR;
            }
        }
    } else {
        match term.cwd {
            Some(cwd) => {
                if vfs.retain(cwd).is_err() {
                    return codes::ERR;
                }
                cwd
            }
            None => match vfs.resolve("/") {
                Some(root) => root,
                None => {
                    shell_error(term, "mkdir: no filesystem mounted");
                    return codes::ERR;
                }
            },
        }
    };

    let comps: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if comps.is_empty() {
        vfs.release(current);
        shell_error(term, format!("mkdir: {path}: file exists"));
        return codes::EINVAL;
    }

    for (i, comp) in comps.iter().enumerate() {
        let is_last = i == comps.len() - 1;
        if *comp == "." {
            continue;
        }
        if *comp == ".." {
            let Some(next) = vfs.resolve_at(Some(current), "..") else {
                vfs.release(current);
                shell_error(term, format!("mkdir: {path}: no such file or directory"));
                return codes::ENOENT;
            };
            vfs.release(current);
            current = next;
            continue;
        }

        match vfs.resolve_at(Some(current), comp) {
            Some(next) => {
                if vfs.node_type(next) != Ok(NodeType::Directory) {
                    shell_error(term, format!("mkdir: {comp}: not a directory"));
                    vfs.release(next);
                    vfs.release(current);
                    return codes::ENOTDIR;
                }
                if is_last && !parents {
                    vfs.release(next);
                    vfs.release(current);
                    shell_error(term, format!("mkdir: {path}: file exists"));
                    return codes::EINVAL;
                }
                vfs.release(current);
                current = next;
            }
            None => {
                if !parents && !is_last {
                    vfs.release(current);
                    shell_error(term, format!("mkdir: {path}: no such file or directory"));
                    return codes::ENOENT;
                }
                if name_has_extension(comp) {
                    shell_error(term, format!("mkdir: {comp}: invalid directory name"));
                    vfs.release(current);
                    return codes::EINVAL;
                }
                match vfs.dir_create_node(current, comp, NodeType::Directory) {
                    Ok(created) => {
                        vfs.release(current);
                        current = created;
                    }
                    Err(_) => {
                        vfs.release(current);
                        shell_error(term, format!("mkdir: {path}: failed to create directory"));
                        return codes::ERR;
                    }
                }
            }
        }
    }

    vfs.release(current);
    codes::OK
}

fn cmd_mkdir(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        shell_error(term, "mkdir: missing operand");
        return codes::EINVAL;
    }

    let mut parents = false;
    let mut paths_found = false;
    for arg in &argv[1..] {
        if arg == "-p" {
            parents = true;
            continue;
        }
        if arg.starts_with('-') {
            shell_error(term, format!("mkdir: invalid option -- {arg}"));
            return codes::EINVAL;
        }
        paths_found = true;
        let result = mkdir_single(vfs, term, arg, parents);
        if result != codes::OK {
            return result;
        }
    }
    if !paths_found {
        shell_error(term, "mkdir: missing operand");
        return codes::EINVAL;
    }
    codes::OK
}
