use core_term::TermId;
use core_vfs::NodeType;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const LS: Builtin = Builtin {
    name: "ls",
    help: "List directory contents",
    handler: cmd_ls,
};

fn cmd_ls(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() > 2 {
        shell_error(term, "ls: too many arguments");
        return codes::EINVAL;
    }

    // target: the argument when given, the working directory otherwise
    let dir = if argv.len() > 1 {
        let path = &argv[1];
        let Some(dir) = vfs.resolve_at(term.cwd, path) else {
            shell_error(term, format!("ls: {path}: no such file or directory"));
            return codes::ENOENT;
        };
        if vfs.node_type(dir) != Ok(NodeType::Directory) {
            shell_error(term, format!("ls: {path}: not a directory"));
            vfs.release(dir);
            return codes::ENOTDIR;
        }
        dir
    } else {
        match term.cwd {
            Some(cwd) => {
                if vfs.retain(cwd).is_err() {
                    return codes::ERR;
                }
                cwd
            }
            None => {
                let Some(root) = vfs.resolve("/") else {
                    shell_error(term, "ls: no filesystem mounted");
                    return codes::ERR;
                };
                root
            }
        }
    };

    let iter = match vfs.dir_iter_create(dir) {
        Ok(it) => it,
        Err(_) => {
            shell_error(term, "ls: directory iteration not supported");
            vfs.release(dir);
            return codes::ERR;
        }
    };

    // captured output (pipes) gets one entry per line so downstream
    // consumers can split it; interactive output is space separated
    let use_newlines = term.capture_active();
    let mut entry_count = 0usize;
    loop {
        match vfs.dir_iter_next(iter) {
            Ok(Some(name)) => {
                if use_newlines {
                    term.write_line(&name);
                } else {
                    if entry_count > 0 {
                        term.write_char(b' ');
                    }
                    term.write_str(&name);
                }
                entry_count += 1;
            }
            Ok(None) => break,
            Err(_) => {
                shell_error(term, "ls: error reading directory");
                vfs.dir_iter_destroy(iter);
                vfs.release(dir);
                return codes::ERR;
            }
        }
    }
    if !use_newlines {
        term.newline();
    }

    vfs.dir_iter_destroy(iter);
    vfs.release(dir);
    codes::OK
}
