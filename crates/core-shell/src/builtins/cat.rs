use core_term::{TermId, TerminalState};
use core_vfs::{FileId, NodeType, OpenFlags, Vfs, VfsError};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const CAT: Builtin = Builtin {
    name: "cat",
    help: "Display file contents",
    handler: cmd_cat,
};

fn write_output(
    vfs: &mut Vfs,
    term: &mut TerminalState,
    out_file: Option<FileId>,
    buf: &[u8],
) -> i32 {
    match out_file {
        Some(file) => match vfs.write(file, buf) {
            Ok(n) if n == buf.len() => codes::OK,
            _ => codes::ERR,
        },
        None => {
            term.write_bytes(buf);
            codes::OK
        }
    }
}

/// Open (creating on demand) the `>` destination for writing.
fn open_redirect_target(
    vfs: &mut Vfs,
    term: &mut TerminalState,
    out_path: &str,
) -> Result<FileId, i32> {
    if let Some(node) = vfs.resolve_at(term.cwd, out_path) {
        if vfs.node_type(node) != Ok(NodeType::File) {
            shell_error(term, format!("cat: {out_path}: not a file"));
            vfs.release(node);
            return Err(codes::EINVAL);
        }
        let file = vfs.open_node(node, OpenFlags::WRITE | OpenFlags::TRUNC | OpenFlags::CREATE);
        vfs.release(node);
        return file.map_err(|_| {
            shell_error(term, format!("cat: {out_path}: unable to open output"));
            codes::ERR
        });
    }

    let (parent, name) = match vfs.resolve_parent(term.cwd, out_path) {
        Ok(pair) => pair,
        Err(VfsError::NotFound) => {
            shell_error(term, format!("cat: {out_path}: no such file or directory"));
            return Err(codes::ENOENT);
        }
        Err(VfsError::NotDir) => {
            shell_error(term, format!("cat: {out_path}: invalid path"));
            return Err(codes::ENOTDIR);
        }
        Err(_) => {
            shell_error(term, format!("cat: {out_path}: invalid path"));
            return Err(codes::EINVAL);
        }
    };
    let created = vfs.dir_create_node(parent, &name, NodeType::File);
    vfs.release(parent);
    let created = match created {
        Ok(node) => node,
        Err(_) => {
            shell_error(term, format!("cat: {out_path}: failed to create file"));
            return Err(codes::ERR);
        }
    };
    let file = vfs.open_node(created, OpenFlags::WRITE | OpenFlags::TRUNC | OpenFlags::CREATE);
    vfs.release(created);
    file.map_err(|_| {
        shell_error(term, format!("cat: {out_path}: unable to open output"));
        codes::ERR
    })
}

fn cmd_cat(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        // bare cat consumes pipe input when present
        if let Some(pipe) = term.pipe_input.clone() {
            if !pipe.is_empty() {
                term.write_bytes(&pipe);
                return codes::OK;
            }
        }
        shell_error(term, "cat: missing file operand");
        return codes::EINVAL;
    }

    let redirect_pos = argv[1..].iter().position(|a| a == ">").map(|i| i + 1);

    let mut last_input = match redirect_pos {
        Some(pos) => pos as i32 - 1,
        None => argv.len() as i32 - 1,
    };
    if last_input < 1 {
        if term.pipe_input.as_ref().map(|p| !p.is_empty()).unwrap_or(false) {
            last_input = 0;
        } else {
            shell_error(term, "cat: missing file operand");
            return codes::EINVAL;
        }
    }

    let out_path = match redirect_pos {
        Some(pos) => {
            if pos + 1 >= argv.len() {
                shell_error(term, "cat: missing output file operand");
                return codes::EINVAL;
            }
            if pos + 2 != argv.len() {
                shell_error(term, "cat: too many arguments");
                return codes::EINVAL;
            }
            Some(argv[pos + 1].clone())
        }
        None => None,
    };

    let out_file = match &out_path {
        Some(path) => match open_redirect_target(vfs, term, path) {
            Ok(file) => Some(file),
            Err(code) => return code,
        },
        None => None,
    };

    // pipe input as the sole source
    if last_input == 0 {
        let pipe = term.pipe_input.clone().unwrap_or_default();
        let result = write_output(vfs, term, out_file, &pipe);
        if let Some(file) = out_file {
            let _ = vfs.close(file);
        }
        if result != codes::OK {
            shell_error(term, "cat: write error");
            return codes::ERR;
        }
        return codes::OK;
    }

    let mut buffer = [0u8; 128];
    for path in &argv[1..=last_input as usize] {
        let Some(node) = vfs.resolve_at(term.cwd, path) else {
            shell_error(term, format!("cat: {path}: no such file or directory"));
            if let Some(file) = out_file {
                let _ = vfs.close(file);
            }
            return codes::ENOENT;
        };
        if vfs.node_type(node) != Ok(NodeType::File) {
            shell_error(term, format!("cat: {path}: not a file"));
            vfs.release(node);
            if let Some(file) = out_file {
                let _ = vfs.close(file);
            }
            return codes::EINVAL;
        }
        let file = vfs.open_node(node, OpenFlags::READ);
        vfs.release(node);
        let Ok(file) = file else {
            shell_error(term, format!("cat: {path}: unable to open"));
            if let Some(out) = out_file {
                let _ = vfs.close(out);
            }
            return codes::ERR;
        };

        loop {
            match vfs.read(file, &mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if write_output(vfs, term, out_file, &buffer[..n]) != codes::OK {
                        let _ = vfs.close(file);
                        if let Some(out) = out_file {
                            let _ = vfs.close(out);
                        }
                        shell_error(term, "cat: write error");
                        return codes::ERR;
                    }
                }
                Err(_) => {
                    let _ = vfs.close(file);
                    if let Some(out) = out_file {
                        let _ = vfs.close(out);
                    }
                    shell_error(term, format!("cat: {path}: read error"));
                    return codes::ERR;
                }
            }
        }
        let _ = vfs.close(file);
    }

    if let Some(out) = out_file {
        let _ = vfs.close(out);
    }
    codes::OK
}
