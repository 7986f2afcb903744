use core_term::{TermId, TerminalState};
use core_vfs::{NodeType, Vfs, VfsError};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const MV: Builtin = Builtin {
    name: "mv",
    help: "Move or rename files",
    handler: cmd_mv,
};

fn name_has_extension(name: &str) -> bool {
    match name.rfind('.') {
        Some(0) | None => false,
        Some(_) => true,
    }
}

fn basename(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn mv_single(
    vfs: &mut Vfs,
    term: &mut TerminalState,
    src_path: &str,
    dst_path: &str,
    dst_is_dir: bool,
) -> i32 {
    let Some(src_node) = vfs.resolve_at(term.cwd, src_path) else {
        shell_error(term, format!("mv: {src_path}: no such file or directory"));
        return codes::ENOENT;
    };
    let src_is_dir = vfs.node_type(src_node) == Ok(NodeType::Directory);

    let (src_parent, src_name) = match vfs.resolve_parent(term.cwd, src_path) {
        Ok(pair) => pair,
        Err(_) => {
            vfs.release(src_node);
            shell_error(term, format!("mv: {src_path}: invalid path"));
            return codes::EINVAL;
        }
    };

    let (dst_dir, dst_name) = if dst_is_dir {
        let Some(dst_dir) = vfs.resolve_at(term.cwd, dst_path) else {
            vfs.release(src_node);
            vfs.release(src_parent);
            shell_error(term, format!("mv: {dst_path}: no such file or directory"));
            return codes::ENOENT;
        };
        if vfs.node_type(dst_dir) != Ok(NodeType::Directory) {
            vfs.release(src_node);
            vfs.release(src_parent);
            vfs.release(dst_dir);
            shell_error(term, format!("mv: {dst_path}: not a directory"));
            return codes::ENOTDIR;
        }
        let Some(name) = basename(src_path) else {
            vfs.release(src_node);
            vfs.release(src_parent);
            vfs.release(dst_dir);
            shell_error(term, format!("mv: {src_path}: invalid path"));
            return codes::EINVAL;
        };
        (dst_dir, name)
    } else {
        match vfs.resolve_parent(term.cwd, dst_path) {
            Ok(pair) => pair,
            Err(VfsError::NotFound) => {
                vfs.release(src_node);
                vfs.release(src_parent);
                shell_error(term, format!("mv: {dst_path}: no such file or directory"));
                return codes::ENOENT;
            }
            Err(_) => {
                vfs.release(src_node);
                vfs.release(src_parent);
                shell_error(term, format!("mv: {dst_path}: invalid path"));
                return codes::EINVAL;
            }
        }
    };

    // directories may not take on a file-style extension
    if src_is_dir && name_has_extension(&dst_name) {
        vfs.release(dst_dir);
        vfs.release(src_parent);
        vfs.release(src_node);
        shell_error(term, format!("mv: {dst_name}: invalid directory name"));
        return codes::EINVAL;
    }

    if let Some(dst_node) = vfs.resolve_at(Some(dst_dir), &dst_name) {
        if dst_node == src_node {
            vfs.release(dst_node);
            vfs.release(dst_dir);
            vfs.release(src_parent);
            vfs.release(src_node);
            return codes::OK;
        }
        let dst_node_is_dir = vfs.node_type(dst_node) == Ok(NodeType::Directory);
        vfs.release(dst_node);
        if dst_node_is_dir {
            vfs.release(dst_dir);
            vfs.release(src_parent);
            vfs.release(src_node);
            shell_error(term, format!("mv: {dst_name}: is a directory"));
            return codes::ENOTDIR;
        }
        if src_is_dir {
            vfs.release(dst_dir);
            vfs.release(src_parent);
            vfs.release(src_node);
            shell_error(term, format!("mv: {dst_path}: not a directory"));
            return codes::ENOTDIR;
        }
        // plain file over plain file: replace
        if vfs.dir_remove_node(dst_dir, &dst_name).is_err() {
            vfs.release(dst_dir);
            vfs.release(src_parent);
            vfs.release(src_node);
            shell_error(term, format!("mv: {dst_path}: failed to remove"));
            return codes::ERR;
        }
    }

    let renamed = vfs.dir_rename_node(src_parent, &src_name, dst_dir, &dst_name);
    vfs.release(dst_dir);
    vfs.release(src_parent);
    vfs.release(src_node);

    match renamed {
        Ok(()) => codes::OK,
        Err(VfsError::Invalid) => {
            shell_error(term, format!("mv: {src_path}: invalid move"));
            codes::EINVAL
        }
        Err(_) => {
            shell_error(term, format!("mv: {src_path}: failed to move"));
            codes::ERR
        }
    }
}

fn cmd_mv(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 3 {
        shell_error(term, "mv: missing file operand");
        return codes::EINVAL;
    }

    let target = &argv[argv.len() - 1];
    let target_trailing_slash = target.len() > 1 && target.ends_with('/');
    let mut target_is_dir = false;
    if let Some(node) = vfs.resolve_at(term.cwd, target) {
        target_is_dir = vfs.node_type(node) == Ok(NodeType::Directory);
        vfs.release(node);
    } else if target_trailing_slash {
        shell_error(term, format!("mv: {target}: not a directory"));
        return codes::ENOTDIR;
    }

    let sources = &argv[1..argv.len() - 1];
    if sources.len() > 1 {
        if !target_is_dir {
            shell_error(term, format!("mv: {target}: not a directory"));
            return codes::ENOTDIR;
        }
        for src in sources {
            let result = mv_single(vfs, term, src, target, true);
            if result != codes::OK {
                return result;
            }
        }
        return codes::OK;
    }

    mv_single(vfs, term, &sources[0], target, target_is_dir)
}
