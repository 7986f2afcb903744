use core_term::TermId;
use core_vfs::NodeType;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const QIMGV: Builtin = Builtin {
    name: "qimgv",
    help: "View an image",
    handler: cmd_qimgv,
};

fn cmd_qimgv(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        shell_error(term, "qimgv: missing file operand");
        return codes::EINVAL;
    }
    if argv.len() > 2 {
        shell_error(term, "qimgv: too many arguments");
        return codes::EINVAL;
    }
    let path = &argv[1];
    let Some(node) = vfs.resolve_at(term.cwd, path) else {
        shell_error(term, format!("qimgv: {path}: no such file or directory"));
        return codes::ENOENT;
    };
    if vfs.node_type(node) != Ok(NodeType::File) {
        shell_error(term, format!("qimgv: {path}: not a file"));
        vfs.release(node);
        return codes::EINVAL;
    }
    let canonical = vfs.node_path(node).unwrap_or(path).to_string();
    vfs.release(node);

    // the viewer renders externally; the flag makes the terminal swallow
    // keys until Esc leaves the mode
    term.image_view = Some(canonical);
    codes::OK
}
