use core_term::TermId;
use core_vfs::NodeType;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const NANO: Builtin = Builtin {
    name: "nano",
    help: "Edit a file",
    handler: cmd_nano,
};

fn cmd_nano(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() < 2 {
        shell_error(session.term_mut(tid), "nano: missing file operand");
        return codes::EINVAL;
    }
    if argv.len() > 2 {
        shell_error(session.term_mut(tid), "nano: too many arguments");
        return codes::EINVAL;
    }
    let path = argv[1].clone();

    let (vfs, term) = session.vfs_term(tid);
    let Some(node) = vfs.resolve_at(term.cwd, &path) else {
        shell_error(term, format!("nano: {path}: no such file or directory"));
        return codes::ENOENT;
    };
    if vfs.node_type(node) != Ok(NodeType::File) {
        shell_error(term, format!("nano: {path}: not a file"));
        vfs.release(node);
        return codes::EINVAL;
    }
    vfs.release(node);

    if !session
        .modes
        .nano
        .open(&mut session.vfs, session.wm.terminal_mut(tid), &path)
    {
        shell_error(session.term_mut(tid), format!("nano: {path}: unable to open"));
        return codes::ERR;
    }
    codes::OK
}
