use core_modes::auth;
use core_term::TermId;

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const FASTFETCH: Builtin = Builtin {
    name: "fastfetch",
    help: "Show system information",
    handler: cmd_fastfetch,
};

const BANNER_IMAGE: &str = "/usr/share/banners/logo.raw";

fn cmd_fastfetch(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() > 1 {
        shell_error(session.term_mut(tid), "fastfetch: too many arguments");
        return codes::EINVAL;
    }

    let user = auth::read_entry(&mut session.vfs)
        .map(|e| e.username)
        .unwrap_or_else(|| "user".to_string());
    let terminals = session.wm.window_count();
    let processes = session.procs.count();
    let banner = session.vfs.resolve(BANNER_IMAGE).map(|node| {
        let path = session
            .vfs
            .node_path(node)
            .unwrap_or(BANNER_IMAGE)
            .to_string();
        session.vfs.release(node);
        path
    });

    let term = session.wm.terminal_mut(tid);
    let start_row = term.cursor_row;
    let title = format!("{user}@slate");
    let lines = [
        title.clone(),
        "-".repeat(title.len()),
        "OS: Slate 0.1".to_string(),
        "Host: ESP32 devkit".to_string(),
        "Shell: slate sh".to_string(),
        format!("Terminals: {terminals}"),
        format!("Processes: {processes}"),
        "Display: 480x320 tft".to_string(),
    ];
    for line in &lines {
        term.write_line(line);
    }

    // reserve the banner region beside the text; pixel compositing is the
    // renderer's job
    term.fastfetch.active = true;
    term.fastfetch.start_row = start_row;
    term.fastfetch.line_count = lines.len();
    term.fastfetch.image_path = banner.unwrap_or_default();
    codes::OK
}
