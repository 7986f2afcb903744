use core_term::{TermId, TerminalState};
use core_vfs::{NodeType, OpenFlags, Vfs};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const WC: Builtin = Builtin {
    name: "wc",
    help: "Count lines, words, and bytes",
    handler: cmd_wc,
};

#[derive(Clone, Copy, Default)]
struct Counts {
    lines: usize,
    words: usize,
    bytes: usize,
}

#[derive(Clone, Copy)]
struct WcOpts {
    show_lines: bool,
    show_words: bool,
    show_bytes: bool,
}

impl WcOpts {
    /// No flags means all three columns.
    fn effective(self) -> (bool, bool, bool) {
        if !self.show_lines && !self.show_words && !self.show_bytes {
            (true, true, true)
        } else {
            (self.show_lines, self.show_words, self.show_bytes)
        }
    }
}

fn parse_flags(argv: &[String]) -> Result<(WcOpts, usize), i32> {
    let mut opts = WcOpts {
        show_lines: false,
        show_words: false,
        show_bytes: false,
    };
    for (i, arg) in argv.iter().enumerate().skip(1) {
        if !arg.starts_with('-') || arg.len() == 1 {
            return Ok((opts, i));
        }
        if arg == "--" {
            return Ok((opts, i + 1));
        }
        for c in arg[1..].chars() {
            match c {
                'l' => opts.show_lines = true,
                'w' => opts.show_words = true,
                'c' => opts.show_bytes = true,
                _ => return Err(codes::EINVAL),
            }
        }
    }
    Ok((opts, argv.len()))
}

fn count(data: &[u8]) -> Counts {
    let mut c = Counts {
        bytes: data.len(),
        ..Counts::default()
    };
    let mut in_word = false;
    for &b in data {
        if b == b'\n' {
            c.lines += 1;
        }
        if b.is_ascii_whitespace() {
            in_word = false;
        } else if !in_word {
            in_word = true;
            c.words += 1;
        }
    }
    c
}

fn print_counts(term: &mut TerminalState, opts: WcOpts, c: Counts, label: Option<&str>) {
    let (lines, words, bytes) = opts.effective();
    let mut out = String::new();
    if lines {
        out.push_str(&c.lines.to_string());
    }
    if words {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&c.words.to_string());
    }
    if bytes {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&c.bytes.to_string());
    }
    if let Some(label) = label {
        out.push(' ');
        out.push_str(label);
    }
    term.write_line(&out);
}

fn slurp(vfs: &mut Vfs, term: &mut TerminalState, path: &str) -> Result<Vec<u8>, i32> {
    let Some(node) = vfs.resolve_at(term.cwd, path) else {
        shell_error(term, format!("wc: {path}: no such file or directory"));
        return Err(codes::ENOENT);
    };
    if vfs.node_type(node) != Ok(NodeType::File) {
        shell_error(term, format!("wc: {path}: not a file"));
        vfs.release(node);
        return Err(codes::EINVAL);
    }
    let file = vfs.open_node(node, OpenFlags::READ);
    vfs.release(node);
    let Ok(file) = file else {
        shell_error(term, format!("wc: {path}: unable to open"));
        return Err(codes::ERR);
    };
    let mut data = Vec::new();
    let mut buf = [0u8; 128];
    loop {
        match vfs.read(file, &mut buf) {
            Ok(0) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            Err(_) => {
                let _ = vfs.close(file);
                shell_error(term, format!("wc: {path}: read error"));
                return Err(codes::ERR);
            }
        }
    }
    let _ = vfs.close(file);
    Ok(data)
}

fn cmd_wc(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    let (opts, first_path) = match parse_flags(argv) {
        Ok(pair) => pair,
        Err(code) => {
            shell_error(term, "wc: invalid option");
            return code;
        }
    };

    if first_path >= argv.len() {
        if let Some(pipe) = term.pipe_input.clone() {
            if !pipe.is_empty() {
                print_counts(term, opts, count(&pipe), None);
                return codes::OK;
            }
        }
        shell_error(term, "wc: missing file operand");
        return codes::EINVAL;
    }

    let paths = &argv[first_path..];
    let mut total = Counts::default();
    for path in paths {
        let data = match slurp(vfs, term, path) {
            Ok(d) => d,
            Err(code) => return code,
        };
        let c = count(&data);
        total.lines += c.lines;
        total.words += c.words;
        total.bytes += c.bytes;
        print_counts(term, opts, c, Some(path));
    }
    if paths.len() > 1 {
        print_counts(term, opts, total, Some("total"));
    }
    codes::OK
}
