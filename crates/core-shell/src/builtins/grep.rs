use core_term::{TermId, TerminalState};
use core_vfs::{NodeType, OpenFlags, Vfs};

use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const GREP: Builtin = Builtin {
    name: "grep",
    help: "Search for PATTERN in files",
    handler: cmd_grep,
};

struct GrepOpts {
    ignore_case: bool,
    invert: bool,
    show_line: bool,
}

fn parse_flags(argv: &[String]) -> Result<(GrepOpts, usize), i32> {
    let mut opts = GrepOpts {
        ignore_case: false,
        invert: false,
        show_line: false,
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
                'i' => opts.ignore_case = true,
                'v' => opts.invert = true,
                'n' => opts.show_line = true,
                _ => return Err(codes::EINVAL),
            }
        }
    }
    Ok((opts, argv.len()))
}

fn line_matches(line: &[u8], pattern: &str, ignore_case: bool) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let hay = String::from_utf8_lossy(line);
    if ignore_case {
        hay.to_ascii_lowercase()
            .contains(&pattern.to_ascii_lowercase())
    } else {
        hay.contains(pattern)
    }
}

fn output_line(
    term: &mut TerminalState,
    filename: Option<&str>,
    line_no: Option<usize>,
    line: &[u8],
) {
    if let Some(name) = filename {
        term.write_str(name);
        term.write_char(b':');
    }
    if let Some(no) = line_no {
        term.write_str(&format!("{no}:"));
    }
    term.write_bytes(line);
    term.newline();
}

fn grep_data(
    term: &mut TerminalState,
    opts: &GrepOpts,
    pattern: &str,
    filename: Option<&str>,
    data: &[u8],
) {
    let mut line_no = 1usize;
    let mut start = 0usize;
    let mut emit = |term: &mut TerminalState, line: &[u8], no: usize| {
        let mut matched = line_matches(line, pattern, opts.ignore_case);
        if opts.invert {
            matched = !matched;
        }
        if matched {
            output_line(term, filename, opts.show_line.then_some(no), line);
        }
    };
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            emit(term, &data[start..i], line_no);
            start = i + 1;
            line_no += 1;
        }
    }
    if start < data.len() {
        emit(term, &data[start..], line_no);
    }
}

fn slurp(vfs: &mut Vfs, term: &mut TerminalState, path: &str) -> Result<Vec<u8>, i32> {
    let Some(node) = vfs.resolve_at(term.cwd, path) else {
        shell_error(term, format!("grep: {path}: no such file or directory"));
        return Err(codes::ENOENT);
    };
    if vfs.node_type(node) != Ok(NodeType::File) {
        shell_error(term, format!("grep: {path}: not a file"));
        vfs.release(node);
        return Err(codes::EINVAL);
    }
    let file = vfs.open_node(node, OpenFlags::READ);
    vfs.release(node);
    let Ok(file) = file else {
        shell_error(term, format!("grep: {path}: unable to open"));
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
                shell_error(term, format!("grep: {path}: read error"));
                return Err(codes::ERR);
            }
        }
    }
    let _ = vfs.close(file);
    Ok(data)
}

fn cmd_grep(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let (vfs, term) = session.vfs_term(tid);

    if argv.len() < 2 {
        shell_error(term, "grep: missing pattern");
        return codes::EINVAL;
    }
    let (opts, first_pattern) = match parse_flags(argv) {
        Ok(pair) => pair,
        Err(code) => {
            shell_error(term, "grep: invalid option");
            return code;
        }
    };
    if first_pattern >= argv.len() {
        shell_error(term, "grep: missing pattern");
        return codes::EINVAL;
    }
    let pattern = argv[first_pattern].clone();
    let first_path = first_pattern + 1;

    if first_path >= argv.len() {
        // no FILE operands: read the pipe payload
        if let Some(pipe) = term.pipe_input.clone() {
            if !pipe.is_empty() {
                grep_data(term, &opts, &pattern, None, &pipe);
                return codes::OK;
            }
        }
        shell_error(term, "grep: missing file operand");
        return codes::EINVAL;
    }

    let paths = &argv[first_path..];
    let show_filename = paths.len() > 1;
    for path in paths {
        let data = match slurp(vfs, term, path) {
            Ok(d) => d,
            Err(code) => return code,
        };
        let filename = show_filename.then_some(path.as_str());
        grep_data(term, &opts, &pattern, filename, &data);
    }
    codes::OK
}
