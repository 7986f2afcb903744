use core_term::{TermId, TerminalState};

use crate::registry::Builtin;
use crate::session::Session;
use crate::codes;

pub const ECHO: Builtin = Builtin {
    name: "echo",
    help: "Echo arguments",
    handler: cmd_echo,
};

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(10 + c - b'a'),
        b'A'..=b'F' => Some(10 + c - b'A'),
        _ => None,
    }
}

/// Write one argument interpreting C-style escapes. Returns `false` when a
/// `\c` terminated output (suppressing the trailing newline too).
fn write_escaped(term: &mut TerminalState, text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            term.write_char(bytes[i]);
            i += 1;
            continue;
        }
        i += 1;
        if i >= bytes.len() {
            term.write_char(b'\\');
            break;
        }
        match bytes[i] {
            b'a' => term.write_char(0x07),
            b'b' => term.write_char(0x08),
            b'f' => term.write_char(0x0c),
            b'n' => term.write_char(b'\n'),
            b'r' => term.write_char(b'\r'),
            b't' => term.write_char(b'\t'),
            b'v' => term.write_char(0x0b),
            b'\\' => term.write_char(b'\\'),
            b'c' => return false,
            b'0' => {
                // up to three octal digits, the leading zero included
                let mut value: u32 = 0;
                let mut digits = 0;
                while i < bytes.len() && digits < 3 && (b'0'..=b'7').contains(&bytes[i]) {
                    value = value * 8 + (bytes[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                term.write_char(value as u8);
                continue;
            }
            b'x' => {
                i += 1;
                let mut value: u32 = 0;
                let mut digits = 0;
                while i < bytes.len() && digits < 2 {
                    let Some(hv) = hex_value(bytes[i]) else { break };
                    value = (value << 4) | hv as u32;
                    i += 1;
                    digits += 1;
                }
                if digits == 0 {
                    term.write_char(b'x');
                } else {
                    term.write_char(value as u8);
                }
                continue;
            }
            other => term.write_char(other),
        }
        i += 1;
    }
    true
}

fn cmd_echo(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    let term = session.term_mut(tid);

    let mut print_newline = true;
    let mut interpret_escapes = false;
    let mut arg_start = 1;

    while arg_start < argv.len() {
        let opt = &argv[arg_start];
        if !opt.starts_with('-') || opt.len() == 1 {
            break;
        }
        if opt == "--" {
            arg_start += 1;
            break;
        }
        let mut valid = true;
        for c in opt[1..].chars() {
            match c {
                'n' => print_newline = false,
                'e' => interpret_escapes = true,
                'E' => interpret_escapes = false,
                _ => {
                    valid = false;
                    break;
                }
            }
        }
        if !valid {
            break;
        }
        arg_start += 1;
    }

    let words = &argv[arg_start..];
    for (i, word) in words.iter().enumerate() {
        if interpret_escapes {
            if !write_escaped(term, word) {
                print_newline = false;
                break;
            }
        } else {
            term.write_str(word);
        }
        if i + 1 < words.len() {
            term.write_char(b' ');
        }
    }
    if print_newline {
        term.newline();
    }
    codes::OK
}
