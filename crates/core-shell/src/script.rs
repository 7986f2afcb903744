//! The `run` builtin: a line-oriented interpreter over the builtin set.
//!
//! Scripts are read whole, then interpreted line by line. Comments are
//! stripped with quote and escape awareness, `$var`/`${var}` expand outside
//! single quotes, `NAME=VALUE` lines set script variables, and
//! `if/elif/else/fi`, `while/do/done` and `for NAME in …/do/done` nest via
//! a balanced scanner. Conditions are ordinary commands; exit 0 is true.
//! A nonzero exit from a plain line does not stop the script.

use core_term::{TermId, TerminalState};
use core_vfs::{NodeType, OpenFlags, Vfs};

use crate::parse;
use crate::registry::Builtin;
use crate::session::Session;
use crate::{codes, shell_error};

pub const RUN: Builtin = Builtin {
    name: "run",
    help: "Execute a shell script",
    handler: cmd_run,
};

const MAX_VARS: usize = 32;
const MAX_VAR_NAME: usize = 32;

#[derive(Default)]
struct ScriptCtx {
    vars: Vec<(String, String)>,
    loop_depth: u32,
    break_requested: bool,
    continue_requested: bool,
}

impl ScriptCtx {
    fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.vars.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.to_string();
            return;
        }
        if self.vars.len() >= MAX_VARS {
            tracing::warn!(target: "shell.script", name, "variable table full");
            return;
        }
        self.vars.push((name.to_string(), value.to_string()));
    }
}

/// How a block-scan ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EndKind {
    None,
    Else,
    Elif,
    Fi,
    Done,
}

struct BlockEnd {
    kind: EndKind,
    line: Option<String>,
}

impl BlockEnd {
    fn none() -> Self {
        Self {
            kind: EndKind::None,
            line: None,
        }
    }

    fn at(kind: EndKind, line: String) -> Self {
        Self {
            kind,
            line: Some(line),
        }
    }
}

// ---- lexical helpers ---------------------------------------------------

/// Strip an unquoted `#` comment and surrounding whitespace. Backslash
/// escapes and quotes shield `#` from comment stripping.
fn strip_comments_and_trim(line: &str) -> String {
    let mut out = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => {
                escaped = true;
                out.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                out.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                out.push(c);
            }
            '#' if !in_single && !in_double => break,
            c => out.push(c),
        }
    }
    out.trim().to_string()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Expand `$NAME`, `${NAME}` and `$$` outside single quotes. Unknown
/// variables expand to nothing. Escapes are carried through verbatim so the
/// downstream tokenizer can interpret them.
fn expand(ctx: &ScriptCtx, line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if escaped {
            out.push(c);
            escaped = false;
            i += 1;
            continue;
        }
        match c {
            '\\' if !in_single => {
                escaped = true;
                out.push(c);
                i += 1;
            }
            '\'' if !in_double => {
                in_single = !in_single;
                out.push(c);
                i += 1;
            }
            '"' if !in_single => {
                in_double = !in_double;
                out.push(c);
                i += 1;
            }
            '$' if !in_single => {
                if chars.get(i + 1) == Some(&'$') {
                    out.push('$');
                    i += 2;
                    continue;
                }
                if chars.get(i + 1) == Some(&'{') {
                    let mut j = i + 2;
                    let mut name = String::new();
                    while j < chars.len() && chars[j] != '}' && name.len() < MAX_VAR_NAME {
                        name.push(chars[j]);
                        j += 1;
                    }
                    if chars.get(j) == Some(&'}') {
                        if let Some(val) = ctx.get(&name) {
                            out.push_str(val);
                        }
                        i = j + 1;
                        continue;
                    }
                    // unterminated brace: the dollar is literal
                    out.push('$');
                    i += 1;
                    continue;
                }
                if chars.get(i + 1).copied().map(is_ident_start) == Some(true) {
                    let mut j = i + 1;
                    let mut name = String::new();
                    while j < chars.len() && is_ident_char(chars[j]) && name.len() < MAX_VAR_NAME {
                        name.push(chars[j]);
                        j += 1;
                    }
                    if let Some(val) = ctx.get(&name) {
                        out.push_str(val);
                    }
                    i = j;
                    continue;
                }
                out.push('$');
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(is_ident_char)
}

/// `NAME=VALUE` with no unquoted whitespace and a valid identifier.
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut eq: Option<usize> = None;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => return None,
            '=' if !in_single && !in_double && eq.is_none() => eq = Some(i),
            _ => {}
        }
    }
    let eq = eq?;
    let name = &line[..eq];
    if !is_valid_name(name) {
        return None;
    }
    Some((name.to_string(), line[eq + 1..].to_string()))
}

/// Assignment value: single quotes literal, double quotes expanded, bare
/// words expanded.
fn extract_value(ctx: &ScriptCtx, value: &str) -> String {
    let len = value.len();
    if len >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..len - 1].to_string();
    }
    if len >= 2 && value.starts_with('"') && value.ends_with('"') {
        return expand(ctx, &value[1..len - 1]);
    }
    expand(ctx, value)
}

/// `kw` alone, optionally followed by a bare `;`.
fn line_is_keyword(line: &str, kw: &str) -> bool {
    let Some(rest) = line.strip_prefix(kw) else {
        return false;
    };
    let rest = rest.trim_start();
    rest.is_empty() || (rest.starts_with(';') && rest[1..].trim().is_empty())
}

/// `kw` followed by whitespace (or end); yields the remainder.
fn line_starts_with<'a>(line: &'a str, kw: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(kw)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim_start())
}

/// Split `rest` at its first top-level `;` when the tail is exactly
/// `token` (`if cmd; then` on one line). Returns the command part and
/// whether the token was found inline.
fn parse_inline_token(rest: &str, token: &str) -> (String, bool) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut split: Option<usize> = None;
    for (i, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => {
                split = Some(i);
                break;
            }
            _ => {}
        }
    }
    if let Some(pos) = split {
        let after = rest[pos + 1..].trim_start();
        if let Some(tail) = after.strip_prefix(token) {
            if tail.trim().is_empty() {
                return (rest[..pos].trim().to_string(), true);
            }
        }
    }
    (rest.to_string(), false)
}

fn parse_if_line(line: &str, keyword: &str) -> Option<(String, bool)> {
    let rest = line_starts_with(line, keyword)?;
    if rest.is_empty() {
        return None;
    }
    Some(parse_inline_token(rest, "then"))
}

fn parse_while_line(line: &str) -> Option<(String, bool)> {
    let rest = line_starts_with(line, "while")?;
    if rest.is_empty() {
        return None;
    }
    Some(parse_inline_token(rest, "do"))
}

fn parse_for_line(line: &str) -> Option<(String, Vec<String>, bool)> {
    let rest = line_starts_with(line, "for")?;
    if rest.is_empty() {
        return None;
    }
    let (list_part, inline_do) = parse_inline_token(rest, "do");
    let words = parse::split_words(&list_part);
    if words.len() < 3 || words[1] != "in" {
        return None;
    }
    let var = words[0].clone();
    let items = words[2..].to_vec();
    Some((var, items, inline_do))
}

/// Index of the `done` closing the loop whose body starts at `start`,
/// honoring nested `if`/`while`/`for`.
fn find_matching_done(lines: &[String], start: usize) -> Option<usize> {
    let mut loop_depth = 0u32;
    let mut if_depth = 0u32;
    for (i, raw) in lines.iter().enumerate().skip(start) {
        let line = strip_comments_and_trim(raw);
        if line.is_empty() {
            continue;
        }
        if line_starts_with(&line, "if").is_some() {
            if_depth += 1;
        } else if line_is_keyword(&line, "fi") {
            if_depth = if_depth.saturating_sub(1);
        } else if line_starts_with(&line, "while").is_some()
            || line_starts_with(&line, "for").is_some()
        {
            loop_depth += 1;
        } else if line_is_keyword(&line, "done") {
            if loop_depth == 0 && if_depth == 0 {
                return Some(i);
            }
            loop_depth = loop_depth.saturating_sub(1);
        }
    }
    None
}

/// Advance past blank lines and require `expected` next.
fn consume_expected(lines: &[String], count: usize, idx: &mut usize, expected: &str) -> bool {
    while *idx < count {
        let line = strip_comments_and_trim(&lines[*idx]);
        *idx += 1;
        if line.is_empty() {
            continue;
        }
        return line_is_keyword(&line, expected);
    }
    false
}

// ---- execution ---------------------------------------------------------

/// A condition is an ordinary command; its exit code is the truth value.
/// Unlike plain lines, a condition's status is consumed, never reported.
fn exec_condition(session: &mut Session, tid: TermId, ctx: &ScriptCtx, cmd: &str) -> i32 {
    let expanded = expand(ctx, cmd);
    let tokens = parse::tokenize(&expanded);
    if tokens.is_empty() {
        return codes::ERR;
    }
    if tokens.has_pipe {
        session.execute_pipeline(tid, &tokens)
    } else {
        session.dispatch(tid, &tokens.tokens)
    }
}

fn execute_segment(session: &mut Session, tid: TermId, ctx: &mut ScriptCtx, segment: &str) {
    let trimmed = segment.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return;
    }
    if line_is_keyword(trimmed, "break") {
        if ctx.loop_depth == 0 {
            shell_error(session.term_mut(tid), "run: break outside loop");
            return;
        }
        ctx.break_requested = true;
        return;
    }
    if line_is_keyword(trimmed, "continue") {
        if ctx.loop_depth == 0 {
            shell_error(session.term_mut(tid), "run: continue outside loop");
            return;
        }
        ctx.continue_requested = true;
        return;
    }
    if let Some((name, value)) = parse_assignment(trimmed) {
        let resolved = extract_value(ctx, &value);
        ctx.set(&name, &resolved);
        return;
    }
    let expanded = expand(ctx, trimmed);
    session.execute_command_line(tid, &expanded);
}

/// A simple line may hold several `;`-separated commands.
fn execute_simple_line(session: &mut Session, tid: TermId, ctx: &mut ScriptCtx, line: &str) {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut start = 0usize;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => {
                execute_segment(session, tid, ctx, &line[start..i]);
                if ctx.break_requested || ctx.continue_requested {
                    return;
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    execute_segment(session, tid, ctx, &line[start..]);
}

/// Walk lines until one of `stops` closes the block. With `execute` false
/// the block is scanned (and nested blocks skipped) without running
/// anything.
#[allow(clippy::too_many_arguments)]
fn execute_block_until(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    execute: bool,
    stops: &[EndKind],
) -> BlockEnd {
    while *idx < count {
        if ctx.break_requested || ctx.continue_requested {
            return BlockEnd::none();
        }
        let line = strip_comments_and_trim(&lines[*idx]);
        *idx += 1;
        if line.is_empty() {
            continue;
        }

        if line_is_keyword(&line, "else") {
            if stops.contains(&EndKind::Else) {
                return BlockEnd::at(EndKind::Else, line);
            }
        } else if line_starts_with(&line, "elif").is_some() {
            if stops.contains(&EndKind::Elif) {
                return BlockEnd::at(EndKind::Elif, line);
            }
        } else if line_is_keyword(&line, "fi") {
            if stops.contains(&EndKind::Fi) {
                return BlockEnd::at(EndKind::Fi, line);
            }
        } else if line_is_keyword(&line, "done") {
            if stops.contains(&EndKind::Done) {
                return BlockEnd::at(EndKind::Done, line);
            }
        } else if line_starts_with(&line, "if").is_some() {
            if execute {
                execute_if(session, tid, ctx, lines, count, idx, &line);
            } else {
                skip_if(session, tid, ctx, lines, count, idx, &line);
            }
        } else if line_starts_with(&line, "while").is_some() {
            if execute {
                execute_while(session, tid, ctx, lines, count, idx, &line);
            } else {
                skip_while(session, tid, ctx, lines, count, idx, &line);
            }
        } else if line_starts_with(&line, "for").is_some() {
            if execute {
                execute_for(session, tid, ctx, lines, count, idx, &line);
            } else {
                skip_for(session, tid, ctx, lines, count, idx, &line);
            }
        } else if execute {
            execute_simple_line(session, tid, ctx, &line);
        }
    }
    BlockEnd::none()
}

#[allow(clippy::too_many_arguments)]
fn execute_if(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    line: &str,
) {
    let Some((cond, inline_then)) = parse_if_line(line, "if") else {
        shell_error(session.term_mut(tid), "run: malformed if");
        return;
    };
    if !inline_then && !consume_expected(lines, count, idx, "then") {
        shell_error(session.term_mut(tid), "run: missing then");
        return;
    }
    let mut executed = exec_condition(session, tid, ctx, &cond) == codes::OK;
    let mut end = execute_block_until(
        session,
        tid,
        ctx,
        lines,
        count,
        idx,
        executed,
        &[EndKind::Else, EndKind::Elif, EndKind::Fi],
    );
    loop {
        match end.kind {
            EndKind::Elif => {
                let Some(elif_line) = end.line.take() else { break };
                let Some((econd, einline)) = parse_if_line(&elif_line, "elif") else {
                    break;
                };
                let run = if executed {
                    false
                } else {
                    exec_condition(session, tid, ctx, &econd) == codes::OK
                };
                if !einline && !consume_expected(lines, count, idx, "then") {
                    shell_error(session.term_mut(tid), "run: missing then");
                    break;
                }
                if run {
                    executed = true;
                }
                end = execute_block_until(
                    session,
                    tid,
                    ctx,
                    lines,
                    count,
                    idx,
                    run,
                    &[EndKind::Else, EndKind::Elif, EndKind::Fi],
                );
            }
            EndKind::Else => {
                end = execute_block_until(
                    session,
                    tid,
                    ctx,
                    lines,
                    count,
                    idx,
                    !executed,
                    &[EndKind::Fi],
                );
            }
            _ => break,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn skip_if(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    line: &str,
) {
    let Some((_, inline_then)) = parse_if_line(line, "if") else {
        return;
    };
    if !inline_then && !consume_expected(lines, count, idx, "then") {
        return;
    }
    let mut end = execute_block_until(
        session,
        tid,
        ctx,
        lines,
        count,
        idx,
        false,
        &[EndKind::Else, EndKind::Elif, EndKind::Fi],
    );
    while end.kind == EndKind::Elif {
        if let Some(elif_line) = end.line.take() {
            if let Some((_, einline)) = parse_if_line(&elif_line, "elif") {
                if !einline {
                    consume_expected(lines, count, idx, "then");
                }
            }
        }
        end = execute_block_until(
            session,
            tid,
            ctx,
            lines,
            count,
            idx,
            false,
            &[EndKind::Else, EndKind::Elif, EndKind::Fi],
        );
    }
    if end.kind == EndKind::Else {
        execute_block_until(session, tid, ctx, lines, count, idx, false, &[EndKind::Fi]);
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_while(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    line: &str,
) {
    let Some((cond, inline_do)) = parse_while_line(line) else {
        shell_error(session.term_mut(tid), "run: malformed while");
        return;
    };
    if !inline_do && !consume_expected(lines, count, idx, "do") {
        shell_error(session.term_mut(tid), "run: missing do");
        return;
    }
    let body_start = *idx;
    let Some(body_end) = find_matching_done(lines, body_start) else {
        shell_error(session.term_mut(tid), "run: missing done");
        return;
    };
    ctx.loop_depth += 1;
    while exec_condition(session, tid, ctx, &cond) == codes::OK {
        let mut inner = body_start;
        execute_block_until(session, tid, ctx, lines, body_end, &mut inner, true, &[]);
        if ctx.break_requested {
            ctx.break_requested = false;
            break;
        }
        if ctx.continue_requested {
            ctx.continue_requested = false;
            continue;
        }
    }
    ctx.loop_depth -= 1;
    *idx = body_end + 1;
}

#[allow(clippy::too_many_arguments)]
fn skip_while(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    line: &str,
) {
    let Some((_, inline_do)) = parse_while_line(line) else {
        return;
    };
    if !inline_do && !consume_expected(lines, count, idx, "do") {
        return;
    }
    execute_block_until(session, tid, ctx, lines, count, idx, false, &[EndKind::Done]);
}

#[allow(clippy::too_many_arguments)]
fn execute_for(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    line: &str,
) {
    let Some((var, items, inline_do)) = parse_for_line(line) else {
        shell_error(session.term_mut(tid), "run: malformed for");
        return;
    };
    if !inline_do && !consume_expected(lines, count, idx, "do") {
        shell_error(session.term_mut(tid), "run: missing do");
        return;
    }
    let body_start = *idx;
    let Some(body_end) = find_matching_done(lines, body_start) else {
        shell_error(session.term_mut(tid), "run: missing done");
        return;
    };
    ctx.loop_depth += 1;
    for item in &items {
        let value = expand(ctx, item);
        ctx.set(&var, &value);
        let mut inner = body_start;
        execute_block_until(session, tid, ctx, lines, body_end, &mut inner, true, &[]);
        if ctx.break_requested {
            ctx.break_requested = false;
            break;
        }
        if ctx.continue_requested {
            ctx.continue_requested = false;
            continue;
        }
    }
    ctx.loop_depth -= 1;
    *idx = body_end + 1;
}

#[allow(clippy::too_many_arguments)]
fn skip_for(
    session: &mut Session,
    tid: TermId,
    ctx: &mut ScriptCtx,
    lines: &[String],
    count: usize,
    idx: &mut usize,
    line: &str,
) {
    let Some((_, _, inline_do)) = parse_for_line(line) else {
        return;
    };
    if !inline_do && !consume_expected(lines, count, idx, "do") {
        return;
    }
    execute_block_until(session, tid, ctx, lines, count, idx, false, &[EndKind::Done]);
}

// ---- entry -------------------------------------------------------------

fn load_script(vfs: &mut Vfs, term: &mut TerminalState, path: &str) -> Result<Vec<String>, i32> {
    let Some(node) = vfs.resolve_at(term.cwd, path) else {
        shell_error(term, format!("run: {path}: no such file or directory"));
        return Err(codes::ENOENT);
    };
    if vfs.node_type(node) != Ok(NodeType::File) {
        shell_error(term, format!("run: {path}: not a file"));
        vfs.release(node);
        return Err(codes::EINVAL);
    }
    let file = vfs.open_node(node, OpenFlags::READ);
    vfs.release(node);
    let Ok(file) = file else {
        shell_error(term, format!("run: {path}: unable to open"));
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
                shell_error(term, format!("run: {path}: read error"));
                return Err(codes::ERR);
            }
        }
    }
    let _ = vfs.close(file);

    let text = String::from_utf8_lossy(&data).replace('\r', "");
    Ok(text.split('\n').map(str::to_string).collect())
}

fn cmd_run(session: &mut Session, tid: TermId, argv: &[String]) -> i32 {
    if argv.len() < 2 {
        shell_error(session.term_mut(tid), "run: missing program name");
        return codes::EINVAL;
    }
    if argv.len() > 2 {
        shell_error(session.term_mut(tid), "run: too many arguments");
        return codes::EINVAL;
    }
    let path = argv[1].clone();
    let lines = {
        let (vfs, term) = session.vfs_term(tid);
        match load_script(vfs, term, &path) {
            Ok(lines) => lines,
            Err(code) => return code,
        }
    };
    tracing::debug!(target: "shell.script", path = %path, lines = lines.len(), "running script");

    let mut ctx = ScriptCtx::default();
    let count = lines.len();
    let mut idx = 0usize;
    while idx < count {
        let line = strip_comments_and_trim(&lines[idx]);
        idx += 1;
        if line.is_empty() {
            continue;
        }
        if line_starts_with(&line, "if").is_some() {
            execute_if(session, tid, &mut ctx, &lines, count, &mut idx, &line);
        } else if line_starts_with(&line, "while").is_some() {
            execute_while(session, tid, &mut ctx, &lines, count, &mut idx, &line);
        } else if line_starts_with(&line, "for").is_some() {
            execute_for(session, tid, &mut ctx, &lines, count, &mut idx, &line);
        } else if line_is_keyword(&line, "else")
            || line_is_keyword(&line, "fi")
            || line_is_keyword(&line, "done")
            || line_starts_with(&line, "elif").is_some()
        {
            shell_error(session.term_mut(tid), "run: unexpected control keyword");
        } else {
            execute_simple_line(session, tid, &mut ctx, &line);
        }
    }
    codes::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_rules() {
        let mut ctx = ScriptCtx::default();
        ctx.set("name", "world");
        assert_eq!(expand(&ctx, "hello $name"), "hello world");
        assert_eq!(expand(&ctx, "hello ${name}!"), "hello world!");
        assert_eq!(expand(&ctx, "'$name'"), "'$name'", "single quotes literal");
        assert_eq!(expand(&ctx, "\"$name\""), "\"world\"");
        assert_eq!(expand(&ctx, "$$name"), "$name", "dollar-dollar escapes");
        assert_eq!(expand(&ctx, "$unknown!"), "!", "unknown expands empty");
        assert_eq!(expand(&ctx, "${unclosed"), "${unclosed");
        assert_eq!(expand(&ctx, "a\\$name"), "a\\$name", "escape preserved");
    }

    #[test]
    fn assignment_recognition() {
        assert_eq!(
            parse_assignment("x=1"),
            Some(("x".to_string(), "1".to_string()))
        );
        assert_eq!(
            parse_assignment("msg=\"a b\""),
            Some(("msg".to_string(), "\"a b\"".to_string()))
        );
        assert_eq!(parse_assignment("x = 1"), None, "unquoted whitespace");
        assert_eq!(parse_assignment("1x=2"), None, "invalid identifier");
        assert_eq!(parse_assignment("echo hi"), None);
    }

    #[test]
    fn keyword_recognition() {
        assert!(line_is_keyword("done", "done"));
        assert!(line_is_keyword("done ;", "done"));
        assert!(!line_is_keyword("done; echo x", "done"));
        assert!(!line_is_keyword("donex", "done"));
        assert_eq!(line_starts_with("if echo hi", "if"), Some("echo hi"));
        assert_eq!(line_starts_with("ifecho", "if"), None);
    }

    #[test]
    fn inline_token_split() {
        assert_eq!(
            parse_inline_token("echo hi; then", "then"),
            ("echo hi".to_string(), true)
        );
        assert_eq!(
            parse_inline_token("echo hi", "then"),
            ("echo hi".to_string(), false)
        );
        assert_eq!(
            parse_inline_token("echo 'a;b'; do", "do"),
            ("echo 'a;b'".to_string(), true)
        );
    }

    #[test]
    fn for_line_parsing() {
        let (var, items, inline) = parse_for_line("for f in a \"b c\" $x; do").unwrap();
        assert_eq!(var, "f");
        assert_eq!(items, ["a", "b c", "$x"]);
        assert!(inline);
        assert!(parse_for_line("for f a b; do").is_none(), "missing in");
    }

    #[test]
    fn done_matching_honors_nesting() {
        let lines: Vec<String> = [
            "echo body",   // 0
            "while echo t", // 1
            "do",          // 2
            "  echo deep", // 3
            "done",        // 4
            "if echo c; then", // 5
            "  echo x",    // 6
            "fi",          // 7
            "done",        // 8
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(find_matching_done(&lines, 0), Some(8));
    }
}
