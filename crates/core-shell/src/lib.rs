//! The shell: tokenizer, builtin dispatch, pipelines, scripting, and the
//! session object wiring every runtime subsystem together.
//!
//! Control flow for a keystroke: hotkey table → modal interceptor (image
//! view, login, first boot, passwd, nano) → line editor. On Enter the line
//! is tokenized and dispatched — a single builtin, or a two-stage pipeline
//! bridged by a captured byte buffer.

pub mod codes;
pub mod parse;

mod builtins;
mod registry;
mod script;
mod session;

pub use registry::{Builtin, BuiltinHandler, BuiltinRegistry};
pub use session::{PowerState, Session};

use core_term::TerminalState;

/// Format a diagnostic onto the terminal, appending a newline when the
/// message lacks one. Builtins use lowercase command-name prefixes
/// (`"cat: /foo: no such file or directory"`).
pub fn shell_error(term: &mut TerminalState, msg: impl AsRef<str>) {
    let msg = msg.as_ref();
    term.write_str(msg);
    if !msg.ends_with('\n') {
        term.newline();
    }
}
