//! End-to-end shell scenarios: keystrokes in, screen contents and
//! filesystem state out.

use core_events::{KeyCode, KeyEvent, Modifiers};
use core_shell::Session;
use core_term::NullDisplay;
use core_vfs::{MemoryFs, OpenFlags, Vfs};

fn base_fs() -> MemoryFs {
    let mut fs = MemoryFs::new();
    fs.put_dir("/etc").unwrap();
    fs.put_dir("/tmp").unwrap();
    fs.put_dir("/home/user").unwrap();
    fs
}

fn session_with(fs: MemoryFs) -> Session {
    let mut vfs = Vfs::new();
    vfs.mount("/", Box::new(fs)).unwrap();
    let mut session = Session::new(vfs, Box::new(NullDisplay::default()));
    session.open_terminal().expect("first terminal");
    session
}

fn type_line(session: &mut Session, line: &str) {
    for c in line.chars() {
        let mut shift = Modifiers::empty();
        let name = if c.is_ascii_uppercase() {
            shift = Modifiers::SHIFT;
            c.to_ascii_lowercase().to_string()
        } else {
            c.to_string()
        };
        let code = KeyCode::from_name(&name).unwrap_or_else(|| panic!("no key for {c:?}"));
        session.process_key(KeyEvent::with_mods(code, shift));
    }
    session.process_key(KeyEvent::new(KeyCode::Enter));
}

fn screen(session: &Session) -> Vec<String> {
    session.wm.active_terminal().unwrap().screen_text()
}

fn read_file(vfs: &mut Vfs, path: &str) -> Option<Vec<u8>> {
    let file = vfs.open_at(None, path, OpenFlags::READ).ok()?;
    let mut out = Vec::new();
    let mut buf = [0u8; 64];
    loop {
        match vfs.read(file, &mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => return None,
        }
    }
    vfs.close(file).ok()?;
    Some(out)
}

// Scenario: `echo hello` typed key by key renders command echo, output,
// and a fresh prompt.
#[test]
fn shell_dispatch_echo() {
    let mut session = session_with(base_fs());
    type_line(&mut session, "echo hello");
    let rows = screen(&session);
    assert_eq!(rows[0], "Slate Terminal v0.1");
    assert_eq!(rows[1], "$ echo hello");
    assert_eq!(rows[2], "hello");
    assert_eq!(rows[3], "$");
}

// Scenario: pipeline hand-off; the right stage sees the left stage's
// complete output and pipe_input is cleared afterwards.
#[test]
fn pipeline_cat_grep() {
    let mut fs = base_fs();
    fs.put_file("/etc/passwd", b"alice:abcdef12\n").unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();

    let code = session.execute_command_line(tid, "cat /etc/passwd | grep alice");
    assert_eq!(code, 0);
    let term = session.wm.terminal(tid);
    assert!(term.pipe_input.is_none(), "pipe input cleared");
    let rows = screen(&session);
    assert!(
        rows.iter().any(|r| r == "alice:abcdef12"),
        "match printed: {rows:?}"
    );
}

// Scenario: redirection through a pipeline writes the file and keeps the
// terminal quiet.
#[test]
fn pipeline_redirection_writes_file() {
    let mut session = session_with(base_fs());
    let tid = session.wm.active_id();

    let code = session.execute_command_line(tid, "echo hi | cat > /tmp/x");
    assert_eq!(code, 0);
    assert_eq!(
        read_file(&mut session.vfs, "/tmp/x").as_deref(),
        Some(&b"hi\n"[..])
    );
    let rows = screen(&session);
    assert!(
        !rows.iter().any(|r| r.contains("hi")),
        "output went to the file, not the screen: {rows:?}"
    );
}

// Scenario: script with a while loop and break. The condition runs exactly
// once and nothing after the break executes.
#[test]
fn script_loop_and_break() {
    let mut fs = base_fs();
    fs.put_file(
        "/s.sh",
        b"echo start\nwhile echo loop\ndo\n  echo body\n  break\n  echo after\ndone\necho end\n",
    )
    .unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();

    session.wm.terminal_mut(tid).capture_start();
    let code = session.execute_command_line(tid, "run /s.sh");
    let out = session.wm.terminal_mut(tid).capture_stop();
    assert_eq!(code, 0);
    assert_eq!(String::from_utf8_lossy(&out), "start\nloop\nbody\nend\n");
}

// Scenario: ls output is space separated on screen, newline separated when
// captured for a downstream consumer.
#[test]
fn ls_formats_by_capture_state() {
    let mut fs = base_fs();
    fs.put_file("/data/a", b"").unwrap();
    fs.put_file("/data/b", b"").unwrap();
    fs.put_file("/data/c", b"").unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();

    session.execute_command_line(tid, "ls /data");
    let rows = screen(&session);
    assert!(rows.iter().any(|r| r == "a b c"), "{rows:?}");

    session.wm.terminal_mut(tid).capture_start();
    session.execute_command_line(tid, "ls /data");
    let captured = session.wm.terminal_mut(tid).capture_stop();
    assert_eq!(String::from_utf8_lossy(&captured), "a\nb\nc\n");
}

// Scenario: first boot. Empty passwd file, stock home directory; typing
// username and password twice configures the account and lands at a
// prompt.
#[test]
fn first_boot_flow() {
    let mut fs = base_fs();
    fs.put_file("/etc/passwd", b"").unwrap();
    let mut session = session_with(fs);
    session.begin_auth();
    assert!(session.modes.firstboot.is_active());

    type_line(&mut session, "alice");
    type_line(&mut session, "pass");
    type_line(&mut session, "pass");

    assert!(!session.modes.firstboot.is_active());
    let passwd = read_file(&mut session.vfs, "/etc/passwd").unwrap();
    let expected = format!("alice:{:08x}\n", core_modes::auth::fnv1a(b"pass"));
    assert_eq!(String::from_utf8_lossy(&passwd), expected);
    let home = session.vfs.resolve("/home/alice").expect("home renamed");
    session.vfs.release(home);
    let rows = screen(&session);
    assert!(rows.iter().any(|r| r.starts_with('$')), "prompt active: {rows:?}");
}

// Hotkeys fire before the terminal ever sees the event.
#[test]
fn hotkey_opens_terminal_and_swallows_event() {
    let mut session = session_with(base_fs());
    assert_eq!(session.wm.window_count(), 1);
    session.process_key(KeyEvent::with_mods(KeyCode::A, Modifiers::SHIFT));
    assert_eq!(session.wm.window_count(), 2);
    // the new terminal's input line never saw the 'A'
    assert_eq!(session.wm.active_terminal().unwrap().input_line, "");

    session.process_key(KeyEvent::with_mods(KeyCode::D, Modifiers::SHIFT));
    assert_eq!(session.wm.window_count(), 1);
}

// The keyboard ring drains in order through the dispatch chain.
#[test]
fn event_queue_pump_preserves_order() {
    let mut session = session_with(base_fs());
    for code in [KeyCode::L, KeyCode::S] {
        session.push_key(KeyEvent::new(code));
    }
    session.pump();
    assert_eq!(session.wm.active_terminal().unwrap().input_line, "ls");
}

// echo argv identity: `-n` drops the trailing newline, `-e` interprets
// C-style escapes, `\c` stops output cold.
#[test]
fn echo_flag_semantics() {
    let mut session = session_with(base_fs());
    let tid = session.wm.active_id();

    session.wm.terminal_mut(tid).capture_start();
    session.execute_command_line(tid, "echo -n A B C");
    let out = session.wm.terminal_mut(tid).capture_stop();
    assert_eq!(String::from_utf8_lossy(&out), "A B C");

    // single quotes carry the backslash through the tokenizer to echo
    session.wm.terminal_mut(tid).capture_start();
    session.execute_command_line(tid, r"echo -e 'a\tb'");
    let out = session.wm.terminal_mut(tid).capture_stop();
    assert_eq!(String::from_utf8_lossy(&out), "a\tb\n");

    session.wm.terminal_mut(tid).capture_start();
    session.execute_command_line(tid, r"echo -e 'before\cafter'");
    let out = session.wm.terminal_mut(tid).capture_stop();
    assert_eq!(String::from_utf8_lossy(&out), "before");
}

// Unknown commands report and return the generic error.
#[test]
fn unknown_command_reports() {
    let mut session = session_with(base_fs());
    let tid = session.wm.active_id();
    let code = session.execute_command_line(tid, "frobnicate");
    assert_eq!(code, 1);
    let rows = screen(&session);
    assert!(rows.iter().any(|r| r == "command not found: frobnicate"));
    assert!(rows.iter().any(|r| r == "Command failed with code 1"));
}

// Refcount balance: after a command completes, only the cwd pins remain.
#[test]
fn commands_leave_refcounts_balanced() {
    let mut fs = base_fs();
    fs.put_file("/etc/passwd", b"alice:abcdef12\n").unwrap();
    fs.put_dir("/home/alice").unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();
    let baseline = session.vfs.live_nodes();

    for cmd in [
        "ls /etc",
        "cat /etc/passwd",
        "mkdir /tmp/newdir",
        "rmdir /tmp/newdir",
        "touch /tmp/f.txt",
        "rm /tmp/f.txt",
        "echo done",
        "cat /etc/passwd | wc -l",
    ] {
        session.execute_command_line(tid, cmd);
        assert_eq!(
            session.vfs.live_nodes(),
            baseline,
            "node leak after {cmd:?}"
        );
    }
}

// cd moves the working directory reference; pwd prints the canonical path.
#[test]
fn cd_and_pwd_round_trip() {
    let mut session = session_with(base_fs());
    let tid = session.wm.active_id();
    session.execute_command_line(tid, "cd /home/user");
    session.execute_command_line(tid, "pwd");
    assert!(screen(&session).iter().any(|r| r == "/home/user"));
    session.execute_command_line(tid, "cd ..");
    session.execute_command_line(tid, "pwd");
    assert!(screen(&session).iter().any(|r| r == "/home"));
    let code = session.execute_command_line(tid, "cd /etc/passwd/nope");
    assert_eq!(code, 2);
}

// rm / is refused with the argument-error code.
#[test]
fn rm_root_is_refused() {
    let mut session = session_with(base_fs());
    let tid = session.wm.active_id();
    let code = session.execute_command_line(tid, "rm /");
    assert_eq!(code, 3);
}

// mkdir rejects directory names carrying an extension.
#[test]
fn mkdir_rejects_dotted_names() {
    let mut session = session_with(base_fs());
    let tid = session.wm.active_id();
    assert_eq!(session.execute_command_line(tid, "mkdir /tmp/notes.txt"), 3);
    assert_eq!(session.execute_command_line(tid, "mkdir /tmp/notes"), 0);
}

// Scripts: variables, for loops, if/else arms.
#[test]
fn script_variables_and_for() {
    let mut fs = base_fs();
    fs.put_file(
        "/v.sh",
        b"greeting=hello\nfor w in $greeting world\ndo\n  echo $w\ndone\nif echo check\nthen\n  echo yes\nelse\n  echo no\nfi\n",
    )
    .unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();
    session.wm.terminal_mut(tid).capture_start();
    session.execute_command_line(tid, "run /v.sh");
    let out = session.wm.terminal_mut(tid).capture_stop();
    assert_eq!(
        String::from_utf8_lossy(&out),
        "hello\nworld\ncheck\nyes\n"
    );
}

// nano launched from the shell takes over the keys; ^X leaves it.
#[test]
fn nano_intercepts_keys_until_exit() {
    let mut fs = base_fs();
    fs.put_file("/note.txt", b"").unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();
    session.execute_command_line(tid, "nano /note.txt");
    assert!(session.modes.nano.is_active());

    session.process_key(KeyEvent::new(KeyCode::H));
    session.process_key(KeyEvent::new(KeyCode::I));
    assert!(session.modes.nano.is_dirty());
    session.process_key(KeyEvent::with_mods(KeyCode::X, Modifiers::CTRL));
    session.process_key(KeyEvent::new(KeyCode::Y));
    session.process_key(KeyEvent::new(KeyCode::Enter));
    assert!(!session.modes.nano.is_active());
    assert_eq!(
        read_file(&mut session.vfs, "/note.txt").as_deref(),
        Some(&b"hi"[..])
    );
}

// Image view swallows keystrokes until Esc.
#[test]
fn image_view_swallows_keys() {
    let mut fs = base_fs();
    fs.put_file("/pic.raw", b"\x00\x00").unwrap();
    let mut session = session_with(fs);
    let tid = session.wm.active_id();
    session.execute_command_line(tid, "qimgv /pic.raw");
    assert!(session.wm.terminal(tid).image_view.is_some());

    session.process_key(KeyEvent::new(KeyCode::L));
    assert_eq!(session.wm.terminal(tid).input_line, "", "keys swallowed");
    session.process_key(KeyEvent::new(KeyCode::Esc));
    assert!(session.wm.terminal(tid).image_view.is_none());
}
