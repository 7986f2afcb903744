//! Slate entrypoint: boot, then the interactive loop.

mod boot;
mod frontend;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use core_shell::{PowerState, Session};
use core_term::NullDisplay;

use boot::BootReporter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "slate", version, about = "Slate terminal environment")]
struct Args {
    /// Append structured logs to this file instead of stderr.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
    /// Run a scripted smoke pass and print the resulting screen, without
    /// taking over the host terminal.
    #[arg(long)]
    smoke: bool,
}

fn configure_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &args.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path.file_name().map(PathBuf::from).unwrap_or_else(|| "slate.log".into());
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Cold boot: peripherals, VFS, process set, first terminal, auth.
fn boot_system(quiet: bool) -> Result<Session> {
    let reporter = BootReporter::new(quiet);

    reporter.step("Low-level bring-up", || Ok(()))?;
    let vfs = boot::bring_up_vfs(&reporter)?;

    let mut session = reporter.step("Init terminal system", || {
        let session = Session::new(vfs, Box::new(NullDisplay::default()));
        Ok(session)
    })?;

    reporter.step("Init process system", || {
        boot::start_boot_processes(&mut session.procs)
    })?;

    reporter.step("Start shell", || {
        session
            .open_terminal()
            .ok_or_else(|| anyhow::anyhow!("no terminal"))?;
        session.begin_auth();
        Ok(())
    })?;

    info!(target: "boot", "boot complete");
    Ok(session)
}

/// Interactive loop: translate host keys, pump the ring, tick the
/// scheduler, repaint.
fn run_interactive(mut session: Session) -> Result<PowerState> {
    let mut host = frontend::HostTerminal::enter()?;
    frontend::draw(&session)?;

    loop {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if let Some(evt) = frontend::map_key(key) {
                    session.push_key(evt);
                }
            }
        }
        session.pump();
        session.scheduler_tick();
        frontend::draw(&session)?;

        if session.power != PowerState::Running {
            break;
        }
        if session.wm.window_count() == 0 {
            // last terminal closed: power down like the hardware would
            session.power = PowerState::Shutdown;
            break;
        }
    }

    host.leave()?;
    Ok(session.power)
}

/// Scripted pass used by CI and quick sanity checks: a few commands, then
/// the visible screen on stdout.
fn run_smoke(mut session: Session) -> Result<PowerState> {
    let tid = session.wm.active_id();
    for cmd in [
        "echo hello from slate",
        "ls /",
        "mkdir /tmp/demo",
        "touch /tmp/demo/file.txt",
        "ls /tmp/demo",
        "echo smoke ok | cat > /tmp/result",
        "cat /tmp/result",
    ] {
        session.execute_command_line(tid, cmd);
        session.scheduler_tick();
    }
    if let Some(term) = session.wm.active_terminal() {
        for row in term.screen_text() {
            println!("{row}");
        }
    }
    Ok(PowerState::Shutdown)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args)?;

    loop {
        let session = boot_system(args.smoke)?;
        let power = if args.smoke {
            run_smoke(session)?
        } else {
            run_interactive(session)?
        };
        match power {
            // reboot loops straight back into the boot sequence
            PowerState::Reboot => {
                info!(target: "boot", "rebooting");
                continue;
            }
            _ => break,
        }
    }
    Ok(())
}
