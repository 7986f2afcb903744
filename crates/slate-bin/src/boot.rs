//! Boot sequence: named steps with `[ OK ]`/`[FAIL]` reporting, canonical
//! filesystem layout seeding, and the boot-time process set.
//!
//! A failed critical step halts boot before any shell starts; layout repair
//! recreates whatever entries have gone missing on an already-used card.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use core_bus::{BusArbiter, LoopbackPort};
use core_proc::{BootProcessSet, ProcessPriority, ProcessTable};
use core_vfs::{MemoryFs, NodeType, RamCard, SdBackend, SdCard, Vfs, VfsError};

const DIRS: &[&str] = &[
    "/bin",
    "/dev",
    "/dev/input",
    "/dev/pipe",
    "/etc",
    "/home",
    "/home/user",
    "/home/user/documents",
    "/proc",
    "/proc/tasks",
    "/run",
    "/run/pipes",
    "/run/tasks",
    "/run/events",
    "/tmp",
    "/usr",
    "/usr/bin",
    "/usr/bin/games",
    "/usr/bin/demos",
    "/usr/share",
    "/usr/share/help",
    "/usr/share/fonts",
    "/usr/share/banners",
    "/var",
    "/var/log",
];

const FILES: &[&str] = &[
    "/bin/sh",
    "/bin/ls",
    "/bin/cat",
    "/bin/echo",
    "/bin/ps",
    "/bin/kill",
    "/bin/clear",
    "/bin/help",
    "/bin/reboot",
    "/bin/nano",
    "/bin/top",
    "/bin/uptime",
    "/bin/meminfo",
    "/bin/logread",
    "/dev/tty",
    "/dev/tty0",
    "/dev/null",
    "/dev/input/keyboard",
    "/etc/passwd",
    "/etc/shells",
    "/etc/system.conf",
    "/etc/tty.conf",
    "/etc/keymap.conf",
    "/etc/motd",
    "/home/user/.profile",
    "/home/user/.history",
    "/home/user/.editorrc",
    "/proc/uptime",
    "/proc/meminfo",
    "/proc/version",
    "/proc/sched",
    "/run/tty.lock",
    "/run/scheduler.lock",
    "/run/pipes/3",
    "/run/pipes/4",
    "/run/tasks/1",
    "/run/tasks/2",
    "/run/events/queue",
    "/tmp/.keep",
    "/var/log/kernel.log",
    "/var/log/scheduler.log",
    "/var/log/terminal.log",
    "/var/log/input.log",
    "/var/log/boot.log",
];

/// Prints each step's outcome in the boot-banner format.
pub struct BootReporter {
    quiet: bool,
}

impl BootReporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn step<T>(&self, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let result = f();
        let status = if result.is_ok() { "[ OK ]" } else { "[FAIL]" };
        if !self.quiet {
            println!("{name:<34}{status}");
        }
        match &result {
            Ok(_) => tracing::info!(target: "boot", step = name, "ok"),
            Err(e) => tracing::error!(target: "boot", step = name, error = %e, "failed"),
        }
        result
    }
}

/// Bring up the VFS: a memory-backed root plus, when a card answers, the
/// SD backend mounted at `/sd`.
pub fn bring_up_vfs(reporter: &BootReporter) -> Result<Vfs> {
    let mut vfs = reporter.step("Mount root filesystem", || {
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(MemoryFs::new()))
            .map_err(|e| anyhow!("mount root: {e}"))?;
        Ok(vfs)
    })?;

    reporter.step("Check filesystem layout", || {
        ensure_layout(&mut vfs).map_err(|e| anyhow!("layout: {e}"))
    })?;

    // the SD card is optional; a missing card is reported, not fatal
    let _ = reporter.step("Probe SD card", || {
        let port = LoopbackPort::with_card();
        let bus = Rc::new(RefCell::new(
            BusArbiter::new(Box::new(port)).map_err(|e| anyhow!("bus: {e}"))?,
        ));
        let backend = SdBackend::new(bus, seeded_card());
        if !backend.available() {
            return Err(anyhow!("no card present"));
        }
        let root = vfs.resolve("/").ok_or_else(|| anyhow!("no root"))?;
        let created = vfs.dir_create_node(root, "sd", NodeType::Directory);
        vfs.release(root);
        if let Ok(node) = created {
            vfs.release(node);
        }
        vfs.mount("/sd", Box::new(backend))
            .map_err(|e| anyhow!("mount /sd: {e}"))
    });

    Ok(vfs)
}

fn seeded_card() -> RamCard {
    let mut card = RamCard::new();
    card.mkdir("/images");
    card.create_file("/images/boot.raw");
    card.mkdir("/scripts");
    card
}

/// Create the canonical layout when missing; repair holes on later boots.
pub fn ensure_layout(vfs: &mut Vfs) -> Result<(), VfsError> {
    for dir in DIRS {
        ensure_entry(vfs, dir, NodeType::Directory)?;
    }
    for file in FILES {
        ensure_entry(vfs, file, NodeType::File)?;
    }
    tracing::info!(target: "boot", "filesystem layout verified");
    Ok(())
}

fn ensure_entry(vfs: &mut Vfs, path: &str, node_type: NodeType) -> Result<(), VfsError> {
    if let Some(node) = vfs.resolve(path) {
        vfs.release(node);
        return Ok(());
    }
    let (parent, name) = vfs.resolve_parent(None, path)?;
    let created = vfs.dir_create_node(parent, &name, node_type);
    vfs.release(parent);
    let node = created?;
    vfs.release(node);
    Ok(())
}

/// Register and start the boot process set.
pub fn start_boot_processes(table: &mut ProcessTable) -> Result<()> {
    let mut set = BootProcessSet::new();
    set.register("system_idle", Box::new(|| {}), ProcessPriority::Low, &[]);
    set.register(
        "event_pump",
        Box::new(|| {}),
        ProcessPriority::Normal,
        &["system_idle"],
    );
    let report = set.start_all(table);
    for name in &report.failed {
        tracing::warn!(target: "boot", process = %name, "failed to start");
    }
    // unstartable processes are reported but never halt the boot
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_vfs::OpenFlags;

    #[test]
    fn layout_created_and_repaired() {
        let mut vfs = Vfs::new();
        vfs.mount("/", Box::new(MemoryFs::new())).unwrap();
        ensure_layout(&mut vfs).unwrap();
        for path in ["/etc/passwd", "/home/user/.profile", "/var/log/boot.log"] {
            let node = vfs.resolve(path).unwrap_or_else(|| panic!("{path} missing"));
            vfs.release(node);
        }
        // damage the tree, then repair
        let etc = vfs.resolve("/etc").unwrap();
        vfs.dir_remove_node(etc, "motd").unwrap();
        vfs.release(etc);
        assert!(vfs.resolve("/etc/motd").is_none());
        ensure_layout(&mut vfs).unwrap();
        let motd = vfs.resolve("/etc/motd").expect("repaired");
        vfs.release(motd);
        assert_eq!(vfs.live_nodes(), 0);
    }

    #[test]
    fn boot_leaves_no_dangling_references() {
        let reporter = BootReporter::new(true);
        let mut vfs = bring_up_vfs(&reporter).unwrap();
        assert_eq!(vfs.live_nodes(), 0);
        // seeded files are usable
        let f = vfs.open_at(None, "/etc/passwd", OpenFlags::READ).unwrap();
        vfs.close(f).unwrap();
    }

    #[test]
    fn sd_mount_is_browsable() {
        let reporter = BootReporter::new(true);
        let mut vfs = bring_up_vfs(&reporter).unwrap();
        let dir = vfs.resolve("/sd/images").expect("sd mounted");
        let it = vfs.dir_iter_create(dir).unwrap();
        let mut names = Vec::new();
        while let Some(n) = vfs.dir_iter_next(it).unwrap() {
            names.push(n);
        }
        vfs.dir_iter_destroy(it);
        vfs.release(dir);
        assert_eq!(names, vec!["boot.raw"]);
    }
}
