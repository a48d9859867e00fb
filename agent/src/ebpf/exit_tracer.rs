//! Syscall exit eBPF program management
//!
//! Handles the lifecycle of the kernel-side exit pipeline: map sync, the
//! tail-call dispatch table, and attachment.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use aya::maps::{perf::AsyncPerfEventArray, MapData, ProgramArray};
use aya::{Btf, Ebpf};
use syscap_shared::maps::{EMIT_PROGRAM, SYSCALL_EXIT_EVENTS, SYSCALL_EXIT_TAIL_TABLE};
use tracing::{debug, info, warn};

use super::loader;
use super::maps::KernelMaps;
use crate::snapshot::ConfigSnapshot;

/// Syscall exit tracer manager
pub struct ExitTracer {
    bpf: Ebpf,
    btf: Btf,
    tail_table: ProgramArray<MapData>,
    handlers: BTreeSet<u32>,
    attached: bool,
    _logger: Option<aya_log::EbpfLogger>,
}

impl ExitTracer {
    /// Load the object and the tail-call targets; nothing is attached yet.
    pub fn new(object: Option<&Path>) -> Result<Self> {
        info!("Initializing syscall exit tracer");

        let mut bpf = loader::load_exit_object(object).context("Failed to load exit eBPF")?;
        let logger = loader::init_kernel_logger(&mut bpf);
        let btf = loader::kernel_btf()?;

        loader::load_btf_program(&mut bpf, &btf, EMIT_PROGRAM)?;

        let tail_table = ProgramArray::try_from(
            bpf.take_map(SYSCALL_EXIT_TAIL_TABLE)
                .context("Failed to get SYSCALL_EXIT_TAIL_TABLE map")?,
        )?;

        Ok(Self {
            bpf,
            btf,
            tail_table,
            handlers: BTreeSet::new(),
            attached: false,
            _logger: logger,
        })
    }

    /// Push a snapshot into the kernel maps and align the tail-call table
    /// with its interest set.
    pub fn apply(&mut self, snapshot: &ConfigSnapshot) -> Result<()> {
        KernelMaps::sync(&mut self.bpf, snapshot)?;

        let wanted: BTreeSet<u32> = snapshot
            .interesting_ids()
            .filter(|&id| id < snapshot.dispatch_range())
            .collect();

        for &id in self.handlers.difference(&wanted) {
            self.tail_table
                .clear_index(&id)
                .with_context(|| format!("Failed to clear handler {}", id))?;
        }

        let fd = loader::program_fd(&self.bpf, EMIT_PROGRAM)?;
        for &id in wanted.difference(&self.handlers) {
            self.tail_table
                .set(id, fd, 0)
                .with_context(|| format!("Failed to register handler {}", id))?;
        }

        debug!("{} tail-call handlers registered", wanted.len());
        self.handlers = wanted;
        Ok(())
    }

    /// Attach the exit program
    pub fn start(&mut self) -> Result<()> {
        info!("Starting syscall exit tracing");

        if self.attached {
            warn!("Syscall exit tracer already started");
            return Ok(());
        }
        loader::attach_exit_program(&mut self.bpf, &self.btf)
            .context("Failed to attach syscall exit tracer")?;
        self.attached = true;
        Ok(())
    }

    /// Per-CPU buffers the emit program writes admitted events to.
    pub fn take_events(&mut self) -> Result<AsyncPerfEventArray<MapData>> {
        let map = self
            .bpf
            .take_map(SYSCALL_EXIT_EVENTS)
            .context("Failed to get SYSCALL_EXIT_EVENTS map")?;
        Ok(AsyncPerfEventArray::try_from(map)?)
    }

    pub fn handlers(&self) -> impl Iterator<Item = u32> + '_ {
        self.handlers.iter().copied()
    }
}

impl Drop for ExitTracer {
    fn drop(&mut self) {
        if self.attached {
            // links are owned by `bpf` and detach when it drops
            info!("Syscall exit tracing stopped");
        }
    }
}
