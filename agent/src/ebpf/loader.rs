//! eBPF object loader
//!
//! Loads the syscall exit object and attaches its programs to the kernel

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aya::{
    programs::{BtfTracePoint, ProgramFd},
    Btf, Ebpf, EbpfLoader,
};
use syscap_shared::maps::EXIT_PROGRAM;
use tracing::{debug, info, warn};

/// Environment variable naming the compiled eBPF object
pub const OBJECT_ENV: &str = "SYSCAP_EBPF_OBJECT";

/// Kernel function both programs are typed against
const TRACE_TARGET: &str = "sys_exit";

fn default_object_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("../agent-ebpf/target/bpfel-unknown-none/release/syscall-exit");
    path
}

/// Load the syscall exit object.
///
/// Resolution order: explicit path, `SYSCAP_EBPF_OBJECT`, the embedded
/// object (with the `embed-bpf` feature), then the agent-ebpf build output.
pub fn load_exit_object(object: Option<&Path>) -> Result<Ebpf> {
    info!("Loading syscall exit eBPF program");

    let path = object
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(OBJECT_ENV).map(PathBuf::from));

    #[cfg(feature = "embed-bpf")]
    if path.is_none() {
        let bpf_data = include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../agent-ebpf/target/bpfel-unknown-none/release/syscall-exit"
        ));
        let bpf = EbpfLoader::new()
            .allow_unsupported_maps()
            .load(bpf_data)
            .context("Failed to load embedded eBPF program")?;
        info!("Loaded embedded syscall exit eBPF program");
        return Ok(bpf);
    }

    let path = path.unwrap_or_else(default_object_path);
    info!("Loading eBPF from file: {:?}", path);
    if !path.exists() {
        anyhow::bail!("eBPF program file not found: {:?}", path);
    }

    let bpf = EbpfLoader::new()
        .allow_unsupported_maps()
        .load_file(&path)
        .context("Failed to load eBPF program from file")?;
    info!("Successfully loaded syscall exit eBPF program");
    Ok(bpf)
}

/// Forward `aya-log` output from the kernel programs into `tracing`.
pub fn init_kernel_logger(bpf: &mut Ebpf) -> Option<aya_log::EbpfLogger> {
    match aya_log::EbpfLogger::init(bpf) {
        Ok(logger) => Some(logger),
        Err(e) => {
            // the object carries no log statements in some builds
            warn!("Failed to initialize eBPF logger: {}", e);
            None
        }
    }
}

/// Load a `tp_btf/sys_exit` program into the kernel without attaching it.
pub fn load_btf_program<'a>(bpf: &'a mut Ebpf, btf: &Btf, name: &str) -> Result<&'a mut BtfTracePoint> {
    let program: &mut BtfTracePoint = bpf
        .program_mut(name)
        .with_context(|| format!("Failed to find {} program", name))?
        .try_into()
        .with_context(|| format!("Program {} is not a BTF tracepoint", name))?;

    program
        .load(TRACE_TARGET, btf)
        .with_context(|| format!("Failed to load {} program", name))?;
    debug!("Loaded program {}", name);
    Ok(program)
}

/// Attach the exit program; the link lives as long as `bpf`.
pub fn attach_exit_program(bpf: &mut Ebpf, btf: &Btf) -> Result<()> {
    info!("Attaching {} to tp_btf/{}", EXIT_PROGRAM, TRACE_TARGET);

    debug!("Available programs:");
    for (name, program) in bpf.programs() {
        debug!("  - {} (type: {:?})", name, program.prog_type());
    }

    let program = load_btf_program(bpf, btf, EXIT_PROGRAM)?;
    program.attach().context("Failed to attach sys_exit program")?;

    info!("Syscall exit program attached");
    Ok(())
}

/// File descriptor of an already loaded BTF tracepoint program.
pub fn program_fd<'a>(bpf: &'a Ebpf, name: &str) -> Result<&'a ProgramFd> {
    let program: &BtfTracePoint = bpf
        .program(name)
        .with_context(|| format!("Failed to find {} program", name))?
        .try_into()
        .with_context(|| format!("Program {} is not a BTF tracepoint", name))?;
    Ok(program.fd()?)
}

/// Kernel BTF, needed to load `tp_btf` programs.
pub fn kernel_btf() -> Result<Btf> {
    Btf::from_sys_fs().context("Failed to read kernel BTF from /sys/kernel/btf/vmlinux")
}
