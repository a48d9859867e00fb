#![no_std]
#![no_main]

use aya_ebpf::{
    helpers::{bpf_get_current_comm, bpf_get_current_pid_tgid, bpf_ktime_get_ns},
    macros::{btf_tracepoint, map},
    maps::{Array, HashMap, PerCpuArray, PerfEventArray, ProgramArray},
    programs::BtfTracePointContext,
};
use aya_log_ebpf::debug;
use syscap_shared::{
    maps::{ExitRecord, KernelSettings, MAX_FILTERS},
    pipeline::{run_exit, Direction, DropReason, ExitTables, PrefixPass, Sampler, SyscallRegs},
    syscalls::{ia32::IA32_TABLE_SIZE, SYSCALL_TABLE_SIZE, UNSUPPORTED},
    FilterMapEntry, UserPath,
};

mod common;
use common::{ExitRegs, TaskMemory};

#[no_mangle]
#[link_section = "license"]
pub static LICENSE: [u8; 4] = *b"GPL\0";

/// INTERESTING_SYSCALLS[id] != 0 when `id` is instrumented
#[map]
static INTERESTING_SYSCALLS: Array<u8> = Array::with_max_entries(SYSCALL_TABLE_SIZE, 0);

/// SETTINGS[0] = drop-on-failure flag, prefix cap, architecture, task layout
#[map]
static SETTINGS: Array<KernelSettings> = Array::with_max_entries(1, 0);

#[map]
static SYSCALL_FILTERS: HashMap<u32, FilterMapEntry> = HashMap::with_max_entries(MAX_FILTERS, 0);

/// Raw ia32 id -> canonical id, `UNSUPPORTED` when missing
#[map]
static IA32_TO_64: Array<u32> = Array::with_max_entries(IA32_TABLE_SIZE, 0);

/// SAMPLED_OUT[id] != 0 while the sampler skips `id`
#[map]
static SAMPLED_OUT: Array<u8> = Array::with_max_entries(SYSCALL_TABLE_SIZE, 0);

/// Per-syscall handlers, indexed by canonical id
#[map]
static SYSCALL_EXIT_TAIL_TABLE: ProgramArray = ProgramArray::with_max_entries(SYSCALL_TABLE_SIZE, 0);

/// Admitted event, handed to the tail-called handler
#[map]
static EXIT_SCRATCH: PerCpuArray<ExitRecord> = PerCpuArray::with_max_entries(1, 0);

#[map]
static SYSCALL_EXIT_EVENTS: PerfEventArray<ExitRecord> = PerfEventArray::new(0);

struct MapTables {
    settings: &'static KernelSettings,
}

impl ExitTables for MapTables {
    #[inline(always)]
    fn is_interesting(&self, id: u32) -> bool {
        matches!(INTERESTING_SYSCALLS.get(id), Some(&flag) if flag != 0)
    }

    #[inline(always)]
    fn drop_failed(&self) -> bool {
        self.settings.drop_failed != 0
    }

    #[inline(always)]
    fn filter_for(&self, id: u32) -> Option<&FilterMapEntry> {
        unsafe { SYSCALL_FILTERS.get(&id) }
    }

    #[inline(always)]
    fn compat_to_canonical(&self, raw: u32) -> Option<u32> {
        match IA32_TO_64.get(raw) {
            Some(&id) if id != UNSUPPORTED => Some(id),
            _ => None,
        }
    }
}

struct MapSampler;

impl Sampler for MapSampler {
    #[inline(always)]
    fn sample_out(&self, id: u32, _direction: Direction) -> bool {
        matches!(SAMPLED_OUT.get(id), Some(&flag) if flag != 0)
    }
}

#[inline(always)]
fn path_str(path: &UserPath) -> &str {
    // only logged; the verifier does not care about UTF-8
    unsafe { core::str::from_utf8_unchecked(path.as_bytes()) }
}

#[btf_tracepoint(function = "sys_exit")]
pub fn sys_exit(ctx: BtfTracePointContext) -> i32 {
    match try_sys_exit(&ctx) {
        Ok(ret) => ret,
        Err(_) => 0,
    }
}

fn try_sys_exit(ctx: &BtfTracePointContext) -> Result<i32, i64> {
    let Some(settings) = SETTINGS.get(0) else {
        return Ok(0);
    };
    // zeroed until userspace syncs the first snapshot
    if !settings.is_configured() {
        return Ok(0);
    }
    let profile = settings.profile();

    let regs_ptr: *const u8 = unsafe { ctx.arg(0) };
    let ret: i64 = unsafe { ctx.arg(1) };
    let regs = ExitRegs::new(regs_ptr, settings.thread_status_offset);
    let tables = MapTables { settings };

    let admitted = match run_exit(&regs, ret, &tables, &MapSampler, &TaskMemory, &profile) {
        Ok(admitted) => admitted,
        Err(DropReason::PrefixMatch { path }) => {
            debug!(ctx, "filtering out {}", path_str(&path));
            return Ok(0);
        }
        Err(_) => return Ok(0),
    };
    if let PrefixPass::Sent(path) = &admitted.prefix {
        debug!(ctx, "sending {}", path_str(path));
    }

    let record = EXIT_SCRATCH.get_ptr_mut(0).ok_or(1i64)?;
    let record = unsafe { &mut *record };

    let pid_tgid = bpf_get_current_pid_tgid();
    record.timestamp = unsafe { bpf_ktime_get_ns() };
    record.pid = (pid_tgid >> 32) as u32;
    record.tid = pid_tgid as u32;
    record.raw_id = regs.raw_syscall_id();
    record.syscall_id = admitted.syscall_id;
    record.compat = regs.in_compat_syscall() as u32;
    record.return_value = ret;
    for (i, arg) in record.args.iter_mut().enumerate() {
        *arg = regs.arg(i);
    }
    record.comm = bpf_get_current_comm().unwrap_or([0u8; 16]);

    // Returns only when no handler is registered for the id
    let _ = unsafe { SYSCALL_EXIT_TAIL_TABLE.tail_call(ctx, admitted.syscall_id) };
    Ok(0)
}

/// Default handler: forward the admitted event to userspace.
#[btf_tracepoint(function = "sys_exit")]
pub fn sys_exit_emit(ctx: BtfTracePointContext) -> i32 {
    if let Some(record) = EXIT_SCRATCH.get(0) {
        SYSCALL_EXIT_EVENTS.output(&ctx, record, 0);
    }
    0
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
