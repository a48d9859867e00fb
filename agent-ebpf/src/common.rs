//! Common BPF helpers
//!
//! Register access at syscall exit and fault-tolerant user string reads.

use aya_ebpf::helpers::{bpf_probe_read_kernel, bpf_probe_read_user_str_bytes};
use syscap_shared::pipeline::{SyscallRegs, UserMemory};

// struct pt_regs byte offsets
#[cfg(bpf_target_arch = "x86_64")]
mod layout {
    pub const BP: usize = 32;
    pub const BX: usize = 40;
    pub const R10: usize = 56;
    pub const R9: usize = 64;
    pub const R8: usize = 72;
    pub const CX: usize = 88;
    pub const DX: usize = 96;
    pub const SI: usize = 104;
    pub const DI: usize = 112;
    pub const ORIG_AX: usize = 120;

    pub const NATIVE_ARGS: [usize; 6] = [DI, SI, DX, R10, R8, R9];
    pub const COMPAT_ARGS: [usize; 6] = [BX, CX, DX, SI, DI, BP];
}

#[cfg(bpf_target_arch = "aarch64")]
mod layout {
    // x0 holds the return value by now; orig_x0 keeps the first argument
    pub const ORIG_X0: usize = 272;
    pub const SYSCALLNO: usize = 280;

    pub const NATIVE_ARGS: [usize; 6] = [ORIG_X0, 8, 16, 24, 32, 40];
}

/// `struct pt_regs *` of the task leaving a syscall
pub struct ExitRegs {
    regs: *const u8,
    compat: bool,
}

impl ExitRegs {
    /// `status_offset` locates `thread_info.status` in the current task.
    pub fn new(regs: *const u8, status_offset: u32) -> Self {
        Self {
            regs,
            compat: in_ia32_syscall(status_offset),
        }
    }

    #[inline(always)]
    fn read(&self, offset: usize) -> u64 {
        unsafe { bpf_probe_read_kernel(self.regs.add(offset) as *const u64) }.unwrap_or(0)
    }
}

/// TS_COMPAT is set for every ia32 entry, `int 0x80` from 64-bit tasks too
#[cfg(bpf_target_arch = "x86_64")]
#[inline(always)]
fn in_ia32_syscall(status_offset: u32) -> bool {
    use aya_ebpf::helpers::bpf_get_current_task;
    use syscap_shared::maps::TS_COMPAT;

    let task = unsafe { bpf_get_current_task() } as *const u8;
    let status = unsafe { bpf_probe_read_kernel(task.add(status_offset as usize) as *const u32) }
        .unwrap_or(0);
    status & TS_COMPAT != 0
}

#[cfg(not(bpf_target_arch = "x86_64"))]
#[inline(always)]
fn in_ia32_syscall(_status_offset: u32) -> bool {
    false
}

impl SyscallRegs for ExitRegs {
    #[cfg(bpf_target_arch = "x86_64")]
    fn raw_syscall_id(&self) -> u32 {
        self.read(layout::ORIG_AX) as u32
    }

    #[cfg(bpf_target_arch = "aarch64")]
    fn raw_syscall_id(&self) -> u32 {
        self.read(layout::SYSCALLNO) as u32
    }

    #[cfg(bpf_target_arch = "x86_64")]
    fn arg(&self, index: usize) -> u64 {
        let offsets = if self.compat {
            &layout::COMPAT_ARGS
        } else {
            &layout::NATIVE_ARGS
        };
        match offsets.get(index) {
            Some(&offset) => {
                let value = self.read(offset);
                // compat registers are 32 bits wide
                if self.compat {
                    value & 0xffff_ffff
                } else {
                    value
                }
            }
            None => 0,
        }
    }

    #[cfg(bpf_target_arch = "aarch64")]
    fn arg(&self, index: usize) -> u64 {
        match layout::NATIVE_ARGS.get(index) {
            Some(&offset) => self.read(offset),
            None => 0,
        }
    }

    fn in_compat_syscall(&self) -> bool {
        self.compat
    }
}

/// Memory of the current task
pub struct TaskMemory;

impl UserMemory for TaskMemory {
    #[inline(always)]
    fn read_user_str(&self, addr: u64, buf: &mut [u8]) -> Option<usize> {
        // the helper NUL-terminates and reports the length without it
        unsafe { bpf_probe_read_user_str_bytes(addr as *const u8, buf) }
            .ok()
            .map(|s| s.len())
    }
}
