//! Syscall exit events as seen by userspace
//!
//! A [`SyscallEvent`] is created at syscall exit, runs through the exit
//! pipeline once, and, if dispatched, reaches the suppression engine.

use serde::{Deserialize, Serialize};

use crate::pipeline::SyscallRegs;

/// Timestamp in nanoseconds since boot
pub type Timestamp = u64;

/// Process ID
pub type Pid = i32;

/// Thread ID
pub type Tid = i32;

/// Delivery channel (per-CPU buffer) an event arrived through
pub type DevId = u16;

/// Number of syscall argument registers
pub const SYSCALL_ARGS: usize = 6;

/// Register state captured at syscall exit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    /// Raw syscall id in the numbering of the execution mode
    pub syscall_id: u32,

    /// Argument registers, already ordered by the mode's calling convention
    #[serde(default)]
    pub args: [u64; SYSCALL_ARGS],

    /// 32-bit task on a 64-bit kernel
    #[serde(default)]
    pub compat: bool,
}

impl SyscallRegs for RegisterSnapshot {
    fn raw_syscall_id(&self) -> u32 {
        self.syscall_id
    }

    fn arg(&self, index: usize) -> u64 {
        self.args.get(index).copied().unwrap_or_default()
    }

    fn in_compat_syscall(&self) -> bool {
        self.compat
    }
}

/// Syscall exit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallEvent {
    pub timestamp: Timestamp,
    pub pid: Pid,
    pub tid: Tid,
    pub regs: RegisterSnapshot,

    /// Canonical id, filled in once the resolver ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syscall_id: Option<u32>,

    pub return_value: i64,

    #[serde(default)]
    pub devid: DevId,

    /// Command name, populated by the capture engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm: Option<String>,
}

impl SyscallEvent {
    /// Canonical id if resolved, raw id otherwise
    pub fn id(&self) -> u32 {
        self.syscall_id.unwrap_or(self.regs.syscall_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syscall_event_json_defaults() {
        let json = r#"{
            "timestamp": 1000,
            "pid": 42,
            "tid": 43,
            "regs": { "syscall_id": 257, "args": [0, 4096, 0, 0, 0, 0] },
            "return_value": 3
        }"#;

        let event: SyscallEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.regs.syscall_id, 257);
        assert!(!event.regs.compat);
        assert_eq!(event.regs.arg(1), 4096);
        assert_eq!(event.devid, 0);
        assert_eq!(event.comm, None);
        assert_eq!(event.id(), 257);
    }

    #[test]
    fn test_out_of_range_arg_is_zero() {
        let regs = RegisterSnapshot {
            syscall_id: 0,
            args: [1, 2, 3, 4, 5, 6],
            compat: false,
        };
        assert_eq!(regs.arg(5), 6);
        assert_eq!(regs.arg(6), 0);
    }
}
