use super::{DropReason, ExitTables, Flow, SyscallRegs};
use crate::abi::ArchProfile;
use crate::syscalls::socketcall::demux_socketcall;

/// Normalize the raw syscall id of `regs` into the canonical id space.
///
/// Compat ids go through the translation table (except the exec ids that keep
/// 64-bit numbering mid-exec), and socketcall is demultiplexed into the
/// network syscall selected by its first argument.
pub fn resolve_syscall_id<R, T>(regs: &R, tables: &T, profile: &ArchProfile) -> Flow<u32>
where
    R: SyscallRegs,
    T: ExitTables,
{
    let raw = regs.raw_syscall_id();
    let compat = regs.in_compat_syscall();
    let socketcall = profile.socketcall(compat);

    if compat && !profile.compat_supported {
        return Err(DropReason::UnsupportedCompat { raw });
    }

    // Matched on the untranslated id: a translated compat id may collide
    // with the socketcall number (ia32 getuid32 becomes 102).
    if Some(raw) == socketcall {
        let selector = regs.arg(0);
        return demux_socketcall(selector).ok_or(DropReason::UnknownSocketcall { selector });
    }

    if !compat || profile.is_exec_passthrough(raw) {
        return Ok(raw);
    }
    tables
        .compat_to_canonical(raw)
        .ok_or(DropReason::UnsupportedCompat { raw })
}
