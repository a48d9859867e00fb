//! `socketcall(2)` demultiplexing
//!
//! 32-bit x86 (and a few other ABIs) reach every socket operation through a
//! single umbrella syscall whose first argument selects the operation. The
//! selector values come from `include/uapi/linux/net.h`.

use super::x86_64;

pub const SYS_SOCKET: u64 = 1;
pub const SYS_BIND: u64 = 2;
pub const SYS_CONNECT: u64 = 3;
pub const SYS_LISTEN: u64 = 4;
pub const SYS_ACCEPT: u64 = 5;
pub const SYS_GETSOCKNAME: u64 = 6;
pub const SYS_GETPEERNAME: u64 = 7;
pub const SYS_SOCKETPAIR: u64 = 8;
pub const SYS_SEND: u64 = 9;
pub const SYS_RECV: u64 = 10;
pub const SYS_SENDTO: u64 = 11;
pub const SYS_RECVFROM: u64 = 12;
pub const SYS_SHUTDOWN: u64 = 13;
pub const SYS_SETSOCKOPT: u64 = 14;
pub const SYS_GETSOCKOPT: u64 = 15;
pub const SYS_SENDMSG: u64 = 16;
pub const SYS_RECVMSG: u64 = 17;
pub const SYS_ACCEPT4: u64 = 18;
pub const SYS_RECVMMSG: u64 = 19;
pub const SYS_SENDMMSG: u64 = 20;

/// Map a socketcall selector to the canonical network syscall it stands for.
///
/// x86_64 has no `send`/`recv`, so those collapse onto `sendto`/`recvfrom`
/// whose argument layout is a superset.
pub fn demux_socketcall(selector: u64) -> Option<u32> {
    let id = match selector {
        SYS_SOCKET => x86_64::SOCKET,
        SYS_BIND => x86_64::BIND,
        SYS_CONNECT => x86_64::CONNECT,
        SYS_LISTEN => x86_64::LISTEN,
        SYS_ACCEPT => x86_64::ACCEPT,
        SYS_GETSOCKNAME => x86_64::GETSOCKNAME,
        SYS_GETPEERNAME => x86_64::GETPEERNAME,
        SYS_SOCKETPAIR => x86_64::SOCKETPAIR,
        SYS_SEND | SYS_SENDTO => x86_64::SENDTO,
        SYS_RECV | SYS_RECVFROM => x86_64::RECVFROM,
        SYS_SHUTDOWN => x86_64::SHUTDOWN,
        SYS_SETSOCKOPT => x86_64::SETSOCKOPT,
        SYS_GETSOCKOPT => x86_64::GETSOCKOPT,
        SYS_SENDMSG => x86_64::SENDMSG,
        SYS_RECVMSG => x86_64::RECVMSG,
        SYS_ACCEPT4 => x86_64::ACCEPT4,
        SYS_RECVMMSG => x86_64::RECVMMSG,
        SYS_SENDMMSG => x86_64::SENDMMSG,
        _ => return None,
    };
    Some(id)
}
