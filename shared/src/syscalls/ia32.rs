//! ia32 (32-bit compat) to x86_64 syscall translation
//!
//! Mirrors the table the kernel program receives through `IA32_TO_64`. ids
//! absent here are dropped by the resolver. `socketcall` (102) is handled by
//! demultiplexing and never translated.

use super::x86_64 as x64;

/// The ia32 `socketcall` number.
pub const SOCKETCALL: u32 = 102;

/// Size of the kernel-side translation array.
pub const IA32_TABLE_SIZE: u32 = 512;

/// `(ia32 id, canonical x86_64 id)` pairs sorted by ia32 id.
pub const IA32_TO_X86_64: &[(u32, u32)] = &[
    (1, x64::EXIT),
    (2, x64::FORK),
    (3, x64::READ),
    (4, x64::WRITE),
    (5, x64::OPEN),
    (6, x64::CLOSE),
    (8, x64::CREAT),
    (9, x64::LINK),
    (10, x64::UNLINK),
    (11, x64::EXECVE),
    (12, x64::CHDIR),
    (14, x64::MKNOD),
    (15, x64::CHMOD),
    (19, x64::LSEEK),
    (20, x64::GETPID),
    (21, x64::MOUNT),
    (26, x64::PTRACE),
    (33, x64::ACCESS),
    (37, x64::KILL),
    (38, x64::RENAME),
    (39, x64::MKDIR),
    (40, x64::RMDIR),
    (41, x64::DUP),
    (42, x64::PIPE),
    (45, x64::BRK),
    (52, x64::UMOUNT2),
    (54, x64::IOCTL),
    (55, x64::FCNTL),
    (57, x64::SETPGID),
    (60, x64::UMASK),
    (61, x64::CHROOT),
    (63, x64::DUP2),
    (64, x64::GETPPID),
    (66, x64::SETSID),
    (83, x64::SYMLINK),
    (85, x64::READLINK),
    (91, x64::MUNMAP),
    (92, x64::TRUNCATE),
    (93, x64::FTRUNCATE),
    (94, x64::FCHMOD),
    (114, x64::WAIT4),
    (118, x64::FSYNC),
    (120, x64::CLONE),
    (122, x64::UNAME),
    (125, x64::MPROTECT),
    (128, x64::INIT_MODULE),
    (129, x64::DELETE_MODULE),
    (133, x64::FCHDIR),
    (143, x64::FLOCK),
    (145, x64::READV),
    (146, x64::WRITEV),
    (147, x64::GETSID),
    (150, x64::MLOCK),
    (151, x64::MUNLOCK),
    (158, x64::SCHED_YIELD),
    (162, x64::NANOSLEEP),
    (168, x64::POLL),
    (172, x64::PRCTL),
    (180, x64::PREAD64),
    (181, x64::PWRITE64),
    (183, x64::GETCWD),
    (185, x64::CAPSET),
    (190, x64::VFORK),
    // mmap2 takes a page offset, the argument layout otherwise matches mmap
    (192, x64::MMAP),
    (199, x64::GETUID),
    (200, x64::GETGID),
    (203, x64::SETREUID),
    (204, x64::SETREGID),
    (208, x64::SETRESUID),
    (210, x64::SETRESGID),
    (213, x64::SETUID),
    (214, x64::SETGID),
    (217, x64::PIVOT_ROOT),
    (220, x64::GETDENTS64),
    (221, x64::FCNTL),
    (224, x64::GETTID),
    (238, x64::TKILL),
    (240, x64::FUTEX),
    (252, x64::EXIT_GROUP),
    (270, x64::TGKILL),
    (295, x64::OPENAT),
    (296, x64::MKDIRAT),
    (297, x64::MKNODAT),
    (301, x64::UNLINKAT),
    (302, x64::RENAMEAT),
    (303, x64::LINKAT),
    (304, x64::SYMLINKAT),
    (305, x64::READLINKAT),
    (306, x64::FCHMODAT),
    (307, x64::FACCESSAT),
    (310, x64::UNSHARE),
    (313, x64::SPLICE),
    (330, x64::DUP3),
    (331, x64::PIPE2),
    (337, x64::RECVMMSG),
    (340, x64::PRLIMIT64),
    (342, x64::OPEN_BY_HANDLE_AT),
    (345, x64::SENDMMSG),
    (346, x64::SETNS),
    (350, x64::FINIT_MODULE),
    (353, x64::RENAMEAT2),
    (354, x64::SECCOMP),
    (356, x64::MEMFD_CREATE),
    (357, x64::BPF),
    (358, x64::EXECVEAT),
    (359, x64::SOCKET),
    (360, x64::SOCKETPAIR),
    (361, x64::BIND),
    (362, x64::CONNECT),
    (363, x64::LISTEN),
    (364, x64::ACCEPT4),
    (365, x64::GETSOCKOPT),
    (366, x64::SETSOCKOPT),
    (367, x64::GETSOCKNAME),
    (368, x64::GETPEERNAME),
    (369, x64::SENDTO),
    (370, x64::SENDMSG),
    (371, x64::RECVFROM),
    (372, x64::RECVMSG),
    (373, x64::SHUTDOWN),
    (374, x64::USERFAULTFD),
    (377, x64::COPY_FILE_RANGE),
    (424, x64::PIDFD_SEND_SIGNAL),
    (425, x64::IO_URING_SETUP),
    (426, x64::IO_URING_ENTER),
    (427, x64::IO_URING_REGISTER),
    (428, x64::OPEN_TREE),
    (429, x64::MOVE_MOUNT),
    (430, x64::FSOPEN),
    (431, x64::FSCONFIG),
    (432, x64::FSMOUNT),
    (433, x64::FSPICK),
    (434, x64::PIDFD_OPEN),
    (435, x64::CLONE3),
    (436, x64::CLOSE_RANGE),
    (437, x64::OPENAT2),
    (438, x64::PIDFD_GETFD),
    (439, x64::FACCESSAT2),
];

/// Translate an ia32 syscall id using the built-in table.
pub fn ia32_to_x86_64(raw: u32) -> Option<u32> {
    IA32_TO_X86_64
        .binary_search_by_key(&raw, |&(ia32, _)| ia32)
        .ok()
        .map(|idx| IA32_TO_X86_64[idx].1)
}
