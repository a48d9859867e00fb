//! x86_64 syscall numbers (the canonical id space on x86_64 hosts)
//!
//! Only the syscalls the pipeline or its default configuration refer to are
//! listed; unknown ids are still valid, they just have no name.

macro_rules! syscall_table {
    ($($konst:ident = $nr:literal => $name:literal,)*) => {
        $(pub const $konst: u32 = $nr;)*

        /// `(id, name)` pairs sorted by id.
        pub const SYSCALLS: &[(u32, &str)] = &[$(($nr, $name),)*];
    };
}

syscall_table! {
    READ = 0 => "read",
    WRITE = 1 => "write",
    OPEN = 2 => "open",
    CLOSE = 3 => "close",
    STAT = 4 => "stat",
    FSTAT = 5 => "fstat",
    LSTAT = 6 => "lstat",
    POLL = 7 => "poll",
    LSEEK = 8 => "lseek",
    MMAP = 9 => "mmap",
    MPROTECT = 10 => "mprotect",
    MUNMAP = 11 => "munmap",
    BRK = 12 => "brk",
    IOCTL = 16 => "ioctl",
    PREAD64 = 17 => "pread64",
    PWRITE64 = 18 => "pwrite64",
    READV = 19 => "readv",
    WRITEV = 20 => "writev",
    ACCESS = 21 => "access",
    PIPE = 22 => "pipe",
    SCHED_YIELD = 24 => "sched_yield",
    DUP = 32 => "dup",
    DUP2 = 33 => "dup2",
    NANOSLEEP = 35 => "nanosleep",
    GETPID = 39 => "getpid",
    SENDFILE = 40 => "sendfile",
    SOCKET = 41 => "socket",
    CONNECT = 42 => "connect",
    ACCEPT = 43 => "accept",
    SENDTO = 44 => "sendto",
    RECVFROM = 45 => "recvfrom",
    SENDMSG = 46 => "sendmsg",
    RECVMSG = 47 => "recvmsg",
    SHUTDOWN = 48 => "shutdown",
    BIND = 49 => "bind",
    LISTEN = 50 => "listen",
    GETSOCKNAME = 51 => "getsockname",
    GETPEERNAME = 52 => "getpeername",
    SOCKETPAIR = 53 => "socketpair",
    SETSOCKOPT = 54 => "setsockopt",
    GETSOCKOPT = 55 => "getsockopt",
    CLONE = 56 => "clone",
    FORK = 57 => "fork",
    VFORK = 58 => "vfork",
    EXECVE = 59 => "execve",
    EXIT = 60 => "exit",
    WAIT4 = 61 => "wait4",
    KILL = 62 => "kill",
    UNAME = 63 => "uname",
    FCNTL = 72 => "fcntl",
    FLOCK = 73 => "flock",
    FSYNC = 74 => "fsync",
    TRUNCATE = 76 => "truncate",
    FTRUNCATE = 77 => "ftruncate",
    GETDENTS = 78 => "getdents",
    GETCWD = 79 => "getcwd",
    CHDIR = 80 => "chdir",
    FCHDIR = 81 => "fchdir",
    RENAME = 82 => "rename",
    MKDIR = 83 => "mkdir",
    RMDIR = 84 => "rmdir",
    CREAT = 85 => "creat",
    LINK = 86 => "link",
    UNLINK = 87 => "unlink",
    SYMLINK = 88 => "symlink",
    READLINK = 89 => "readlink",
    CHMOD = 90 => "chmod",
    FCHMOD = 91 => "fchmod",
    CHOWN = 92 => "chown",
    FCHOWN = 93 => "fchown",
    LCHOWN = 94 => "lchown",
    UMASK = 95 => "umask",
    PTRACE = 101 => "ptrace",
    GETUID = 102 => "getuid",
    GETGID = 104 => "getgid",
    SETUID = 105 => "setuid",
    SETGID = 106 => "setgid",
    SETPGID = 109 => "setpgid",
    GETPPID = 110 => "getppid",
    SETSID = 112 => "setsid",
    SETREUID = 113 => "setreuid",
    SETREGID = 114 => "setregid",
    SETRESUID = 117 => "setresuid",
    SETRESGID = 119 => "setresgid",
    GETSID = 124 => "getsid",
    CAPSET = 126 => "capset",
    MKNOD = 133 => "mknod",
    MLOCK = 149 => "mlock",
    MUNLOCK = 150 => "munlock",
    PIVOT_ROOT = 155 => "pivot_root",
    PRCTL = 157 => "prctl",
    CHROOT = 161 => "chroot",
    MOUNT = 165 => "mount",
    UMOUNT2 = 166 => "umount2",
    INIT_MODULE = 175 => "init_module",
    DELETE_MODULE = 176 => "delete_module",
    GETTID = 186 => "gettid",
    TKILL = 200 => "tkill",
    FUTEX = 202 => "futex",
    GETDENTS64 = 217 => "getdents64",
    EXIT_GROUP = 231 => "exit_group",
    TGKILL = 234 => "tgkill",
    OPENAT = 257 => "openat",
    MKDIRAT = 258 => "mkdirat",
    MKNODAT = 259 => "mknodat",
    UNLINKAT = 263 => "unlinkat",
    RENAMEAT = 264 => "renameat",
    LINKAT = 265 => "linkat",
    SYMLINKAT = 266 => "symlinkat",
    READLINKAT = 267 => "readlinkat",
    FCHMODAT = 268 => "fchmodat",
    FACCESSAT = 269 => "faccessat",
    UNSHARE = 272 => "unshare",
    SPLICE = 275 => "splice",
    ACCEPT4 = 288 => "accept4",
    DUP3 = 292 => "dup3",
    PIPE2 = 293 => "pipe2",
    RECVMMSG = 299 => "recvmmsg",
    PRLIMIT64 = 302 => "prlimit64",
    OPEN_BY_HANDLE_AT = 304 => "open_by_handle_at",
    SENDMMSG = 307 => "sendmmsg",
    SETNS = 308 => "setns",
    FINIT_MODULE = 313 => "finit_module",
    RENAMEAT2 = 316 => "renameat2",
    SECCOMP = 317 => "seccomp",
    MEMFD_CREATE = 319 => "memfd_create",
    BPF = 321 => "bpf",
    EXECVEAT = 322 => "execveat",
    USERFAULTFD = 323 => "userfaultfd",
    COPY_FILE_RANGE = 326 => "copy_file_range",
    PIDFD_SEND_SIGNAL = 424 => "pidfd_send_signal",
    IO_URING_SETUP = 425 => "io_uring_setup",
    IO_URING_ENTER = 426 => "io_uring_enter",
    IO_URING_REGISTER = 427 => "io_uring_register",
    OPEN_TREE = 428 => "open_tree",
    MOVE_MOUNT = 429 => "move_mount",
    FSOPEN = 430 => "fsopen",
    FSCONFIG = 431 => "fsconfig",
    FSMOUNT = 432 => "fsmount",
    FSPICK = 433 => "fspick",
    PIDFD_OPEN = 434 => "pidfd_open",
    CLONE3 = 435 => "clone3",
    CLOSE_RANGE = 436 => "close_range",
    OPENAT2 = 437 => "openat2",
    PIDFD_GETFD = 438 => "pidfd_getfd",
    FACCESSAT2 = 439 => "faccessat2",
}
