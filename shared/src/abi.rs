//! Per-architecture ABI facts the resolver and prefix filter depend on

use crate::filter::FILTER_PREFIX_SLOTS;
use crate::syscalls::{ia32, x86_64};

/// Default number of prefixes the kernel program consults per filter entry.
pub const DEFAULT_MAX_PREFIXES: usize = 12;

/// Host architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "std",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    /// Architecture this crate was compiled for, defaulting to x86_64.
    pub const fn host() -> Self {
        if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else {
            Arch::X86_64
        }
    }
}

/// ABI description used to normalize raw syscall ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchProfile {
    pub arch: Arch,
    /// Whether 32-bit compat syscalls can be translated at all
    pub compat_supported: bool,
    /// Compat-mode socketcall number, if the compat ABI has one
    pub compat_socketcall: Option<u32>,
    /// Native socketcall number, if the 64-bit ABI has one
    pub native_socketcall: Option<u32>,
    /// Canonical execve id; keeps 64-bit numbering during a 64->32 exec
    pub execve: u32,
    /// Canonical execveat id; same exemption as `execve`
    pub execveat: u32,
    /// Prefixes consulted per filter entry
    pub max_prefixes: usize,
}

impl ArchProfile {
    pub const X86_64: Self = Self {
        arch: Arch::X86_64,
        compat_supported: true,
        compat_socketcall: Some(ia32::SOCKETCALL),
        native_socketcall: None,
        execve: x86_64::EXECVE,
        execveat: x86_64::EXECVEAT,
        max_prefixes: DEFAULT_MAX_PREFIXES,
    };

    pub const AARCH64: Self = Self {
        arch: Arch::Aarch64,
        compat_supported: false,
        compat_socketcall: None,
        native_socketcall: None,
        execve: 221,
        execveat: 281,
        max_prefixes: DEFAULT_MAX_PREFIXES,
    };

    pub const fn for_arch(arch: Arch) -> Self {
        match arch {
            Arch::X86_64 => Self::X86_64,
            Arch::Aarch64 => Self::AARCH64,
        }
    }

    /// Override the prefix cap, clamped to the slots a filter entry stores.
    pub const fn with_max_prefixes(mut self, max_prefixes: usize) -> Self {
        self.max_prefixes = if max_prefixes > FILTER_PREFIX_SLOTS {
            FILTER_PREFIX_SLOTS
        } else {
            max_prefixes
        };
        self
    }

    /// Socketcall number for the given execution mode.
    pub const fn socketcall(&self, compat: bool) -> Option<u32> {
        if compat {
            self.compat_socketcall
        } else {
            self.native_socketcall
        }
    }

    /// Ids that keep 64-bit numbering while a compat task finishes an exec.
    pub const fn is_exec_passthrough(&self, raw: u32) -> bool {
        raw == self.execve || raw == self.execveat
    }
}

impl Default for ArchProfile {
    fn default() -> Self {
        Self::for_arch(Arch::host())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_prefixes_clamped() {
        let profile = ArchProfile::X86_64.with_max_prefixes(64);
        assert_eq!(profile.max_prefixes, FILTER_PREFIX_SLOTS);

        let profile = ArchProfile::X86_64.with_max_prefixes(4);
        assert_eq!(profile.max_prefixes, 4);
    }

    #[test]
    fn test_socketcall_per_mode() {
        assert_eq!(ArchProfile::X86_64.socketcall(true), Some(102));
        assert_eq!(ArchProfile::X86_64.socketcall(false), None);
        assert!(ArchProfile::X86_64.is_exec_passthrough(59));
        assert!(ArchProfile::X86_64.is_exec_passthrough(322));
        assert!(!ArchProfile::X86_64.is_exec_passthrough(11));
    }
}
