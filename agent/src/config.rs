//! Configuration types for the syscall agent
//!
//! Loaded with the `config` crate from an optional TOML file, then overridden
//! by `SYSCAP_`-prefixed environment variables (nested keys use `__`, e.g.
//! `SYSCAP_PLATFORM__MAX_PREFIXES=8`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use syscap_shared::abi::{Arch, ArchProfile};
use syscap_shared::syscalls::{self, SYSCALL_TABLE_SIZE};
use syscap_shared::types::events::Tid;
use syscap_shared::{FilterMapEntry, PREFIX_LEN};
use tracing::warn;

use crate::error::ConfigError;
use crate::suppress::DEFAULT_CACHE_SLOTS;

/// A syscall given either by number or by x86_64 name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyscallRef {
    Id(u32),
    Name(String),
}

impl SyscallRef {
    /// Resolve to a canonical id inside the dispatch table.
    pub fn resolve(&self) -> Result<u32, ConfigError> {
        let id = match self {
            SyscallRef::Id(id) => *id,
            SyscallRef::Name(name) => syscalls::syscall_id(name)
                .ok_or_else(|| ConfigError::UnknownSyscall(name.clone()))?,
        };
        if id >= SYSCALL_TABLE_SIZE {
            return Err(ConfigError::SyscallOutOfRange {
                id,
                max: SYSCALL_TABLE_SIZE,
            });
        }
        Ok(id)
    }
}

impl std::fmt::Display for SyscallRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyscallRef::Id(id) => write!(f, "{}", id),
            SyscallRef::Name(name) => f.write_str(name),
        }
    }
}

/// Target platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub arch: Arch,

    /// Prefixes consulted per filter entry (architecture default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_prefixes: Option<usize>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            arch: Arch::host(),
            max_prefixes: None,
        }
    }
}

impl PlatformConfig {
    pub fn profile(&self) -> ArchProfile {
        let profile = ArchProfile::for_arch(self.arch);
        match self.max_prefixes {
            Some(max) => profile.with_max_prefixes(max),
            None => profile,
        }
    }
}

/// Prefix filter for one syscall
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub syscall: SyscallRef,

    /// Path prefixes whose matches are dropped; empty means unrestricted
    #[serde(default)]
    pub prefixes: Vec<String>,

    /// Syscall argument holding the path pointer (0 = first argument)
    #[serde(default)]
    pub arg_index: u32,
}

impl FilterConfig {
    pub fn to_entry(&self) -> FilterMapEntry {
        FilterMapEntry::from_prefixes(&self.prefixes, self.arg_index)
    }
}

/// Suppression engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressConfig {
    /// Command names whose threads are suppressed
    pub comms: Vec<String>,

    /// Thread ids suppressed from the start of the session
    pub tids: Vec<Tid>,

    /// Suppress the agent's own process
    pub exclude_self: bool,

    /// Slots in the devid verdict cache
    pub cache_slots: usize,
}

impl Default for SuppressConfig {
    fn default() -> Self {
        Self {
            comms: Vec::new(),
            tids: Vec::new(),
            exclude_self: false,
            cache_slots: DEFAULT_CACHE_SLOTS,
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub platform: PlatformConfig,

    /// Instrumented syscalls (empty = every syscall)
    pub interesting: Vec<SyscallRef>,

    /// Drop events whose return value is negative
    pub drop_failed: bool,

    /// Syscalls the external sampler currently skips
    pub sampled_out: Vec<SyscallRef>,

    pub filters: Vec<FilterConfig>,

    pub suppress: SuppressConfig,

    /// Size of the dispatch table; ids at or above it are dropped
    pub dispatch_range: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            interesting: Vec::new(),
            drop_failed: false,
            sampled_out: Vec::new(),
            filters: Vec::new(),
            suppress: SuppressConfig::default(),
            dispatch_range: SYSCALL_TABLE_SIZE,
        }
    }
}

impl AgentConfig {
    /// Load from an optional file plus `SYSCAP_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("SYSCAP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AgentConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for syscall in self.interesting.iter().chain(&self.sampled_out) {
            syscall.resolve()?;
        }

        if self.dispatch_range == 0 || self.dispatch_range > SYSCALL_TABLE_SIZE {
            return Err(ConfigError::DispatchRange {
                range: self.dispatch_range,
                max: SYSCALL_TABLE_SIZE,
            });
        }

        let max_prefixes = self.platform.profile().max_prefixes;
        for filter in &self.filters {
            filter.syscall.resolve()?;

            if filter.arg_index as usize >= syscap_shared::types::events::SYSCALL_ARGS {
                return Err(ConfigError::ArgIndex {
                    syscall: filter.syscall.to_string(),
                    index: filter.arg_index,
                });
            }

            if let Some(prefix) = filter
                .prefixes
                .iter()
                .find(|p| p.is_empty() || p.len() >= PREFIX_LEN || p.contains('\0'))
            {
                return Err(ConfigError::InvalidPrefix {
                    syscall: filter.syscall.to_string(),
                    prefix: prefix.clone(),
                    max: PREFIX_LEN - 1,
                });
            }

            if filter.prefixes.len() > max_prefixes {
                warn!(
                    "Filter for {} has {} prefixes, only the first {} are checked",
                    filter.syscall,
                    filter.prefixes.len(),
                    max_prefixes
                );
            }
        }

        if self.suppress.cache_slots == 0 {
            return Err(ConfigError::EmptyCache);
        }

        Ok(())
    }
}
