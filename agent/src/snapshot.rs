//! Read-mostly view of the configuration used on the hot path
//!
//! A [`ConfigSnapshot`] is immutable once built. Reconfiguration builds a new
//! snapshot and swaps it in through [`SharedConfig`], so an event always sees
//! one consistent configuration from resolver to dispatch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use syscap_shared::abi::ArchProfile;
use syscap_shared::pipeline::{Direction, ExitTables, Sampler};
use syscap_shared::syscalls::{ia32::IA32_TO_X86_64, SYSCALL_TABLE_SIZE};
use syscap_shared::FilterMapEntry;

use crate::config::AgentConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub profile: ArchProfile,
    interesting: Vec<bool>,
    drop_failed: bool,
    filters: HashMap<u32, FilterMapEntry>,
    compat: HashMap<u32, u32>,
    sampled_out: HashSet<u32>,
    dispatch_range: u32,
}

impl ConfigSnapshot {
    pub fn from_config(config: &AgentConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let profile = config.platform.profile();

        let mut interesting = vec![config.interesting.is_empty(); SYSCALL_TABLE_SIZE as usize];
        for syscall in &config.interesting {
            interesting[syscall.resolve()? as usize] = true;
        }

        let mut filters = HashMap::new();
        for filter in &config.filters {
            filters.insert(filter.syscall.resolve()?, filter.to_entry());
        }

        let sampled_out = config
            .sampled_out
            .iter()
            .map(|s| s.resolve())
            .collect::<Result<_, _>>()?;

        let compat = if profile.compat_supported {
            IA32_TO_X86_64.iter().copied().collect()
        } else {
            HashMap::new()
        };

        Ok(Self {
            profile,
            interesting,
            drop_failed: config.drop_failed,
            filters,
            compat,
            sampled_out,
            dispatch_range: config.dispatch_range,
        })
    }

    /// Canonical ids with the interest flag set, in ascending order.
    pub fn interesting_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.interesting
            .iter()
            .enumerate()
            .filter(|(_, &on)| on)
            .map(|(id, _)| id as u32)
    }

    pub fn interesting_flags(&self) -> &[bool] {
        &self.interesting
    }

    pub fn filters(&self) -> &HashMap<u32, FilterMapEntry> {
        &self.filters
    }

    pub fn compat_table(&self) -> &HashMap<u32, u32> {
        &self.compat
    }

    pub fn sampled_out(&self) -> &HashSet<u32> {
        &self.sampled_out
    }

    pub fn dispatch_range(&self) -> u32 {
        self.dispatch_range
    }
}

impl ExitTables for ConfigSnapshot {
    fn is_interesting(&self, id: u32) -> bool {
        self.interesting.get(id as usize).copied().unwrap_or(false)
    }

    fn drop_failed(&self) -> bool {
        self.drop_failed
    }

    fn filter_for(&self, id: u32) -> Option<&FilterMapEntry> {
        self.filters.get(&id)
    }

    fn compat_to_canonical(&self, raw: u32) -> Option<u32> {
        self.compat.get(&raw).copied()
    }
}

impl Sampler for ConfigSnapshot {
    fn sample_out(&self, id: u32, _direction: Direction) -> bool {
        self.sampled_out.contains(&id)
    }
}

/// Shared handle to the current snapshot
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<ArcSwap<ConfigSnapshot>>,
}

impl SharedConfig {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(snapshot)),
        }
    }

    /// Snapshot for processing one event.
    pub fn load(&self) -> Arc<ConfigSnapshot> {
        self.inner.load_full()
    }

    /// Publish a new snapshot; events already in flight keep the old one.
    pub fn store(&self, snapshot: ConfigSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }
}
