//! Writes a [`ConfigSnapshot`] into the kernel program's maps

use std::collections::HashSet;

use anyhow::{Context, Result};
use aya::maps::{Array, HashMap, MapData};
use aya::Ebpf;
use syscap_shared::maps::{
    KernelSettings, IA32_TO_64, INTERESTING_SYSCALLS, MAX_FILTERS, SAMPLED_OUT, SETTINGS,
    SYSCALL_FILTERS,
};
use syscap_shared::pipeline::ExitTables;
use syscap_shared::syscalls::{ia32::IA32_TABLE_SIZE, SYSCALL_TABLE_SIZE, UNSUPPORTED};
use syscap_shared::FilterMapEntry;
use tracing::{debug, info};

use super::kernel::KernelVersion;
use crate::snapshot::ConfigSnapshot;

fn array<'a, V: aya::Pod>(bpf: &'a mut Ebpf, name: &str) -> Result<Array<&'a mut MapData, V>> {
    let map = bpf
        .map_mut(name)
        .with_context(|| format!("Failed to get {} map", name))?;
    Array::try_from(map).with_context(|| format!("{} is not an array map", name))
}

/// Flag table with one byte per canonical id
pub fn flag_table<F>(contains: F) -> Vec<u8>
where
    F: Fn(u32) -> bool,
{
    (0..SYSCALL_TABLE_SIZE).map(|id| contains(id) as u8).collect()
}

/// Compat translation table indexed by raw ia32 id
pub fn compat_table(snapshot: &ConfigSnapshot) -> Vec<u32> {
    (0..IA32_TABLE_SIZE)
        .map(|raw| {
            snapshot
                .compat_table()
                .get(&raw)
                .copied()
                .unwrap_or(UNSUPPORTED)
        })
        .collect()
}

/// Settings entry for `snapshot` on the running kernel
pub fn kernel_settings(snapshot: &ConfigSnapshot) -> Result<KernelSettings> {
    let settings = KernelSettings::new(&snapshot.profile, snapshot.drop_failed());
    if !snapshot.profile.compat_supported {
        return Ok(settings);
    }
    let version = KernelVersion::detect()?;
    debug!("Kernel {:?}, thread_info.status at {}", version, version.thread_status_offset());
    Ok(settings.with_thread_status_offset(version.thread_status_offset()))
}

pub struct KernelMaps;

impl KernelMaps {
    /// Bring every configuration map in line with `snapshot`.
    ///
    /// Each map entry is replaced atomically; a concurrently running program
    /// may observe a mix of old and new entries until this returns.
    pub fn sync(bpf: &mut Ebpf, snapshot: &ConfigSnapshot) -> Result<()> {
        if snapshot.filters().len() > MAX_FILTERS as usize {
            anyhow::bail!(
                "{} prefix filters configured, the kernel map holds {}",
                snapshot.filters().len(),
                MAX_FILTERS
            );
        }

        {
            let mut interesting = array::<u8>(bpf, INTERESTING_SYSCALLS)?;
            for (id, flag) in snapshot.interesting_flags().iter().enumerate() {
                interesting.set(id as u32, *flag as u8, 0)?;
            }
        }

        {
            let mut sampled = array::<u8>(bpf, SAMPLED_OUT)?;
            for (id, flag) in flag_table(|id| snapshot.sampled_out().contains(&id))
                .into_iter()
                .enumerate()
            {
                sampled.set(id as u32, flag, 0)?;
            }
        }

        {
            let mut compat = array::<u32>(bpf, IA32_TO_64)?;
            for (raw, id) in compat_table(snapshot).into_iter().enumerate() {
                compat.set(raw as u32, id, 0)?;
            }
        }

        Self::sync_filters(bpf, snapshot)?;

        // last, so the prefix cap never applies to half-written filters
        let settings = kernel_settings(snapshot)?;
        array::<KernelSettings>(bpf, SETTINGS)?.set(0, settings, 0)?;

        info!(
            "Synced kernel maps: {} interesting, {} filters, {} sampled out",
            snapshot.interesting_ids().count(),
            snapshot.filters().len(),
            snapshot.sampled_out().len()
        );
        Ok(())
    }

    fn sync_filters(bpf: &mut Ebpf, snapshot: &ConfigSnapshot) -> Result<()> {
        let map = bpf
            .map_mut(SYSCALL_FILTERS)
            .with_context(|| format!("Failed to get {} map", SYSCALL_FILTERS))?;
        let mut filters: HashMap<_, u32, FilterMapEntry> =
            HashMap::try_from(map).context("SYSCALL_FILTERS is not a hash map")?;

        let stale: HashSet<u32> = filters
            .keys()
            .filter_map(|key| key.ok())
            .filter(|id| !snapshot.filters().contains_key(id))
            .collect();
        for id in stale {
            debug!("Removing filter for syscall {}", id);
            filters.remove(&id)?;
        }

        for (&id, entry) in snapshot.filters() {
            filters.insert(id, *entry, 0)?;
        }
        Ok(())
    }
}
