//! Identity-based event suppression
//!
//! Events that reach userspace are dropped when their thread id, or the
//! command name of that thread, has been suppressed. Thread ids are sticky: a
//! thread whose command name matched once stays suppressed for the session,
//! even after it execs into something else.
//!
//! Lookups go through a direct-mapped cache keyed by the delivery channel
//! (`devid`), since consecutive events on one channel tend to come from the
//! same thread. The cache is only a hint. The exact sets decide on any
//! mismatch, and a cached "keep" verdict is discarded as soon as either set
//! changes.

use std::collections::HashSet;

use syscap_shared::types::events::{DevId, SyscallEvent, Tid};
use tracing::{debug, info};

use crate::config::SuppressConfig;
use crate::metrics;

/// Default number of devid cache slots
pub const DEFAULT_CACHE_SLOTS: usize = 1024;

/// Channel id meaning "unknown channel"; bypasses the cache.
pub const NO_DEVID: DevId = DevId::MAX;

/// Longest command name the cache can fingerprint (kernel TASK_COMM_LEN).
const COMM_KEY_LEN: usize = 16;

/// Suppression decision for one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CommKey {
    bytes: [u8; COMM_KEY_LEN],
    len: u8,
}

impl CommKey {
    fn new(comm: Option<&str>) -> Option<Self> {
        let comm = comm?.as_bytes();
        if comm.len() > COMM_KEY_LEN {
            return None;
        }
        let mut bytes = [0u8; COMM_KEY_LEN];
        bytes[..comm.len()].copy_from_slice(comm);
        Some(Self {
            bytes,
            len: comm.len() as u8,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheSlot {
    tid: Tid,
    suppressed: bool,
    /// Suppression-set generation the verdict was computed against
    generation: u64,
    /// Command name of the event that produced a "keep" verdict
    comm: Option<CommKey>,
}

/// Suppression state for one capture session
#[derive(Debug)]
pub struct Suppressor {
    comms: HashSet<String>,
    tids: HashSet<Tid>,
    cache: Box<[Option<CacheSlot>]>,
    /// Bumped whenever `comms` or `tids` changes
    generation: u64,
    num_suppressed_events: u64,
}

impl Default for Suppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Suppressor {
    pub fn new() -> Self {
        Self::with_cache_slots(DEFAULT_CACHE_SLOTS)
    }

    pub fn with_cache_slots(slots: usize) -> Self {
        Self {
            comms: HashSet::new(),
            tids: HashSet::new(),
            cache: vec![None; slots.max(1)].into_boxed_slice(),
            generation: 0,
            num_suppressed_events: 0,
        }
    }

    /// Build the session state from configuration.
    pub fn from_config(config: &SuppressConfig) -> Self {
        let mut suppressor = Self::with_cache_slots(config.cache_slots);
        for comm in &config.comms {
            suppressor.suppress_comm(comm.as_str());
        }
        for &tid in &config.tids {
            suppressor.suppress_tid(tid);
        }
        if config.exclude_self {
            suppressor.suppress_tid(std::process::id() as Tid);
        }
        suppressor
    }

    /// Suppress threads running `comm` from now on.
    ///
    /// Threads already classified are not revisited; they are caught on their
    /// next event.
    pub fn suppress_comm(&mut self, comm: impl Into<String>) {
        let comm = comm.into();
        info!("Suppressing command {:?}", comm);
        if self.comms.insert(comm) {
            self.generation += 1;
        }
    }

    /// Suppress a thread id for the rest of the session.
    pub fn suppress_tid(&mut self, tid: Tid) {
        if self.tids.insert(tid) {
            debug!("Suppressing tid {}", tid);
            self.generation += 1;
        }
    }

    /// True if `comm` is suppressed, in which case `tid` is suppressed too.
    pub fn check_suppressed_comm(&mut self, tid: Tid, comm: &str) -> bool {
        if !self.comms.contains(comm) {
            return false;
        }
        self.suppress_tid(tid);
        true
    }

    /// Decide whether an event is dropped, counting every drop.
    pub fn process_event(&mut self, event: &SyscallEvent, devid: DevId) -> Verdict {
        if self.comms.is_empty() && self.tids.is_empty() {
            return Verdict::Keep;
        }

        let tid = event.tid;
        let comm = event.comm.as_deref();
        let comm_key = CommKey::new(comm);

        let cached = self.cached(tid, devid).filter(|slot| {
            // "keep" only holds for the command name it was computed for
            slot.suppressed || (comm_key.is_some() && slot.comm == comm_key)
        });

        let suppressed = match cached {
            Some(slot) => {
                metrics::SUPPRESS_CACHE.with_label_values(&["hit"]).inc();
                slot.suppressed
            }
            None => {
                metrics::SUPPRESS_CACHE.with_label_values(&["miss"]).inc();
                self.tids.contains(&tid)
                    || comm.is_some_and(|comm| self.check_suppressed_comm(tid, comm))
            }
        };
        self.remember(devid, tid, suppressed, comm_key);

        if suppressed {
            self.num_suppressed_events += 1;
            metrics::SUPPRESSED_EVENTS.inc();
            Verdict::Drop
        } else {
            Verdict::Keep
        }
    }

    /// Read-only variant of the lookup in [`Suppressor::process_event`].
    pub fn is_suppressed_tid(&self, tid: Tid, devid: DevId) -> bool {
        match self.cached(tid, devid) {
            Some(slot) => slot.suppressed,
            None => self.tids.contains(&tid),
        }
    }

    /// Number of `process_event` calls that returned [`Verdict::Drop`]
    pub fn num_suppressed_events(&self) -> u64 {
        self.num_suppressed_events
    }

    /// Number of suppressed thread ids
    pub fn num_suppressed_tids(&self) -> u64 {
        self.tids.len() as u64
    }

    fn slot_index(&self, devid: DevId) -> Option<usize> {
        if devid == NO_DEVID {
            return None;
        }
        Some(devid as usize % self.cache.len())
    }

    /// Cached slot for `tid` on `devid`, if it is still trustworthy.
    fn cached(&self, tid: Tid, devid: DevId) -> Option<CacheSlot> {
        let slot = self.cache[self.slot_index(devid)?]?;
        if slot.tid != tid {
            return None;
        }
        // suppressed tids never leave the set, so those verdicts never expire
        if slot.suppressed || slot.generation == self.generation {
            Some(slot)
        } else {
            None
        }
    }

    fn remember(&mut self, devid: DevId, tid: Tid, suppressed: bool, comm: Option<CommKey>) {
        if let Some(idx) = self.slot_index(devid) {
            self.cache[idx] = Some(CacheSlot {
                tid,
                suppressed,
                generation: self.generation,
                comm,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syscap_shared::types::events::RegisterSnapshot;

    fn event(tid: Tid, comm: &str) -> SyscallEvent {
        SyscallEvent {
            timestamp: 0,
            pid: tid,
            tid,
            regs: RegisterSnapshot::default(),
            syscall_id: None,
            return_value: 0,
            devid: 0,
            comm: Some(comm.to_string()),
        }
    }

    #[test]
    fn test_empty_sets_keep_everything() {
        let mut suppressor = Suppressor::new();
        assert_eq!(suppressor.process_event(&event(1, "bash"), 0), Verdict::Keep);
        assert_eq!(suppressor.num_suppressed_events(), 0);
    }

    #[test]
    fn test_comm_match_promotes_tid() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("bash");

        assert_eq!(suppressor.process_event(&event(5, "bash"), 1), Verdict::Drop);
        assert_eq!(suppressor.num_suppressed_tids(), 1);

        // sticky across exec and across channels
        assert_eq!(suppressor.process_event(&event(5, "python"), 1), Verdict::Drop);
        assert_eq!(suppressor.process_event(&event(5, "python"), 7), Verdict::Drop);
        assert_eq!(suppressor.num_suppressed_events(), 3);
    }

    #[test]
    fn test_suppress_comm_is_forward_looking() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_tid(99);
        assert_eq!(suppressor.process_event(&event(5, "bash"), 1), Verdict::Keep);

        suppressor.suppress_comm("bash");
        assert_eq!(suppressor.num_suppressed_tids(), 1);
        assert!(!suppressor.is_suppressed_tid(5, 1));

        // the cached keep verdict is stale now
        assert_eq!(suppressor.process_event(&event(5, "bash"), 1), Verdict::Drop);
        assert!(suppressor.is_suppressed_tid(5, 1));
    }

    #[test]
    fn test_cached_keep_not_reused_for_other_comm() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("nc");

        assert_eq!(suppressor.process_event(&event(5, "bash"), 1), Verdict::Keep);
        // same tid on the same channel after exec
        assert_eq!(suppressor.process_event(&event(5, "nc"), 1), Verdict::Drop);
    }

    #[test]
    fn test_suppress_tid_invalidates_cached_keep() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("nc");
        assert_eq!(suppressor.process_event(&event(5, "bash"), 1), Verdict::Keep);

        suppressor.suppress_tid(5);
        assert_eq!(suppressor.process_event(&event(5, "bash"), 1), Verdict::Drop);
    }

    #[test]
    fn test_colliding_devids_fall_back_to_sets() {
        let mut suppressor = Suppressor::with_cache_slots(4);
        suppressor.suppress_tid(10);

        // devid 1 and 5 share a slot
        assert_eq!(suppressor.process_event(&event(10, "a"), 1), Verdict::Drop);
        assert_eq!(suppressor.process_event(&event(11, "b"), 5), Verdict::Keep);
        assert_eq!(suppressor.process_event(&event(10, "a"), 1), Verdict::Drop);
        assert_eq!(suppressor.process_event(&event(11, "b"), 5), Verdict::Keep);
        assert!(suppressor.is_suppressed_tid(10, 5));
        assert!(!suppressor.is_suppressed_tid(11, 1));
    }

    #[test]
    fn test_no_devid_bypasses_cache() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_tid(3);
        assert_eq!(suppressor.process_event(&event(3, "x"), NO_DEVID), Verdict::Drop);
        assert!(suppressor.cache.iter().all(Option::is_none));
        assert!(suppressor.is_suppressed_tid(3, NO_DEVID));
    }

    #[test]
    fn test_is_suppressed_tid_has_no_side_effects() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("bash");
        assert!(!suppressor.is_suppressed_tid(5, 1));
        assert_eq!(suppressor.num_suppressed_tids(), 0);
        assert_eq!(suppressor.num_suppressed_events(), 0);
    }

    #[test]
    fn test_counts_every_dropping_call() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("bash");
        let ev = event(5, "bash");

        for _ in 0..5 {
            assert_eq!(suppressor.process_event(&ev, 2), Verdict::Drop);
        }
        for _ in 0..3 {
            assert_eq!(suppressor.process_event(&event(6, "zsh"), 2), Verdict::Keep);
        }
        assert_eq!(suppressor.num_suppressed_events(), 5);
        assert_eq!(suppressor.num_suppressed_tids(), 1);
    }

    #[test]
    fn test_missing_comm_only_checks_tid() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("bash");
        let mut ev = event(5, "bash");
        ev.comm = None;
        assert_eq!(suppressor.process_event(&ev, 1), Verdict::Keep);
        assert_eq!(suppressor.num_suppressed_tids(), 0);
    }

    #[test]
    fn test_missing_comm_keep_not_reused_for_empty_comm() {
        let mut suppressor = Suppressor::new();
        suppressor.suppress_comm("");
        let mut ev = event(5, "");
        ev.comm = None;
        assert_eq!(suppressor.process_event(&ev, 1), Verdict::Keep);
        assert_eq!(suppressor.process_event(&event(5, ""), 1), Verdict::Drop);
        assert_eq!(suppressor.num_suppressed_tids(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = SuppressConfig {
            comms: vec!["sshd".into()],
            tids: vec![1, 2],
            exclude_self: true,
            cache_slots: 8,
        };
        let suppressor = Suppressor::from_config(&config);
        assert_eq!(suppressor.cache.len(), 8);
        assert_eq!(suppressor.num_suppressed_tids(), 3);
        assert!(suppressor.is_suppressed_tid(std::process::id() as Tid, NO_DEVID));
    }
}
