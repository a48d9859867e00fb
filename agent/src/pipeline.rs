//! Userspace rendition of the syscall-exit pipeline
//!
//! Runs the shared filter stages against the current [`ConfigSnapshot`] and
//! hands surviving events to the [`DispatchTable`]. The kernel program runs
//! the same stages against BPF maps; this path serves replay and testing.

use std::fmt;
use std::sync::Arc;

use syscap_shared::pipeline::{run_exit, DropReason, Flow, PrefixPass, Sampler, UserMemory};
use syscap_shared::types::events::SyscallEvent;
use tracing::{debug, trace};

use crate::dispatch::DispatchTable;
use crate::metrics;
use crate::snapshot::{ConfigSnapshot, SharedConfig};

/// Sampler shared with whoever owns the sampling policy
pub type SharedSampler = Arc<dyn Sampler + Send + Sync>;

pub struct ExitPipeline {
    config: SharedConfig,
    sampler: Option<SharedSampler>,
    dispatch: DispatchTable,
}

impl fmt::Debug for ExitPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitPipeline")
            .field("external_sampler", &self.sampler.is_some())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl ExitPipeline {
    pub fn new(config: SharedConfig) -> Self {
        let range = config.load().dispatch_range();
        Self {
            config,
            sampler: None,
            dispatch: DispatchTable::new(range),
        }
    }

    /// Replace the configured `sampled_out` list with an external policy.
    pub fn with_sampler(mut self, sampler: SharedSampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub fn dispatch_mut(&mut self) -> &mut DispatchTable {
        &mut self.dispatch
    }

    /// Run one exit event through every stage; returns the canonical id it
    /// was dispatched under.
    pub fn process<M>(&self, mut event: SyscallEvent, memory: &M) -> Flow<u32>
    where
        M: UserMemory + ?Sized,
    {
        let snapshot = self.config.load();
        let result = self.run(&snapshot, &mut event, memory);

        match result {
            Ok(id) => {
                metrics::EXIT_DISPATCHED.inc();
                Ok(id)
            }
            Err(reason) => {
                metrics::EXIT_DROPPED
                    .with_label_values(&[reason.as_str()])
                    .inc();
                trace!("tid {} dropped: {:?}", event.tid, reason);
                Err(reason)
            }
        }
    }

    fn run<M>(&self, snapshot: &ConfigSnapshot, event: &mut SyscallEvent, memory: &M) -> Flow<u32>
    where
        M: UserMemory + ?Sized,
    {
        let sampler: &dyn Sampler = match &self.sampler {
            Some(sampler) => &**sampler,
            None => snapshot,
        };

        let admitted = run_exit(
            &event.regs,
            event.return_value,
            snapshot,
            sampler,
            &MemoryRef(memory),
            &snapshot.profile,
        )
        .map_err(|reason| {
            if let DropReason::PrefixMatch { path } = &reason {
                debug!("filtering out {}", path);
            }
            reason
        })?;

        if let PrefixPass::Sent(path) = &admitted.prefix {
            debug!("sending {}", path);
        }

        let id = admitted.syscall_id;
        event.syscall_id = Some(id);
        self.dispatch.dispatch(id, event.clone())?;
        Ok(id)
    }
}

/// Sized wrapper so unsized memory sources fit the stage signatures.
struct MemoryRef<'a, M: ?Sized>(&'a M);

impl<M: UserMemory + ?Sized> UserMemory for MemoryRef<'_, M> {
    fn read_user_str(&self, addr: u64, buf: &mut [u8]) -> Option<usize> {
        self.0.read_user_str(addr, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, FilterConfig, SyscallRef};
    use crate::dispatch::ChannelHandler;
    use crate::memory::CapturedStrings;
    use std::sync::mpsc;
    use syscap_shared::abi::Arch;
    use syscap_shared::pipeline::Direction;
    use syscap_shared::syscalls::x86_64;
    use syscap_shared::types::events::RegisterSnapshot;

    fn pipeline(config: AgentConfig) -> (ExitPipeline, mpsc::Receiver<SyscallEvent>) {
        let snapshot = ConfigSnapshot::from_config(&config).unwrap();
        let mut pipeline = ExitPipeline::new(SharedConfig::new(snapshot));
        let (tx, rx) = mpsc::sync_channel(16);
        let handler = Arc::new(ChannelHandler(tx));
        for id in 0..pipeline.dispatch().range() {
            pipeline.dispatch_mut().register(id, handler.clone()).unwrap();
        }
        (pipeline, rx)
    }

    fn x86_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.platform.arch = Arch::X86_64;
        config
    }

    fn event(id: u32, args: [u64; 6], compat: bool, ret: i64) -> SyscallEvent {
        SyscallEvent {
            timestamp: 1,
            pid: 10,
            tid: 11,
            regs: RegisterSnapshot {
                syscall_id: id,
                args,
                compat,
            },
            syscall_id: None,
            return_value: ret,
            devid: 0,
            comm: Some("cat".into()),
        }
    }

    #[test]
    fn test_dispatches_with_canonical_id() {
        let (pipeline, rx) = pipeline(x86_config());
        let memory = CapturedStrings::new();

        // ia32 open
        let id = pipeline.process(event(5, [0; 6], true, 3), &memory).unwrap();
        assert_eq!(id, x86_64::OPEN);
        assert_eq!(rx.try_recv().unwrap().syscall_id, Some(x86_64::OPEN));
    }

    #[test]
    fn test_socketcall_demux() {
        let (pipeline, rx) = pipeline(x86_config());
        let memory = CapturedStrings::new();

        let id = pipeline.process(event(102, [3, 0, 0, 0, 0, 0], true, 0), &memory);
        assert_eq!(id, Ok(x86_64::CONNECT));
        assert_eq!(rx.try_recv().unwrap().id(), x86_64::CONNECT);

        let id = pipeline.process(event(102, [99, 0, 0, 0, 0, 0], true, 0), &memory);
        assert_eq!(id, Err(DropReason::UnknownSocketcall { selector: 99 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_prefix_filter_drops_match() {
        let config = AgentConfig {
            filters: vec![FilterConfig {
                syscall: SyscallRef::Name("openat".into()),
                prefixes: vec!["/etc".into()],
                arg_index: 1,
            }],
            ..x86_config()
        };
        let (pipeline, rx) = pipeline(config);
        let memory: CapturedStrings = [
            (0x1000, "/etc/shadow".to_string()),
            (0x2000, "/tmp/x".to_string()),
        ]
        .into_iter()
        .collect();

        let res = pipeline.process(event(x86_64::OPENAT, [0, 0x1000, 0, 0, 0, 0], false, 3), &memory);
        assert!(matches!(res, Err(DropReason::PrefixMatch { .. })));

        let res = pipeline.process(event(x86_64::OPENAT, [0, 0x2000, 0, 0, 0, 0], false, 3), &memory);
        assert_eq!(res, Ok(x86_64::OPENAT));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_missing_handler_drops() {
        let snapshot = ConfigSnapshot::from_config(&x86_config()).unwrap();
        let pipeline = ExitPipeline::new(SharedConfig::new(snapshot));
        let res = pipeline.process(event(0, [0; 6], false, 0), &CapturedStrings::new());
        assert_eq!(res, Err(DropReason::NoHandler));
    }

    #[test]
    fn test_external_sampler_overrides_config() {
        struct SkipAll;
        impl Sampler for SkipAll {
            fn sample_out(&self, _id: u32, _direction: Direction) -> bool {
                true
            }
        }

        let (pipeline, _rx) = pipeline(x86_config());
        let pipeline = pipeline.with_sampler(Arc::new(SkipAll));
        let res = pipeline.process(event(0, [0; 6], false, 0), &CapturedStrings::new());
        assert_eq!(res, Err(DropReason::SampledOut));
    }

    #[test]
    fn test_reload_applies_to_next_event() {
        let (pipeline, _rx) = pipeline(x86_config());
        let memory = CapturedStrings::new();
        assert!(pipeline.process(event(0, [0; 6], false, -1), &memory).is_ok());

        let config = AgentConfig {
            drop_failed: true,
            ..x86_config()
        };
        pipeline
            .config()
            .store(ConfigSnapshot::from_config(&config).unwrap());
        assert_eq!(
            pipeline.process(event(0, [0; 6], false, -1), &memory),
            Err(DropReason::Failed)
        );
    }
}
