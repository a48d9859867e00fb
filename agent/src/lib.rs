//! Syscall exit capture agent
//!
//! This library provides the userspace half of syscap: configuration, the
//! exit pipeline and dispatch table, the suppression engine, and loading of
//! the kernel-side exit program.

pub mod config;
pub mod dispatch;
pub mod ebpf;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod pipeline;
pub mod replay;
pub mod snapshot;
pub mod suppress;

pub use config::AgentConfig;
pub use dispatch::{DispatchTable, SyscallHandler};
pub use pipeline::ExitPipeline;
pub use replay::{run_replay, ReplayStats};
pub use snapshot::{ConfigSnapshot, SharedConfig};
pub use suppress::{Suppressor, Verdict};

use std::path::Path;

use anyhow::{Context, Result};
use syscap_shared::types::events::{DevId, SyscallEvent};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events buffered between the per-CPU readers and the suppression engine
const EVENT_QUEUE: usize = 4096;

/// Attach the kernel exit pipeline and stream kept events to stdout until
/// Ctrl-C. SIGHUP reloads the configuration file into the kernel maps.
pub async fn run_attach(config_path: Option<&Path>, object: Option<&Path>) -> Result<()> {
    use aya::util::online_cpus;
    use bytes::BytesMut;
    use syscap_shared::maps::ExitRecord;
    use tokio::signal::unix::{signal, SignalKind};

    let config = AgentConfig::load(config_path).context("Failed to load configuration")?;
    let snapshot = ConfigSnapshot::from_config(&config)?;

    let mut tracer = ebpf::ExitTracer::new(object)?;
    tracer.apply(&snapshot)?;

    let mut perf_array = tracer.take_events()?;
    let (tx, rx) = mpsc::channel::<SyscallEvent>(EVENT_QUEUE);

    let cpus = online_cpus().map_err(|(msg, e)| anyhow::anyhow!("{}: {}", msg, e))?;
    let mut handles = Vec::new();

    for cpu_id in cpus {
        let mut buf = perf_array.open(cpu_id, None)?;
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            let mut buffers = (0..10)
                .map(|_| BytesMut::with_capacity(core::mem::size_of::<ExitRecord>() + 64))
                .collect::<Vec<_>>();

            loop {
                let events = match buf.read_events(&mut buffers).await {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("Perf buffer on CPU {} failed: {}", cpu_id, e);
                        break;
                    }
                };
                if events.lost > 0 {
                    warn!("Lost {} events on CPU {}", events.lost, cpu_id);
                }
                for buf_ref in buffers.iter().take(events.read) {
                    if buf_ref.len() < core::mem::size_of::<ExitRecord>() {
                        continue;
                    }
                    let record =
                        unsafe { (buf_ref.as_ptr() as *const ExitRecord).read_unaligned() };
                    if tx.send(record.into_event(cpu_id as DevId)).await.is_err() {
                        return;
                    }
                }
            }
        }));
    }
    drop(tx);

    let suppressor = Suppressor::from_config(&config.suppress);
    let consumer = tokio::spawn(consume_events(rx, suppressor, tokio::io::stdout()));

    tracer.start()?;
    info!(
        "Tracing {} syscalls, press Ctrl-C to stop",
        tracer.handlers().count()
    );

    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
            _ = hangup.recv() => {
                info!("Reloading configuration");
                let reloaded = AgentConfig::load(config_path)
                    .and_then(|config| ConfigSnapshot::from_config(&config));
                match reloaded {
                    Ok(snapshot) => tracer.apply(&snapshot)?,
                    Err(e) => warn!("Keeping previous configuration: {}", e),
                }
            }
        }
    }

    // Cleanup
    for handle in &handles {
        handle.abort();
    }
    for handle in handles {
        let _ = handle.await;
    }
    drop(tracer);

    let suppressor = consumer.await??;
    info!(
        "Suppressed {} events from {} threads",
        suppressor.num_suppressed_events(),
        suppressor.num_suppressed_tids()
    );
    Ok(())
}

/// Run dispatched events through the suppression engine and write the kept
/// ones as JSON lines. Returns the engine once the channel closes.
pub async fn consume_events<W>(
    mut rx: mpsc::Receiver<SyscallEvent>,
    mut suppressor: Suppressor,
    mut output: W,
) -> Result<Suppressor>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        metrics::EXIT_DISPATCHED.inc();
        let verdict = suppressor.process_event(&event, event.devid);
        metrics::SUPPRESSED_TIDS.set(suppressor.num_suppressed_tids() as f64);
        if verdict == Verdict::Drop {
            continue;
        }
        let mut json = serde_json::to_vec(&event)?;
        json.push(b'\n');
        output.write_all(&json).await?;
    }
    output.flush().await?;
    debug!("Event channel closed");
    Ok(suppressor)
}
