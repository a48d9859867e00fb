//! Offline replay of recorded syscall exits
//!
//! Input is JSON lines, one [`ReplayRecord`] per line: a [`SyscallEvent`] plus
//! the user strings its pointer arguments referenced at capture time. Every
//! record runs through the exit pipeline and the suppression engine; kept
//! events are written back out as JSON lines.

use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use syscap_shared::types::events::SyscallEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::dispatch::ChannelHandler;
use crate::memory::CapturedStrings;
use crate::metrics;
use crate::pipeline::ExitPipeline;
use crate::snapshot::{ConfigSnapshot, SharedConfig};
use crate::suppress::{Suppressor, Verdict};

/// A user string observed at `addr`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedString {
    pub addr: u64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    #[serde(flatten)]
    pub event: SyscallEvent,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_strings: Vec<CapturedString>,
}

impl ReplayRecord {
    fn memory(&self) -> CapturedStrings {
        self.user_strings
            .iter()
            .map(|s| (s.addr, s.value.clone()))
            .collect()
    }
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub records: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub dispatched: u64,
    pub suppressed: u64,
    pub written: u64,
}

/// Replay `input` and write kept events to `output`.
pub async fn run_replay<R, W>(config: &AgentConfig, input: R, mut output: W) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let snapshot = ConfigSnapshot::from_config(config).context("Invalid configuration")?;
    let interesting: Vec<u32> = snapshot.interesting_ids().collect();

    let mut pipeline = ExitPipeline::new(SharedConfig::new(snapshot));
    let mut suppressor = Suppressor::from_config(&config.suppress);

    // One record dispatches at most one event, drained right after.
    let (tx, rx) = mpsc::sync_channel(1);
    let handler = Arc::new(ChannelHandler(tx));
    let range = pipeline.dispatch().range();
    for id in interesting.into_iter().filter(|&id| id < range) {
        pipeline.dispatch_mut().register(id, handler.clone())?;
    }
    info!(
        "Replaying with {} registered syscalls",
        pipeline.dispatch().registered().count()
    );

    let mut stats = ReplayStats::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.records += 1;

        let record: ReplayRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed record {}: {}", stats.records, e);
                stats.malformed += 1;
                continue;
            }
        };

        let memory = record.memory();
        if let Err(reason) = pipeline.process(record.event, &memory) {
            debug!("Record {} dropped: {}", stats.records, reason.as_str());
            stats.dropped += 1;
            continue;
        }
        stats.dispatched += 1;

        for event in rx.try_iter() {
            if suppressor.process_event(&event, event.devid) == Verdict::Drop {
                stats.suppressed += 1;
                continue;
            }
            let mut json = serde_json::to_vec(&event)?;
            json.push(b'\n');
            output.write_all(&json).await?;
            stats.written += 1;
        }
    }
    output.flush().await?;
    metrics::SUPPRESSED_TIDS.set(suppressor.num_suppressed_tids() as f64);

    info!(
        "Replay finished: {} records, {} dispatched, {} suppressed, {} written",
        stats.records, stats.dispatched, stats.suppressed, stats.written
    );
    debug!(
        "Suppression totals: {} events, {} tids",
        suppressor.num_suppressed_events(),
        suppressor.num_suppressed_tids()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_parses_flattened_event() {
        let line = r#"{"timestamp":5,"pid":1,"tid":2,"regs":{"syscall_id":257,"args":[0,4096,0,0,0,0]},"return_value":3,"comm":"cat","user_strings":[{"addr":4096,"value":"/etc/hosts"}]}"#;
        let record: ReplayRecord = serde_json::from_str(line).unwrap();
        assert_eq!(record.event.tid, 2);
        assert_eq!(record.event.comm.as_deref(), Some("cat"));
        assert_eq!(record.user_strings.len(), 1);
        assert!(!record.memory().is_empty());
    }

    #[tokio::test]
    async fn test_replay_counts() {
        let input = concat!(
            r#"{"timestamp":1,"pid":1,"tid":1,"regs":{"syscall_id":0},"return_value":0}"#,
            "\n",
            "not json\n",
            "\n",
            r#"{"timestamp":2,"pid":1,"tid":1,"regs":{"syscall_id":600},"return_value":0}"#,
            "\n",
        );
        let mut out = Vec::new();
        let stats = run_replay(&AgentConfig::default(), input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(stats.records, 3);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.dispatched, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
