//! Per-syscall handler table
//!
//! Handlers are indexed by canonical syscall id. An event whose id has no
//! handler, or lies outside the table, is dropped.

use std::fmt;
use std::sync::{mpsc, Arc};

use syscap_shared::pipeline::{DropReason, Flow};
use syscap_shared::syscalls::syscall_name;
use syscap_shared::types::events::SyscallEvent;
use tracing::debug;

use crate::error::DispatchError;

/// Receives events that made it through the exit pipeline.
pub trait SyscallHandler: Send + Sync {
    fn handle(&self, event: SyscallEvent);
}

impl<F> SyscallHandler for F
where
    F: Fn(SyscallEvent) + Send + Sync,
{
    fn handle(&self, event: SyscallEvent) {
        self(event)
    }
}

/// Forwards events into a channel for a consumer on another thread.
#[derive(Debug, Clone)]
pub struct ChannelHandler(pub mpsc::SyncSender<SyscallEvent>);

impl SyscallHandler for ChannelHandler {
    fn handle(&self, event: SyscallEvent) {
        // receiver gone means the session is shutting down
        let _ = self.0.send(event);
    }
}

pub struct DispatchTable {
    handlers: Vec<Option<Arc<dyn SyscallHandler>>>,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("range", &self.handlers.len())
            .field("registered", &self.registered().count())
            .finish()
    }
}

impl DispatchTable {
    pub fn new(range: u32) -> Self {
        Self {
            handlers: vec![None; range as usize],
        }
    }

    pub fn range(&self) -> u32 {
        self.handlers.len() as u32
    }

    pub fn register(&mut self, id: u32, handler: Arc<dyn SyscallHandler>) -> Result<(), DispatchError> {
        let size = self.handlers.len() as u32;
        let slot = self
            .handlers
            .get_mut(id as usize)
            .ok_or(DispatchError::OutOfRange { id, size })?;
        debug!(
            "Registered handler for {} ({})",
            syscall_name(id).unwrap_or("?"),
            id
        );
        *slot = Some(handler);
        Ok(())
    }

    pub fn unregister(&mut self, id: u32) -> bool {
        self.handlers
            .get_mut(id as usize)
            .and_then(Option::take)
            .is_some()
    }

    pub fn is_registered(&self, id: u32) -> bool {
        matches!(self.handlers.get(id as usize), Some(Some(_)))
    }

    /// Registered ids in ascending order.
    pub fn registered(&self) -> impl Iterator<Item = u32> + '_ {
        self.handlers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_some())
            .map(|(id, _)| id as u32)
    }

    /// Hand `event` to the handler for `id`.
    pub fn dispatch(&self, id: u32, event: SyscallEvent) -> Flow<()> {
        match self.handlers.get(id as usize) {
            Some(Some(handler)) => {
                handler.handle(event);
                Ok(())
            }
            _ => Err(DropReason::NoHandler),
        }
    }
}
