//! User memory access for the prefix filter
//!
//! [`ProcessMemory`] reads a live task's address space with
//! `process_vm_readv`; [`CapturedStrings`] serves strings recorded alongside a
//! replayed event.

use std::collections::BTreeMap;
use std::io::IoSliceMut;

use nix::sys::uio::{process_vm_readv, RemoteIoVec};
use nix::unistd::Pid;
use syscap_shared::pipeline::UserMemory;
use tracing::trace;

const PAGE_SIZE: u64 = 4096;

/// Address space of a running process
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemory {
    pid: Pid,
}

impl ProcessMemory {
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    fn read_chunk(&self, addr: u64, dst: &mut [u8]) -> Option<usize> {
        let remote = [RemoteIoVec {
            base: addr as usize,
            len: dst.len(),
        }];
        let mut local = [IoSliceMut::new(dst)];
        match process_vm_readv(self.pid, &mut local, &remote) {
            Ok(n) if n > 0 => Some(n),
            Ok(_) => None,
            Err(e) => {
                trace!("process_vm_readv({}, {:#x}) failed: {}", self.pid, addr, e);
                None
            }
        }
    }
}

impl UserMemory for ProcessMemory {
    fn read_user_str(&self, addr: u64, buf: &mut [u8]) -> Option<usize> {
        let cap = buf.len().checked_sub(1)?;
        buf.fill(0);
        if addr == 0 {
            return None;
        }

        // Chunks never cross a page so a valid string next to an unmapped
        // page still reads.
        let mut len = 0;
        while len < cap {
            let cursor = addr + len as u64;
            let to_page_end = (PAGE_SIZE - cursor % PAGE_SIZE) as usize;
            let want = to_page_end.min(cap - len);

            let Some(n) = self.read_chunk(cursor, &mut buf[len..len + want]) else {
                if len == 0 {
                    return None;
                }
                break;
            };
            if let Some(nul) = buf[len..len + n].iter().position(|&b| b == 0) {
                len += nul;
                buf[len..].fill(0);
                return Some(len);
            }
            len += n;
        }
        buf[len..].fill(0);
        Some(len)
    }
}

/// Strings captured at known addresses, standing in for a task's memory
#[derive(Debug, Clone, Default)]
pub struct CapturedStrings {
    strings: BTreeMap<u64, String>,
}

impl CapturedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: u64, value: impl Into<String>) {
        self.strings.insert(addr, value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl FromIterator<(u64, String)> for CapturedStrings {
    fn from_iter<I: IntoIterator<Item = (u64, String)>>(iter: I) -> Self {
        Self {
            strings: iter.into_iter().collect(),
        }
    }
}

impl UserMemory for CapturedStrings {
    fn read_user_str(&self, addr: u64, buf: &mut [u8]) -> Option<usize> {
        let cap = buf.len().checked_sub(1)?;
        // pointers into the middle of a captured string are valid too
        let (&start, value) = self.strings.range(..=addr).next_back()?;
        let bytes = value.as_bytes();
        let offset = (addr - start) as usize;
        if offset > bytes.len() {
            return None;
        }

        let tail = &bytes[offset..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(tail.len())
            .min(cap);
        buf.fill(0);
        buf[..len].copy_from_slice(&tail[..len]);
        Some(len)
    }
}
