//! Running kernel version and the struct offsets that depend on it

use anyhow::{Context, Result};
use nix::sys::utsname::uname;

/// `thread_info.status` before 5.11: after `flags`
const STATUS_OFFSET_LEGACY: u32 = 8;
/// 5.11 added `syscall_work` ahead of `status`
const STATUS_OFFSET: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl KernelVersion {
    pub fn detect() -> Result<Self> {
        let info = uname().context("Getting kernel version calling uname() failed")?;
        let release = info
            .release()
            .to_str()
            .context("Kernel release from uname contained invalid characters")?;
        Self::parse_release(release)
    }

    /// Parse "major.minor.patch[suffix]" as found in `uname -r`.
    pub fn parse_release(value: &str) -> Result<Self> {
        let parse = |value: &str| -> Option<Self> {
            let mut items = value.split('.');
            Some(Self {
                major: items.next()?.parse().ok()?,
                minor: items.next()?.parse().ok()?,
                patch: items.next().map(leading_u32).unwrap_or(0),
            })
        };
        parse(value).with_context(|| format!("Invalid kernel release: {value}"))
    }

    /// Offset of `thread_info.status` inside `task_struct` on x86_64.
    ///
    /// `thread_info` is the first member of `task_struct` on every kernel
    /// with BTF tracepoints.
    pub fn thread_status_offset(&self) -> u32 {
        if (self.major, self.minor) >= (5, 11) {
            STATUS_OFFSET
        } else {
            STATUS_OFFSET_LEGACY
        }
    }
}

fn leading_u32(value: &str) -> u32 {
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release() {
        assert_eq!(
            KernelVersion::parse_release("6.1.8-arch1-1").unwrap(),
            KernelVersion {
                major: 6,
                minor: 1,
                patch: 8
            }
        );
        assert_eq!(KernelVersion::parse_release("5.15").unwrap().patch, 0);
        assert!(KernelVersion::parse_release("linux").is_err());
    }

    #[test]
    fn test_thread_status_offset() {
        let offset = |release| {
            KernelVersion::parse_release(release)
                .unwrap()
                .thread_status_offset()
        };
        assert_eq!(offset("5.10.0-28-amd64"), 8);
        assert_eq!(offset("5.11.0"), 16);
        assert_eq!(offset("6.8.0-45-generic"), 16);
    }
}
