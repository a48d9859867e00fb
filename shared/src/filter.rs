//! Prefix filter map layout
//!
//! `FilterMapEntry` is shared verbatim with the kernel program, so it is
//! `#[repr(C)]`, fixed size and contains no pointers.

use core::fmt;

/// Bytes read from user memory and stored per prefix, NUL included.
pub const PREFIX_LEN: usize = 32;

/// Prefix slots stored per entry. The platform cap may consult fewer.
pub const FILTER_PREFIX_SLOTS: usize = 16;

/// Prefix filter for a single syscall id.
///
/// An empty first slot means the syscall is not restricted. Slots after the
/// first empty one are never consulted.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterMapEntry {
    pub prefixes: [[u8; PREFIX_LEN]; FILTER_PREFIX_SLOTS],
    pub num_prefixes: u32,
    /// Syscall argument holding the user string pointer
    pub arg_index: u32,
}

impl FilterMapEntry {
    pub const fn empty() -> Self {
        Self {
            prefixes: [[0; PREFIX_LEN]; FILTER_PREFIX_SLOTS],
            num_prefixes: 0,
            arg_index: 0,
        }
    }

    /// Build an entry from prefix strings.
    ///
    /// Prefixes beyond [`FILTER_PREFIX_SLOTS`] are ignored and each prefix is
    /// truncated to `PREFIX_LEN - 1` bytes so it stays NUL terminated.
    pub fn from_prefixes<I, P>(prefixes: I, arg_index: u32) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut entry = Self::empty();
        entry.arg_index = arg_index;
        for (slot, prefix) in entry
            .prefixes
            .iter_mut()
            .zip(prefixes.into_iter())
        {
            let bytes = prefix.as_ref();
            let len = bytes.len().min(PREFIX_LEN - 1);
            slot[..len].copy_from_slice(&bytes[..len]);
            entry.num_prefixes += 1;
        }
        entry
    }

    /// No prefix configured in the first slot.
    pub fn is_unrestricted(&self) -> bool {
        self.prefixes[0][0] == 0
    }

    /// Number of slots to consult under the given platform cap.
    pub fn prefix_limit(&self, max_prefixes: usize) -> usize {
        let configured = self.num_prefixes as usize;
        configured.min(max_prefixes).min(FILTER_PREFIX_SLOTS)
    }
}

impl Default for FilterMapEntry {
    fn default() -> Self {
        Self::empty()
    }
}

/// Bounded copy of a user string, at most `PREFIX_LEN - 1` bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UserPath {
    bytes: [u8; PREFIX_LEN],
    len: usize,
}

impl UserPath {
    /// Wrap a buffer filled by a user string read. `len` excludes the NUL.
    pub fn new(bytes: [u8; PREFIX_LEN], len: usize) -> Self {
        Self {
            bytes,
            len: len.min(PREFIX_LEN),
        }
    }

    /// Zero-padded buffer as compared against prefixes.
    pub fn raw(&self) -> &[u8; PREFIX_LEN] {
        &self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl fmt::Debug for UserPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPath({})", self)
    }
}

impl fmt::Display for UserPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for FilterMapEntry {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_prefixes() {
        let entry = FilterMapEntry::from_prefixes(["/etc", "/proc"], 1);
        assert_eq!(entry.num_prefixes, 2);
        assert_eq!(entry.arg_index, 1);
        assert_eq!(&entry.prefixes[0][..5], b"/etc\0");
        assert_eq!(&entry.prefixes[1][..6], b"/proc\0");
        assert!(!entry.is_unrestricted());
    }

    #[test]
    fn test_extra_prefixes_ignored() {
        let prefixes: Vec<String> = (0..20).map(|i| format!("/p{}", i)).collect();
        let entry = FilterMapEntry::from_prefixes(&prefixes, 0);
        assert_eq!(entry.num_prefixes as usize, FILTER_PREFIX_SLOTS);
        assert_eq!(entry.prefix_limit(12), 12);
        assert_eq!(entry.prefix_limit(64), FILTER_PREFIX_SLOTS);
    }

    #[test]
    fn test_long_prefix_stays_terminated() {
        let long = "x".repeat(64);
        let entry = FilterMapEntry::from_prefixes([long], 0);
        assert_eq!(entry.prefixes[0][PREFIX_LEN - 2], b'x');
        assert_eq!(entry.prefixes[0][PREFIX_LEN - 1], 0);
    }

    #[test]
    fn test_user_path_display() {
        let mut bytes = [0u8; PREFIX_LEN];
        bytes[..4].copy_from_slice(b"/tmp");
        let path = UserPath::new(bytes, 4);
        assert_eq!(path.to_string(), "/tmp");
        assert_eq!(path.as_bytes(), b"/tmp");
    }
}
