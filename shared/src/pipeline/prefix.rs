use super::{DropReason, ExitTables, Flow, SyscallRegs, UserMemory};
use crate::filter::{UserPath, PREFIX_LEN};

/// Outcome of a prefix filter that let the event through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixPass {
    /// No filter entry, or an unrestricted one
    Unfiltered,
    /// The string argument could not be read; treated as no match
    Unreadable,
    /// Checked against every prefix without a match
    Sent(UserPath),
}

/// Bytewise prefix comparison over at most `PREFIX_LEN` bytes.
///
/// A NUL on either side ends the comparison as a match, so a path shorter
/// than the prefix also matches. Only a differing byte before either
/// terminator rejects.
pub fn prefix_matches(prefix: &[u8; PREFIX_LEN], path: &[u8; PREFIX_LEN]) -> bool {
    for i in 0..PREFIX_LEN {
        let (p, c) = (prefix[i], path[i]);
        if p == 0 || c == 0 {
            break;
        }
        if p != c {
            return false;
        }
    }
    true
}

/// Drop the event if its string argument starts with a configured prefix.
pub fn check_prefix_filter<R, T, M>(
    id: u32,
    regs: &R,
    tables: &T,
    memory: &M,
    max_prefixes: usize,
) -> Flow<PrefixPass>
where
    R: SyscallRegs,
    T: ExitTables,
    M: UserMemory,
{
    let Some(filter) = tables.filter_for(id) else {
        return Ok(PrefixPass::Unfiltered);
    };
    if filter.is_unrestricted() {
        return Ok(PrefixPass::Unfiltered);
    }

    let addr = regs.arg(filter.arg_index as usize);
    let mut buf = [0u8; PREFIX_LEN];
    let Some(len) = memory.read_user_str(addr, &mut buf) else {
        return Ok(PrefixPass::Unreadable);
    };
    let path = UserPath::new(buf, len);

    for prefix in filter.prefixes.iter().take(filter.prefix_limit(max_prefixes)) {
        if prefix[0] == 0 {
            break;
        }
        if prefix_matches(prefix, path.raw()) {
            return Err(DropReason::PrefixMatch { path });
        }
    }
    Ok(PrefixPass::Sent(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterMapEntry;
    use crate::pipeline::testing::{Memory, Regs, Tables};

    const OPENAT: u32 = 257;

    fn padded(s: &str) -> [u8; PREFIX_LEN] {
        let mut buf = [0u8; PREFIX_LEN];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    fn setup(prefixes: &[&str]) -> (Regs, Tables, Memory) {
        let regs = Regs {
            id: OPENAT,
            args: [0x10, 0, 0, 0, 0, 0],
            ..Default::default()
        };
        let mut tables = Tables::default();
        tables
            .filters
            .insert(OPENAT, FilterMapEntry::from_prefixes(prefixes, 0));
        let memory = Memory(
            [(0x10, "/etc/passwd"), (0x20, "/home/x"), (0x30, "/et")]
                .into_iter()
                .collect(),
        );
        (regs, tables, memory)
    }

    #[test]
    fn test_prefix_matches() {
        assert!(prefix_matches(&padded("/etc"), &padded("/etc/passwd")));
        assert!(!prefix_matches(&padded("/proc"), &padded("/etc/passwd")));
        // shorter path is still a match
        assert!(prefix_matches(&padded("/etc"), &padded("/et")));
        assert!(prefix_matches(&padded("/etc"), &padded("")));
    }

    #[test]
    fn test_matching_prefix_drops() {
        let (regs, tables, memory) = setup(&["/etc", "/proc"]);
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        match res {
            Err(DropReason::PrefixMatch { path }) => assert_eq!(path.to_string(), "/etc/passwd"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_matching_path_is_sent() {
        let (mut regs, tables, memory) = setup(&["/etc", "/proc"]);
        regs.args[0] = 0x20;
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        assert!(matches!(res, Ok(PrefixPass::Sent(p)) if p.as_bytes() == b"/home/x"));
    }

    #[test]
    fn test_empty_first_slot_is_unrestricted() {
        let (regs, mut tables, memory) = setup(&[]);
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        assert_eq!(res, Ok(PrefixPass::Unfiltered));

        // A stale count does not matter once the first slot is empty
        tables.filters.get_mut(&OPENAT).unwrap().num_prefixes = 3;
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        assert_eq!(res, Ok(PrefixPass::Unfiltered));
    }

    #[test]
    fn test_no_entry_passes() {
        let (regs, tables, memory) = setup(&["/etc"]);
        let res = check_prefix_filter(OPENAT + 1, &regs, &tables, &memory, 12);
        assert_eq!(res, Ok(PrefixPass::Unfiltered));
    }

    #[test]
    fn test_unreadable_string_passes() {
        let (mut regs, tables, memory) = setup(&["/etc"]);
        regs.args[0] = 0xdead;
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        assert_eq!(res, Ok(PrefixPass::Unreadable));
    }

    #[test]
    fn test_cap_limits_consulted_prefixes() {
        let (regs, tables, memory) = setup(&["/a", "/b", "/etc"]);
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 2);
        assert!(matches!(res, Ok(PrefixPass::Sent(_))));

        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 3);
        assert!(matches!(res, Err(DropReason::PrefixMatch { .. })));
    }

    #[test]
    fn test_empty_sentinel_stops_iteration() {
        let (regs, mut tables, memory) = setup(&["/a"]);
        let entry = tables.filters.get_mut(&OPENAT).unwrap();
        // slot 1 empty, slot 2 would match
        entry.prefixes[2] = padded("/etc");
        entry.num_prefixes = 3;
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        assert!(matches!(res, Ok(PrefixPass::Sent(_))));
    }

    #[test]
    fn test_arg_index_selects_pointer() {
        let (mut regs, mut tables, memory) = setup(&["/etc"]);
        regs.args = [0x20, 0x10, 0, 0, 0, 0];
        tables.filters.get_mut(&OPENAT).unwrap().arg_index = 1;
        let res = check_prefix_filter(OPENAT, &regs, &tables, &memory, 12);
        assert!(matches!(res, Err(DropReason::PrefixMatch { .. })));
    }
}
