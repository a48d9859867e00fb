use syscap_agent::config::SuppressConfig;
use syscap_agent::suppress::NO_DEVID;
use syscap_agent::{Suppressor, Verdict};
use syscap_shared::types::events::{DevId, RegisterSnapshot, SyscallEvent, Tid};

fn event(tid: Tid, comm: &str, devid: DevId) -> SyscallEvent {
    SyscallEvent {
        timestamp: 0,
        pid: tid,
        tid,
        regs: RegisterSnapshot::default(),
        syscall_id: Some(0),
        return_value: 0,
        devid,
        comm: Some(comm.to_string()),
    }
}

fn verdict(suppressor: &mut Suppressor, tid: Tid, comm: &str, devid: DevId) -> Verdict {
    suppressor.process_event(&event(tid, comm, devid), devid)
}

#[test]
fn test_suppressed_comm_sticks_to_tid() {
    let mut suppressor = Suppressor::new();
    suppressor.suppress_comm("bash");

    assert_eq!(verdict(&mut suppressor, 5, "bash", 1), Verdict::Drop);
    assert!(suppressor.is_suppressed_tid(5, 1));

    for (comm, devid) in [("python3", 1), ("ls", 2), ("bash", NO_DEVID)] {
        assert_eq!(verdict(&mut suppressor, 5, comm, devid), Verdict::Drop);
    }
    assert_eq!(verdict(&mut suppressor, 6, "ls", 2), Verdict::Keep);
}

#[test]
fn test_verdicts_are_stable_and_counted() {
    let mut suppressor = Suppressor::new();
    suppressor.suppress_comm("sshd");
    suppressor.suppress_tid(100);

    let stream = [
        (1, "sshd", 0),
        (2, "nginx", 0),
        (100, "nginx", 1),
        (1, "sshd", 0),
        (2, "nginx", 0),
        (3, "nginx", 1025),
        (1, "bash", 1),
    ];

    let first: Vec<Verdict> = stream
        .iter()
        .map(|&(tid, comm, devid)| verdict(&mut suppressor, tid, comm, devid))
        .collect();
    let second: Vec<Verdict> = stream
        .iter()
        .map(|&(tid, comm, devid)| verdict(&mut suppressor, tid, comm, devid))
        .collect();

    assert_eq!(first, second);
    let drops = first.iter().filter(|&&v| v == Verdict::Drop).count() as u64;
    assert_eq!(drops, 4);
    assert_eq!(suppressor.num_suppressed_events(), drops * 2);
    assert_eq!(suppressor.num_suppressed_tids(), 2);
}

#[test]
fn test_cache_never_contradicts_sets() {
    let mut cached = Suppressor::with_cache_slots(3);
    let mut uncached = Suppressor::new();
    for suppressor in [&mut cached, &mut uncached] {
        suppressor.suppress_comm("nc");
    }

    let comms = ["bash", "nc", "curl", "vim"];
    for step in 0..400u32 {
        let tid = (step * 7 % 13) as Tid;
        let comm = comms[(step * 5 % 4) as usize];
        let devid = (step % 5) as DevId;

        if step == 200 {
            cached.suppress_tid(4);
            uncached.suppress_tid(4);
        }

        let a = verdict(&mut cached, tid, comm, devid);
        let b = verdict(&mut uncached, tid, comm, NO_DEVID);
        assert_eq!(a, b, "step {} tid {} comm {}", step, tid, comm);
    }
    assert_eq!(cached.num_suppressed_events(), uncached.num_suppressed_events());
    assert_eq!(cached.num_suppressed_tids(), uncached.num_suppressed_tids());
}

#[test]
fn test_from_config_exclude_self() {
    let config = SuppressConfig {
        exclude_self: true,
        ..Default::default()
    };
    let mut suppressor = Suppressor::from_config(&config);
    let me = std::process::id() as Tid;
    assert_eq!(verdict(&mut suppressor, me, "syscap-agent", 9), Verdict::Drop);
    assert_eq!(verdict(&mut suppressor, me + 1, "syscap-agent", 9), Verdict::Keep);
}

#[test]
fn test_sessions_leave_tid_gauge_to_consumer() {
    let mut first = Suppressor::new();
    first.suppress_tid(1);
    first.suppress_tid(2);
    let mut second = Suppressor::new();
    second.suppress_comm("bash");
    assert_eq!(verdict(&mut second, 7, "bash", 0), Verdict::Drop);

    assert_eq!(first.num_suppressed_tids(), 2);
    assert_eq!(second.num_suppressed_tids(), 1);
    assert_eq!(syscap_agent::metrics::SUPPRESSED_TIDS.get(), 0.0);
}
