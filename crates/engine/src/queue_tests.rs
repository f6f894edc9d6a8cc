use super::*;
use loom_core::PipelineId;
use yare::parameterized;

fn ident(n: u64) -> Ident {
    Ident::new(PipelineId::new("p"), n)
}

#[test]
fn restartable_runs_immediately_under_the_limit() {
    let mut q = Queue::new("q".into(), Concurrency::restartable(2));
    assert!(matches!(q.admit(ident(0)), Admission::Run));
    assert!(matches!(q.admit(ident(1)), Admission::Run));
}

#[test]
fn restartable_evicts_the_oldest_running_peer_at_the_limit() {
    let mut q = Queue::new("q".into(), Concurrency::restartable(1));
    assert!(matches!(q.admit(ident(0)), Admission::Run));
    match q.admit(ident(1)) {
        Admission::RestartOldest(old) => assert_eq!(old, ident(0)),
        other => panic!("expected RestartOldest, got {other:?}"),
    }
}

#[test]
fn enqueued_waits_behind_a_running_peer_then_starts_on_completion() {
    let mut q = Queue::new("q".into(), Concurrency::enqueued(1));
    assert!(matches!(q.admit(ident(0)), Admission::Run));
    assert!(matches!(q.admit(ident(1)), Admission::Wait));
    q.complete(&ident(0));
    assert_eq!(q.start_next(), Some(ident(1)));
    assert_eq!(q.start_next(), None);
}

#[test]
fn dropping_refuses_admission_at_the_limit() {
    let mut q = Queue::new("q".into(), Concurrency::dropping(1));
    assert!(matches!(q.admit(ident(0)), Admission::Run));
    assert!(matches!(q.admit(ident(1)), Admission::Drop));
}

#[test]
fn keep_latest_retains_only_the_newest_pending_member() {
    let mut q = Queue::new("q".into(), Concurrency::keep_latest(1));
    assert!(matches!(q.admit(ident(0)), Admission::Run));
    assert!(matches!(q.admit(ident(1)), Admission::KeepLatestEvict(ref v) if v.is_empty()));
    match q.admit(ident(2)) {
        Admission::KeepLatestEvict(evicted) => assert_eq!(evicted, vec![ident(1)]),
        other => panic!("expected KeepLatestEvict, got {other:?}"),
    }
    q.complete(&ident(0));
    assert_eq!(q.start_next(), Some(ident(2)));
}

#[parameterized(
    one = { 1 },
    three = { 3 },
)]
fn keep_latest_ignores_max_beyond_one_pending_slot(max: usize) {
    let mut q = Queue::new("q".into(), Concurrency::keep_latest(max));
    for n in 0..max as u64 {
        assert!(matches!(q.admit(ident(n)), Admission::Run));
    }
    match q.admit(ident(100)) {
        Admission::Wait | Admission::RestartOldest(_) => {
            panic!("keepLatest must never run or restart beyond its running ceiling")
        }
        _ => {}
    }
}
