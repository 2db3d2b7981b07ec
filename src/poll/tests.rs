use super::*;
use crate::remote::RequestKind;
use crate::test_support::{FakeClock, FakeRemote, http_error};
use std::rc::Rc;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn settings(deadline: u64, interval: u64) -> PollSettings {
    PollSettings {
        deadline: secs(deadline),
        interval: secs(interval),
    }
}

fn target(seed_commits: u64) -> PollTarget {
    PollTarget {
        branch: "task-1".to_string(),
        base: "main".to_string(),
        seed_commits,
        own_request: None,
    }
}

fn remote() -> FakeRemote {
    let remote = FakeRemote::with_main("aaa111");
    remote.set_branch("task-1", "aaa111");
    remote
}

#[test]
fn done_when_pull_request_appears_on_third_sample() {
    let remote = remote();
    remote.open_pull_on_call(3, "task-1", "main");
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(1), settings(10, 3), &clock);

    assert_eq!(state.phase, PollPhase::Done);
    assert_eq!(state.elapsed_secs, 9);
    assert_eq!(state.samples, 3);
    assert_eq!(state.pull_request_open, Some(true));
    assert_eq!(clock.sleeps(), vec![secs(3), secs(3), secs(3)]);
}

#[test]
fn done_when_branch_moves_past_seed_commits() {
    let remote = remote();
    remote.set_ahead("task-1", 2);
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(1), settings(60, 5), &clock);

    assert!(state.is_done());
    assert_eq!(state.ahead_by, Some(2));
    assert_eq!(state.samples, 1);
}

#[test]
fn seed_commit_alone_is_not_completion() {
    let remote = remote();
    remote.set_ahead("task-1", 1);
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(1), settings(10, 3), &clock);

    assert_eq!(state.phase, PollPhase::TimedOut);
    assert_eq!(state.ahead_by, Some(1));
}

#[test]
fn own_pull_request_does_not_count() {
    let remote = remote();
    let own = remote.open_pull("task-1", "main", "[baton] add logging", &["baton"]);
    let clock = FakeClock::new();
    let mut target = target(1);
    target.own_request = Some(RemoteRequest {
        kind: RequestKind::PullRequest,
        number: own,
        url: "https://github.com/acme/widgets/pull/1".to_string(),
        branch: Some("task-1".to_string()),
    });

    let state = poll_until_done(&remote, &target, settings(6, 3), &clock);

    assert_eq!(state.phase, PollPhase::TimedOut);
    assert_eq!(state.pull_request_open, Some(false));
}

#[test]
fn times_out_at_deadline_with_final_short_sleep() {
    let remote = remote();
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(0), settings(10, 3), &clock);

    assert_eq!(state.phase, PollPhase::TimedOut);
    assert_eq!(state.elapsed_secs, 10);
    assert_eq!(clock.sleeps(), vec![secs(3), secs(3), secs(3), secs(1)]);
    assert_eq!(remote.calls("compare"), 4);
}

#[test]
fn failed_samples_do_not_abort_the_wait() {
    let remote = remote();
    remote.fail("compare", 2, http_error(502, "Bad Gateway"));
    remote.set_ahead("task-1", 3);
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(1), settings(30, 5), &clock);

    assert!(state.is_done());
    assert_eq!(state.failed_samples, 2);
    assert_eq!(state.samples, 3);
    assert!(state.last_error.is_none());
}

#[test]
fn persistent_failures_end_in_timeout_with_last_error() {
    let remote = remote();
    remote.fail("compare", 100, http_error(503, "Service Unavailable"));
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(0), settings(9, 3), &clock);

    assert_eq!(state.phase, PollPhase::TimedOut);
    assert_eq!(state.failed_samples, 3);
    assert!(state.last_error.unwrap().contains("503"));
}

#[test]
fn returns_within_deadline_plus_interval_for_any_settings() {
    // Per-call latency stays under half the interval; each sample makes two calls.
    for (deadline, interval, latency) in [(10, 3, 0), (10, 10, 2), (7, 2, 1), (1, 1, 0), (100, 30, 10)] {
        let clock = Rc::new(FakeClock::new());
        let remote = remote().with_latency(Rc::clone(&clock), secs(latency));

        let state = poll_until_done(&remote, &target(5), settings(deadline, interval), &*clock);

        assert_eq!(state.phase, PollPhase::TimedOut);
        assert!(
            clock.elapsed() <= secs(deadline + interval),
            "deadline={} interval={} latency={} returned at {:?}",
            deadline,
            interval,
            latency,
            clock.elapsed()
        );
    }
}

#[test]
fn poller_never_writes_to_the_remote() {
    let remote = remote();
    remote.open_pull_on_call(2, "task-1", "main");
    let clock = FakeClock::new();

    poll_until_done(&remote, &target(1), settings(10, 3), &clock);

    for op in [
        "create_branch_ref",
        "put_content",
        "create_pull_request",
        "create_issue",
        "add_labels",
        "post_comment",
        "merge_pull_request",
    ] {
        assert_eq!(remote.calls(op), 0, "{} must not be called", op);
    }
}

#[test]
fn overrides_cap_interval_at_deadline() {
    let settings = settings(600, 30).with_overrides(Some(20), Some(45));
    assert_eq!(settings.deadline, secs(20));
    assert_eq!(settings.interval, secs(20));
}

#[test]
fn zero_interval_override_is_raised_to_minimum() {
    let settings = settings(600, 30).with_overrides(Some(10), Some(0));
    assert_eq!(settings.deadline, secs(10));
    assert_eq!(settings.interval, MIN_POLL_INTERVAL);
}

#[test]
fn zero_interval_still_paces_samples_and_terminates() {
    let remote = remote();
    let clock = FakeClock::new();

    let state = poll_until_done(&remote, &target(1), settings(5, 0), &clock);

    assert_eq!(state.phase, PollPhase::TimedOut);
    assert_eq!(state.samples, 5);
    assert_eq!(clock.sleeps(), vec![MIN_POLL_INTERVAL; 5]);
}

#[test]
fn next_steps_point_at_branch_and_commands() {
    let remote = remote();
    let mut target = target(1);
    target.own_request = Some(RemoteRequest {
        kind: RequestKind::PullRequest,
        number: 7,
        url: "https://github.com/acme/widgets/pull/7".to_string(),
        branch: Some("task-1".to_string()),
    });

    let steps = NextSteps::for_target(&remote, "https://github.com", &target);

    assert_eq!(steps.branch_url, "https://github.com/acme/widgets/tree/task-1");
    assert_eq!(
        steps.pull_request_url.as_deref(),
        Some("https://github.com/acme/widgets/pull/7")
    );
    assert!(steps.status_command.contains("--exclude-pr 7"));
    assert!(steps.sync_command.starts_with("baton sync --repo acme/widgets"));
}
