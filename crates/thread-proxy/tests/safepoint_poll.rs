//! Integration tests for safepoint polling.
//!
//! A mutator thread runs a polling loop while a controller suspends and
//! resumes it, checking that the mutator parks, gives up the mutator lock
//! and makes no progress until released.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thread_proxy::test_util::{wait_until, InstrumentedLock, RecordingHooks};
use thread_proxy::{ExecutionState, RequestFlags, SuspensionConfig, ThreadProxy};

const TIMEOUT: Duration = Duration::from_secs(10);

fn proxy(hooks: &Arc<RecordingHooks>, config: SuspensionConfig) -> Arc<ThreadProxy<InstrumentedLock>> {
    Arc::new(ThreadProxy::new(
        Arc::new(InstrumentedLock::new()),
        Arc::clone(hooks) as Arc<dyn thread_proxy::RuntimeHooks>,
        config,
    ))
}

fn spawn_mutator(
    proxy: &Arc<ThreadProxy<InstrumentedLock>>,
    progress: &Arc<AtomicU64>,
    stop: &Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    let proxy = Arc::clone(proxy);
    let progress = Arc::clone(progress);
    let stop = Arc::clone(stop);
    thread::spawn(move || {
        proxy.update_status(ExecutionState::Running);
        while !stop.load(Ordering::Acquire) {
            progress.fetch_add(1, Ordering::Relaxed);
            proxy.poll_safepoint();
        }
        proxy.update_status(ExecutionState::Finished);
    })
}

/// Suspend a running thread, observe it parked, resume it.
#[test]
fn test_suspend_running_thread_end_to_end() {
    let hooks = Arc::new(RecordingHooks::new());
    let proxy = proxy(&hooks, SuspensionConfig::default());
    let progress = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let mutator = spawn_mutator(&proxy, &progress, &stop);

    assert!(wait_until(TIMEOUT, || progress.load(Ordering::Relaxed) > 0));

    proxy.request_suspend(false);
    assert!(wait_until(TIMEOUT, || proxy.read_state()
        == ExecutionState::Suspended));
    assert_eq!(proxy.mutator_lock().shared_holder_count(), 0);
    assert_eq!(hooks.before_suspend_calls(), 1);

    let frozen = progress.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(progress.load(Ordering::Relaxed), frozen);
    assert_eq!(proxy.read_state(), ExecutionState::Suspended);

    proxy.request_resume(false);
    assert!(wait_until(TIMEOUT, || progress.load(Ordering::Relaxed) > frozen));
    assert!(!proxy.is_user_suspended());

    stop.store(true, Ordering::Release);
    mutator.join().unwrap();

    assert!(!proxy.is_alive());
    assert_eq!(proxy.mutator_lock().shared_holder_count(), 0);
    let metrics = proxy.metrics();
    assert_eq!(metrics.suspensions, 1);
    assert!(metrics.safepoints_taken >= 1);
}

/// A thread suspended several times parks once per request.
#[test]
fn test_repeated_suspensions() {
    let hooks = Arc::new(RecordingHooks::new());
    let proxy = proxy(&hooks, SuspensionConfig::default());
    let progress = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));
    let mutator = spawn_mutator(&proxy, &progress, &stop);

    for round in 1..=5 {
        proxy.request_suspend(true);
        assert!(wait_until(TIMEOUT, || proxy.read_state()
            == ExecutionState::Suspended));
        proxy.request_resume(true);
        assert!(wait_until(TIMEOUT, || proxy.read_state()
            == ExecutionState::Running));
        assert_eq!(hooks.before_suspend_calls(), round);
    }

    stop.store(true, Ordering::Release);
    mutator.join().unwrap();
    assert_eq!(proxy.metrics().suspensions, 5);
}

/// A safepoint request runs the hook without parking.
#[test]
fn test_safepoint_request_runs_hook() {
    let hooks = Arc::new(RecordingHooks::new());
    let proxy = proxy(&hooks, SuspensionConfig::default());
    proxy.update_status(ExecutionState::Running);

    proxy.poll_safepoint();
    assert_eq!(hooks.safepoints(), 0);

    proxy.request_safepoint();
    proxy.poll_safepoint();
    assert_eq!(hooks.safepoints(), 1);
    assert_eq!(hooks.last_flags(), RequestFlags::SAFEPOINT_REQUEST);
    assert_eq!(proxy.read_state(), ExecutionState::Running);

    proxy.clear_safepoint_request();
    proxy.poll_safepoint();
    assert_eq!(hooks.safepoints(), 1);
    assert_eq!(hooks.before_suspend_calls(), 0);

    proxy.update_status(ExecutionState::Finished);
}

/// Flags equal to the baseline are not a pending request.
#[test]
fn test_baseline_flags_do_not_trigger_slow_path() {
    let hooks = Arc::new(RecordingHooks::new());
    let config = SuspensionConfig::new().with_run_gc_every_safepoint(true);
    let proxy = proxy(&hooks, config);
    assert_eq!(proxy.baseline_flags(), RequestFlags::SAFEPOINT_REQUEST);

    proxy.update_status(ExecutionState::Running);
    for _ in 0..100 {
        proxy.poll_safepoint();
    }
    assert_eq!(hooks.safepoints(), 0);
    assert_eq!(proxy.metrics().safepoints_taken, 0);

    // Anything beyond the baseline is.
    proxy.request_runtime_termination();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        proxy.poll_safepoint();
    }));
    assert!(result.is_err());
    assert_eq!(hooks.safepoints(), 1);
    assert!(hooks
        .last_flags()
        .contains(RequestFlags::RUNTIME_TERMINATION_REQUEST));
}

/// A thread parked in a native state returns to that state, not `Running`.
#[test]
fn test_wait_restores_previous_state() {
    let hooks = Arc::new(RecordingHooks::new());
    let proxy = proxy(&hooks, SuspensionConfig::default());
    proxy.update_status(ExecutionState::Native);
    proxy.request_suspend(true);

    let parked = {
        let proxy = Arc::clone(&proxy);
        thread::spawn(move || proxy.wait_for_suspension())
    };
    assert!(wait_until(TIMEOUT, || proxy.read_state()
        == ExecutionState::Suspended));

    proxy.request_resume(true);
    parked.join().unwrap();
    assert_eq!(proxy.read_state(), ExecutionState::Native);
    assert_eq!(proxy.mutator_lock().shared_holder_count(), 0);
}

/// The hook may itself raise requests on other threads.
#[test]
fn test_hook_can_request_on_other_thread() {
    struct Forwarding {
        other: Arc<ThreadProxy>,
    }

    impl thread_proxy::RuntimeHooks for Forwarding {
        fn safepoint(&self, _flags: RequestFlags) {
            self.other.request_suspend(true);
            self.other.request_resume(true);
        }
    }

    let other: Arc<ThreadProxy> = Arc::new(ThreadProxy::new(
        Arc::new(thread_proxy::new_mutator_lock()),
        Arc::new(thread_proxy::NoopHooks),
        SuspensionConfig::default(),
    ));
    let proxy: ThreadProxy = ThreadProxy::new(
        Arc::new(thread_proxy::new_mutator_lock()),
        Arc::new(Forwarding {
            other: Arc::clone(&other),
        }),
        SuspensionConfig::default(),
    );

    proxy.update_status(ExecutionState::Running);
    proxy.request_safepoint();
    proxy.poll_safepoint();
    assert_eq!(other.suspend_count(), 0);
    proxy.update_status(ExecutionState::Finished);
}
