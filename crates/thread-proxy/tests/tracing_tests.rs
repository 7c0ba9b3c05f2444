//! Integration tests for the tracing feature.
//!
//! These tests run the suspension protocol under a tracing subscriber to
//! make sure spans and events are emitted without disturbing it.

#![cfg(feature = "tracing")]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use thread_proxy::test_util::wait_until;
use thread_proxy::{
    new_mutator_lock, stop_the_world, ExecutionState, NoopHooks, SuspensionConfig, ThreadProxy,
};

fn subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .finish()
}

#[test]
fn test_requests_with_tracing() {
    tracing::subscriber::with_default(subscriber(), || {
        let proxy: ThreadProxy = ThreadProxy::new(
            Arc::new(new_mutator_lock()),
            Arc::new(NoopHooks),
            SuspensionConfig::default(),
        );
        proxy.request_suspend(false);
        proxy.request_suspend(true);
        proxy.request_resume(true);
        proxy.request_resume(false);
        assert_eq!(proxy.suspend_count(), 0);
    });
}

#[test]
fn test_suspension_span_with_tracing() {
    let _guard = tracing::subscriber::set_default(subscriber());

    let proxy: Arc<ThreadProxy> = Arc::new(ThreadProxy::new(
        Arc::new(new_mutator_lock()),
        Arc::new(NoopHooks),
        SuspensionConfig::default(),
    ));
    let stop = Arc::new(AtomicBool::new(false));

    let mutator = {
        let proxy = Arc::clone(&proxy);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let _guard = tracing::subscriber::set_default(subscriber());
            proxy.update_status(ExecutionState::Running);
            while !stop.load(Ordering::Acquire) {
                proxy.poll_safepoint();
            }
            proxy.update_status(ExecutionState::Finished);
        })
    };

    proxy.request_suspend(false);
    assert!(wait_until(Duration::from_secs(10), || proxy.read_state()
        == ExecutionState::Suspended));
    proxy.request_resume(false);
    stop.store(true, Ordering::Release);
    mutator.join().unwrap();

    let refs = [proxy.as_ref()];
    stop_the_world(&**proxy.mutator_lock(), &refs, |_| ());
    assert_eq!(proxy.metrics().suspensions, 1);
}
