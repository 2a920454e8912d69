//! Interrupt flag tests
//!
//! Kept in their own binary: the flag is process-global.

use std::time::Duration;
use apitest::pipeline::{parse_test_set, RunOptions, TestRunner, Variables};
use apitest::signals::{reset_interrupted, set_interrupted, wait_for_interrupt, was_interrupted};

#[tokio::test]
async fn test_interrupt_flag_and_wait() {
    reset_interrupted();
    assert!(!was_interrupted());

    let waiter = tokio::spawn(wait_for_interrupt());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    set_interrupted();
    assert!(was_interrupted());
    tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter woke up")
        .unwrap();

    // Already set: returns at once
    tokio::time::timeout(Duration::from_millis(100), wait_for_interrupt())
        .await
        .expect("returns immediately when already interrupted");

    // An interrupted run sends nothing
    let set = parse_test_set(
        "requests:\n  - name: Never\n    url: http://127.0.0.1:9/never\n",
        "yaml",
    )
    .unwrap();
    let mut runner = TestRunner::new(RunOptions::default()).unwrap();
    let summary = runner.run(&set, &mut Variables::new()).await;
    assert!(summary.interrupted);
    assert_eq!(summary.total, 0);

    reset_interrupted();
    assert!(!was_interrupted());
}
