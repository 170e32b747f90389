//! Lifecycle gate and poller behavior under concurrent connections.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use exit_when::events::Event;
use exit_when::lifecycle::{HostError, OpenConnection, Poller, Readiness};

mod common;

use common::{Harness, RecordingNext};

const LONG_POLL: Duration = Duration::from_secs(3600);

fn marker(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("stop")
}

/// Run one poller cycle on its own thread and report the result on a channel.
fn spawn_cycle(harness: &Harness) -> mpsc::Receiver<bool> {
    let poller = Poller::new(Arc::clone(harness.gate.state()), harness.trigger_handle());
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(poller.cycle());
    });
    rx
}

#[test]
fn readiness_exits_when_event_already_satisfied() {
    let harness = Harness::new(vec![Event::ScriptExit { command: "exit 88".into() }], LONG_POLL);

    assert_eq!(harness.gate.on_readiness_check().unwrap(), Readiness::Exit);
    assert!(harness.next.calls().is_empty(), "host must not be readied");
    assert_eq!(harness.trigger.count(), 0);
}

#[test]
fn readiness_proceeds_and_delegates() {
    let harness = Harness::new(vec![Event::ScriptExit { command: "exit 0".into() }], LONG_POLL);

    assert_eq!(harness.gate.on_readiness_check().unwrap(), Readiness::Proceed);
    assert_eq!(harness.next.calls(), vec!["get_ready"]);
}

#[test]
fn preconnect_rejects_once_exiting() {
    let dir = tempfile::tempdir().unwrap();
    let path = marker(&dir);
    let harness = Harness::new(vec![Event::FileCreated { path: path.clone() }], LONG_POLL);

    harness.gate.on_preconnect(false).unwrap();
    std::fs::write(&path, b"").unwrap();

    assert!(matches!(harness.gate.on_preconnect(false), Err(HostError::Exiting)));
    // Still rejected after the file is gone again.
    std::fs::remove_file(&path).unwrap();
    assert!(matches!(harness.gate.on_preconnect(true), Err(HostError::Exiting)));
    assert_eq!(harness.next.calls(), vec!["preconnect"]);
}

#[test]
fn host_open_failure_is_not_counted() {
    let harness = Harness::with_next(Vec::new(), LONG_POLL, RecordingNext::rejecting_open());

    assert!(matches!(
        harness.gate.on_connection_open(false, "export"),
        Err(HostError::Rejected(_))
    ));
    let guard = harness.gate.state().lock();
    assert_eq!(guard.active_connections(), 0);
    assert!(!guard.poller_suspended());
}

#[test]
fn poller_waits_while_a_connection_is_open() {
    let harness = Harness::new(Vec::new(), LONG_POLL);

    let ticket = harness.gate.on_connection_open(false, "").unwrap();
    assert!(harness.gate.state().lock().poller_suspended());

    let cycle = spawn_cycle(&harness);
    assert!(
        cycle.recv_timeout(Duration::from_millis(200)).is_err(),
        "poller must not evaluate while a connection is open"
    );

    harness.gate.on_connection_close(ticket);
    assert_eq!(cycle.recv_timeout(Duration::from_secs(5)), Ok(false));
}

#[test]
fn paired_opens_and_closes_resume_the_poller() {
    let harness = Harness::new(Vec::new(), LONG_POLL);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let gate = Arc::clone(&harness.gate);
            thread::spawn(move || {
                for _ in 0..25 {
                    let ticket = gate.on_connection_open(false, "").unwrap();
                    thread::yield_now();
                    gate.on_connection_close(ticket);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    {
        let guard = harness.gate.state().lock();
        assert_eq!(guard.active_connections(), 0);
        assert!(!guard.poller_suspended());
    }

    let cycle = spawn_cycle(&harness);
    assert_eq!(cycle.recv_timeout(Duration::from_secs(5)), Ok(false));
    assert_eq!(harness.trigger.count(), 0);
}

#[test]
fn connection_is_closed_when_its_handler_panics() {
    let harness = Harness::new(Vec::new(), LONG_POLL);

    let gate = Arc::clone(&harness.gate);
    let handler = thread::spawn(move || {
        let ticket = gate.on_connection_open(false, "").unwrap();
        let _connection = OpenConnection::new(Arc::clone(&gate), ticket);
        panic!("connection handler failed");
    });
    assert!(handler.join().is_err());

    {
        let guard = harness.gate.state().lock();
        assert_eq!(guard.active_connections(), 0);
        assert!(!guard.poller_suspended());
    }
    let cycle = spawn_cycle(&harness);
    assert_eq!(cycle.recv_timeout(Duration::from_secs(5)), Ok(false));
}

#[test]
fn explicit_close_runs_the_hook_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = marker(&dir);
    let harness = Harness::new(vec![Event::FileCreated { path: path.clone() }], LONG_POLL);

    let ticket = harness.gate.on_connection_open(false, "").unwrap();
    let connection = OpenConnection::new(Arc::clone(&harness.gate), ticket);
    std::fs::write(&path, b"").unwrap();

    connection.close();
    assert_eq!(harness.trigger.count(), 1);
    assert_eq!(harness.gate.state().lock().active_connections(), 0);
}

#[test]
fn close_catches_event_that_fired_while_suspended() {
    let dir = tempfile::tempdir().unwrap();
    let path = marker(&dir);
    let harness = Harness::new(vec![Event::FileCreated { path: path.clone() }], LONG_POLL);

    let first = harness.gate.on_connection_open(false, "").unwrap();
    let second = harness.gate.on_connection_open(false, "").unwrap();
    std::fs::write(&path, b"").unwrap();

    // Not the last connection: the event is latched but nothing shuts down yet.
    harness.gate.on_connection_close(first);
    assert!(harness.gate.state().lock().exiting());
    assert_eq!(harness.trigger.count(), 0);
    assert!(matches!(harness.gate.on_preconnect(false), Err(HostError::Exiting)));

    harness.gate.on_connection_close(second);
    assert_eq!(harness.trigger.count(), 1);

    // The poller stays suspended once the server is on its way out.
    assert!(harness.gate.state().lock().poller_suspended());
}

#[test]
fn shutdown_is_invoked_once_when_poller_and_close_race() {
    let dir = tempfile::tempdir().unwrap();
    let path = marker(&dir);
    let harness = Harness::new(vec![Event::FileCreated { path: path.clone() }], LONG_POLL);

    // A poller that cycles as fast as it can.
    let poller = Poller::new(Arc::clone(harness.gate.state()), harness.trigger_handle());
    thread::spawn(move || loop {
        poller.cycle();
        thread::sleep(Duration::from_millis(1));
    });

    let created = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..6)
        .map(|i| {
            let gate = Arc::clone(&harness.gate);
            let created = Arc::clone(&created);
            let path = path.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    if i == 0 && round == 25 {
                        std::fs::write(&path, b"").unwrap();
                        created.store(true, Ordering::SeqCst);
                    }
                    let ticket = gate.on_connection_open(false, "").unwrap();
                    thread::yield_now();
                    gate.on_connection_close(ticket);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert!(created.load(Ordering::SeqCst));

    // Make sure at least one path has seen the drain after the event.
    let ticket = harness.gate.on_connection_open(false, "").unwrap();
    harness.gate.on_connection_close(ticket);

    assert!(harness.trigger.wait_for_shutdown(Duration::from_secs(5)));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.trigger.count(), 1);
}

#[test]
fn poller_shuts_down_after_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = marker(&dir);
    let harness = Harness::new(
        vec![Event::FileCreated { path: path.clone() }],
        Duration::from_millis(100),
    );

    assert_eq!(harness.gate.on_readiness_check().unwrap(), Readiness::Proceed);
    harness.gate.on_after_fork().unwrap();
    // A second call must not start another poller.
    harness.gate.on_after_fork().unwrap();
    assert_eq!(harness.next.calls(), vec!["get_ready", "after_fork", "after_fork"]);

    thread::sleep(Duration::from_millis(250));
    assert_eq!(harness.trigger.count(), 0);

    std::fs::write(&path, b"").unwrap();
    assert!(harness.trigger.wait_for_shutdown(Duration::from_secs(2)));

    assert!(matches!(harness.gate.on_preconnect(false), Err(HostError::Exiting)));

    // Later cycles keep seeing the latch but do not shut down again.
    thread::sleep(Duration::from_millis(300));
    assert_eq!(harness.trigger.count(), 1);
}

#[test]
fn zero_poll_interval_leaves_hooks_responsive() {
    let dir = tempfile::tempdir().unwrap();
    let path = marker(&dir);
    let harness = Harness::new(vec![Event::FileCreated { path: path.clone() }], Duration::ZERO);
    harness.gate.on_after_fork().unwrap();

    let (tx, rx) = mpsc::channel();
    let gate = Arc::clone(&harness.gate);
    thread::spawn(move || {
        for _ in 0..100 {
            let ticket = gate.on_connection_open(false, "").unwrap();
            gate.on_connection_close(ticket);
        }
        let _ = tx.send(());
    });
    assert!(
        rx.recv_timeout(Duration::from_secs(5)).is_ok(),
        "hooks starved by a continuously polling thread"
    );

    std::fs::write(&path, b"").unwrap();
    assert!(harness.trigger.wait_for_shutdown(Duration::from_secs(2)));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(harness.trigger.count(), 1);

    // Park the poller so it stops spinning for the rest of the run.
    let _parked = harness.gate.on_connection_open(false, "").unwrap();
}

#[test]
fn fd_closed_hard_error_triggers_shutdown_path() {
    use exit_when::events::source::WatchedFd;

    let harness = Harness::new(vec![Event::FdClosed(WatchedFd::new(999_998))], LONG_POLL);
    assert_eq!(harness.gate.on_readiness_check().unwrap(), Readiness::Exit);
}
