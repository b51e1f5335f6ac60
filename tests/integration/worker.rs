//! Worker facade scenarios: the happy path from registration through
//! WORK_DONE, and the CANT_DO + WORK_FAIL path for an unknown function.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use periodic_client::Worker;
use periodic_core::{Command, JobSpec};

use crate::server::MockServer;

#[tokio::test]
async fn worker_runs_an_assigned_job_and_reports_done() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();

    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        assert_eq!(conn.client_type, 2);

        // registration
        let (id, cmd, body) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::CanDo);
        assert_eq!(body.as_ref(), b"\x04echo");
        conn.send(&id, Command::Success, b"").await;

        // first grab gets an assignment on a server-chosen agent id
        let (_, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::GrabJob);
        let job = JobSpec {
            args: "x".into(),
            ..JobSpec::new("echo", "n")
        };
        conn.send(b"abcd", Command::JobAssign, &job.encode().unwrap())
            .await;

        // the worker acks on the assignment id, then reports completion;
        // grab slots keep polling in between
        let mut acked = false;
        loop {
            let (id, cmd, body) = conn.recv_cmd().await;
            match cmd {
                Command::GrabJob => {
                    if id == *b"abcd" {
                        acked = true;
                    }
                }
                Command::WorkDone => {
                    assert!(acked, "WORK_DONE before the GRAB_JOB ack");
                    assert_eq!(body.as_ref(), b"\x04echo\x01nx");
                    conn.send(&id, Command::Success, b"").await;
                    return;
                }
                other => panic!("unexpected command {other}"),
            }
        }
    });

    let worker = Arc::new(Worker::connect(&endpoint, None, Some(1)).await.unwrap());
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));
    worker
        .add_func("echo", move |job| {
            let notify = done_tx.lock().unwrap().take();
            async move {
                let result = job.args().as_bytes().to_vec();
                job.done(&result).await.unwrap();
                if let Some(tx) = notify {
                    let _ = tx.send(());
                }
            }
        })
        .await
        .unwrap();

    let working = Arc::clone(&worker);
    tokio::spawn(async move {
        let _ = working.work().await;
    });

    tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("job should complete within 5s")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), served)
        .await
        .expect("server script should finish")
        .unwrap();
    worker.close().await;
}

#[tokio::test]
async fn job_can_lock_reschedule_and_release() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();

    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;

        let (id, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::CanDo);
        conn.send(&id, Command::Success, b"").await;

        let (_, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::GrabJob);
        let job = JobSpec::new("retry", "r1");
        conn.send(b"lck1", Command::JobAssign, &job.encode().unwrap())
            .await;

        let handle = b"\x05retry\x02r1";
        loop {
            let (id, cmd, body) = conn.recv_cmd().await;
            match cmd {
                Command::GrabJob => {}
                Command::Acquire => {
                    // len8(name) ‖ count(u16) ‖ handle
                    let mut expected = vec![6u8];
                    expected.extend_from_slice(b"mylock");
                    expected.extend_from_slice(&2u16.to_be_bytes());
                    expected.extend_from_slice(handle);
                    assert_eq!(body.as_ref(), &expected[..]);
                    conn.send(&id, Command::Acquired, &[1]).await;
                }
                Command::SchedLater => {
                    // handle ‖ delay(u64) ‖ counter(u16)
                    let mut expected = handle.to_vec();
                    expected.extend_from_slice(&30u64.to_be_bytes());
                    expected.extend_from_slice(&1u16.to_be_bytes());
                    assert_eq!(body.as_ref(), &expected[..]);
                    conn.send(&id, Command::Success, b"").await;
                }
                Command::Release => {
                    let mut expected = vec![6u8];
                    expected.extend_from_slice(b"mylock");
                    expected.extend_from_slice(handle);
                    assert_eq!(body.as_ref(), &expected[..]);
                    conn.send(&id, Command::Success, b"").await;
                    return;
                }
                other => panic!("unexpected command {other}"),
            }
        }
    });

    let worker = Arc::new(Worker::connect(&endpoint, None, Some(1)).await.unwrap());
    worker
        .add_func("retry", |job| async move {
            let ran = job
                .with_lock("mylock", 2, || async {
                    job.sched_later(30, 1).await.unwrap();
                })
                .await
                .unwrap();
            assert!(ran.is_some(), "lock was granted, the task must run");
        })
        .await
        .unwrap();

    let working = Arc::clone(&worker);
    tokio::spawn(async move {
        let _ = working.work().await;
    });

    tokio::time::timeout(Duration::from_secs(5), served)
        .await
        .expect("server script should finish")
        .unwrap();
    worker.close().await;
}

#[tokio::test]
async fn unknown_function_triggers_cant_do_then_work_fail() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();

    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;

        // wait for the first grab, then assign a function nobody registered
        let (_, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::GrabJob);
        let job = JobSpec::new("foo", "n");
        conn.send(b"serv", Command::JobAssign, &job.encode().unwrap())
            .await;

        let mut saw_cant_do = false;
        loop {
            let (id, cmd, body) = conn.recv_cmd().await;
            match cmd {
                Command::GrabJob => {}
                Command::CantDo => {
                    assert_eq!(body.as_ref(), b"\x03foo");
                    saw_cant_do = true;
                    conn.send(&id, Command::Success, b"").await;
                }
                Command::WorkFail => {
                    assert!(saw_cant_do, "WORK_FAIL must follow CANT_DO");
                    assert_eq!(body.as_ref(), b"\x03foo\x01n");
                    conn.send(&id, Command::Success, b"").await;
                    return;
                }
                other => panic!("unexpected command {other}"),
            }
        }
    });

    let worker = Arc::new(Worker::connect(&endpoint, None, Some(1)).await.unwrap());
    let working = Arc::clone(&worker);
    tokio::spawn(async move {
        let _ = working.work().await;
    });

    tokio::time::timeout(Duration::from_secs(5), served)
        .await
        .expect("server script should finish")
        .unwrap();
    worker.close().await;
}
