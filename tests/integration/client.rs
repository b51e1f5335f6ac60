//! Client facade scenarios: ping, submit/status, run_job, admin errors,
//! and the XOR transport end to end.

use periodic_client::{Client, SubmitOptions};
use periodic_core::xor::XorKey;
use periodic_core::{Command, JobSpec};

use crate::server::MockServer;

#[tokio::test]
async fn ping_gets_pong() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        assert_eq!(conn.client_type, 1);
        let (id, cmd, _) = conn.recv().await;
        assert_eq!(cmd, Command::Ping);
        conn.send(&id, Command::Pong, b"").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    assert!(client.ping().await);
    client.close().await;
    served.await.unwrap();
}

#[tokio::test]
async fn submit_then_status() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;

        let (id, cmd, body) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::SubmitJob);
        let job = JobSpec::decode(body).unwrap();
        assert_eq!(job.func, "email");
        assert_eq!(job.name, "u1");
        assert_eq!(job.args, "hi");
        assert_eq!(job.sched_at, 1_700_000_000);
        conn.send(&id, Command::Success, b"").await;

        let (id, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::Status);
        conn.send(&id, Command::Data, b"email,0,1,0,0,1700000000").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    client
        .submit_job(
            "email",
            "u1",
            SubmitOptions {
                args: Some("hi".into()),
                sched_at: Some(1_700_000_000),
                ..SubmitOptions::default()
            },
        )
        .await
        .unwrap();

    let rows = client.status().await.unwrap();
    assert_eq!(
        rows,
        vec![vec!["email", "0", "1", "0", "0", "1700000000"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()]
    );
    client.close().await;
    served.await.unwrap();
}

#[tokio::test]
async fn run_job_returns_the_data_body() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let (id, cmd, body) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::RunJob);
        let job = JobSpec::decode(body).unwrap();
        assert_eq!(job.func, "add");
        assert_eq!(job.args, "1,2");
        // run_job fills in the default server-side timeout
        assert_eq!(job.timeout, 10);
        conn.send(&id, Command::Data, b"3").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    let result = client
        .run_job(
            "add",
            "j",
            SubmitOptions {
                args: Some("1,2".into()),
                ..SubmitOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(result.as_ref(), b"3");
    client.close().await;
    served.await.unwrap();
}

#[tokio::test]
async fn run_job_with_no_worker_is_an_error() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let (id, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::RunJob);
        conn.send(&id, Command::NoWorker, b"").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    let err = client
        .run_job("none", "j", SubmitOptions::default())
        .await
        .unwrap_err();
    assert!(
        err.to_string().contains("no worker"),
        "unexpected error: {err}"
    );
    client.close().await;
    served.await.unwrap();
}

#[tokio::test]
async fn admin_reply_body_becomes_the_error_detail() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let (id, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::DropFunc);
        conn.send(&id, Command::Unknown, b"func is busy").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    let err = client.drop_func("web").await.unwrap_err();
    assert!(
        err.to_string().contains("func is busy"),
        "unexpected error: {err}"
    );
    client.close().await;
    served.await.unwrap();
}

#[tokio::test]
async fn config_values_round_trip_as_big_endian_i32() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;

        let (id, cmd, body) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::ConfigGet);
        assert_eq!(body.as_ref(), b"\x07timeout");
        conn.send(&id, Command::Config, &300i32.to_be_bytes()).await;

        let (id, cmd, body) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::ConfigSet);
        let mut expected = b"\x07timeout".to_vec();
        expected.extend_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(body.as_ref(), &expected[..]);
        conn.send(&id, Command::Success, b"").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    assert_eq!(client.config_get("timeout").await.unwrap(), 300);
    client.config_set("timeout", -1).await.unwrap();
    client.close().await;
    served.await.unwrap();
}

#[tokio::test]
async fn ping_round_trips_through_the_xor_transport() {
    let key = XorKey::new(b"0123456789abcdef".to_vec()).unwrap();
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let server_key = key.clone();
    let served = tokio::spawn(async move {
        let mut conn = server.accept_with_key(Some(server_key)).await;
        assert_eq!(conn.client_type, 1);
        let (id, cmd, _) = conn.recv().await;
        assert_eq!(cmd, Command::Ping);
        conn.send(&id, Command::Pong, b"").await;
    });

    let client = Client::connect(&endpoint, Some(key)).await.unwrap();
    assert!(client.ping().await);
    client.close().await;
    served.await.unwrap();
}
