//! Dump streaming: each body lands in the writer behind its reconstructed
//! length header, and the `EOF` sentinel terminates the call cleanly.

use periodic_client::Client;
use periodic_core::Command;

use crate::server::MockServer;

#[tokio::test]
async fn dump_writes_length_prefixed_bodies_until_eof() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let (id, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::Dump);
        for body in [&b"alpha"[..], b"bee", b"gamma-three"] {
            conn.send(&id, Command::Data, body).await;
        }
        conn.send(&id, Command::Data, b"EOF").await;
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    let mut out: Vec<u8> = Vec::new();
    client.dump(&mut out).await.unwrap();
    client.close().await;
    served.await.unwrap();

    let mut expected = Vec::new();
    for body in [&b"alpha"[..], b"bee", b"gamma-three"] {
        expected.extend_from_slice(&(body.len() as u32).to_be_bytes());
        expected.extend_from_slice(body);
    }
    assert_eq!(out, expected);
}

#[tokio::test]
async fn dump_fails_when_the_connection_dies_mid_stream() {
    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let (id, cmd, _) = conn.recv_cmd().await;
        assert_eq!(cmd, Command::Dump);
        conn.send(&id, Command::Data, b"partial").await;
        // hang up without the sentinel
    });

    let client = Client::connect(&endpoint, None).await.unwrap();
    let mut out: Vec<u8> = Vec::new();
    let err = client.dump(&mut out).await.unwrap_err();
    assert!(matches!(err, periodic_core::Error::Closed), "got {err}");
    client.close().await;
    served.await.unwrap();
}
