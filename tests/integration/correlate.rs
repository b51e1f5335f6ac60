//! Correlation under fire: 64 concurrent callers against a server that
//! echoes each request's body back under its agent id, answering in bursts
//! so replies interleave arbitrarily with requests.

use std::sync::Arc;

use periodic_client::Mux;
use periodic_core::{ClientType, Command};

use crate::server::MockServer;

#[tokio::test]
async fn sixty_four_concurrent_callers_never_get_a_misrouted_reply() {
    const CALLERS: usize = 64;

    let server = MockServer::bind().await;
    let endpoint = server.endpoint();
    let served = tokio::spawn(async move {
        let mut conn = server.accept().await;
        let mut answered = 0;
        let mut pending = Vec::new();
        while answered < CALLERS {
            let Some((id, cmd, body)) = conn.try_recv().await else {
                panic!("client hung up after {answered} replies");
            };
            assert_eq!(cmd, Command::SubmitJob);
            pending.push((id, body));
            // answer in reversed bursts of up to 8 to shuffle reply order
            if pending.len() == 8 || answered + pending.len() == CALLERS {
                for (id, body) in pending.drain(..).rev() {
                    conn.send(&id, Command::Data, &body).await;
                    answered += 1;
                }
            }
        }
    });

    let mux = Mux::connect(&endpoint, None, ClientType::Client)
        .await
        .unwrap();

    let mut callers = Vec::new();
    for i in 0..CALLERS {
        let mux = Arc::clone(&mux);
        callers.push(tokio::spawn(async move {
            let request = format!("caller-{i}-payload");
            let (cmd, body) = mux
                .send_and_wait(Command::SubmitJob, request.as_bytes())
                .await
                .unwrap();
            assert_eq!(cmd, Command::Data);
            assert_eq!(body.as_ref(), request.as_bytes(), "reply misrouted");
        }));
    }
    for caller in callers {
        caller.await.unwrap();
    }
    mux.close().await;
    served.await.unwrap();
}
