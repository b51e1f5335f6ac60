//! Mock periodic server: accepts one framed connection, performs the
//! handshake, and lets each test script the conversation packet by packet.

use bytes::Bytes;
use tokio::net::TcpListener;

use periodic_core::codec::{decode_packet, encode_packet};
use periodic_core::endpoint::Endpoint;
use periodic_core::frame::{FrameReader, FrameWriter};
use periodic_core::xor::{XorKey, XorReader, XorWriter};
use periodic_core::Command;

pub type AgentId = [u8; 4];

pub struct MockServer {
    listener: TcpListener,
    addr: String,
}

impl MockServer {
    pub async fn bind() -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        MockServer { listener, addr }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Tcp(self.addr.clone())
    }

    /// Accept one connection and answer the handshake.
    pub async fn accept(&self) -> ServerConn {
        self.accept_with_key(None).await
    }

    /// Accept with the server side of the XOR transport applied.
    pub async fn accept_with_key(&self, key: Option<XorKey>) -> ServerConn {
        let (stream, _) = self.listener.accept().await.unwrap();
        let (read, write) = tokio::io::split(stream);
        let (mut reader, mut writer) = match key {
            Some(key) => (
                FrameReader::new(Box::new(XorReader::new(read, key.clone()))),
                FrameWriter::new(Box::new(XorWriter::new(write, key))),
            ),
            None => (
                FrameReader::new(Box::new(read)),
                FrameWriter::new(Box::new(write)),
            ),
        };
        let hello = reader.receive().await.unwrap();
        assert_eq!(hello.len(), 1, "handshake must be a one-byte client type");
        writer.send(b"conn-mock-1").await.unwrap();
        ServerConn {
            client_type: hello[0],
            reader,
            writer,
        }
    }
}

pub struct ServerConn {
    pub client_type: u8,
    reader: FrameReader,
    writer: FrameWriter,
}

impl ServerConn {
    pub async fn send(&mut self, id: &AgentId, cmd: Command, body: &[u8]) {
        self.writer.send(&encode_packet(id, cmd, body)).await.unwrap();
    }

    pub async fn recv(&mut self) -> (AgentId, Command, Bytes) {
        let payload = self.reader.receive().await.unwrap();
        decode_packet(payload).unwrap()
    }

    /// Like [`ServerConn::recv`], but `None` once the client hangs up.
    pub async fn try_recv(&mut self) -> Option<(AgentId, Command, Bytes)> {
        let payload = self.reader.receive().await.ok()?;
        Some(decode_packet(payload).unwrap())
    }

    /// Receive the next packet that is not a healthcheck ping, answering
    /// pings with `PONG` along the way.
    pub async fn recv_cmd(&mut self) -> (AgentId, Command, Bytes) {
        loop {
            let (id, cmd, body) = self.recv().await;
            if cmd == Command::Ping {
                self.send(&id, Command::Pong, b"").await;
                continue;
            }
            return (id, cmd, body);
        }
    }
}
