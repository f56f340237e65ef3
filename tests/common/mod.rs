//! Loopback rcon servers for the integration tests.
#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sourcon::packet::{Packet, PacketType, HEADER_SIZE};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpSocket, TcpStream},
    task::JoinHandle,
};

pub const PASSWORD: &str = "testing";

/// Pause between two deliveries so the client sees them as separate reads.
const DELIVERY_GAP: Duration = Duration::from_millis(50);

/// What the server does after receiving a command.
pub enum Reply {
    /// Write each buffer as its own delivery.
    Deliveries(Vec<Vec<u8>>),
    /// Never answer.
    Stall,
    /// Write the buffers, then close the connection.
    HangUp(Vec<Vec<u8>>),
}

impl Reply {
    /// A single well-formed response packet.
    pub fn text(body: &str) -> Self {
        Reply::Deliveries(vec![Packet::new(0, PacketType::Response, body).pack()])
    }
}

/// How the server answers the auth packet.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// One auth response echoing the id, or `-1` on a bad password.
    Single,
    /// An empty response value first, then the auth response (srcds does this).
    EmptyValueFirst,
    /// One auth response, written as the size field and then the rest.
    SplitHeader,
    /// Never answer the auth packet.
    Silent,
}

/// A raw chunk: 12 header bytes followed by `body` as-is.
pub fn raw_chunk(body: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(HEADER_SIZE + body.len());
    chunk.extend_from_slice(&((body.len() + 8) as i32).to_le_bytes());
    chunk.extend_from_slice(&0i32.to_le_bytes());
    chunk.extend_from_slice(&PacketType::Response.to_le_bytes());
    chunk.extend_from_slice(body);
    chunk
}

pub struct MockServer {
    pub addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start<F>(auth: AuthStyle, handler: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler = Arc::new(handler);

        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move { serve(stream, auth, handler.as_ref()).await });
            }
        });

        MockServer { addr, handle }
    }

    /// A server that knows `echo`, `status` (stalls) and nothing else.
    pub async fn game_server() -> Self {
        Self::start(AuthStyle::Single, |command| {
            match command.split_once(' ').unwrap_or((command, "")) {
                ("echo", rest) => Reply::text(&format!("{}\n", rest)),
                ("status", _) => Reply::Stall,
                _ => Reply::text(&format!("Unknown command: {}\n", command)),
            }
        })
        .await
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve<F>(mut stream: TcpStream, auth: AuthStyle, handler: &F)
where
    F: Fn(&str) -> Reply,
{
    let mut buf = Vec::new();

    while let Some(packet) = read_packet(&mut stream, &mut buf).await {
        let reply = match packet.packet_type() {
            PacketType::Auth => auth_reply(&packet, auth),
            _ => handler(packet.body()),
        };

        match reply {
            Reply::Deliveries(deliveries) => {
                if deliver(&mut stream, deliveries).await.is_err() {
                    return;
                }
            }
            Reply::Stall => std::future::pending::<()>().await,
            Reply::HangUp(deliveries) => {
                let _ = deliver(&mut stream, deliveries).await;
                return;
            }
        }
    }
}

fn auth_reply(packet: &Packet, auth: AuthStyle) -> Reply {
    let id = if packet.body() == PASSWORD {
        packet.id()
    } else {
        -1
    };
    let response = Packet::new(id, PacketType::Exec, "").pack();

    match auth {
        AuthStyle::Single => Reply::Deliveries(vec![response]),
        AuthStyle::EmptyValueFirst => Reply::Deliveries(vec![
            Packet::new(packet.id(), PacketType::Response, "").pack(),
            response,
        ]),
        AuthStyle::SplitHeader => {
            Reply::Deliveries(vec![response[..4].to_vec(), response[4..].to_vec()])
        }
        AuthStyle::Silent => Reply::Stall,
    }
}

async fn deliver(stream: &mut TcpStream, deliveries: Vec<Vec<u8>>) -> std::io::Result<()> {
    for (i, delivery) in deliveries.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(DELIVERY_GAP).await;
        }
        stream.write_all(delivery).await?;
        stream.flush().await?;
    }
    Ok(())
}

async fn read_packet(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<Packet> {
    loop {
        if buf.len() >= 4 {
            let size = i32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
            if buf.len() >= size + 4 {
                let packet = Packet::unpack(&buf[..size + 4]).unwrap();
                buf.drain(..size + 4);
                return Some(packet);
            }
        }

        let mut chunk = [0u8; 4096];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// A listener whose accept queue is full, so further handshakes stall.
/// Keep the returned streams alive for as long as the stall is needed.
pub async fn saturated_listener() -> (TcpListener, SocketAddr, Vec<TcpStream>) {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(1).unwrap();
    let addr = listener.local_addr().unwrap();

    let mut fillers = Vec::new();
    for _ in 0..16 {
        match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => fillers.push(stream),
            _ => break,
        }
    }

    (listener, addr, fillers)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
