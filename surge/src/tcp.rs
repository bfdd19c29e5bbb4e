//! TCP transport: newline-terminated commands out, MessagePack documents back.
use crate::error::TransportError;
use crate::transport::{deadline, Connection, Transport};
use serde::Deserialize;
use std::io::{self, Cursor, ErrorKind};
use std::sync::Arc;
use std::time::Duration;
use surge_core::{Value, DEFAULT_CALL_TIMEOUT};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Clone, Debug)]
pub struct TcpTransport {
    addr: Arc<str>,
    timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Deadline applied to each connect, send and receive.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for TcpTransport {
    type Conn = TcpConnection;

    async fn connect(&self) -> Result<TcpConnection, TransportError> {
        let stream = deadline("connect", self.timeout, async {
            TcpStream::connect(&*self.addr)
                .await
                .map_err(TransportError::Connect)
        })
        .await?;
        stream.set_nodelay(true).map_err(TransportError::Connect)?;
        trace!("Connected to {}", self.addr);

        Ok(TcpConnection {
            stream,
            buf: Vec::with_capacity(4096),
            timeout: self.timeout,
        })
    }
}

pub struct TcpConnection {
    stream: TcpStream,
    buf: Vec<u8>,
    timeout: Duration,
}

impl TcpConnection {
    async fn read_frame(&mut self) -> Result<Value, TransportError> {
        loop {
            if let Some((value, consumed)) = decode_frame(&self.buf)? {
                self.buf.drain(..consumed);
                return Ok(value);
            }

            let n = self
                .stream
                .read_buf(&mut self.buf)
                .await
                .map_err(TransportError::Read)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
        }
    }
}

impl Connection for TcpConnection {
    async fn send(&mut self, command: &str) -> Result<(), TransportError> {
        // A blank line is never answered, so it would only surface later as a
        // receive timeout.
        if command.trim().is_empty() {
            return Err(TransportError::Send(io::Error::new(
                ErrorKind::InvalidInput,
                "empty command",
            )));
        }

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let stream = &mut self.stream;
        deadline("send", self.timeout, async {
            stream
                .write_all(line.as_bytes())
                .await
                .map_err(TransportError::Send)
        })
        .await
    }

    async fn receive(&mut self) -> Result<Value, TransportError> {
        let timeout = self.timeout;
        deadline("receive", timeout, self.read_frame()).await
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.shutdown().await {
            trace!("Error shutting down connection: {err}");
        }
    }
}

/// Decodes one complete MessagePack document from the front of `buf`.
///
/// Returns `Ok(None)` while the document is still incomplete, otherwise the
/// value and the number of bytes it occupied.
fn decode_frame(buf: &[u8]) -> Result<Option<(Value, usize)>, TransportError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(buf);
    let res = {
        let mut de = rmp_serde::Deserializer::new(&mut cursor);
        Value::deserialize(&mut de)
    };

    match res {
        Ok(value) => Ok(Some((value, cursor.position() as usize))),
        Err(err) if is_incomplete(&err) => Ok(None),
        Err(err) => Err(TransportError::Decode(err)),
    }
}

fn is_incomplete(err: &rmp_serde::decode::Error) -> bool {
    use rmp_serde::decode::Error;

    match err {
        Error::InvalidMarkerRead(io) | Error::InvalidDataRead(io) => {
            io.kind() == ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn encode(value: serde_json::Value) -> Vec<u8> {
        rmp_serde::to_vec(&value).unwrap()
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let bytes = encode(json!({"status": "OK", "data": {"objects": []}}));
        for cut in 0..bytes.len() {
            assert!(decode_frame(&bytes[..cut]).unwrap().is_none(), "cut at {cut}");
        }
        let (value, used) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(value.field("status").unwrap().as_str().unwrap(), "OK");
    }

    #[test]
    fn back_to_back_frames_are_split() {
        let mut bytes = encode(json!({"n": 1}));
        let first = bytes.len();
        bytes.extend(encode(json!({"n": 2})));

        let (value, used) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(used, first);
        assert_eq!(value.get("n"), Some(&Value::Integer(1)));
        let (value, _) = decode_frame(&bytes[used..]).unwrap().unwrap();
        assert_eq!(value.get("n"), Some(&Value::Integer(2)));
    }

    #[tokio::test]
    async fn round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            while let Some(line) = lines.next_line().await.unwrap() {
                let reply = encode(json!({"status": "OK", "echo": line}));
                // Dribble the reply out in two writes.
                let (head, tail) = reply.split_at(reply.len() / 2);
                write.write_all(head).await.unwrap();
                write.flush().await.unwrap();
                tokio::task::yield_now().await;
                write.write_all(tail).await.unwrap();
            }
        });

        let transport = TcpTransport::new(&addr).timeout(Duration::from_secs(2));
        let mut conn = transport.connect().await.unwrap();
        for cmd in ["EVENT in:ns entity:u1", "QUERY in:ns where:(loc:ca)\n"] {
            conn.send(cmd).await.unwrap();
            let reply = conn.receive().await.unwrap();
            assert_eq!(reply.field("echo").unwrap().as_str().unwrap(), cmd.trim_end());
        }
        conn.close().await;
    }

    #[tokio::test]
    async fn blank_commands_are_rejected_before_writing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let transport = TcpTransport::new(&addr).timeout(Duration::from_secs(2));
        let mut conn = transport.connect().await.unwrap();
        for cmd in ["", "  \n"] {
            match conn.send(cmd).await {
                Err(TransportError::Send(err)) => assert_eq!(err.kind(), ErrorKind::InvalidInput),
                other => panic!("unexpected {other:?}"),
            }
        }
        conn.close().await;

        assert!(server.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn receive_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = TcpTransport::new(&addr).timeout(Duration::from_millis(100));
        let mut conn = transport.connect().await.unwrap();
        conn.send("QUERY in:ns").await.unwrap();
        assert!(matches!(
            conn.receive().await,
            Err(TransportError::Timeout { op: "receive", .. })
        ));
    }
}
