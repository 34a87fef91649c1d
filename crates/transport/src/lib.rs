use std::time::Duration;

use async_trait::async_trait;
use shared::domain::{Square, BOARD_SIZE};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufStream},
    net::TcpStream,
    sync::Mutex,
    time::timeout,
};
use tracing::{debug, warn};

/// Grid pitch of the gantry in millimetres, one cell per 30mm.
pub const CELL_PITCH_MM: u32 = 30;

const READ_BOARD_COMMAND: &str = "READ_BOARD";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bridge did not answer within {0:?}")]
    Timeout(Duration),
    #[error("bridge i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("bridge closed the connection")]
    Closed,
}

/// Seam to the physical board bridge. One implementation talks to the real
/// sensor/gantry controller; tests substitute scripted doubles.
#[async_trait]
pub trait BoardTransport: Send + Sync {
    /// Requests one raw occupancy reading: a 36-character line of '0'/'1'.
    /// Content validation is the codec's job, not the transport's.
    async fn read_snapshot(&self, timeout: Duration) -> Result<String, TransportError>;

    /// Sends an actuator command and returns the controller's ack line.
    async fn send_command(&self, command: &str, timeout: Duration)
        -> Result<String, TransportError>;
}

/// Line-protocol client for the sensor bridge: one request line out, one
/// response line back. The connection is opened lazily and dropped on any
/// error so the next call reconnects. The internal mutex keeps snapshot
/// reads and actuator writes from interleaving on the wire.
pub struct TcpBoardTransport {
    addr: String,
    conn: Mutex<Option<BufStream<TcpStream>>>,
}

impl TcpBoardTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            conn: Mutex::new(None),
        }
    }

    async fn exchange(&self, line: &str, limit: Duration) -> Result<String, TransportError> {
        let mut guard = self.conn.lock().await;

        if guard.is_none() {
            let stream = timeout(limit, TcpStream::connect(&self.addr))
                .await
                .map_err(|_| TransportError::Timeout(limit))??;
            debug!(addr = %self.addr, "connected to board bridge");
            *guard = Some(BufStream::new(stream));
        }
        let stream = guard.as_mut().ok_or(TransportError::Closed)?;

        let result = Self::exchange_on(stream, line, limit).await;
        if result.is_err() {
            // Stale connections produce garbled reads; reconnect next call.
            *guard = None;
        }
        result
    }

    async fn exchange_on(
        stream: &mut BufStream<TcpStream>,
        line: &str,
        limit: Duration,
    ) -> Result<String, TransportError> {
        let io = async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await?;

            let mut response = String::new();
            let read = stream.read_line(&mut response).await?;
            Ok::<_, std::io::Error>((read, response))
        };

        let (read, response) = timeout(limit, io)
            .await
            .map_err(|_| TransportError::Timeout(limit))??;
        if read == 0 {
            return Err(TransportError::Closed);
        }
        Ok(response.trim_end().to_string())
    }
}

#[async_trait]
impl BoardTransport for TcpBoardTransport {
    async fn read_snapshot(&self, limit: Duration) -> Result<String, TransportError> {
        self.exchange(READ_BOARD_COMMAND, limit).await
    }

    async fn send_command(
        &self,
        command: &str,
        limit: Duration,
    ) -> Result<String, TransportError> {
        let ack = self.exchange(command, limit).await?;
        if ack.is_empty() {
            warn!(%command, "bridge acked with an empty line");
        }
        Ok(ack)
    }
}

/// Plans the gantry command replaying a committed move on the physical
/// board. The gantry origin sits at the f1 corner, so the file axis runs
/// mirrored relative to notation.
pub fn actuator_command(from: Square, to: Square) -> String {
    let (x1, y1) = gantry_position(from);
    let (x2, y2) = gantry_position(to);
    format!("MOVE {x1} {y1} {x2} {y2}")
}

fn gantry_position(square: Square) -> (u32, u32) {
    let x = (BOARD_SIZE - 1 - square.file()) as u32 * CELL_PITCH_MM;
    let y = (BOARD_SIZE - 1 - square.rank()) as u32 * CELL_PITCH_MM;
    (x, y)
}
