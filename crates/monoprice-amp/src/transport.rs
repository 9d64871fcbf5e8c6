//! Serial transport glue.
//!
//! The engine talks to any `AsyncRead + AsyncWrite` stream: a
//! `tokio_serial::SerialStream` in production, an in-memory duplex pipe in
//! tests. [`LineTransport`] adds line framing on top of the raw stream.

use std::io;
use std::time::Duration;

use monoprice_protocol::LineCodec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;
use tracing::trace;

use crate::error::{AmpError, AmpResult};

/// Any byte stream the engine can own.
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased serial stream.
pub type DynSerial = Box<dyn SerialPortIO>;

/// Default serial device.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate of the amplifier's RS-232 port.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

const READ_CHUNK: usize = 64;

/// Open a serial device with the amplifier's line settings (8N1, no flow control).
pub fn open_serial(path: &str, baud_rate: u32) -> AmpResult<DynSerial> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| {
            AmpError::Transport(io::Error::new(
                io::ErrorKind::Other,
                format!("failed to open {}: {}", path, e),
            ))
        })?;

    Ok(Box::new(port))
}

/// Line-oriented reader/writer over a raw stream.
pub struct LineTransport {
    io: DynSerial,
    codec: LineCodec,
}

impl LineTransport {
    pub fn new<T: SerialPortIO + 'static>(io: T) -> Self {
        Self {
            io: Box::new(io),
            codec: LineCodec::new(),
        }
    }

    /// Write a command followed by the terminator and flush it.
    pub async fn write_command(&mut self, command: &str) -> AmpResult<()> {
        let bytes = LineCodec::encode_command(command);
        self.io.write_all(&bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Read the next framed line.
    ///
    /// Cancel-safe: bytes already received stay buffered when the future is
    /// dropped, so it can be wrapped in a timeout.
    pub async fn read_line(&mut self) -> AmpResult<String> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.codec.decode_line() {
                trace!(line = %line, "rx");
                return Ok(line);
            }

            let n = self.io.read(&mut chunk).await?;
            if n == 0 {
                return Err(AmpError::EndOfStream);
            }
            self.codec.push(&chunk[..n])?;
        }
    }

    /// Discard everything buffered or immediately readable.
    ///
    /// Returns the complete lines that were thrown away.
    pub async fn drain_ready(&mut self) -> AmpResult<Vec<String>> {
        self.drain_for(Duration::ZERO).await
    }

    /// Discard input until the line has been silent for `quiet`.
    pub async fn drain_quiet(&mut self, quiet: Duration) -> AmpResult<Vec<String>> {
        self.drain_for(quiet).await
    }

    async fn drain_for(&mut self, quiet: Duration) -> AmpResult<Vec<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut discarded = Vec::new();

        loop {
            while let Some(line) = self.codec.decode_line() {
                discarded.push(line);
            }

            match timeout(quiet, self.io.read(&mut chunk)).await {
                Err(_) => break,
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    if self.codec.push(&chunk[..n]).is_err() {
                        // Overflow already cleared the codec; keep draining.
                        discarded.push(String::from_utf8_lossy(&chunk[..n]).into_owned());
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }

        // A partial line cannot belong to the next exchange.
        if self.codec.buffered_len() > 0 {
            let partial = self.codec.buffer_as_str();
            self.codec.clear();
            let partial = monoprice_protocol::frame_line(&partial);
            if !partial.is_empty() {
                discarded.push(partial.to_string());
            }
        }

        Ok(discarded)
    }
}

impl std::fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("buffered", &self.codec.buffered_len())
            .finish_non_exhaustive()
    }
}
