use std::collections::VecDeque;
use std::io;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use crate::client::transport::ByteStream;
use crate::protocol::reassembler::Reassembler;
use crate::protocol::request::Request;

/// The client side of the packet protocol on top of a single open transport.
///
/// Requests go out unframed, responses come back as a stream of fixed-length frames that is
///  cut into frames by a [Reassembler] owned by this connection. The reassembler's carry-over
///  buffer lives exactly as long as the connection, so every connection starts aligned.
pub struct PacketConnection {
    stream: Box<dyn ByteStream>,
    reassembler: Reassembler,
    pending_frames: VecDeque<Bytes>,
    read_buf: Vec<u8>,
}

impl PacketConnection {
    pub fn new(stream: Box<dyn ByteStream>, read_buffer_size: usize) -> PacketConnection {
        PacketConnection {
            stream,
            reassembler: Reassembler::new(),
            pending_frames: VecDeque::new(),
            read_buf: vec![0u8; read_buffer_size.max(1)],
        }
    }

    /// Asks the server to stream all packets it has, closing the stream afterwards
    pub async fn request_all_packets(&mut self) -> io::Result<()> {
        self.send(Request::StreamAllPackets).await
    }

    /// Asks the server to resend the packet with a given sequence number
    pub async fn request_packet(&mut self, sequence: i32) -> io::Result<()> {
        self.send(Request::ResendPacket { sequence }).await
    }

    async fn send(&mut self, request: Request) -> io::Result<()> {
        trace!(?request, "sending request");
        self.stream.write_all(&request.to_bytes()).await?;
        self.stream.flush().await
    }

    /// Returns the next complete frame, or `None` if the peer closed the stream. A partial frame
    ///  left over at the end of the stream is discarded.
    ///
    /// This is cancel safe: if the returned future is dropped, no received bytes are lost.
    pub async fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.pending_frames.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                debug!("stream closed by peer");
                self.reassembler.flush();
                return Ok(None);
            }
            self.pending_frames.extend(self.reassembler.push(&self.read_buf[..n]));
        }
    }
}
