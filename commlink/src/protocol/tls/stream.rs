//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Adapter stream running a [`CryptoEngine`] over a [`Duplex`].
//!
//! The wrapped codec reads and writes cleartext through a [`TlsStream`];
//! the stream drives the handshake, encrypts on flush and decrypts on read.
//! Every buffer lives in [`TlsBuffers`] so that a stream can be rebuilt for
//! each codec call without losing partially processed records.

use super::engine::{CryptoEngine, EngineStatus, HandshakeStatus};
use crate::protocol::Duplex;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

/// Default capacity of the cleartext write buffer.
pub const DEFAULT_WRITE_CAPACITY: usize = 8192;

/// First size of the `unwrap` destination; it grows on overflow.
const INITIAL_CLEAR_BUFFER: usize = 256;

/// Buffers that outlive a single [`TlsStream`].
#[derive(Debug)]
pub struct TlsBuffers {
    /// Ciphertext read from the transport and not yet accepted by the engine.
    crypt_in: Vec<u8>,
    /// Decrypted bytes not yet handed to the reader.
    clear_in: Vec<u8>,
    /// Read offset into `clear_in`.
    clear_in_pos: usize,
    /// Destination of `unwrap`, grown on overflow.
    clear_scratch: Vec<u8>,
    /// Cleartext waiting to be wrapped.
    clear_out: Vec<u8>,
    /// Size of `clear_out` at which a write flushes on its own.
    write_capacity: usize,
    /// Ciphertext waiting to be written to the transport.
    net_out: Vec<u8>,
    /// Bytes of `net_out` already written.
    net_out_pos: usize,
    /// Set once the peer closed the session or the transport hit EOF.
    eof: bool,
}

impl TlsBuffers {
    /// Creates empty buffers flushing cleartext every `write_capacity` bytes.
    pub fn new(write_capacity: usize) -> Self {
        let write_capacity = write_capacity.max(1);
        Self {
            crypt_in: Vec::new(),
            clear_in: Vec::new(),
            clear_in_pos: 0,
            clear_scratch: Vec::new(),
            clear_out: Vec::with_capacity(write_capacity),
            write_capacity,
            net_out: Vec::new(),
            net_out_pos: 0,
            eof: false,
        }
    }

    /// True once the peer closed the session or the transport hit EOF.
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl Default for TlsBuffers {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_CAPACITY)
    }
}

/// An engine broke its contract; the session cannot continue.
fn protocol_violation(reason: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.to_string())
}

/// Cleartext view of an encrypted [`Duplex`].
///
/// No application data is wrapped or unwrapped before the engine reports
/// that the handshake is over; if the engine asks for more handshaking
/// later, the stream re-enters the handshake loop transparently.
///
/// # Examples
///
/// ```rust,no_run
/// use commlink::protocol::tls::{EngineFactory, EngineMode, RustlsEngineFactory, TlsBuffers, TlsStream};
/// use commlink::protocol::ProtocolParams;
/// use commlink::transport::TcpTransport;
/// use tokio::io::AsyncWriteExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let factory = RustlsEngineFactory::from_params(&ProtocolParams::empty())?;
/// let mut engine = factory.create_engine(EngineMode::Client, "example.com")?;
/// let mut buffers = TlsBuffers::default();
/// let mut transport = TcpTransport::connect("example.com:443").await?;
///
/// let mut tls = TlsStream::new(&mut transport, engine.as_mut(), &mut buffers);
/// tls.handshake().await?;
/// tls.write_all(b"hello").await?;
/// tls.flush().await?;
/// tls.close_notify().await?;
/// # Ok(())
/// # }
/// ```
pub struct TlsStream<'a> {
    inner: &'a mut dyn Duplex,
    engine: &'a mut dyn CryptoEngine,
    buffers: &'a mut TlsBuffers,
}

impl<'a> TlsStream<'a> {
    /// Layers a cleartext stream over `inner`. `buffers` outlive the stream
    /// so a session can span many calls.
    pub fn new(
        inner: &'a mut dyn Duplex,
        engine: &'a mut dyn CryptoEngine,
        buffers: &'a mut TlsBuffers,
    ) -> Self {
        Self {
            inner,
            engine,
            buffers,
        }
    }

    /// Runs the handshake to completion without exchanging application data.
    pub async fn handshake(&mut self) -> io::Result<()> {
        poll_fn(|cx| self.poll_handshake(cx)).await
    }

    /// Flushes pending cleartext, then sends a close notification.
    pub async fn close_notify(&mut self) -> io::Result<()> {
        self.flush().await?;
        self.engine.close_outbound();
        self.wrap(&[])?;
        poll_fn(|cx| self.poll_drain(cx)).await
    }

    /// Writes queued ciphertext to the transport and flushes it.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let buffers = &mut *self.buffers;
        while buffers.net_out_pos < buffers.net_out.len() {
            let pending = &buffers.net_out[buffers.net_out_pos..];
            let n = ready!(Pin::new(&mut *self.inner).poll_write(cx, pending))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            buffers.net_out_pos += n;
        }
        buffers.net_out.clear();
        buffers.net_out_pos = 0;
        Pin::new(&mut *self.inner).poll_flush(cx)
    }

    /// Encrypts all of `src` into the outbound ciphertext queue.
    ///
    /// The result buffer starts at the source size and grows whenever the
    /// engine overflows it. Returns the number of ciphertext bytes queued.
    fn wrap(&mut self, src: &[u8]) -> io::Result<usize> {
        let mut src = src;
        let mut out = vec![0u8; src.len().max(self.engine.packet_buffer_size()).max(1)];
        let mut total = 0;
        loop {
            let result = self.engine.wrap(src, &mut out)?;
            src = &src[result.consumed..];
            self.buffers.net_out.extend_from_slice(&out[..result.produced]);
            total += result.produced;

            match result.status {
                EngineStatus::BufferOverflow => {
                    let grown = (out.len() * 2).max(result.produced + self.engine.packet_buffer_size());
                    out.resize(grown, 0);
                }
                EngineStatus::Ok if src.is_empty() => return Ok(total),
                EngineStatus::Ok if result.consumed == 0 && result.produced == 0 => {
                    return Err(protocol_violation("TLS engine made no progress while wrapping"));
                }
                EngineStatus::Ok => {}
                EngineStatus::Closed if src.is_empty() => return Ok(total),
                EngineStatus::Closed => {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "TLS session closed with unsent data",
                    ));
                }
                EngineStatus::BufferUnderflow => {
                    return Err(protocol_violation("TLS engine underflowed while wrapping"));
                }
            }
        }
    }

    /// Reads up to one packet of ciphertext from the transport.
    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<usize>> {
        let want = self.engine.packet_buffer_size().max(1);
        let crypt_in = &mut self.buffers.crypt_in;
        let start = crypt_in.len();
        crypt_in.resize(start + want, 0);

        let mut read_buf = ReadBuf::new(&mut crypt_in[start..]);
        let polled = Pin::new(&mut *self.inner).poll_read(cx, &mut read_buf);
        let filled = read_buf.filled().len();
        crypt_in.truncate(start + filled);

        match polled {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(filled)),
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }

    /// Feeds buffered ciphertext to the engine, reading more when it
    /// underflows. Resolves to `true` when the engine produced cleartext or
    /// advanced its handshake, `false` on end of input.
    fn poll_unwrap(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<bool>> {
        let application = self.engine.application_buffer_size().max(1);
        if self.buffers.clear_scratch.is_empty() {
            self.buffers
                .clear_scratch
                .resize(INITIAL_CLEAR_BUFFER.min(application), 0);
        }

        let mut produced_any = false;
        loop {
            let buffers = &mut *self.buffers;
            let result = self
                .engine
                .unwrap(&buffers.crypt_in, &mut buffers.clear_scratch)?;
            buffers.crypt_in.drain(..result.consumed);
            buffers
                .clear_in
                .extend_from_slice(&buffers.clear_scratch[..result.produced]);
            produced_any |= result.produced > 0;

            match result.status {
                EngineStatus::BufferOverflow => {
                    let grown = (buffers.clear_scratch.len() * 2).max(application);
                    buffers.clear_scratch.resize(grown, 0);
                }
                EngineStatus::Ok => return Poll::Ready(Ok(true)),
                EngineStatus::Closed => {
                    buffers.eof = true;
                    return Poll::Ready(Ok(produced_any));
                }
                EngineStatus::BufferUnderflow if produced_any => return Poll::Ready(Ok(true)),
                EngineStatus::BufferUnderflow => {
                    if ready!(self.poll_fill(cx))? == 0 {
                        self.buffers.eof = true;
                        return Poll::Ready(Ok(false));
                    }
                }
            }
        }
    }

    /// Drives the engine until it stops asking for handshake work.
    fn poll_handshake(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        loop {
            ready!(self.poll_drain(cx))?;
            match self.engine.handshake_status() {
                HandshakeStatus::NotHandshaking | HandshakeStatus::Finished => {
                    return Poll::Ready(Ok(()))
                }
                HandshakeStatus::NeedTask => {
                    while let Some(task) = self.engine.delegated_task() {
                        task();
                    }
                }
                HandshakeStatus::NeedWrap => {
                    if self.wrap(&[])? == 0 {
                        return Poll::Ready(Err(protocol_violation(
                            "TLS engine requested a wrap but produced nothing",
                        )));
                    }
                }
                HandshakeStatus::NeedUnwrap => {
                    if self.buffers.eof || !ready!(self.poll_unwrap(cx))? {
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed during TLS handshake",
                        )));
                    }
                }
            }
        }
    }

    /// Wraps and sends whatever cleartext is buffered.
    fn poll_write_cache(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain(cx))?;
        if !self.buffers.clear_out.is_empty() {
            ready!(self.poll_handshake(cx))?;
            let pending = std::mem::take(&mut self.buffers.clear_out);
            self.wrap(&pending)?;
            ready!(self.poll_drain(cx))?;
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncRead for TlsStream<'_> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            let buffers = &mut *this.buffers;
            if buffers.clear_in_pos < buffers.clear_in.len() {
                let available = &buffers.clear_in[buffers.clear_in_pos..];
                let n = available.len().min(buf.remaining());
                buf.put_slice(&available[..n]);
                buffers.clear_in_pos += n;
                if buffers.clear_in_pos == buffers.clear_in.len() {
                    buffers.clear_in.clear();
                    buffers.clear_in_pos = 0;
                }
                return Poll::Ready(Ok(()));
            }
            if buffers.eof {
                return Poll::Ready(Ok(()));
            }

            ready!(this.poll_handshake(cx))?;
            if this.buffers.clear_in.is_empty() {
                ready!(this.poll_unwrap(cx))?;
            }
        }
    }
}

impl AsyncWrite for TlsStream<'_> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        if this.buffers.clear_out.len() >= this.buffers.write_capacity {
            ready!(this.poll_write_cache(cx))?;
        }
        let room = this.buffers.write_capacity - this.buffers.clear_out.len();
        let n = room.min(buf.len());
        this.buffers.clear_out.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_write_cache(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_write_cache(cx)
    }
}
