// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Framed TCP egress with opportunistic reconnect.
//!
//! Wire format per packet: `[8 bytes LE u64 payload size][1 byte
//! flags][payload]`, flags bit 0 = saturation in this block, bits 1..7
//! zero. The payload is the filtered interleaved I/Q block as
//! little-endian `i16`. The header is emitted from a packed 9-byte
//! serialisation; an in-memory struct would carry alignment padding
//! and must not be sent raw.
//!
//! The socket layer is `libc` rather than `std::net` because the write
//! must pass `MSG_NOSIGNAL`: a dying peer raises an error return here,
//! never SIGPIPE.

use std::io;
use std::net::Ipv4Addr;
use std::os::unix::io::RawFd;

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use crate::Sample;

/// Header bytes preceding every payload.
pub const HEADER_LEN: usize = 9;

const FLAG_SATURATION: u8 = 0x01;

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("invalid IPv4 host \"{0}\"")]
    InvalidHost(String),

    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: Ipv4Addr,
        port: u16,
        source: io::Error,
    },
}

/// Scoped owner of one OS file descriptor.
///
/// The descriptor is closed exactly here: on explicit [`close`](Fd::close)
/// or on drop, and only while `connected` is set. The type is move-only,
/// so reassigning a field of this type drops (and thereby closes) the
/// previous descriptor.
struct Fd {
    fd: RawFd,
    connected: bool,
}

impl Fd {
    fn invalid() -> Self {
        Self {
            fd: -1,
            connected: false,
        }
    }

    fn open(fd: RawFd) -> Self {
        Self {
            fd,
            connected: true,
        }
    }

    fn close(&mut self) {
        if self.connected {
            unsafe { libc::close(self.fd) };
            self.fd = -1;
            self.connected = false;
        }
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        self.close();
    }
}

/// One TCP connection to the downstream consumer.
///
/// A send failure closes the socket and reports through the return
/// value; the connection is reopened on demand by
/// [`Sender::reconnect`]. Blocks produced while disconnected are
/// dropped, not queued.
pub struct Sender {
    host: Ipv4Addr,
    port: u16,
    fd: Fd,
    frame: BytesMut,
}

impl Sender {
    /// Resolve `host` as an IPv4 dotted quad and connect.
    ///
    /// `payload_capacity` is the largest sample count a single
    /// [`send`](Sender::send) will carry; the frame scratch buffer is
    /// sized for it once so the per-block path never allocates.
    pub fn connect(host: &str, port: u16, payload_capacity: usize) -> Result<Self, SenderError> {
        let host: Ipv4Addr = host
            .parse()
            .map_err(|_| SenderError::InvalidHost(host.to_string()))?;

        let mut sender = Self {
            host,
            port,
            fd: Fd::invalid(),
            frame: BytesMut::with_capacity(HEADER_LEN + payload_capacity * 2),
        };

        if sender.reconnect() != 0 {
            return Err(SenderError::Connect {
                host,
                port,
                source: io::Error::last_os_error(),
            });
        }

        Ok(sender)
    }

    /// Frame and push one filtered block.
    ///
    /// Returns the number of bytes written, 0 when currently
    /// disconnected (the block is dropped), or -1 on a write error, in
    /// which case the socket is closed and the sender left
    /// disconnected.
    pub fn send(&mut self, block: &[Sample], saturation: bool) -> isize {
        if !self.fd.connected {
            return 0;
        }

        self.frame.clear();
        self.frame.put_u64_le((block.len() * 2) as u64);
        self.frame
            .put_u8(if saturation { FLAG_SATURATION } else { 0 });
        for &sample in block {
            self.frame.put_i16_le(sample);
        }

        let written = unsafe {
            libc::send(
                self.fd.fd,
                self.frame.as_ptr().cast(),
                self.frame.len(),
                libc::MSG_NOSIGNAL,
            )
        };

        if written < 0 {
            self.fd.close();
        }

        written
    }

    /// Drop any current socket and connect a fresh one.
    ///
    /// Returns 0 on success, -1 on failure. Safe to call repeatedly;
    /// each failed attempt leaves the sender disconnected.
    pub fn reconnect(&mut self) -> i32 {
        self.fd.close();

        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return -1;
        }
        let new_fd = Fd::open(fd);

        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: self.port.to_be(),
            sin_addr: libc::in_addr {
                s_addr: u32::from(self.host).to_be(),
            },
            sin_zero: [0; 8],
        };

        let rc = unsafe {
            libc::connect(
                new_fd.fd,
                std::ptr::addr_of!(addr).cast(),
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return -1;
        }

        self.fd = new_fd;
        0
    }

    /// Whether the last send or reconnect left an open socket behind.
    pub fn is_connected(&self) -> bool {
        self.fd.connected
    }
}
