// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-callback orchestrator: ingest, reservoir swap, FIR, egress.
//!
//! [`Pipeline::apply`] runs once per tuner buffer, on the tuner's own
//! callback thread. Copying the block to a worker first would double
//! the memory bandwidth of the hottest path; the filter and the socket
//! write fit comfortably in the inter-callback budget, so both run
//! synchronously here. The only call that may block is the socket
//! write on a connected stream.

use thiserror::Error;
use tracing::{info, warn};

use crate::filter::{filter_buffer, Coefficients};
use crate::reservoir::Reservoir;
use crate::sender::Sender;
use crate::Sample;

/// Fraction of the tuner's full-scale value at which an output sample
/// counts as saturated. Part of the device contract.
const SATURATION_HEADROOM: f64 = 0.92;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("filter must contain at least one coefficient")]
    EmptyFilter,

    #[error("filter length {taps} exceeds the device block size {capacity}")]
    FilterTooLong { taps: usize, capacity: usize },

    #[error("decimation factor must be at least 1")]
    ZeroStep,
}

/// Owns the reservoir, the coefficient vector, the decimation cursor,
/// the output scratch block, and the sender for one reception session.
pub struct Pipeline {
    reservoir: Reservoir,
    coefficients: Coefficients,
    cursor: usize,
    output: Vec<Sample>,
    step: usize,
    threshold: i32,
    sender: Sender,
}

impl Pipeline {
    /// Build the pipeline for blocks of up to `block_capacity` raw
    /// interleaved samples.
    ///
    /// `max_value` is the tuner's full-scale sample value; the
    /// saturation threshold is derived from it here. All buffers are
    /// preallocated so [`apply`](Pipeline::apply) never touches the
    /// allocator.
    pub fn new(
        block_capacity: usize,
        coefficients: Coefficients,
        step: usize,
        max_value: i32,
        sender: Sender,
    ) -> Result<Self, PipelineError> {
        if coefficients.is_empty() {
            return Err(PipelineError::EmptyFilter);
        }
        if coefficients.len() > block_capacity {
            return Err(PipelineError::FilterTooLong {
                taps: coefficients.len(),
                capacity: block_capacity,
            });
        }
        if step == 0 {
            return Err(PipelineError::ZeroStep);
        }

        Ok(Self {
            reservoir: Reservoir::with_capacity(block_capacity),
            coefficients,
            cursor: 0,
            output: Vec::with_capacity(block_capacity),
            step,
            threshold: (f64::from(max_value) * SATURATION_HEADROOM) as i32,
            sender,
        })
    }

    /// Process one tuner block: filter, decimate, frame, send.
    ///
    /// A failed or disconnected send drops the block and schedules one
    /// best-effort reconnect; the next callback retries if the
    /// downstream is still gone.
    pub fn apply(&mut self, input: &[Sample]) {
        self.output.clear();
        self.reservoir.swap_in(input);

        let saturation = filter_buffer(
            &self.reservoir,
            &self.coefficients,
            &mut self.output,
            &mut self.cursor,
            self.step,
            self.threshold,
        );

        // The kernel leaves the cursor within one decimation stride
        // past the block end; fold it back so the remainder carries
        // into the next block.
        if !self.reservoir.is_empty() {
            self.cursor %= self.reservoir.len();
        }

        let written = self.sender.send(&self.output, saturation);
        if written <= 0 {
            if written < 0 {
                warn!("downstream write failed, dropping block");
            }
            if self.sender.reconnect() == 0 {
                info!("reconnected to downstream");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::time::Duration;

    use crate::sender::HEADER_LEN;

    use super::*;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, port)
    }

    fn make(port: u16, coefficients: Vec<f64>, step: usize, max_value: i32) -> Pipeline {
        let sender = Sender::connect("127.0.0.1", port, 64).expect("connect");
        Pipeline::new(64, coefficients, step, max_value, sender).expect("pipeline")
    }

    fn read_packet(stream: &mut TcpStream) -> (u8, Vec<Sample>) {
        let mut header = [0u8; HEADER_LEN];
        stream.read_exact(&mut header).expect("header");
        let size = u64::from_le_bytes(header[..8].try_into().unwrap());
        let flags = header[8];

        let mut payload = vec![0u8; size as usize];
        stream.read_exact(&mut payload).expect("payload");
        let samples = payload
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        (flags, samples)
    }

    #[test]
    fn pass_through_block_arrives_unchanged() {
        let (listener, port) = listener();
        let mut pipeline = make(port, vec![1.0], 1, i32::MAX);
        let (mut peer, _) = listener.accept().expect("accept");

        pipeline.apply(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let (flags, samples) = read_packet(&mut peer);
        assert_eq!(samples, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(flags, 0);
    }

    #[test]
    fn decimation_by_two_halves_the_stream() {
        let (listener, port) = listener();
        let mut pipeline = make(port, vec![1.0], 2, i32::MAX);
        let (mut peer, _) = listener.accept().expect("accept");

        pipeline.apply(&[1, 2, 3, 4, 5, 6, 7, 8]);

        let (_, samples) = read_packet(&mut peer);
        assert_eq!(samples, vec![1, 2, 5, 6]);
    }

    #[test]
    fn moving_average_spans_the_block_boundary() {
        let (listener, port) = listener();
        let mut pipeline = make(port, vec![0.5, 0.5], 1, i32::MAX);
        let (mut peer, _) = listener.accept().expect("accept");

        pipeline.apply(&[0, 0, 0, 0]);
        let (_, samples) = read_packet(&mut peer);
        assert_eq!(samples, vec![0, 0, 0, 0]);

        pipeline.apply(&[10, 20, 10, 20]);
        let (_, samples) = read_packet(&mut peer);
        assert_eq!(samples, vec![5, 10, 10, 20]);
    }

    #[test]
    fn saturated_block_sets_the_header_flag() {
        let (listener, port) = listener();
        // max_value 6 puts the derived threshold at 5, the magnitude
        // of the (3, 4) pair.
        let mut pipeline = make(port, vec![1.0], 1, 6);
        let (mut peer, _) = listener.accept().expect("accept");

        pipeline.apply(&[3, 4, 1, 1]);

        let (flags, samples) = read_packet(&mut peer);
        assert_eq!(samples, vec![3, 4, 1, 1]);
        assert_eq!(flags, 0x01);
    }

    #[test]
    fn threshold_keeps_headroom_below_full_scale() {
        let (listener, port) = listener();
        let pipeline = make(port, vec![1.0], 1, 4096);
        let _peer = listener.accept().expect("accept");

        assert_eq!(pipeline.threshold, 3768);
    }

    #[test]
    fn reconnects_and_resumes_after_peer_close() {
        let (listener, port) = listener();
        let mut pipeline = make(port, vec![1.0], 1, i32::MAX);
        let (mut peer, _) = listener.accept().expect("accept");

        pipeline.apply(&[1, 2, 3, 4]);
        let (_, samples) = read_packet(&mut peer);
        assert_eq!(samples, vec![1, 2, 3, 4]);

        drop(peer);
        listener.set_nonblocking(true).expect("nonblocking");

        // Keep feeding until the dead socket is noticed; the failing
        // block is dropped and apply() reopens the connection.
        let mut replacement = None;
        for _ in 0..100 {
            pipeline.apply(&[5, 6, 7, 8]);
            if let Ok((stream, _)) = listener.accept() {
                replacement = Some(stream);
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let mut peer = replacement.expect("pipeline never reconnected");
        peer.set_nonblocking(false).expect("blocking peer");

        pipeline.apply(&[9, 10, 11, 12]);

        // Blocks sent between the reconnect and our accept may precede
        // the marker block on the new connection.
        for _ in 0..100 {
            let (_, samples) = read_packet(&mut peer);
            if samples == vec![9, 10, 11, 12] {
                return;
            }
            assert_eq!(samples, vec![5, 6, 7, 8]);
        }
        panic!("marker block never arrived after reconnect");
    }

    #[test]
    fn construction_rejects_degenerate_parameters() {
        let (_listener, port) = listener();

        let sender = Sender::connect("127.0.0.1", port, 8).expect("connect");
        assert!(matches!(
            Pipeline::new(8, vec![], 1, 4096, sender),
            Err(PipelineError::EmptyFilter)
        ));

        let sender = Sender::connect("127.0.0.1", port, 8).expect("connect");
        assert!(matches!(
            Pipeline::new(8, vec![1.0; 9], 1, 4096, sender),
            Err(PipelineError::FilterTooLong { .. })
        ));

        let sender = Sender::connect("127.0.0.1", port, 8).expect("connect");
        assert!(matches!(
            Pipeline::new(8, vec![1.0], 0, 4096, sender),
            Err(PipelineError::ZeroStep)
        ));
    }
}
