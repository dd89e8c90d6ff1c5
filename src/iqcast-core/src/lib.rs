// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Signal-processing core of iqcast.
//!
//! Everything in this crate runs inside the tuner's sample callback:
//! a two-slot sample reservoir, a decimating dual-channel FIR with
//! cross-buffer history, and a framed TCP sender with opportunistic
//! reconnect. Nothing here allocates or blocks on the steady path
//! except the socket write itself.

pub mod filter;
pub mod pipeline;
pub mod reservoir;
pub mod sender;

pub use pipeline::{Pipeline, PipelineError};
pub use reservoir::Reservoir;
pub use sender::{Sender, SenderError};

/// Element type of the interleaved I/Q streams produced by the
/// supported tuners (16-bit signed, I and Q always in pairs).
pub type Sample = i16;
