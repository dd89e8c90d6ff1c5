// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Tuner backends for iqcast.
//!
//! A backend delivers blocks of interleaved 16-bit I/Q samples to the
//! processing pipeline from a thread it owns, serially, until told to
//! stop. The supervisor polls [`Device::is_streaming`] once per second
//! to catch silent hardware stalls.

pub mod airspy;
pub mod dummy;
pub mod rspduo;

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use iqcast_core::Pipeline;

pub use airspy::Airspy;
pub use dummy::DummyDevice;
pub use rspduo::Rspduo;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unknown device type \"{0}\"")]
    UnknownType(String),

    #[error("unsupported sample type \"{0}\"")]
    UnsupportedSampleType(String),

    #[error("{device} support is not compiled in")]
    NotCompiled { device: &'static str },

    #[error("{operation} failed: {detail}")]
    Hardware {
        operation: &'static str,
        detail: String,
    },
}

/// Sample encodings a tuner can be asked to produce. Only interleaved
/// 16-bit I/Q is carried through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    Int16Iq,
}

impl FromStr for SampleType {
    type Err = DeviceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "int" => Ok(SampleType::Int16Iq),
            other => Err(DeviceError::UnsupportedSampleType(other.to_string())),
        }
    }
}

/// Tuning parameters handed to a hardware backend when it is opened.
#[derive(Debug, Clone)]
pub struct TunerSettings {
    /// Centre frequency in Hz.
    pub frequency: u32,
    /// Device sample rate in Hz.
    pub sample_rate: u32,
    pub sample_type: SampleType,
    /// Preferred device serial; first device when absent.
    pub serial_number: Option<u64>,
}

/// The contract every sample source satisfies.
///
/// `start` begins delivering blocks by invoking the pipeline from one
/// dedicated device thread; callbacks are serial, never concurrent
/// with themselves. After `stop` returns no further callback occurs.
pub trait Device {
    fn start(&mut self, pipeline: Arc<Mutex<Pipeline>>) -> Result<(), DeviceError>;

    fn stop(&mut self);

    /// Maximum raw interleaved sample count one callback may deliver;
    /// sizes the pipeline's reservoir.
    fn buffer_size(&self) -> usize;

    /// Full-scale sample value; the pipeline derives its saturation
    /// threshold from this.
    fn max_value(&self) -> i32;

    fn is_streaming(&self) -> bool;
}

/// The tuner selected by the `device` configuration key.
pub enum Backend {
    Airspy(Airspy),
    Rspduo(Rspduo),
    Dummy(DummyDevice),
}

impl Backend {
    /// Open the backend named by `kind`. `dummy_count` is the number
    /// of synthetic blocks the dummy device produces before stopping
    /// on its own; negative means forever.
    pub fn open(
        kind: &str,
        settings: &TunerSettings,
        dummy_count: i64,
    ) -> Result<Backend, DeviceError> {
        match kind {
            "airspy" => Ok(Backend::Airspy(Airspy::open(settings)?)),
            "rspduo" => Ok(Backend::Rspduo(Rspduo::open(settings)?)),
            "dummy" => Ok(Backend::Dummy(DummyDevice::new(dummy_count))),
            other => Err(DeviceError::UnknownType(other.to_string())),
        }
    }
}

impl Device for Backend {
    fn start(&mut self, pipeline: Arc<Mutex<Pipeline>>) -> Result<(), DeviceError> {
        match self {
            Backend::Airspy(device) => device.start(pipeline),
            Backend::Rspduo(device) => device.start(pipeline),
            Backend::Dummy(device) => device.start(pipeline),
        }
    }

    fn stop(&mut self) {
        match self {
            Backend::Airspy(device) => device.stop(),
            Backend::Rspduo(device) => device.stop(),
            Backend::Dummy(device) => device.stop(),
        }
    }

    fn buffer_size(&self) -> usize {
        match self {
            Backend::Airspy(device) => device.buffer_size(),
            Backend::Rspduo(device) => device.buffer_size(),
            Backend::Dummy(device) => device.buffer_size(),
        }
    }

    fn max_value(&self) -> i32 {
        match self {
            Backend::Airspy(device) => device.max_value(),
            Backend::Rspduo(device) => device.max_value(),
            Backend::Dummy(device) => device.max_value(),
        }
    }

    fn is_streaming(&self) -> bool {
        match self {
            Backend::Airspy(device) => device.is_streaming(),
            Backend::Rspduo(device) => device.is_streaming(),
            Backend::Dummy(device) => device.is_streaming(),
        }
    }
}

/// Scoped reception: starts the device on construction and stops it on
/// drop, so the pipeline is guaranteed to outlive every callback the
/// device may still deliver.
pub struct Receiver<'a, D: Device> {
    device: &'a mut D,
}

impl<'a, D: Device> Receiver<'a, D> {
    pub fn start(device: &'a mut D, pipeline: Arc<Mutex<Pipeline>>) -> Result<Self, DeviceError> {
        device.start(pipeline)?;
        Ok(Self { device })
    }

    pub fn is_streaming(&self) -> bool {
        self.device.is_streaming()
    }
}

impl<D: Device> Drop for Receiver<'_, D> {
    fn drop(&mut self) {
        self.device.stop();
    }
}
