// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! SDRplay RSPduo backend placeholder.
//!
//! The RSPduo needs the proprietary sdrplay_api service and a
//! multi-step device selection dance before it can stream. Until
//! bindings for that API are carried here, the backend only reports
//! that support is missing; selecting `device = rspduo` fails at
//! startup instead of mid-session.

use std::sync::{Arc, Mutex};

use iqcast_core::Pipeline;

use crate::{Device, DeviceError, TunerSettings};

pub struct Rspduo {
    never: std::convert::Infallible,
}

impl Rspduo {
    pub fn open(_settings: &TunerSettings) -> Result<Self, DeviceError> {
        Err(DeviceError::NotCompiled { device: "rspduo" })
    }
}

impl Device for Rspduo {
    fn start(&mut self, _pipeline: Arc<Mutex<Pipeline>>) -> Result<(), DeviceError> {
        match self.never {}
    }

    fn stop(&mut self) {
        match self.never {}
    }

    fn buffer_size(&self) -> usize {
        match self.never {}
    }

    fn max_value(&self) -> i32 {
        match self.never {}
    }

    fn is_streaming(&self) -> bool {
        match self.never {}
    }
}
