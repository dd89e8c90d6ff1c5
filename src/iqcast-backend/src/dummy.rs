// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Software tuner for development and testing.
//!
//! Produces a fixed ramp block at roughly the cadence of a real 2.5
//! MSPS tuner. No hardware required.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use iqcast_core::{Pipeline, Sample};

use crate::{Device, DeviceError};

/// Raw interleaved samples per synthetic block.
const BLOCK_SIZE: usize = 65_536;

/// Pause between blocks, approximating the real callback cadence.
const BLOCK_INTERVAL: Duration = Duration::from_millis(26);

pub struct DummyDevice {
    count: i64,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl DummyDevice {
    /// `count` is the number of blocks to produce before stopping on
    /// its own; negative means until [`Device::stop`].
    pub fn new(count: i64) -> Self {
        Self {
            count,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl Device for DummyDevice {
    fn start(&mut self, pipeline: Arc<Mutex<Pipeline>>) -> Result<(), DeviceError> {
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let count = self.count;
        let worker = thread::Builder::new()
            .name("dummy-tuner".to_string())
            .spawn(move || {
                let block: Vec<Sample> = (0..BLOCK_SIZE).map(|i| i as Sample).collect();
                let mut produced: i64 = 0;

                while running.load(Ordering::SeqCst) && (count < 0 || produced < count) {
                    match pipeline.lock() {
                        Ok(mut pipeline) => pipeline.apply(&block),
                        Err(_) => break,
                    }
                    produced += 1;
                    thread::sleep(BLOCK_INTERVAL);
                }

                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| DeviceError::Hardware {
                operation: "spawning the dummy tuner thread",
                detail: e.to_string(),
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    fn buffer_size(&self) -> usize {
        BLOCK_SIZE
    }

    fn max_value(&self) -> i32 {
        // Matches the 12-bit tuners it stands in for.
        4096
    }

    fn is_streaming(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for DummyDevice {
    fn drop(&mut self) {
        self.stop();
    }
}
