// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Airspy tuner backend.
//!
//! Links libairspy through the `airspy` cargo feature; without it the
//! backend is a stub whose `open` reports that support was not
//! compiled in, so the rest of the workspace builds on hosts without
//! the vendor library.

#[cfg(feature = "airspy")]
pub use real::Airspy;
#[cfg(not(feature = "airspy"))]
pub use stub::Airspy;

#[cfg(feature = "airspy")]
mod real {
    use std::ffi::CStr;
    use std::os::raw::{c_int, c_void};
    use std::ptr;
    use std::sync::{Arc, Mutex};

    use tracing::{info, warn};

    use iqcast_core::{Pipeline, Sample};

    use crate::{Device, DeviceError, SampleType, TunerSettings};

    /// Hand-written bindings for the parts of libairspy this backend
    /// uses; layouts match airspy.h.
    mod ffi {
        use std::os::raw::{c_char, c_int, c_void};

        pub const AIRSPY_SUCCESS: c_int = 0;
        pub const AIRSPY_SAMPLE_INT16_IQ: c_int = 2;

        #[repr(C)]
        pub struct airspy_device {
            _opaque: [u8; 0],
        }

        #[repr(C)]
        pub struct airspy_transfer {
            pub device: *mut airspy_device,
            pub ctx: *mut c_void,
            pub samples: *mut c_void,
            pub sample_count: c_int,
            pub dropped_samples: u64,
            pub sample_type: c_int,
        }

        pub type airspy_sample_block_cb_fn =
            extern "C" fn(transfer: *mut airspy_transfer) -> c_int;

        #[link(name = "airspy")]
        extern "C" {
            pub fn airspy_open(device: *mut *mut airspy_device) -> c_int;
            pub fn airspy_open_sn(device: *mut *mut airspy_device, serial_number: u64) -> c_int;
            pub fn airspy_close(device: *mut airspy_device) -> c_int;
            pub fn airspy_set_freq(device: *mut airspy_device, freq_hz: u32) -> c_int;
            pub fn airspy_set_samplerate(device: *mut airspy_device, samplerate: u32) -> c_int;
            pub fn airspy_set_sample_type(device: *mut airspy_device, sample_type: c_int)
                -> c_int;
            pub fn airspy_set_vga_gain(device: *mut airspy_device, value: u8) -> c_int;
            pub fn airspy_set_mixer_gain(device: *mut airspy_device, value: u8) -> c_int;
            pub fn airspy_set_lna_gain(device: *mut airspy_device, value: u8) -> c_int;
            pub fn airspy_start_rx(
                device: *mut airspy_device,
                callback: airspy_sample_block_cb_fn,
                ctx: *mut c_void,
            ) -> c_int;
            pub fn airspy_stop_rx(device: *mut airspy_device) -> c_int;
            pub fn airspy_is_streaming(device: *mut airspy_device) -> c_int;
            pub fn airspy_si5351c_read(
                device: *mut airspy_device,
                register_number: u8,
                value: *mut u8,
            ) -> c_int;
            pub fn airspy_error_name(errcode: c_int) -> *const c_char;
        }
    }

    /// libairspy fills 262 144-byte USB transfers.
    const TRANSFER_BYTES: usize = 262_144;

    /// Register 0 of the si5351c clock chip; bit 4 set means the
    /// tuner is still locked to its clock.
    const SYNC_BIT: u8 = 0x10;

    pub struct Airspy {
        device: *mut ffi::airspy_device,
        // Held from start to stop so the callback context stays valid
        // for every block the driver may still deliver.
        pipeline: Option<Arc<Mutex<Pipeline>>>,
    }

    fn error_name(result: c_int) -> String {
        unsafe { CStr::from_ptr(ffi::airspy_error_name(result)) }
            .to_string_lossy()
            .into_owned()
    }

    fn check(operation: &'static str, result: c_int) -> Result<(), DeviceError> {
        if result == ffi::AIRSPY_SUCCESS {
            Ok(())
        } else {
            Err(DeviceError::Hardware {
                operation,
                detail: error_name(result),
            })
        }
    }

    /// Sample-block callback invoked serially on the driver's USB
    /// thread. Sync and dropped-sample checks are observability only;
    /// the block is processed either way.
    extern "C" fn rx_callback(transfer: *mut ffi::airspy_transfer) -> c_int {
        let transfer = unsafe { &*transfer };

        let mut register0: u8 = 0;
        let result = unsafe { ffi::airspy_si5351c_read(transfer.device, 0, &mut register0) };
        if result != ffi::AIRSPY_SUCCESS {
            warn!("could not dump clock register 0: {}", error_name(result));
        } else if register0 & SYNC_BIT == 0 {
            warn!("airspy out of sync");
        }

        if transfer.dropped_samples > 0 {
            warn!("airspy dropped {} samples", transfer.dropped_samples);
        }

        let pipeline = unsafe { &*transfer.ctx.cast::<Mutex<Pipeline>>() };
        let block = unsafe {
            std::slice::from_raw_parts(
                transfer.samples.cast::<Sample>(),
                transfer.sample_count as usize * 2,
            )
        };
        if let Ok(mut pipeline) = pipeline.lock() {
            pipeline.apply(block);
        }

        0
    }

    impl Airspy {
        /// Open and configure a tuner, by serial number when one is
        /// given, otherwise whichever enumerates first.
        pub fn open(settings: &TunerSettings) -> Result<Self, DeviceError> {
            let mut device = ptr::null_mut();
            let result = match settings.serial_number {
                Some(serial) => unsafe { ffi::airspy_open_sn(&mut device, serial) },
                None => unsafe { ffi::airspy_open(&mut device) },
            };
            check("airspy_open", result)?;

            let airspy = Self {
                device,
                pipeline: None,
            };
            airspy.configure(settings)?;
            Ok(airspy)
        }

        fn configure(&self, settings: &TunerSettings) -> Result<(), DeviceError> {
            check("airspy_set_freq", unsafe {
                ffi::airspy_set_freq(self.device, settings.frequency)
            })?;
            check("airspy_set_samplerate", unsafe {
                ffi::airspy_set_samplerate(self.device, settings.sample_rate)
            })?;
            let sample_type = match settings.sample_type {
                SampleType::Int16Iq => ffi::AIRSPY_SAMPLE_INT16_IQ,
            };
            check("airspy_set_sample_type", unsafe {
                ffi::airspy_set_sample_type(self.device, sample_type)
            })?;
            check("airspy_set_vga_gain", unsafe {
                ffi::airspy_set_vga_gain(self.device, 5)
            })?;
            check("airspy_set_mixer_gain", unsafe {
                ffi::airspy_set_mixer_gain(self.device, 5)
            })?;
            check("airspy_set_lna_gain", unsafe {
                ffi::airspy_set_lna_gain(self.device, 1)
            })
        }
    }

    impl Device for Airspy {
        fn start(&mut self, pipeline: Arc<Mutex<Pipeline>>) -> Result<(), DeviceError> {
            let ctx = Arc::as_ptr(&pipeline) as *mut c_void;
            self.pipeline = Some(pipeline);

            let result = unsafe { ffi::airspy_start_rx(self.device, rx_callback, ctx) };
            if result != ffi::AIRSPY_SUCCESS {
                self.pipeline = None;
                return Err(DeviceError::Hardware {
                    operation: "airspy_start_rx",
                    detail: error_name(result),
                });
            }
            Ok(())
        }

        fn stop(&mut self) {
            unsafe { ffi::airspy_stop_rx(self.device) };
            // No callback runs past airspy_stop_rx; the context may go.
            self.pipeline = None;
        }

        fn buffer_size(&self) -> usize {
            TRANSFER_BYTES / std::mem::size_of::<Sample>()
        }

        fn max_value(&self) -> i32 {
            // 12-bit converter full scale.
            4096
        }

        fn is_streaming(&self) -> bool {
            unsafe { ffi::airspy_is_streaming(self.device) != 0 }
        }
    }

    impl Drop for Airspy {
        fn drop(&mut self) {
            self.stop();
            unsafe { ffi::airspy_close(self.device) };
            info!("closed airspy");
        }
    }
}

#[cfg(not(feature = "airspy"))]
mod stub {
    use std::sync::{Arc, Mutex};

    use iqcast_core::Pipeline;

    use crate::{Device, DeviceError, TunerSettings};

    pub struct Airspy {
        never: std::convert::Infallible,
    }

    impl Airspy {
        pub fn open(_settings: &TunerSettings) -> Result<Self, DeviceError> {
            Err(DeviceError::NotCompiled { device: "airspy" })
        }
    }

    impl Device for Airspy {
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
}
