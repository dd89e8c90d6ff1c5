// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Signal-driven supervision.
//!
//! SIGINT, SIGTERM and SIGALRM are blocked process-wide before any
//! other thread exists, so the tuner's callback thread inherits the
//! mask and only the supervisor consumes them, synchronously, through
//! `sigwait`. SIGPIPE never terminates the process: socket writes pass
//! MSG_NOSIGNAL and the runtime ignores it anyway.

use std::io;
use std::mem;
use std::os::raw::c_int;
use std::ptr;

/// The blocked supervisor signal set.
pub struct SignalMask {
    set: libc::sigset_t,
}

impl SignalMask {
    /// Block SIGINT, SIGTERM and SIGALRM for the calling thread and
    /// every thread it spawns afterwards.
    pub fn install() -> io::Result<Self> {
        unsafe {
            let mut set: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGINT);
            libc::sigaddset(&mut set, libc::SIGTERM);
            libc::sigaddset(&mut set, libc::SIGALRM);

            if libc::pthread_sigmask(libc::SIG_BLOCK, &set, ptr::null_mut()) != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self { set })
        }
    }

    /// Arm a one-shot alarm and wait for the next blocked signal.
    ///
    /// Returns the signal number — SIGALRM after `seconds` of quiet,
    /// or whichever termination signal arrived first.
    pub fn wait_with_alarm(&self, seconds: u32) -> io::Result<c_int> {
        let mut signal: c_int = 0;

        unsafe {
            libc::alarm(seconds);
            let rc = libc::sigwait(&self.set, &mut signal);
            if rc != 0 {
                return Err(io::Error::from_raw_os_error(rc));
            }
        }

        Ok(signal)
    }
}
