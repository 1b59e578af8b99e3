// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{Error, Result};
use libc::{c_int, c_void, madvise, mmap, munmap, off_t, MAP_FAILED};
use std::{
    io,
    ops::{Deref, DerefMut},
    os::fd::{AsRawFd, BorrowedFd},
    ptr::null_mut,
    slice::{from_raw_parts, from_raw_parts_mut},
};
use tracing::{trace, warn};

/// Memory-mapped view of a kernel-owned region: a capture buffer, the
/// framebuffer, or the colour lookup table file.
///
/// The mapping is released when dropped, on every exit path. Callers only
/// ever see it as a bounds-checked slice.
///
/// # Safety
///
/// While the API is safe, a capture buffer is concurrently written by the
/// device whenever it is queued. The capture session only hands out a view
/// while the buffer is dequeued.
#[derive(Debug)]
pub struct MappedRegion {
    mmap: *mut u8,
    len: usize,
    writable: bool,
}

impl MappedRegion {
    /// Maps `len` bytes of `fd` starting at `offset`.
    ///
    /// `flags` are the `MAP_*` flags passed straight to `mmap(2)`. A failed
    /// mapping is reported as [`Error::ResourceExhausted`] against `step`.
    pub fn map(
        fd: BorrowedFd<'_>,
        len: usize,
        offset: u64,
        writable: bool,
        flags: c_int,
        step: &'static str,
    ) -> Result<Self> {
        let prot = if writable {
            libc::PROT_READ | libc::PROT_WRITE
        } else {
            libc::PROT_READ
        };
        let offset = off_t::try_from(offset)
            .map_err(|_| Error::MalformedInput(format!("{step}: offset {offset} out of range")))?;

        let mmap = unsafe { mmap(null_mut(), len, prot, flags, fd.as_raw_fd(), offset) };
        if mmap == MAP_FAILED {
            return Err(Error::ResourceExhausted {
                step,
                source: io::Error::last_os_error(),
            });
        }
        trace!("{step}: mapped {len} bytes at {mmap:?}");

        Ok(Self {
            mmap: mmap.cast::<u8>(),
            len,
            writable,
        })
    }

    /// Advises the kernel the whole region will be needed soon.
    pub fn will_need(&self) {
        if unsafe { madvise(self.mmap.cast::<c_void>(), self.len, libc::MADV_WILLNEED) } != 0 {
            warn!("madvise failed: {}", io::Error::last_os_error());
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.mmap, self.len) }
    }

    /// # Panics
    ///
    /// Panics if the region was mapped read-only.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        assert!(self.writable, "region is mapped read-only");
        unsafe { from_raw_parts_mut(self.mmap, self.len) }
    }

    /// The region as native-endian 16-bit words. Mappings are page aligned,
    /// so the cast is always aligned; a trailing odd byte is not exposed.
    pub fn as_words(&self) -> &[u16] {
        unsafe { from_raw_parts(self.mmap.cast::<u16>(), self.len / 2) }
    }

    /// # Panics
    ///
    /// Panics if the region was mapped read-only.
    pub fn as_words_mut(&mut self) -> &mut [u16] {
        assert!(self.writable, "region is mapped read-only");
        unsafe { from_raw_parts_mut(self.mmap.cast::<u16>(), self.len / 2) }
    }
}

// SAFETY: the region owns its mapping outright and only hands out mutable
// access through `&mut self`.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl DerefMut for MappedRegion {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_slice_mut()
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if unsafe { munmap(self.mmap.cast::<c_void>(), self.len) } != 0 {
            warn!("unmap failed: {}", io::Error::last_os_error());
        } else {
            trace!("unmapped {} bytes", self.len);
        }
    }
}
