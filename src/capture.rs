// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Camera capture: the V4L2 device and the streaming session state machine.
//!
//! [`CaptureSession`] drives any [`CaptureDevice`] through
//!
//! ```text
//! Closed -> Opened -> FormatNegotiated -> BuffersAllocated -> BuffersMapped
//!        -> Streaming -> Stopped -> Closed
//! ```
//!
//! and lends out one dequeued buffer at a time. Each buffer cycles
//! `Unqueued -> Queued -> (filled by the device) -> Dequeued -> Queued`.
//! [`V4l2Device`] is the kernel implementation; tests substitute a fake.

use crate::{
    error::{Error, Result},
    mmap::MappedRegion,
    pixel::{FourCC, YUYV},
};
use libc::{c_int, poll, pollfd, POLLIN};
use std::{
    io, mem,
    ops::Deref,
    os::{fd::BorrowedFd, raw::c_void},
    path::Path,
    time::Duration,
};
use tracing::{debug, info, instrument, trace, warn};
use v4l::{
    buffer::{Flags as BufferFlags, Type},
    capability::Flags as CapabilityFlags,
    memory::Memory,
    prelude::*,
    v4l2::{self, vidioc},
    v4l_sys::{v4l2_buffer, v4l2_requestbuffers},
    video::Capture,
    Format,
};

/// What the device reports about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub driver: String,
    pub card: String,
    pub video_capture: bool,
    pub streaming: bool,
}

/// A capture format, as requested or as negotiated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub fourcc: FourCC,
    /// Bytes per row; 0 in a request lets the driver choose.
    pub bytes_per_line: u32,
    /// Bytes per frame; 0 in a request lets the driver choose.
    pub size_image: u32,
}

impl FrameFormat {
    pub fn request(width: u32, height: u32, fourcc: FourCC) -> Self {
        Self {
            width,
            height,
            fourcc,
            bytes_per_line: 0,
            size_image: 0,
        }
    }

    /// Size of one tightly packed YUYV frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }
}

/// A buffer handed back by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DequeuedBuffer {
    pub index: u32,
    pub bytes_used: u32,
    pub sequence: u32,
    /// Driver flagged the frame as corrupted.
    pub error: bool,
}

/// Low-level capture device operations the session sequences.
///
/// Implementations report failures with the step that failed; the session
/// decides what is legal to call when.
pub trait CaptureDevice {
    /// A mapped buffer, readable for as long as the session holds it.
    type Region: Deref<Target = [u8]>;

    fn capabilities(&mut self) -> Result<Capabilities>;

    /// Requests `format` and returns what the device actually applied.
    fn set_format(&mut self, format: &FrameFormat) -> Result<FrameFormat>;

    /// Requests `count` buffers and returns how many were allocated.
    fn request_buffers(&mut self, count: u32) -> Result<u32>;

    fn map_buffer(&mut self, index: u32) -> Result<Self::Region>;

    fn queue_buffer(&mut self, index: u32) -> Result<()>;

    /// Blocks until the device returns a filled buffer, or until `timeout`
    /// when one is given.
    fn dequeue_buffer(&mut self, timeout: Option<Duration>) -> Result<DequeuedBuffer>;

    fn stream_on(&mut self) -> Result<()>;

    fn stream_off(&mut self) -> Result<()>;
}

/// V4L2 single-planar capture device using memory-mapped streaming I/O.
///
/// Capability and format negotiation go through [`v4l::Device`]. The buffer
/// pool is driven with explicit REQBUFS/QUERYBUF/QBUF/DQBUF requests so the
/// session decides which buffer the device owns at any time.
pub struct V4l2Device {
    device: Device,
    path: String,
}

impl V4l2Device {
    /// Opens the device node. The handle is non-blocking, so every dequeue
    /// waits for readiness first.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let device = Device::with_path(path).map_err(|source| Error::DeviceUnavailable {
            step: "open capture device",
            source,
        })?;
        Ok(Self {
            device,
            path: path.display().to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn fd(&self) -> c_int {
        self.device.handle().fd()
    }

    /// Issues one V4L2 request on the device handle.
    ///
    /// # Safety
    ///
    /// `arg` must be the structure `request` expects.
    unsafe fn ioctl<T>(&self, request: vidioc::_IOC_TYPE, arg: &mut T) -> io::Result<()> {
        v4l2::ioctl(self.fd(), request, arg as *mut T as *mut c_void)
    }

    /// Waits until a filled buffer can be dequeued, forever without a
    /// timeout.
    fn wait_readable(&self, timeout: Option<Duration>) -> Result<()> {
        let mut fds = pollfd {
            fd: self.fd(),
            events: POLLIN,
            revents: 0,
        };
        let millis = timeout.map_or(-1, |t| {
            c_int::try_from(t.as_millis()).unwrap_or(c_int::MAX)
        });
        loop {
            match unsafe { poll(&mut fds, 1, millis) } {
                0 => return Err(Error::Timeout(timeout.unwrap_or_default())),
                n if n > 0 => return Ok(()),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(Error::DeviceIo {
                            step: "poll",
                            source: err,
                        });
                    }
                }
            }
        }
    }

    fn mmap_buffer(index: u32) -> v4l2_buffer {
        // SAFETY: all-zero is the documented initial state of v4l2_buffer.
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.index = index;
        buf.type_ = Type::VideoCapture as u32;
        buf.memory = Memory::Mmap as u32;
        buf
    }
}

impl CaptureDevice for V4l2Device {
    type Region = MappedRegion;

    fn capabilities(&mut self) -> Result<Capabilities> {
        let caps = self
            .device
            .query_caps()
            .map_err(|source| Error::DeviceUnavailable {
                step: "VIDIOC_QUERYCAP",
                source,
            })?;

        Ok(Capabilities {
            video_capture: caps.capabilities.contains(CapabilityFlags::VIDEO_CAPTURE),
            streaming: caps.capabilities.contains(CapabilityFlags::STREAMING),
            driver: caps.driver,
            card: caps.card,
        })
    }

    fn set_format(&mut self, format: &FrameFormat) -> Result<FrameFormat> {
        let request = Format::new(
            format.width,
            format.height,
            v4l::FourCC::new(&format.fourcc.0),
        );

        // The applied format is read back from the driver.
        let applied = self.device.set_format(&request).map_err(|e| {
            Error::FormatRejected(format!(
                "VIDIOC_S_FMT {}x{} {}: {e}",
                format.width, format.height, format.fourcc
            ))
        })?;

        Ok(FrameFormat {
            width: applied.width,
            height: applied.height,
            fourcc: FourCC(applied.fourcc.repr),
            bytes_per_line: applied.stride,
            size_image: applied.size,
        })
    }

    fn request_buffers(&mut self, count: u32) -> Result<u32> {
        // SAFETY: all-zero is the documented initial state of v4l2_requestbuffers.
        let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
        req.count = count;
        req.type_ = Type::VideoCapture as u32;
        req.memory = Memory::Mmap as u32;

        unsafe { self.ioctl(vidioc::VIDIOC_REQBUFS, &mut req) }.map_err(|source| {
            Error::ResourceExhausted {
                step: "VIDIOC_REQBUFS",
                source,
            }
        })?;
        Ok(req.count)
    }

    fn map_buffer(&mut self, index: u32) -> Result<MappedRegion> {
        let mut buf = Self::mmap_buffer(index);
        unsafe { self.ioctl(vidioc::VIDIOC_QUERYBUF, &mut buf) }.map_err(|source| {
            Error::ResourceExhausted {
                step: "VIDIOC_QUERYBUF",
                source,
            }
        })?;

        // SAFETY: `offset` is the active member for MEMORY_MMAP buffers, and
        // the handle outlives the borrow below.
        let (offset, fd) = unsafe { (buf.m.offset, BorrowedFd::borrow_raw(self.fd())) };
        MappedRegion::map(
            fd,
            buf.length as usize,
            offset as u64,
            false,
            libc::MAP_SHARED,
            "capture buffer mmap",
        )
    }

    fn queue_buffer(&mut self, index: u32) -> Result<()> {
        let mut buf = Self::mmap_buffer(index);
        unsafe { self.ioctl(vidioc::VIDIOC_QBUF, &mut buf) }.map_err(|source| {
            Error::DeviceIo {
                step: "VIDIOC_QBUF",
                source,
            }
        })
    }

    fn dequeue_buffer(&mut self, timeout: Option<Duration>) -> Result<DequeuedBuffer> {
        self.wait_readable(timeout)?;
        let mut buf = Self::mmap_buffer(0);
        unsafe { self.ioctl(vidioc::VIDIOC_DQBUF, &mut buf) }.map_err(|source| {
            Error::DeviceIo {
                step: "VIDIOC_DQBUF",
                source,
            }
        })?;
        Ok(DequeuedBuffer {
            index: buf.index,
            bytes_used: buf.bytesused,
            sequence: buf.sequence,
            error: buf.flags & BufferFlags::ERROR.bits() != 0,
        })
    }

    fn stream_on(&mut self) -> Result<()> {
        let mut kind = Type::VideoCapture as u32;
        unsafe { self.ioctl(vidioc::VIDIOC_STREAMON, &mut kind) }.map_err(|source| {
            Error::DeviceIo {
                step: "VIDIOC_STREAMON",
                source,
            }
        })
    }

    fn stream_off(&mut self) -> Result<()> {
        let mut kind = Type::VideoCapture as u32;
        unsafe { self.ioctl(vidioc::VIDIOC_STREAMOFF, &mut kind) }.map_err(|source| {
            Error::DeviceIo {
                step: "VIDIOC_STREAMOFF",
                source,
            }
        })
    }
}

/// Lifecycle of a [`CaptureSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opened,
    FormatNegotiated,
    BuffersAllocated,
    BuffersMapped,
    Streaming,
    Stopped,
}

/// Ownership of one pool buffer as the session sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferState {
    /// Mapped but never handed to the device.
    Unqueued,
    /// Owned by the device, waiting to be filled.
    Queued,
    /// Filled and lent to the process.
    Dequeued,
}

struct PoolBuffer<R> {
    region: R,
    state: BufferState,
}

/// Streaming capture session over one device.
///
/// Acquire and release must strictly alternate: [`CaptureSession::acquire_frame`]
/// lends out exactly one filled buffer and refuses to lend another until
/// [`CaptureSession::release_frame`] has returned it to the device.
pub struct CaptureSession<D: CaptureDevice> {
    // Buffers are unmapped before the device handle closes.
    buffers: Vec<PoolBuffer<D::Region>>,
    device: D,
    state: SessionState,
    format: Option<FrameFormat>,
    lent: Option<DequeuedBuffer>,
    timeout: Option<Duration>,
    /// Pool size the device granted in [`CaptureSession::allocate`].
    granted: u32,
}

impl CaptureSession<V4l2Device> {
    /// Opens a V4L2 device node and checks it can stream video capture.
    #[instrument(level = "debug", skip_all, fields(device = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_device(V4l2Device::open(path)?)
    }
}

impl<D: CaptureDevice> CaptureSession<D> {
    /// `Closed -> Opened`. Fails with [`Error::DeviceUnavailable`] unless the
    /// device supports single-planar capture and streaming I/O.
    pub fn with_device(mut device: D) -> Result<Self> {
        let caps = device.capabilities()?;
        info!("capture device {} ({})", caps.card, caps.driver);

        if !caps.video_capture {
            return Err(Error::DeviceUnavailable {
                step: "capability check",
                source: io::Error::new(
                    io::ErrorKind::Unsupported,
                    "device does not handle single-planar video capture",
                ),
            });
        }
        if !caps.streaming {
            return Err(Error::DeviceUnavailable {
                step: "capability check",
                source: io::Error::new(
                    io::ErrorKind::Unsupported,
                    "device does not handle frame streaming",
                ),
            });
        }

        Ok(Self {
            buffers: Vec::new(),
            device,
            state: SessionState::Opened,
            format: None,
            lent: None,
            timeout: None,
            granted: 0,
        })
    }

    /// Bounds every later [`CaptureSession::acquire_frame`] wait. Without
    /// it acquisition blocks until the device delivers.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The negotiated format, once negotiated.
    pub fn format(&self) -> Option<&FrameFormat> {
        self.format.as_ref()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_state(&self, index: usize) -> Option<BufferState> {
        self.buffers.get(index).map(|b| b.state)
    }

    fn expect_state(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// `Opened -> FormatNegotiated`. Requests YUYV at `width` x `height` and
    /// keeps whatever the device actually applied; all later sizing uses the
    /// returned dimensions.
    pub fn negotiate(&mut self, width: u32, height: u32) -> Result<FrameFormat> {
        self.expect_state(SessionState::Opened, "negotiate format")?;

        let actual = self
            .device
            .set_format(&FrameFormat::request(width, height, YUYV))?;

        if actual.fourcc != YUYV {
            return Err(Error::FormatRejected(format!(
                "requested {YUYV} but device selected {}",
                actual.fourcc
            )));
        }
        if actual.width == 0 || actual.height == 0 {
            return Err(Error::FormatRejected(format!(
                "device negotiated an empty {}x{} frame",
                actual.width, actual.height
            )));
        }
        if actual.bytes_per_line != 0 && actual.bytes_per_line != actual.width * 2 {
            return Err(Error::FormatRejected(format!(
                "padded rows unsupported: {} bytes per line for width {}",
                actual.bytes_per_line, actual.width
            )));
        }
        if actual.width != width || actual.height != height {
            warn!(
                "requested {}x{} resolution but camera set {}x{}",
                width, height, actual.width, actual.height
            );
        }
        info!("capture format {}x{} {}", actual.width, actual.height, actual.fourcc);

        self.format = Some(actual);
        self.state = SessionState::FormatNegotiated;
        Ok(actual)
    }

    /// `FormatNegotiated -> BuffersAllocated`. Returns the pool size the
    /// device granted, which may differ from `count`.
    pub fn allocate(&mut self, count: u32) -> Result<u32> {
        self.expect_state(SessionState::FormatNegotiated, "allocate buffers")?;

        let granted = self.device.request_buffers(count)?;
        if granted == 0 {
            return Err(Error::ResourceExhausted {
                step: "VIDIOC_REQBUFS",
                source: io::Error::new(io::ErrorKind::OutOfMemory, "device granted no buffers"),
            });
        }
        if granted != count {
            debug!("requested {count} capture buffers, device granted {granted}");
        }

        self.buffers.reserve_exact(granted as usize);
        self.granted = granted;
        self.state = SessionState::BuffersAllocated;
        Ok(granted)
    }

    /// `BuffersAllocated -> BuffersMapped`. Maps every buffer the device
    /// granted.
    pub fn map_buffers(&mut self) -> Result<()> {
        self.expect_state(SessionState::BuffersAllocated, "map buffers")?;
        let frame_bytes = self.frame_bytes();

        for index in 0..self.granted {
            let region = self.device.map_buffer(index)?;
            if region.len() < frame_bytes {
                return Err(Error::FormatRejected(format!(
                    "capture buffer {index} holds {} bytes, a frame needs {frame_bytes}",
                    region.len()
                )));
            }
            trace!("mapped capture buffer {index}: {} bytes", region.len());
            self.buffers.push(PoolBuffer {
                region,
                state: BufferState::Unqueued,
            });
        }

        self.state = SessionState::BuffersMapped;
        Ok(())
    }

    /// `BuffersMapped -> Streaming`.
    pub fn start_streaming(&mut self) -> Result<()> {
        self.expect_state(SessionState::BuffersMapped, "start streaming")?;
        self.device.stream_on()?;
        self.state = SessionState::Streaming;
        debug!("capture streaming with {} buffer(s)", self.buffers.len());
        Ok(())
    }

    /// Runs negotiate, allocate, map and start in one go.
    pub fn start(&mut self, width: u32, height: u32, buffers: u32) -> Result<FrameFormat> {
        let format = self.negotiate(width, height)?;
        self.allocate(buffers)?;
        self.map_buffers()?;
        self.start_streaming()?;
        Ok(format)
    }

    /// Hands every idle buffer to the device, blocks until one comes back
    /// filled and returns a read-only view of exactly one frame.
    ///
    /// Calling this again before [`CaptureSession::release_frame`] is a
    /// precondition violation and fails with [`Error::InvalidState`].
    pub fn acquire_frame(&mut self) -> Result<&[u8]> {
        self.expect_state(SessionState::Streaming, "acquire frame")?;
        if self.lent.is_some() {
            return Err(Error::InvalidState {
                operation: "acquire a frame before releasing the previous one",
                state: self.state,
            });
        }

        for (index, buf) in self.buffers.iter_mut().enumerate() {
            if buf.state == BufferState::Unqueued {
                self.device.queue_buffer(index as u32)?;
                buf.state = BufferState::Queued;
            }
        }

        let dequeued = self.device.dequeue_buffer(self.timeout)?;
        let frame_bytes = self.frame_bytes();
        let buf = self
            .buffers
            .get_mut(dequeued.index as usize)
            .filter(|b| b.state == BufferState::Queued)
            .ok_or_else(|| Error::DeviceIo {
                step: "VIDIOC_DQBUF",
                source: io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("device returned buffer {} that was not queued", dequeued.index),
                ),
            })?;
        buf.state = BufferState::Dequeued;
        self.lent = Some(dequeued);

        if dequeued.error {
            warn!("frame {} flagged as corrupted by the driver", dequeued.sequence);
        }
        if dequeued.bytes_used != 0 && (dequeued.bytes_used as usize) < frame_bytes {
            return Err(Error::MalformedInput(format!(
                "frame {} carries {} bytes, expected {frame_bytes}",
                dequeued.sequence, dequeued.bytes_used
            )));
        }
        trace!("dequeued buffer {} frame {}", dequeued.index, dequeued.sequence);

        Ok(&buf.region[..frame_bytes])
    }

    /// The buffer currently lent out, if any.
    pub fn lent(&self) -> Option<&DequeuedBuffer> {
        self.lent.as_ref()
    }

    /// Returns the lent buffer to the device for the next fill.
    pub fn release_frame(&mut self) -> Result<()> {
        self.expect_state(SessionState::Streaming, "release frame")?;
        let Some(lent) = self.lent else {
            return Err(Error::InvalidState {
                operation: "release a frame that was never acquired",
                state: self.state,
            });
        };

        self.device.queue_buffer(lent.index)?;
        self.buffers[lent.index as usize].state = BufferState::Queued;
        self.lent = None;
        Ok(())
    }

    /// `Streaming -> Stopped`. The device reclaims every buffer; a lent view
    /// is invalidated with it.
    pub fn stop_streaming(&mut self) -> Result<()> {
        self.expect_state(SessionState::Streaming, "stop streaming")?;
        self.state = SessionState::Stopped;
        self.lent = None;
        for buf in &mut self.buffers {
            buf.state = BufferState::Unqueued;
        }
        self.device.stream_off()?;
        debug!("capture streaming stopped");
        Ok(())
    }

    /// Stops streaming if needed, unmaps the pool and releases the device.
    pub fn close(mut self) -> Result<()> {
        let result = if self.state == SessionState::Streaming {
            self.stop_streaming()
        } else {
            Ok(())
        };
        self.state = SessionState::Closed;
        self.buffers.clear();
        result
    }

    fn frame_bytes(&self) -> usize {
        self.format.map(|f| f.frame_bytes()).unwrap_or(0)
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if self.state == SessionState::Streaming {
            if let Err(e) = self.device.stream_off() {
                warn!("stream off on drop failed: {e}");
            }
        }
    }
}
