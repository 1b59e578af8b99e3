// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    capture::{CaptureDevice, CaptureSession, SessionState},
    convert::convert,
    display::{DisplaySurface, PixelMemory},
    error::{Error, Result},
    haar::HaarTransform,
    lut::ColorLookupTable,
    pixel::{Frame16, Packed16, Yuv422Frame},
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};
use tracing::{debug, info, info_span};

/// Loop settings for [`Pipeline::run`].
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Stop after this many frames; `None` runs until signalled.
    pub frame_budget: Option<u64>,
    /// Run the wavelet transform; when false the converted frame is shown.
    pub transform: bool,
    /// Log the frame rate every this many frames, 0 to disable.
    pub report_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_budget: None,
            transform: true,
            report_interval: 30,
        }
    }
}

/// Rolling frame-rate estimate over the last `history` frame intervals.
#[derive(Debug)]
pub struct FrameRate {
    prev: Instant,
    history: Vec<i64>,
    index: usize,
}

impl FrameRate {
    pub fn new(history: usize) -> Self {
        Self {
            prev: Instant::now(),
            history: vec![0; history.max(1)],
            index: 0,
        }
    }

    /// Records a frame boundary and returns the averaged rate.
    pub fn update(&mut self) -> i64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.prev);
        self.prev = now;

        self.history[self.index] = 1_000_000_000 / (elapsed.as_nanos() as i64).max(1);
        self.index = (self.index + 1) % self.history.len();

        (self.history.iter().sum::<i64>() as f64 / self.history.len() as f64).round() as i64
    }
}

/// Summary of a finished run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunStats {
    pub frames: u64,
    pub elapsed: Duration,
}

impl RunStats {
    pub fn seconds_per_frame(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() / self.frames as f64
    }

    pub fn frames_per_second(&self) -> f64 {
        let spf = self.seconds_per_frame();
        if spf == 0.0 {
            0.0
        } else {
            1.0 / spf
        }
    }
}

/// The capture, convert, transform and composite loop.
///
/// Owns the capture session and the display, borrows the shared lookup
/// table, and keeps the two intermediate frames so the steady state does no
/// allocation.
pub struct Pipeline<'a, D: CaptureDevice, M: PixelMemory> {
    capture: CaptureSession<D>,
    display: DisplaySurface<M>,
    lut: &'a ColorLookupTable,
    haar: HaarTransform,
    rgb: Frame16,
    wavelet: Frame16,
    config: PipelineConfig,
    fps: FrameRate,
    frames: u64,
}

impl<'a, D: CaptureDevice, M: PixelMemory> Pipeline<'a, D, M> {
    /// Checks the streaming geometry once: even dimensions for the
    /// transform and a source no larger than the panel.
    pub fn new(
        capture: CaptureSession<D>,
        display: DisplaySurface<M>,
        lut: &'a ColorLookupTable,
        config: PipelineConfig,
    ) -> Result<Self> {
        if capture.state() != SessionState::Streaming {
            return Err(Error::InvalidState {
                operation: "build a pipeline",
                state: capture.state(),
            });
        }
        let format = capture
            .format()
            .copied()
            .ok_or(Error::InvalidState {
                operation: "build a pipeline without a negotiated format",
                state: capture.state(),
            })?;
        let (width, height) = (format.width, format.height);

        let haar = HaarTransform::new(width, height)?;
        if !display.fits(width, height) {
            return Err(Error::FormatRejected(format!(
                "{width}x{height} capture does not fit {}x{} panel",
                display.width(),
                display.height()
            )));
        }
        let (top, left) = display.geometry().centre(width, height);
        debug!("compositing {width}x{height} at row {top} column {left}");

        Ok(Self {
            capture,
            display,
            lut,
            haar,
            rgb: Frame16::new(width, height, Packed16::BLACK),
            wavelet: Frame16::new(width, height, Packed16::WHITE),
            config,
            fps: FrameRate::new(30),
            frames: 0,
        })
    }

    /// Processes exactly one frame: acquire, convert, transform, composite,
    /// release.
    pub fn step(&mut self) -> Result<()> {
        let frame = {
            let _span = info_span!("capture").entered();
            self.capture.acquire_frame()?
        };
        {
            let _span = info_span!("convert").entered();
            convert(Yuv422Frame::new(frame)?, self.lut, &mut self.rgb)?;
        }

        let shown = if self.config.transform {
            let _span = info_span!("transform").entered();
            self.haar.transform(&self.rgb, &mut self.wavelet)?;
            &self.wavelet
        } else {
            &self.rgb
        };
        {
            let _span = info_span!("composite").entered();
            self.display.composite_centered(shown)?;
        }

        self.capture.release_frame()?;
        self.frames += 1;
        Ok(())
    }

    /// Runs until the frame budget is spent or `stop` is raised. The flag is
    /// only checked between frames; a frame in flight always completes.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<RunStats> {
        let start = Instant::now();
        let first = self.frames;

        while !stop.load(Ordering::Relaxed) {
            if let Some(budget) = self.config.frame_budget {
                if self.frames - first >= budget {
                    break;
                }
            }

            let _span = info_span!("frame", n = self.frames).entered();
            self.step()?;

            let fps = self.fps.update();
            if self.config.report_interval != 0 && self.frames % self.config.report_interval == 0
            {
                info!("frames: {} fps: {}", self.frames, fps);
            }
        }

        Ok(RunStats {
            frames: self.frames - first,
            elapsed: start.elapsed(),
        })
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The most recently composited frame.
    pub fn last_frame(&self) -> &Frame16 {
        if self.config.transform {
            &self.wavelet
        } else {
            &self.rgb
        }
    }

    pub fn display(&self) -> &DisplaySurface<M> {
        &self.display
    }

    pub fn capture(&self) -> &CaptureSession<D> {
        &self.capture
    }

    /// Stops and closes the capture session, then releases the display.
    /// The display is opened before the camera, so this is the reverse of
    /// bring-up.
    pub fn shutdown(self) -> Result<()> {
        let Self {
            capture, display, ..
        } = self;
        let result = capture.close();
        display.close();
        result
    }
}
