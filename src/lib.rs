// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # Haar Camera Pipeline Library
//!
//! This library implements a real-time capture to display pipeline for
//! embedded Linux boards: frames are read from a V4L2 camera in YUYV 4:2:2,
//! converted to packed 16-bit colour through a precomputed lookup table,
//! decomposed with a single-level 2D Haar wavelet transform and composited
//! centred onto a 16 bpp framebuffer.
//!
//! ## Features
//!
//! - **Streaming Capture**: Memory-mapped V4L2 buffers driven through an
//!   explicit session state machine.
//! - **Table Colour Conversion**: A 256³ entry lookup table, persisted once
//!   and memory-mapped on later runs.
//! - **Haar Transform**: Integer 2x2 block transform into LL/LH/HL/HH
//!   quadrants with boosted detail bands.
//! - **Framebuffer Output**: Stride-aware centred compositing.
//!
//! ## Example
//!
//! ```no_run
//! use haarcam::{
//!     capture::CaptureSession,
//!     display::DisplaySurface,
//!     lut::ColorLookupTable,
//!     pipeline::{Pipeline, PipelineConfig},
//! };
//! use std::sync::atomic::AtomicBool;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let lut = ColorLookupTable::load_or_build("yuv2rgb.lut")?;
//! let mut capture = CaptureSession::open("/dev/video0")?;
//! capture.start(432, 240, 1)?;
//! let display = DisplaySurface::open("/dev/fb0")?;
//!
//! let mut pipeline = Pipeline::new(capture, display, &lut, PipelineConfig::default())?;
//! pipeline.run(&AtomicBool::new(false))?;
//! pipeline.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: V4L2 capture device supporting YUYV streaming and an fbdev
//!   framebuffer that accepts 16 bits per pixel.
//!
//! ## Safety
//!
//! This library uses `unsafe` code for device ioctls and memory mapping. All
//! unsafe operations are isolated to the `mmap`, `capture` and `display`
//! modules and wrapped with safe APIs.

pub mod capture;
pub mod convert;
pub mod display;
pub mod error;
pub mod haar;
pub mod lut;
pub mod mmap;
pub mod pipeline;
pub mod pixel;
pub mod rawfile;

pub use error::{Error, Result};
