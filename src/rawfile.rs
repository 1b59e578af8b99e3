// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Headerless raw image dumps.
//!
//! A dump is the frame's pixel words in native byte order and nothing else,
//! so the file size alone fixes the pixel count. The caller supplies the
//! dimensions and they must match.

use crate::{
    error::{Error, Result},
    pixel::Frame16,
};
use std::{fs, path::Path};
use tracing::debug;

/// Reads a raw `width` x `height` packed 16-bit frame.
pub fn read_frame16(path: impl AsRef<Path>, width: u32, height: u32) -> Result<Frame16> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let expected = width as usize * height as usize * 2;
    if bytes.len() != expected {
        return Err(Error::MalformedInput(format!(
            "{} is {} bytes, a {width}x{height} frame is {expected}",
            path.display(),
            bytes.len()
        )));
    }

    let pixels = bytes
        .chunks_exact(2)
        .map(|px| u16::from_ne_bytes([px[0], px[1]]))
        .collect();
    debug!("read {width}x{height} frame from {}", path.display());
    Frame16::from_pixels(width, height, pixels)
}

/// Writes `frame` as a raw dump.
pub fn write_frame16(path: impl AsRef<Path>, frame: &Frame16) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, frame.as_bytes())?;
    debug!("wrote {frame} to {}", path.display());
    Ok(())
}
