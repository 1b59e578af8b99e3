// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{Error, Result};
use core::fmt;

/// Four character pixel format code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

/// YUYV 4:2:2 packed format, the only capture format the pipeline accepts.
pub const YUYV: FourCC = FourCC(*b"YUYV");

/// 16-bit packed 5/6/5 format written to the panel.
pub const RGB565: FourCC = FourCC(*b"RGBP");

impl From<FourCC> for u32 {
    fn from(value: FourCC) -> Self {
        u32::from_le_bytes(value.0)
    }
}

impl From<u32> for FourCC {
    fn from(value: u32) -> Self {
        FourCC(value.to_le_bytes())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0 {
            let c = if b.is_ascii_graphic() { b as char } else { '?' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FourCC({self})")
    }
}

/// Bytes in one YUYV macropixel: two luma samples sharing one chroma pair.
pub const MACROPIXEL_BYTES: usize = 4;

/// Mask of the 5-bit channels (bits 11-15 and 0-4).
pub const CHANNEL5_MAX: u8 = 0x1f;
/// Mask of the 6-bit middle channel (bits 5-10).
pub const CHANNEL6_MAX: u8 = 0x3f;

/// One packed 16-bit pixel.
///
/// Channel A occupies bits 11-15, channel B bits 5-10 and channel C bits
/// 0-4. On the reference panel A is blue and C is red: the colour converter
/// stores blue high and red low, and the display consumes it that way.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Packed16(pub u16);

impl Packed16 {
    pub const WHITE: Packed16 = Packed16(0xffff);
    pub const BLACK: Packed16 = Packed16(0x0000);
    pub const GRAY: Packed16 = Packed16(0xc618);

    /// Packs three channel values. Each value is shifted into place and the
    /// fields are OR-ed together, truncating to 16 bits; values wider than
    /// their field bleed into the neighbouring field exactly as the wavelet
    /// detail boost expects.
    pub const fn pack(a: u8, b: u8, c: u8) -> Self {
        Packed16(((a as u16) << 11) | ((b as u16) << 5) | (c as u16))
    }

    /// Packs full-range 8-bit blue, green and red into blue-high order.
    pub const fn from_bgr888(blue: u8, green: u8, red: u8) -> Self {
        Self::pack(blue >> 3, green >> 2, red >> 3)
    }

    /// High 5-bit channel.
    pub const fn a(self) -> u8 {
        (self.0 >> 11) as u8 & CHANNEL5_MAX
    }

    /// Middle 6-bit channel.
    pub const fn b(self) -> u8 {
        (self.0 >> 5) as u8 & CHANNEL6_MAX
    }

    /// Low 5-bit channel.
    pub const fn c(self) -> u8 {
        self.0 as u8 & CHANNEL5_MAX
    }
}

impl From<Packed16> for u16 {
    fn from(value: Packed16) -> Self {
        value.0
    }
}

impl fmt::Debug for Packed16 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Packed16({:#06x})", self.0)
    }
}

/// Borrowed YUV 4:2:2 frame as delivered by the camera.
///
/// Each 4-byte macropixel is laid out `(Y1, V0, Y0, U0)`.
#[derive(Clone, Copy, Debug)]
pub struct Yuv422Frame<'a> {
    data: &'a [u8],
}

impl<'a> Yuv422Frame<'a> {
    /// Wraps raw capture bytes, rejecting a length that is not a whole
    /// number of macropixels.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() % MACROPIXEL_BYTES != 0 {
            return Err(Error::MalformedInput(format!(
                "YUYV frame of {} bytes is not a multiple of {MACROPIXEL_BYTES}",
                data.len()
            )));
        }
        Ok(Self { data })
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn macropixels(&self) -> usize {
        self.data.len() / MACROPIXEL_BYTES
    }

    /// Number of output pixels the frame converts to.
    pub fn pixels(&self) -> usize {
        self.macropixels() * 2
    }
}

/// Row-major frame of packed 16-bit pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame16 {
    width: u32,
    height: u32,
    pixels: Vec<u16>,
}

impl Frame16 {
    /// Allocates a frame with every pixel set to `fill`.
    pub fn new(width: u32, height: u32, fill: Packed16) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill.0; width as usize * height as usize],
        }
    }

    /// Takes ownership of `pixels`, which must hold exactly `width * height`
    /// entries.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u16>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(Error::MalformedInput(format!(
                "{} pixels supplied for a {width}x{height} frame ({expected} expected)",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size of the pixel data in bytes.
    pub fn size(&self) -> usize {
        self.pixels.len() * 2
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u16] {
        &mut self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    pub fn row(&self, y: u32) -> &[u16] {
        let w = self.width as usize;
        let start = y as usize * w;
        &self.pixels[start..start + w]
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Packed16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(Packed16(
            self.pixels[y as usize * self.width as usize + x as usize],
        ))
    }

    pub fn into_pixels(self) -> Vec<u16> {
        self.pixels
    }
}

impl fmt::Debug for Frame16 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Frame16({}x{})", self.width, self.height)
    }
}

impl fmt::Display for Frame16 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{} {} {}B", self.width, self.height, RGB565, self.size())
    }
}
