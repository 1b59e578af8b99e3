// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Single-level 2D Haar wavelet transform over packed 16-bit frames.
//!
//! The source is walked in non-overlapping 2x2 blocks. Each block yields one
//! pixel in each of the four subbands, and the subbands are tiled into an
//! output frame of the same size:
//!
//! ```text
//! +------+------+
//! |  LL  |  LH  |
//! +------+------+
//! |  HL  |  HH  |
//! +------+------+
//! ```
//!
//! The three channels are transformed independently with integer arithmetic
//! and truncating division. Detail subbands are multiplied by ten for
//! visibility. The boosted value is truncated to 8 bits and is *not*
//! re-clamped to the channel width, so it spills into the neighbouring
//! channel when packed; the output reproduces that bleed bit for bit.

use crate::{
    error::{Error, Result},
    pixel::{Frame16, Packed16, CHANNEL5_MAX, CHANNEL6_MAX},
};

/// Gain applied to the LH, HL and HH subbands.
pub const DETAIL_GAIN: i32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subband {
    /// Approximation, top-left.
    LL,
    /// Horizontal detail, top-right.
    LH,
    /// Vertical detail, bottom-left.
    HL,
    /// Diagonal detail, bottom-right.
    HH,
}

impl Subband {
    pub const ALL: [Subband; 4] = [Subband::LL, Subband::LH, Subband::HL, Subband::HH];
}

/// Quadrant geometry of a transformed `width` x `height` frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuadrantLayout {
    width: usize,
    height: usize,
}

impl QuadrantLayout {
    /// Fails with [`Error::MalformedInput`] unless both dimensions are even
    /// and non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(Error::MalformedInput(format!(
                "Haar transform needs even, non-zero dimensions, got {width}x{height}"
            )));
        }
        Ok(Self {
            width: width as usize,
            height: height as usize,
        })
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Width of each quadrant, the column where the right quadrants start.
    pub fn half_width(&self) -> usize {
        self.width / 2
    }

    /// Height of each quadrant, the row where the bottom quadrants start.
    pub fn half_height(&self) -> usize {
        self.height / 2
    }

    /// `(row, column)` of the quadrant's top-left pixel in the output.
    pub fn origin(&self, band: Subband) -> (usize, usize) {
        match band {
            Subband::LL => (0, 0),
            Subband::LH => (0, self.half_width()),
            Subband::HL => (self.half_height(), 0),
            Subband::HH => (self.half_height(), self.half_width()),
        }
    }

    /// Linear output index of block `(row, col)` within `band`.
    #[inline]
    pub fn offset(&self, band: Subband, row: usize, col: usize) -> usize {
        let (r0, c0) = self.origin(band);
        (r0 + row) * self.width + c0 + col
    }

    /// The subband an output pixel at `(row, col)` belongs to.
    pub fn band_at(&self, row: usize, col: usize) -> Subband {
        match (row < self.half_height(), col < self.half_width()) {
            (true, true) => Subband::LL,
            (true, false) => Subband::LH,
            (false, true) => Subband::HL,
            (false, false) => Subband::HH,
        }
    }

    pub fn pixels(&self) -> usize {
        self.width * self.height
    }
}

/// One 2x2 block of source pixels.
#[derive(Clone, Copy, Debug)]
pub struct Block {
    pub r1c1: Packed16,
    pub r1c2: Packed16,
    pub r2c1: Packed16,
    pub r2c2: Packed16,
}

/// The four packed output pixels of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Subbands {
    pub ll: Packed16,
    pub lh: Packed16,
    pub hl: Packed16,
    pub hh: Packed16,
}

/// Per-channel subband values, details already boosted and truncated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelBands {
    pub ll: u8,
    pub lh: u8,
    pub hl: u8,
    pub hh: u8,
}

/// Transforms one channel of a 2x2 block whose samples saturate at `max`.
pub fn channel_bands(r1c1: u8, r1c2: u8, r2c1: u8, r2c2: u8, max: u8) -> ChannelBands {
    let m = max as i32;
    let (r1c1, r1c2, r2c1, r2c2) = (r1c1 as i32, r1c2 as i32, r2c1 as i32, r2c2 as i32);

    // low pass: vertical averages, then their horizontal average
    let lp1 = ((r1c1 + r2c1) / 2).min(m);
    let lp2 = ((r1c2 + r2c2) / 2).min(m);
    let ll = ((lp1 + lp2) / 2).min(m);
    let lh = ((lp1 - lp2) / 2).abs().min(m);

    // high pass: vertical differences
    let hp1 = ((r1c1 - r2c1) / 2).abs().min(m);
    let hp2 = ((r1c2 - r2c2) / 2).abs().min(m);
    let hl = ((hp1 + hp2) / 2).min(m);
    let hh = ((hp1 - hp2) / 2).abs().min(m);

    ChannelBands {
        ll: ll as u8,
        lh: boost(lh),
        hl: boost(hl),
        hh: boost(hh),
    }
}

#[inline(always)]
fn boost(detail: i32) -> u8 {
    (detail * DETAIL_GAIN) as u8
}

impl Block {
    pub fn transform(&self) -> Subbands {
        let px = [self.r1c1, self.r1c2, self.r2c1, self.r2c2];
        let a = channel_bands(px[0].a(), px[1].a(), px[2].a(), px[3].a(), CHANNEL5_MAX);
        let b = channel_bands(px[0].b(), px[1].b(), px[2].b(), px[3].b(), CHANNEL6_MAX);
        let c = channel_bands(px[0].c(), px[1].c(), px[2].c(), px[3].c(), CHANNEL5_MAX);

        Subbands {
            ll: Packed16::pack(a.ll, b.ll, c.ll),
            lh: Packed16::pack(a.lh, b.lh, c.lh),
            hl: Packed16::pack(a.hl, b.hl, c.hl),
            hh: Packed16::pack(a.hh, b.hh, c.hh),
        }
    }
}

/// Haar transform engine for one fixed geometry.
///
/// The geometry is validated once at construction; [`HaarTransform::transform`]
/// only checks that the frames it is handed match it.
#[derive(Clone, Copy, Debug)]
pub struct HaarTransform {
    layout: QuadrantLayout,
}

impl HaarTransform {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            layout: QuadrantLayout::new(width, height)?,
        })
    }

    pub fn layout(&self) -> &QuadrantLayout {
        &self.layout
    }

    /// Writes the four subbands of `src` into the quadrants of `dst`.
    pub fn transform(&self, src: &Frame16, dst: &mut Frame16) -> Result<()> {
        self.check(src)?;
        self.check(dst)?;

        let w = self.layout.width;
        let input = src.pixels();
        let output = dst.pixels_mut();

        for row in 0..self.layout.half_height() {
            let r1 = &input[2 * row * w..(2 * row + 1) * w];
            let r2 = &input[(2 * row + 1) * w..(2 * row + 2) * w];

            for (col, (top, bottom)) in r1.chunks_exact(2).zip(r2.chunks_exact(2)).enumerate() {
                let bands = Block {
                    r1c1: Packed16(top[0]),
                    r1c2: Packed16(top[1]),
                    r2c1: Packed16(bottom[0]),
                    r2c2: Packed16(bottom[1]),
                }
                .transform();

                output[self.layout.offset(Subband::LL, row, col)] = bands.ll.0;
                output[self.layout.offset(Subband::LH, row, col)] = bands.lh.0;
                output[self.layout.offset(Subband::HL, row, col)] = bands.hl.0;
                output[self.layout.offset(Subband::HH, row, col)] = bands.hh.0;
            }
        }

        Ok(())
    }

    /// Allocating form of [`HaarTransform::transform`].
    pub fn transform_new(&self, src: &Frame16) -> Result<Frame16> {
        let mut dst = Frame16::new(self.layout.width(), self.layout.height(), Packed16::WHITE);
        self.transform(src, &mut dst)?;
        Ok(dst)
    }

    fn check(&self, frame: &Frame16) -> Result<()> {
        if frame.width() != self.layout.width() || frame.height() != self.layout.height() {
            return Err(Error::MalformedInput(format!(
                "{}x{} frame handed to a {}x{} transform",
                frame.width(),
                frame.height(),
                self.layout.width(),
                self.layout.height()
            )));
        }
        Ok(())
    }
}
