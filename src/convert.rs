// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    lut::{yuv_to_packed16, ColorLookupTable},
    pixel::{Frame16, Packed16, Yuv422Frame, MACROPIXEL_BYTES},
};

/// Converts a YUYV frame to packed 16-bit pixels through the lookup table.
///
/// Every `(Y1, V0, Y0, U0)` macropixel produces two output pixels, first
/// `lut[Y0, U0, V0]` then `lut[Y1, U0, V0]`. The output frame must hold
/// exactly two pixels per macropixel.
pub fn convert(frame: Yuv422Frame<'_>, lut: &ColorLookupTable, out: &mut Frame16) -> Result<()> {
    check_output(&frame, out)?;
    let table = lut.entries();

    for (mp, px) in frame
        .as_bytes()
        .chunks_exact(MACROPIXEL_BYTES)
        .zip(out.pixels_mut().chunks_exact_mut(2))
    {
        let (y1, v0, y0, u0) = (mp[0], mp[1], mp[2], mp[3]);
        px[0] = table[ColorLookupTable::index(y0, u0, v0)];
        px[1] = table[ColorLookupTable::index(y1, u0, v0)];
    }

    Ok(())
}

/// Evaluates the colour formula per pixel instead of using the table.
///
/// Orders of magnitude slower than [`convert`]; kept as the reference the
/// table is checked against.
pub fn convert_reference(frame: Yuv422Frame<'_>, out: &mut Frame16) -> Result<()> {
    check_output(&frame, out)?;

    for (mp, px) in frame
        .as_bytes()
        .chunks_exact(MACROPIXEL_BYTES)
        .zip(out.pixels_mut().chunks_exact_mut(2))
    {
        let (y1, v0, y0, u0) = (mp[0], mp[1], mp[2], mp[3]);
        px[0] = yuv_to_packed16(y0, u0, v0).0;
        px[1] = yuv_to_packed16(y1, u0, v0).0;
    }

    Ok(())
}

/// Allocating form of [`convert`] for callers without a reusable frame.
pub fn convert_new(
    frame: Yuv422Frame<'_>,
    lut: &ColorLookupTable,
    width: u32,
    height: u32,
) -> Result<Frame16> {
    let mut out = Frame16::new(width, height, Packed16::BLACK);
    convert(frame, lut, &mut out)?;
    Ok(out)
}

fn check_output(frame: &Yuv422Frame<'_>, out: &Frame16) -> Result<()> {
    if frame.pixels() != out.pixels().len() {
        return Err(Error::MalformedInput(format!(
            "{} macropixels cannot fill a {}x{} frame",
            frame.macropixels(),
            out.width(),
            out.height()
        )));
    }
    Ok(())
}
