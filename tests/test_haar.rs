// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use haarcam::{
    haar::{channel_bands, Block, ChannelBands, HaarTransform, QuadrantLayout, Subband, Subbands},
    pixel::{Frame16, Packed16},
    Error,
};
use std::error::Error as StdError;

fn block(r1c1: u16, r1c2: u16, r2c1: u16, r2c2: u16) -> Block {
    Block {
        r1c1: Packed16(r1c1),
        r1c2: Packed16(r1c2),
        r2c1: Packed16(r2c1),
        r2c2: Packed16(r2c2),
    }
}

#[test]
fn test_layout() -> Result<(), Box<dyn StdError>> {
    let layout = QuadrantLayout::new(432, 240)?;
    assert_eq!(layout.half_width(), 216);
    assert_eq!(layout.half_height(), 120);
    assert_eq!(layout.origin(Subband::LL), (0, 0));
    assert_eq!(layout.origin(Subband::LH), (0, 216));
    assert_eq!(layout.origin(Subband::HL), (120, 0));
    assert_eq!(layout.origin(Subband::HH), (120, 216));

    assert_eq!(layout.band_at(119, 215), Subband::LL);
    assert_eq!(layout.band_at(0, 216), Subband::LH);
    assert_eq!(layout.band_at(120, 0), Subband::HL);
    assert_eq!(layout.band_at(239, 431), Subband::HH);

    assert_eq!(layout.offset(Subband::HH, 0, 0), 120 * 432 + 216);
    assert_eq!(layout.pixels(), 432 * 240);

    Ok(())
}

#[test]
fn test_odd_dimensions() {
    for (w, h) in [(5, 4), (4, 5), (0, 4), (4, 0), (1, 1)] {
        let err = HaarTransform::new(w, h).err().unwrap();
        assert!(matches!(err, Error::MalformedInput(_)), "{w}x{h}: {err}");
    }
}

#[test]
fn test_frame_mismatch() -> Result<(), Box<dyn StdError>> {
    let haar = HaarTransform::new(8, 8)?;
    let src = Frame16::new(8, 6, Packed16::BLACK);
    let mut dst = Frame16::new(8, 8, Packed16::BLACK);
    let err = haar.transform(&src, &mut dst).err().unwrap();
    assert!(matches!(err, Error::MalformedInput(_)), "{err}");

    let src = Frame16::new(8, 8, Packed16::BLACK);
    let mut dst = Frame16::new(4, 16, Packed16::BLACK);
    assert!(haar.transform(&src, &mut dst).is_err());

    Ok(())
}

#[test]
fn test_uniform_field() -> Result<(), Box<dyn StdError>> {
    for fill in [Packed16(0x7bef), Packed16::WHITE, Packed16::GRAY] {
        let haar = HaarTransform::new(16, 8)?;
        let out = haar.transform_new(&Frame16::new(16, 8, fill))?;

        for y in 0..8 {
            for x in 0..16 {
                let expected = match haar.layout().band_at(y as usize, x as usize) {
                    Subband::LL => fill,
                    _ => Packed16::BLACK,
                };
                assert_eq!(out.get(x, y), Some(expected), "{fill:?} at ({x}, {y})");
            }
        }
    }
    Ok(())
}

#[test]
fn test_horizontal_edge_per_channel() {
    // high 5-bit field: detail 15 * 10 = 150 shifted past bit 15
    let bands = block(0xf800, 0, 0xf800, 0).transform();
    assert_eq!(
        bands,
        Subbands {
            ll: Packed16(0x7800),
            lh: Packed16(0xb000),
            hl: Packed16(0),
            hh: Packed16(0),
        }
    );

    // middle 6-bit field: detail 31 * 10 = 310 truncates to 54
    let bands = block(0x07e0, 0, 0x07e0, 0).transform();
    assert_eq!(bands.ll, Packed16(0x03e0));
    assert_eq!(bands.lh, Packed16(0x06c0));
    assert_eq!(bands.hl, Packed16(0));
    assert_eq!(bands.hh, Packed16(0));

    // low 5-bit field: 150 bleeds into the middle field
    let bands = block(0x001f, 0, 0x001f, 0).transform();
    assert_eq!(bands.ll, Packed16(0x000f));
    assert_eq!(bands.lh, Packed16(0x0096));
    assert_eq!(bands.hl, Packed16(0));
    assert_eq!(bands.hh, Packed16(0));
}

#[test]
fn test_vertical_edge() {
    assert_eq!(
        channel_bands(31, 31, 0, 0, 31),
        ChannelBands {
            ll: 15,
            lh: 0,
            hl: 150,
            hh: 0,
        }
    );
    // truncating division is symmetric in sign
    assert_eq!(channel_bands(0, 0, 31, 31, 31), channel_bands(31, 31, 0, 0, 31));
}

#[test]
fn test_single_corner() {
    assert_eq!(
        channel_bands(31, 0, 0, 0, 31),
        ChannelBands {
            ll: 7,
            lh: 70,
            hl: 70,
            hh: 70,
        }
    );
}

#[test]
fn test_saturation() {
    let bands = channel_bands(63, 63, 63, 63, 31);
    assert_eq!(bands.ll, 31);
    assert_eq!(bands.lh, 0);
}

#[test]
fn test_quadrant_placement() -> Result<(), Box<dyn StdError>> {
    // 4x4 source, one corner pixel set in the bottom-right block
    let mut src = Frame16::new(4, 4, Packed16::BLACK);
    src.pixels_mut()[2 * 4 + 2] = 0x001f;

    let haar = HaarTransform::new(4, 4)?;
    let mut dst = Frame16::new(4, 4, Packed16::WHITE);
    haar.transform(&src, &mut dst)?;

    let mut expected = vec![0u16; 16];
    expected[4 + 1] = 7; // LL (1, 1)
    expected[4 + 3] = 70; // LH (1, 2 + 1)
    expected[3 * 4 + 1] = 70; // HL (2 + 1, 1)
    expected[3 * 4 + 3] = 70; // HH (2 + 1, 2 + 1)
    assert_eq!(dst.pixels(), expected.as_slice());

    Ok(())
}

#[test]
fn test_block_order() -> Result<(), Box<dyn StdError>> {
    // each 2x2 block uniform, so only LL is populated and keeps block order
    let values = [0x0001u16, 0x0002, 0x0003, 0x0004, 0x0005, 0x0006];
    let (w, h) = (6u32, 4u32);
    let mut src = Frame16::new(w, h, Packed16::BLACK);
    for y in 0..h {
        for x in 0..w {
            let block = (y / 2) * (w / 2) + x / 2;
            src.pixels_mut()[(y * w + x) as usize] = values[block as usize];
        }
    }

    let dst = HaarTransform::new(w, h)?.transform_new(&src)?;
    assert_eq!(&dst.row(0)[..3], &[1, 2, 3]);
    assert_eq!(&dst.row(1)[..3], &[4, 5, 6]);
    assert_eq!(&dst.row(0)[3..], &[0, 0, 0]);
    assert!(dst.row(2).iter().chain(dst.row(3)).all(|&px| px == 0));

    Ok(())
}
