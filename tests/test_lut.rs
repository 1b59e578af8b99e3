// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use haarcam::{
    lut::{yuv_to_packed16, ColorLookupTable, LUT_BYTES, LUT_ENTRIES},
    pixel::Packed16,
    Error,
};
use std::{error::Error as _, fs};

#[test]
fn test_known_colours() {
    // black and white points of studio swing
    assert_eq!(yuv_to_packed16(16, 128, 128), Packed16(0x0000));
    assert_eq!(yuv_to_packed16(235, 128, 128), Packed16(0xffff));
    // luma above 235 saturates
    assert_eq!(yuv_to_packed16(255, 128, 128), Packed16(0xffff));
    // below 16 clamps to zero
    assert_eq!(yuv_to_packed16(0, 128, 128), Packed16(0x0000));
    // saturated red lands in the low field
    assert_eq!(yuv_to_packed16(81, 90, 240), Packed16(0x001f));
}

#[test]
fn test_channel_order() {
    // strong blue chroma only lifts the high field
    let px = yuv_to_packed16(41, 240, 110);
    assert!(px.a() > 20, "{px:?}");
    assert_eq!(px.c(), 0, "{px:?}");
}

#[test]
fn test_index() {
    assert_eq!(ColorLookupTable::index(0, 0, 0), 0);
    assert_eq!(ColorLookupTable::index(0, 0, 1), 1);
    assert_eq!(ColorLookupTable::index(0, 1, 0), 256);
    assert_eq!(ColorLookupTable::index(1, 0, 0), 65536);
    assert_eq!(ColorLookupTable::index(255, 255, 255), LUT_ENTRIES - 1);
}

#[test]
fn test_build_matches_formula() {
    let lut = ColorLookupTable::build();
    assert_eq!(lut.entries().len(), LUT_ENTRIES);
    assert!(!lut.is_mapped());

    for y in (0..=255u8).step_by(5) {
        for u in (0..=255u8).step_by(3) {
            for v in (0..=255u8).step_by(7) {
                assert_eq!(lut.lookup(y, u, v), yuv_to_packed16(y, u, v));
            }
        }
    }
    assert_eq!(lut.lookup(255, 255, 255), yuv_to_packed16(255, 255, 255));
}

/// BT.601 studio swing to 8-bit RGB, as the C conversion routine computes
/// it: double arithmetic stored through a float, clamped, then truncated.
fn bt601_rgb565(y: u8, u: u8, v: u8) -> u16 {
    let channel = |value: f64| -> u16 {
        let narrowed = value as f32;
        let clamped = if narrowed < 0.0 {
            0.0
        } else if narrowed > 255.0 {
            255.0
        } else {
            narrowed
        };
        clamped as u8 as u16
    };

    let (y, u, v) = (y as f64 - 16.0, u as f64 - 128.0, v as f64 - 128.0);
    let r = channel(1.164 * y + 1.596 * v);
    let g = channel(1.164 * y - 0.813 * v - 0.391 * u);
    let b = channel(1.164 * y + 2.018 * u);

    (b >> 3) << 11 | (g >> 2) << 5 | (r >> 3)
}

#[test]
fn test_every_entry_matches_bt601() {
    let lut = ColorLookupTable::build();
    let entries = lut.entries();
    assert_eq!(entries.len(), 1 << 24);

    let mut mismatches = 0usize;
    for y in 0..=255u8 {
        for u in 0..=255u8 {
            for v in 0..=255u8 {
                let index = (y as usize) << 16 | (u as usize) << 8 | v as usize;
                let expected = bt601_rgb565(y, u, v);
                if entries[index] != expected {
                    if mismatches == 0 {
                        eprintln!(
                            "first mismatch at Y={y} U={u} V={v}: {:#06x} != {expected:#06x}",
                            entries[index]
                        );
                    }
                    mismatches += 1;
                }
            }
        }
    }
    assert_eq!(mismatches, 0);
}

#[test]
fn test_from_entries_size() {
    let err = ColorLookupTable::from_entries(vec![0; 1024]).err().unwrap();
    assert!(matches!(err, Error::MalformedInput(_)), "{err}");
}

#[test]
fn test_persist_and_load() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("yuv2rgb.lut");

    let entries: Vec<u16> = (0..LUT_ENTRIES).map(|i| (i * 13) as u16).collect();
    let lut = ColorLookupTable::from_entries(entries)?;
    lut.persist(&path)?;
    assert_eq!(fs::metadata(&path)?.len(), LUT_BYTES as u64);
    assert!(!path.with_extension("partial").exists());

    let loaded = ColorLookupTable::load(&path)?;
    assert!(loaded.is_mapped());
    assert_eq!(loaded.entries(), lut.entries());
    assert_eq!(loaded.lookup(1, 2, 3), lut.lookup(1, 2, 3));

    Ok(())
}

#[test]
fn test_load_wrong_size() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("short.lut");
    fs::write(&path, vec![0u8; 4096])?;

    match ColorLookupTable::load(&path) {
        Err(Error::MalformedInput(msg)) => assert!(msg.contains("4096"), "{msg}"),
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("short table accepted"),
    }
    Ok(())
}

#[test]
fn test_load_missing() {
    let err = ColorLookupTable::load("/nonexistent/yuv2rgb.lut").err().unwrap();
    assert!(matches!(err, Error::Io(_)), "{err}");
    assert!(err.source().is_some());
}

#[test]
fn test_load_or_build_persists() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("yuv2rgb.lut");

    let built = ColorLookupTable::load_or_build(&path)?;
    assert!(!built.is_mapped());
    assert_eq!(fs::metadata(&path)?.len(), LUT_BYTES as u64);

    let mapped = ColorLookupTable::load_or_build(&path)?;
    assert!(mapped.is_mapped());
    assert_eq!(mapped.lookup(81, 90, 240), Packed16(0x001f));
    assert_eq!(mapped.lookup(16, 128, 128), Packed16(0x0000));

    Ok(())
}
