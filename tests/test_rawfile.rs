// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use haarcam::{
    haar::HaarTransform,
    pixel::{Frame16, Packed16},
    rawfile::{read_frame16, write_frame16},
    Error,
};
use std::{error::Error as StdError, fs};

#[test]
fn test_dump_is_headerless() -> Result<(), Box<dyn StdError>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("frame.raw");

    let frame = Frame16::from_pixels(2, 2, vec![0x0102, 0x0304, 0xffff, 0])?;
    write_frame16(&path, &frame)?;

    let bytes = fs::read(&path)?;
    assert_eq!(bytes.len(), 8);
    assert_eq!(&bytes[..2], &0x0102u16.to_ne_bytes());

    assert_eq!(read_frame16(&path, 2, 2)?, frame);
    Ok(())
}

#[test]
fn test_size_must_match() -> Result<(), Box<dyn StdError>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("frame.raw");
    write_frame16(&path, &Frame16::new(4, 4, Packed16::GRAY))?;

    let err = read_frame16(&path, 8, 8).err().unwrap();
    assert!(matches!(err, Error::MalformedInput(_)), "{err}");
    // same pixel count, different shape, is accepted
    assert_eq!(read_frame16(&path, 2, 8)?.pixels().len(), 16);
    Ok(())
}

#[test]
fn test_file_transform() -> Result<(), Box<dyn StdError>> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("in.raw");
    let output = dir.path().join("out.raw");
    write_frame16(&input, &Frame16::new(512, 512, Packed16::WHITE))?;

    let haar = HaarTransform::new(512, 512)?;
    let src = read_frame16(&input, 512, 512)?;
    write_frame16(&output, &haar.transform_new(&src)?)?;

    let out = read_frame16(&output, 512, 512)?;
    assert_eq!(out.get(0, 0), Some(Packed16::WHITE));
    assert_eq!(out.get(255, 255), Some(Packed16::WHITE));
    assert_eq!(out.get(256, 0), Some(Packed16::BLACK));
    assert_eq!(out.get(511, 511), Some(Packed16::BLACK));
    Ok(())
}
