// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! YUV to packed 16-bit colour lookup table.
//!
//! The table holds one [`Packed16`] for every `(Y, U, V)` byte triple,
//! indexed `Y * 65536 + U * 256 + V`, so the per-frame conversion does no
//! floating point at all. Building it costs 2^24 evaluations of the BT.601
//! formula, which is paid once: the table is persisted as a flat file of
//! native-endian 16-bit words and memory-mapped on later runs.

use crate::{
    error::{Error, Result},
    mmap::MappedRegion,
    pixel::Packed16,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    os::fd::AsFd,
    path::Path,
    time::Instant,
};
use tracing::{debug, info, instrument};

/// Number of entries, one per `(Y, U, V)` triple.
pub const LUT_ENTRIES: usize = 256 * 256 * 256;

/// Exact size of the persisted table file.
pub const LUT_BYTES: usize = LUT_ENTRIES * 2;

/// ITU-R BT.601 conversion of one `(Y, U, V)` sample to a blue-high packed
/// pixel.
///
/// Each channel is evaluated in double precision, narrowed to single
/// precision, clamped to `[0, 255]` and truncated, then reduced to 5/6/5 bits.
pub fn yuv_to_packed16(y: u8, u: u8, v: u8) -> Packed16 {
    let luma = 1.164 * (y as i32 - 16) as f64;
    let u = (u as i32 - 128) as f64;
    let v = (v as i32 - 128) as f64;

    let red = saturate(luma + 1.596 * v);
    let green = saturate(luma - 0.813 * v - 0.391 * u);
    let blue = saturate(luma + 2.018 * u);

    Packed16::from_bgr888(blue, green, red)
}

fn saturate(value: f64) -> u8 {
    (value as f32).clamp(0.0, 255.0) as u8
}

enum Table {
    Owned(Vec<u16>),
    Mapped(MappedRegion),
}

/// Immutable YUV to [`Packed16`] table, either computed in memory or mapped
/// from a persisted file. Read-only for its whole lifetime.
pub struct ColorLookupTable {
    table: Table,
}

impl ColorLookupTable {
    /// Computes the full table in memory.
    #[instrument(level = "debug")]
    pub fn build() -> Self {
        let now = Instant::now();
        let mut entries = Vec::with_capacity(LUT_ENTRIES);
        for y in 0..=255u8 {
            for u in 0..=255u8 {
                for v in 0..=255u8 {
                    entries.push(yuv_to_packed16(y, u, v).0);
                }
            }
        }
        info!("built colour lookup table in {:?}", now.elapsed());
        Self {
            table: Table::Owned(entries),
        }
    }

    /// Wraps precomputed entries, which must cover every `(Y, U, V)` triple.
    pub fn from_entries(entries: Vec<u16>) -> Result<Self> {
        if entries.len() != LUT_ENTRIES {
            return Err(Error::MalformedInput(format!(
                "lookup table has {} entries, expected {LUT_ENTRIES}",
                entries.len()
            )));
        }
        Ok(Self {
            table: Table::Owned(entries),
        })
    }

    /// Maps a persisted table read-only and pre-faults it so the first frame
    /// does not stall on page faults.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len != LUT_BYTES as u64 {
            return Err(Error::MalformedInput(format!(
                "{}: lookup table is {len} bytes, expected {LUT_BYTES}",
                path.display()
            )));
        }

        let region = MappedRegion::map(
            file.as_fd(),
            LUT_BYTES,
            0,
            false,
            libc::MAP_PRIVATE | libc::MAP_POPULATE,
            "lookup table mmap",
        )?;
        region.will_need();
        debug!("mapped lookup table {}", path.display());

        Ok(Self {
            table: Table::Mapped(region),
        })
    }

    /// Loads the table from `path`, building and persisting it first when
    /// the file does not exist yet.
    pub fn load_or_build(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        info!("{} not found, building lookup table", path.display());
        let lut = Self::build();
        lut.persist(path)?;
        Ok(lut)
    }

    /// Writes the table as a flat file of `LUT_ENTRIES` native-endian words.
    ///
    /// The file is written beside `path` and renamed into place, so readers
    /// never observe a partial table.
    #[instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let staging = path.with_extension("partial");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            writer.write_all(bytemuck::cast_slice(self.entries()))?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        }
        fs::rename(&staging, path)?;
        info!("persisted lookup table to {}", path.display());
        Ok(())
    }

    /// Linear table index of a `(Y, U, V)` triple.
    #[inline(always)]
    pub const fn index(y: u8, u: u8, v: u8) -> usize {
        ((y as usize) << 16) | ((u as usize) << 8) | v as usize
    }

    #[inline]
    pub fn lookup(&self, y: u8, u: u8, v: u8) -> Packed16 {
        Packed16(self.entries()[Self::index(y, u, v)])
    }

    /// All entries in `[Y][U][V]` order.
    pub fn entries(&self) -> &[u16] {
        match &self.table {
            Table::Owned(entries) => entries,
            Table::Mapped(region) => region.as_words(),
        }
    }

    /// Whether the table is backed by a mapped file rather than heap memory.
    pub fn is_mapped(&self) -> bool {
        matches!(self.table, Table::Mapped(_))
    }
}
