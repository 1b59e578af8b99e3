// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    mmap::MappedRegion,
    pixel::{Frame16, Packed16},
};
use std::{
    fmt,
    fs::{File, OpenOptions},
    os::fd::{AsFd, AsRawFd},
    path::Path,
};
use tracing::{debug, info, instrument};
use fbdev_sys::{c_str_field, fb_fix_screeninfo, fb_var_screeninfo};

/// Panel geometry in pixels.
///
/// `stride` is the distance between row starts and may exceed `width`;
/// `virtual_height` may exceed `height`. Only the `width` x `height` window
/// at the origin is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub virtual_height: u32,
}

impl ScreenGeometry {
    /// A panel without padding or off-screen rows.
    pub fn packed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width,
            virtual_height: height,
        }
    }

    /// Number of addressable pixels.
    pub fn len(&self) -> usize {
        self.stride as usize * self.virtual_height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-left placement of a `width` x `height` source centred on the
    /// panel, as `(row, column)`. A source wider or taller than the panel is
    /// pinned to the top-left along that axis.
    pub fn centre(&self, width: u32, height: u32) -> (u32, u32) {
        (
            self.height.saturating_sub(height) / 2,
            self.width.saturating_sub(width) / 2,
        )
    }
}

impl fmt::Display for ScreenGeometry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} stride {} virtual height {}",
            self.width, self.height, self.stride, self.virtual_height
        )
    }
}

/// Pixel storage behind a [`DisplaySurface`].
pub trait PixelMemory {
    fn pixels(&self) -> &[u16];
    fn pixels_mut(&mut self) -> &mut [u16];
}

impl PixelMemory for Vec<u16> {
    fn pixels(&self) -> &[u16] {
        self
    }

    fn pixels_mut(&mut self) -> &mut [u16] {
        self
    }
}

/// Memory-mapped Linux framebuffer configured for 16 bits per pixel.
pub struct Framebuffer {
    region: MappedRegion,
    _file: File,
}

impl PixelMemory for Framebuffer {
    fn pixels(&self) -> &[u16] {
        self.region.as_words()
    }

    fn pixels_mut(&mut self) -> &mut [u16] {
        self.region.as_words_mut()
    }
}

impl Framebuffer {
    /// Opens `path`, switches it to 16-bit colour and maps the full virtual
    /// screen.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, ScreenGeometry)> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::DeviceUnavailable {
                step: "open framebuffer",
                source,
            })?;
        let fd = file.as_raw_fd();

        let mut var = fb_var_screeninfo::default();
        unsafe { fbdev_sys::fbioget_vscreeninfo(fd, &mut var) }
            .map_err(Error::unavailable("FBIOGET_VSCREENINFO"))?;

        var.grayscale = 0;
        var.bits_per_pixel = 16;
        unsafe { fbdev_sys::fbioput_vscreeninfo(fd, &mut var) }.map_err(|errno| {
            Error::FormatRejected(format!(
                "FBIOPUT_VSCREENINFO 16bpp colour: {}",
                std::io::Error::from(errno)
            ))
        })?;

        let mut var = fb_var_screeninfo::default();
        unsafe { fbdev_sys::fbioget_vscreeninfo(fd, &mut var) }
            .map_err(Error::device_io("FBIOGET_VSCREENINFO"))?;
        let mut fix = fb_fix_screeninfo::default();
        unsafe { fbdev_sys::fbioget_fscreeninfo(fd, &mut fix) }
            .map_err(Error::device_io("FBIOGET_FSCREENINFO"))?;

        if var.bits_per_pixel != 16 || var.grayscale != 0 {
            return Err(Error::FormatRejected(format!(
                "framebuffer stayed at {} bpp grayscale={}",
                var.bits_per_pixel, var.grayscale
            )));
        }
        if fix.line_length % 2 != 0 || fix.line_length / 2 < var.xres {
            return Err(Error::FormatRejected(format!(
                "line length {} cannot hold {} 16-bit pixels",
                fix.line_length, var.xres
            )));
        }

        let geometry = ScreenGeometry {
            width: var.xres,
            height: var.yres,
            stride: fix.line_length / 2,
            virtual_height: var.yres_virtual.max(var.yres),
        };
        let region = MappedRegion::map(
            file.as_fd(),
            geometry.len() * 2,
            0,
            true,
            libc::MAP_SHARED,
            "framebuffer mmap",
        )?;
        info!("framebuffer {} {}", c_str_field(&fix.id), geometry);

        Ok((
            Self {
                region,
                _file: file,
            },
            geometry,
        ))
    }
}

/// A 16-bit panel the pipeline composites frames onto.
pub struct DisplaySurface<M: PixelMemory> {
    memory: M,
    geometry: ScreenGeometry,
}

impl DisplaySurface<Framebuffer> {
    /// Opens and configures a framebuffer device.
    #[instrument(level = "debug", skip_all, fields(device = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (fb, geometry) = Framebuffer::open(path)?;
        Self::new(fb, geometry)
    }
}

impl DisplaySurface<Vec<u16>> {
    /// An off-screen surface, every pixel black.
    pub fn in_memory(geometry: ScreenGeometry) -> Self {
        Self {
            memory: vec![0; geometry.len()],
            geometry,
        }
    }
}

impl<M: PixelMemory> DisplaySurface<M> {
    /// Wraps `memory`, which must cover the whole virtual screen.
    pub fn new(memory: M, geometry: ScreenGeometry) -> Result<Self> {
        if geometry.stride < geometry.width || geometry.virtual_height < geometry.height {
            return Err(Error::FormatRejected(format!(
                "inconsistent screen geometry {geometry}"
            )));
        }
        if memory.pixels().len() < geometry.len() {
            return Err(Error::ResourceExhausted {
                step: "display surface",
                source: std::io::Error::other(format!(
                    "{} pixels mapped, geometry {geometry} needs {}",
                    memory.pixels().len(),
                    geometry.len()
                )),
            });
        }
        Ok(Self { memory, geometry })
    }

    pub fn geometry(&self) -> &ScreenGeometry {
        &self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    /// Whether a `width` x `height` source fits the visible panel.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.geometry.width && height <= self.geometry.height
    }

    /// Writes `color` to every addressable pixel.
    pub fn fill(&mut self, color: Packed16) {
        let len = self.geometry.len();
        self.memory.pixels_mut()[..len].fill(color.0);
    }

    /// Copies `src` onto the visible panel, centred both ways. Margins keep
    /// their previous contents and no source row spills into them.
    pub fn composite_centered(&mut self, src: &Frame16) -> Result<()> {
        let (w, h) = (src.width(), src.height());
        if !self.fits(w, h) {
            return Err(Error::FormatRejected(format!(
                "{w}x{h} source does not fit {}x{} panel",
                self.geometry.width, self.geometry.height
            )));
        }
        if w == 0 || h == 0 {
            return Ok(());
        }

        let (top, left) = self.geometry.centre(w, h);
        let stride = self.geometry.stride as usize;
        let pixels = self.memory.pixels_mut();
        for (y, row) in src.pixels().chunks_exact(w as usize).enumerate() {
            let start = (top as usize + y) * stride + left as usize;
            pixels[start..start + row.len()].copy_from_slice(row);
        }
        Ok(())
    }

    /// Pixel at panel coordinates, `None` outside the addressable area.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Packed16> {
        if x >= self.geometry.stride || y >= self.geometry.virtual_height {
            return None;
        }
        let idx = y as usize * self.geometry.stride as usize + x as usize;
        self.memory.pixels().get(idx).copied().map(Packed16)
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// Releases the surface and its device.
    pub fn close(self) {
        debug!("display closed");
    }
}
