// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Raw bindings for the Linux fbdev framebuffer API (`linux/fb.h`).
//!
//! Only the screen info structures and the three requests needed to switch a
//! panel to 16-bit output and map it are declared. Layouts follow the kernel
//! UAPI header; `c_ulong` fields keep them correct on 32-bit and 64-bit
//! targets alike.

#![allow(non_camel_case_types)]

use libc::c_ulong;
use std::mem;

pub use nix::errno::Errno;
pub use nix::Result;

pub const FBIOGET_VSCREENINFO: u32 = 0x4600;
pub const FBIOPUT_VSCREENINFO: u32 = 0x4601;
pub const FBIOGET_FSCREENINFO: u32 = 0x4602;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct fb_bitfield {
    pub offset: u32,
    pub length: u32,
    pub msb_right: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct fb_var_screeninfo {
    pub xres: u32,
    pub yres: u32,
    pub xres_virtual: u32,
    pub yres_virtual: u32,
    pub xoffset: u32,
    pub yoffset: u32,
    pub bits_per_pixel: u32,
    pub grayscale: u32,
    pub red: fb_bitfield,
    pub green: fb_bitfield,
    pub blue: fb_bitfield,
    pub transp: fb_bitfield,
    pub nonstd: u32,
    pub activate: u32,
    pub height: u32,
    pub width: u32,
    pub accel_flags: u32,
    pub pixclock: u32,
    pub left_margin: u32,
    pub right_margin: u32,
    pub upper_margin: u32,
    pub lower_margin: u32,
    pub hsync_len: u32,
    pub vsync_len: u32,
    pub sync: u32,
    pub vmode: u32,
    pub rotate: u32,
    pub colorspace: u32,
    pub reserved: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct fb_fix_screeninfo {
    pub id: [u8; 16],
    pub smem_start: c_ulong,
    pub smem_len: u32,
    pub type_: u32,
    pub type_aux: u32,
    pub visual: u32,
    pub xpanstep: u16,
    pub ypanstep: u16,
    pub ywrapstep: u16,
    pub line_length: u32,
    pub mmio_start: c_ulong,
    pub mmio_len: u32,
    pub accel: u32,
    pub capabilities: u16,
    pub reserved: [u16; 2],
}

impl Default for fb_fix_screeninfo {
    fn default() -> Self {
        // SAFETY: plain C struct for which all-zero is the documented
        // initial state.
        unsafe { mem::zeroed() }
    }
}

#[cfg(target_pointer_width = "64")]
const _: () = {
    assert!(mem::size_of::<fb_var_screeninfo>() == 160);
    assert!(mem::size_of::<fb_fix_screeninfo>() == 80);
};

#[cfg(target_pointer_width = "32")]
const _: () = {
    assert!(mem::size_of::<fb_var_screeninfo>() == 160);
    assert!(mem::size_of::<fb_fix_screeninfo>() == 68);
};

nix::ioctl_read_bad!(fbioget_vscreeninfo, FBIOGET_VSCREENINFO, fb_var_screeninfo);
nix::ioctl_readwrite_bad!(fbioput_vscreeninfo, FBIOPUT_VSCREENINFO, fb_var_screeninfo);
nix::ioctl_read_bad!(fbioget_fscreeninfo, FBIOGET_FSCREENINFO, fb_fix_screeninfo);

/// Reads a NUL-padded fixed-size C string field as UTF-8, lossily.
pub fn c_str_field(field: &[u8]) -> String {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fb_fix_screeninfo_defaults_to_zero() {
        let fix = fb_fix_screeninfo::default();
        assert_eq!(fix.line_length, 0);
        assert_eq!(c_str_field(&fix.id), "");
    }

    #[test]
    fn c_str_field_stops_at_nul() {
        let mut id = [0u8; 16];
        id[..9].copy_from_slice(b"mxsfb-drm");
        assert_eq!(c_str_field(&id), "mxsfb-drm");
        assert_eq!(c_str_field(b"full"), "full");
    }
}
