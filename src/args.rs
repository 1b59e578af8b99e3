// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::{Parser, Subcommand};
use haarcam::pixel::Packed16;
use std::{path::PathBuf, time::Duration};

/// Command-line arguments for the Haar camera pipeline.
///
/// Every streaming option can also be given through the environment, which
/// is how the service unit configures it.
///
/// # Example
///
/// ```bash
/// # Via command line
/// haarcam stream --camera /dev/video0 --display /dev/fb0
///
/// # Via environment variables
/// export CAMERA=/dev/video1
/// export CAMERA_SIZE="320 240"
/// haarcam stream
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also send logs to the systemd journal
    #[arg(long, env = "JOURNALD", global = true)]
    pub journald: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY", global = true)]
    pub tracy: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Capture, transform and display frames until interrupted
    Stream(StreamArgs),

    /// Build the colour lookup table and write it to a file
    BuildLut {
        /// Destination of the table
        #[arg(short, long, env = "LUT_PATH", default_value = "yuv2rgb.lut")]
        output: PathBuf,
    },

    /// Haar transform a raw 16-bit frame dump into another dump
    Transform {
        /// Raw packed 16-bit input frame
        #[arg(short, long)]
        input: PathBuf,

        /// Raw packed 16-bit output frame
        #[arg(short, long)]
        output: PathBuf,

        /// Frame width in pixels
        #[arg(long, default_value = "512")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "512")]
        height: u32,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct StreamArgs {
    /// Camera capture device path (e.g., /dev/video0)
    #[arg(short, long, env = "CAMERA", default_value = "/dev/video0")]
    pub camera: String,

    /// Camera capture resolution in pixels (width height)
    #[arg(
        long,
        env = "CAMERA_SIZE",
        default_value = "432 240",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub camera_size: Vec<u32>,

    /// Number of capture buffers to request from the driver
    #[arg(long, env = "CAPTURE_BUFFERS", default_value = "1")]
    pub buffers: u32,

    /// Framebuffer device path
    #[arg(short, long, env = "FRAMEBUFFER", default_value = "/dev/fb0")]
    pub display: String,

    /// Panel background as a hexadecimal packed 16-bit pixel
    #[arg(long, env = "BACKGROUND", default_value = "c618", value_parser = parse_packed16)]
    pub background: Packed16,

    /// Colour lookup table file, built on first use when missing
    #[arg(long, env = "LUT_PATH", default_value = "yuv2rgb.lut")]
    pub lut: PathBuf,

    /// Stop after this many frames, 0 runs until interrupted
    #[arg(long, env = "FRAMES", default_value = "0")]
    pub frames: u64,

    /// Display the colour-converted stream without the wavelet transform
    #[arg(long, env = "BYPASS_TRANSFORM")]
    pub bypass_transform: bool,

    /// Fail when no frame arrives within this many milliseconds
    #[arg(long, env = "CAPTURE_TIMEOUT_MS")]
    pub capture_timeout_ms: Option<u64>,

    /// Write the last displayed frame to this raw dump on exit
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Hide the console cursor while streaming
    #[arg(long, env = "HIDE_CURSOR")]
    pub hide_cursor: bool,
}

impl StreamArgs {
    pub fn width(&self) -> u32 {
        self.camera_size[0]
    }

    pub fn height(&self) -> u32 {
        self.camera_size[1]
    }

    pub fn frame_budget(&self) -> Option<u64> {
        (self.frames != 0).then_some(self.frames)
    }

    pub fn capture_timeout(&self) -> Option<Duration> {
        self.capture_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_packed16(s: &str) -> Result<Packed16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16)
        .map(Packed16)
        .map_err(|e| format!("{s} is not a 16-bit hex pixel: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_defaults() {
        let args = Args::try_parse_from(["haarcam", "stream"]).unwrap();
        let Command::Stream(stream) = args.command else {
            panic!("expected stream subcommand");
        };
        assert_eq!((stream.width(), stream.height()), (432, 240));
        assert_eq!(stream.background, Packed16::GRAY);
        assert_eq!(stream.frame_budget(), None);
        assert_eq!(stream.capture_timeout(), None);
    }

    #[test]
    fn background_accepts_prefix() {
        assert_eq!(parse_packed16("0xF800"), Ok(Packed16(0xf800)));
        assert!(parse_packed16("1ffff").is_err());
    }
}
