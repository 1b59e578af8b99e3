// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::capture::SessionState;
use std::{io, time::Duration};
use thiserror::Error;

/// Failures of the capture, conversion, transform and display stages.
///
/// Every variant is fatal to the pipeline: nothing is retried and a frame is
/// never partially processed. Variants name the step that failed so the
/// process can report it before exiting.
#[derive(Error, Debug)]
pub enum Error {
    /// Device missing, not openable, or lacking a required capability.
    #[error("{step}: device unavailable: {source}")]
    DeviceUnavailable {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    /// Device cannot satisfy the requested pixel format or geometry.
    #[error("format rejected: {0}")]
    FormatRejected(String),

    /// Buffer or table allocation or memory mapping failed.
    #[error("{step}: resource exhausted: {source}")]
    ResourceExhausted {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    /// Frame length or image dimensions do not match the negotiated layout.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// An ioctl failed on an already configured device.
    #[error("{step} failed: {source}")]
    DeviceIo {
        step: &'static str,
        #[source]
        source: io::Error,
    },

    /// A capture session operation was called out of order.
    #[error("cannot {operation} while capture session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// No frame arrived within the configured capture timeout.
    #[error("no frame within {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unavailable(step: &'static str) -> impl FnOnce(fbdev_sys::Errno) -> Self {
        move |errno| Error::DeviceUnavailable {
            step,
            source: errno.into(),
        }
    }

    pub(crate) fn device_io(step: &'static str) -> impl FnOnce(fbdev_sys::Errno) -> Self {
        move |errno| Error::DeviceIo {
            step,
            source: errno.into(),
        }
    }

    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::DeviceUnavailable { .. } => 2,
            Error::FormatRejected(_) => 3,
            Error::ResourceExhausted { .. } => 4,
            Error::MalformedInput(_) => 5,
            Error::DeviceIo { .. } | Error::Timeout(_) => 6,
            Error::InvalidState { .. } => 70,
            Error::Io(_) => 74,
        }
    }
}
