// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error as ThisError;

use crate::camera::{ControllerState, PixelFormat};

/// Errors from the environmental sensor.
///
/// `E` is the error type of the I²C bus. It only needs to implement [`Debug`][fmt::Debug], which
/// keeps bus implementations like the one from `linux-embedded-hal` usable.
#[derive(Debug, ThisError)]
pub enum Error<E>
where
    E: fmt::Debug,
{
    /// The bus device file could not be opened.
    #[error("unable to open I²C bus {}", path.display())]
    BusOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The kernel refused to bind the bus to the device address.
    #[error("unable to select I²C device address {address:#04x}")]
    BusAddress {
        address: u8,
        #[source]
        source: io::Error,
    },

    /// Something answered, but it isn't a BME280.
    #[error("unexpected chip identifier {found:#04x} (expected {expected:#04x})")]
    IdentityMismatch { expected: u8, found: u8 },

    /// One of the trim value burst reads failed.
    #[error("unable to read calibration data: {0:?}")]
    CalibrationRead(E),

    /// Errors originating from the I²C implementation.
    #[error("I²C transaction failed: {0:?}")]
    Bus(E),
}

/// Errors from the still capture pipeline.
#[derive(Debug, ThisError)]
pub enum CameraError {
    #[error("no cameras are available")]
    NoDevice,

    /// Usually means another process is holding the camera.
    #[error("unable to acquire camera {id}")]
    Acquisition {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("the camera rejected a still capture configuration for {0}")]
    InvalidConfiguration(PixelFormat),

    #[error("unable to apply the stream configuration")]
    Configuration(#[source] io::Error),

    #[error("unable to allocate frame buffers")]
    BufferAllocation(#[source] io::Error),

    #[error("unable to create a capture request")]
    RequestCreation,

    #[error("unable to attach a frame buffer to the capture request")]
    BufferAttach(#[source] io::Error),

    #[error("unable to start streaming")]
    StreamStart(#[source] io::Error),

    #[error("unable to queue the capture request: {0}")]
    RequestQueue(String),

    #[error("no request completed within {0:?}")]
    CaptureTimeout(Duration),

    /// None of the frame buffer planes could be mapped.
    #[error("unable to map any frame buffer plane")]
    MapFailure,

    #[error("{0} frames cannot be encoded")]
    UnsupportedFormat(PixelFormat),

    #[error("frame buffer plane holds {actual} bytes, expected at least {expected}")]
    FrameTooSmall { expected: usize, actual: usize },

    #[error("unable to encode the frame")]
    Encode(#[from] image::ImageError),

    #[error("unable to write the frame")]
    Io(#[from] io::Error),

    #[error("cannot {operation} while the camera is {state}")]
    InvalidState {
        operation: &'static str,
        state: ControllerState,
    },
}
