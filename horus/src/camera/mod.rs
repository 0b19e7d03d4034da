// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Still capture through a request-based camera stack.
//!
//! Cameras are driven the way libcamera drives them: a camera is acquired exclusively, a stream
//! is configured for still capture, frame buffers are allocated by the stack, and a request
//! carrying one of those buffers is queued. The stack fills the buffer and hands the request back
//! on its own thread. [`CaptureController`] runs that lifecycle, queueing the same request over
//! and over until the automatic exposure and white balance have settled, then writes the final
//! frame out through the [`frame`] module.
//!
//! The camera stack itself is behind the [`CameraStack`] and [`CameraHandle`] traits. With the
//! `libcamera` feature enabled, [`libcamera::LibcameraStack`] implements them on top of the
//! `libcamera` crate.
use std::fmt;
use std::io;

mod completion;
mod controller;
mod convergence;
pub mod frame;
#[cfg(feature = "libcamera")]
pub mod libcamera;

pub use completion::{Completion, CompletionNotifier, RequestStatus};
pub use controller::CaptureController;
pub use frame::{FrameBufferView, PlaneDescriptor};

pub use crate::error::CameraError;

/// Builds a little-endian DRM fourcc code.
const fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// The pixel formats the capture pipeline knows how to lay out.
///
/// The names follow the DRM/libcamera convention, where the name describes a little-endian word.
/// That means `Rgb888` is stored in memory as blue, green, red.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PixelFormat {
    /// 8-bit greyscale.
    R8,
    Rgb888,
    Bgr888,
    Xrgb8888,
    Xbgr8888,
    /// Planar YUV 4:2:0, interleaved chroma.
    Nv12,
    /// Planar YUV 4:2:0, three planes.
    Yuv420,
}

impl PixelFormat {
    pub const fn fourcc(&self) -> u32 {
        match self {
            Self::R8 => fourcc(b"R8  "),
            Self::Rgb888 => fourcc(b"RG24"),
            Self::Bgr888 => fourcc(b"BG24"),
            Self::Xrgb8888 => fourcc(b"XR24"),
            Self::Xbgr8888 => fourcc(b"XB24"),
            Self::Nv12 => fourcc(b"NV12"),
            Self::Yuv420 => fourcc(b"YU12"),
        }
    }

    pub fn from_fourcc(code: u32) -> Option<Self> {
        [
            Self::R8,
            Self::Rgb888,
            Self::Bgr888,
            Self::Xrgb8888,
            Self::Xbgr8888,
            Self::Nv12,
            Self::Yuv420,
        ]
        .into_iter()
        .find(|format| format.fourcc() == code)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::R8 => "R8",
            Self::Rgb888 => "RGB888",
            Self::Bgr888 => "BGR888",
            Self::Xrgb8888 => "XRGB8888",
            Self::Xbgr8888 => "XBGR8888",
            Self::Nv12 => "NV12",
            Self::Yuv420 => "YUV420",
        }
    }

    /// Bytes per pixel for packed formats, `None` for planar ones.
    pub const fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::R8 => Some(1),
            Self::Rgb888 | Self::Bgr888 => Some(3),
            Self::Xrgb8888 | Self::Xbgr8888 => Some(4),
            Self::Nv12 | Self::Yuv420 => None,
        }
    }

    /// The order the channels are stored in memory, for packed formats.
    pub const fn channel_order(&self) -> Option<ChannelOrder> {
        match self {
            Self::R8 => Some(ChannelOrder::Luma),
            Self::Rgb888 => Some(ChannelOrder::Bgr),
            Self::Bgr888 => Some(ChannelOrder::Rgb),
            Self::Xrgb8888 => Some(ChannelOrder::Bgrx),
            Self::Xbgr8888 => Some(ChannelOrder::Rgbx),
            Self::Nv12 | Self::Yuv420 => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of the channels of one pixel in memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelOrder {
    Luma,
    Rgb,
    Bgr,
    /// RGB followed by a padding byte.
    Rgbx,
    /// BGR followed by a padding byte.
    Bgrx,
}

impl ChannelOrder {
    /// The number of color components, not counting padding.
    pub const fn components(&self) -> usize {
        match self {
            Self::Luma => 1,
            _ => 3,
        }
    }
}

/// The shape of a configured stream.
///
/// `stride` is the distance in bytes between the starts of two rows, which is often more than
/// `width` times the bytes per pixel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamGeometry {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

/// Result of validating a stream configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigurationStatus {
    Valid,
    /// Valid, but the camera changed something (often the size or pixel format).
    Adjusted,
    Invalid,
}

/// How a request should be handed to the camera.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueueMode {
    /// A request that has never been queued before.
    Fresh,
    /// A completed request going around again, with its buffers kept attached.
    ReuseBuffers,
}

/// Where a [`CaptureController`] is in the camera lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControllerState {
    Unconfigured,
    Acquired,
    Configured,
    Streaming,
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Acquired => "acquired",
            Self::Configured => "configured",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Entry point to a camera stack.
pub trait CameraStack {
    type Camera: CameraHandle;

    /// The identifiers of the cameras currently available, in the stack's order.
    fn camera_ids(&self) -> Vec<String>;

    /// Take exclusive control of a camera.
    fn acquire(&self, id: &str) -> Result<Self::Camera, CameraError>;
}

/// An exclusively acquired camera.
///
/// The methods are called in lifecycle order by [`CaptureController`]. Dropping the handle
/// releases the camera.
pub trait CameraHandle {
    fn id(&self) -> &str;

    /// Generate a still capture configuration, force `pixel_format` on its stream, and validate
    /// it.
    fn generate_configuration(
        &mut self,
        pixel_format: PixelFormat,
    ) -> Result<ConfigurationStatus, CameraError>;

    /// Apply the generated configuration to the camera.
    fn configure(&mut self) -> Result<StreamGeometry, CameraError>;

    /// Allocate frame buffers for the configured stream, returning how many there are.
    fn allocate_buffers(&mut self) -> Result<usize, CameraError>;

    /// Build the capture request, with the first allocated buffer attached.
    fn create_request(&mut self) -> Result<(), CameraError>;

    /// Install the completion callback.
    fn on_request_completed(&mut self, notifier: CompletionNotifier);

    fn start(&mut self) -> Result<(), CameraError>;

    fn queue_request(&mut self, mode: QueueMode) -> Result<(), CameraError>;

    fn stop(&mut self) -> io::Result<()>;

    /// The planes of the buffer attached to the request.
    ///
    /// Only meaningful while the request isn't queued.
    fn frame_buffer(&self) -> Result<FrameBufferView<'_>, CameraError>;

    /// Give up exclusive control of the camera.
    fn release(self)
    where
        Self: Sized,
    {
    }
}

#[cfg(test)]
mod test {
    use super::{ChannelOrder, ControllerState, PixelFormat};

    #[test]
    fn fourcc_codes() {
        assert_eq!(PixelFormat::Rgb888.fourcc(), 0x3432_4752);
        assert_eq!(PixelFormat::Nv12.fourcc(), 0x3231_564E);
        assert_eq!(
            PixelFormat::from_fourcc(0x3432_4742),
            Some(PixelFormat::Bgr888)
        );
        assert_eq!(PixelFormat::from_fourcc(0), None);
    }

    #[test]
    fn libcamera_rgb888_is_stored_bgr() {
        assert_eq!(
            PixelFormat::Rgb888.channel_order(),
            Some(ChannelOrder::Bgr)
        );
        assert_eq!(
            PixelFormat::Xbgr8888.channel_order(),
            Some(ChannelOrder::Rgbx)
        );
        assert_eq!(PixelFormat::Yuv420.channel_order(), None);
    }

    #[test]
    fn packed_sizes() {
        assert_eq!(PixelFormat::R8.bytes_per_pixel(), Some(1));
        assert_eq!(PixelFormat::Bgr888.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::Xrgb8888.bytes_per_pixel(), Some(4));
        assert_eq!(PixelFormat::Nv12.bytes_per_pixel(), None);
        assert_eq!(ChannelOrder::Luma.components(), 1);
        assert_eq!(ChannelOrder::Bgrx.components(), 3);
    }

    #[test]
    fn display() {
        assert_eq!(PixelFormat::Xrgb8888.to_string(), "XRGB8888");
        assert_eq!(ControllerState::Streaming.to_string(), "streaming");
    }
}
