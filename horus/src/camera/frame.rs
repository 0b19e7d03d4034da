// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Turning a camera-owned frame buffer into a file.
//!
//! Frame buffers belong to the camera stack (usually DMA buffers allocated by the kernel). They
//! are only ever borrowed here: each plane is mapped read-only for the duration of a write and
//! unmapped when the mapping drops, whichever way the write ends.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::marker::PhantomData;
use std::ops::Deref;
use std::os::unix::io::{AsRawFd, BorrowedFd};
use std::path::Path;

use arrayvec::ArrayVec;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use memmap2::{Mmap, MmapOptions};
use tracing::{info, warn};

use super::{ChannelOrder, StreamGeometry};
use crate::config::OutputFormat;
use crate::error::CameraError;

/// The most planes a frame buffer can have.
pub const MAX_PLANES: usize = 4;

/// One plane of a frame buffer: a region of the memory behind a file descriptor.
#[derive(Clone, Copy, Debug)]
pub struct PlaneDescriptor<'a> {
    pub fd: BorrowedFd<'a>,
    pub offset: u64,
    pub length: usize,
}

/// A borrowed view of the planes of one frame buffer.
#[derive(Clone, Debug, Default)]
pub struct FrameBufferView<'a> {
    planes: ArrayVec<PlaneDescriptor<'a>, MAX_PLANES>,
}

impl<'a> FrameBufferView<'a> {
    pub fn new() -> Self {
        Self {
            planes: ArrayVec::new(),
        }
    }

    /// Add a plane. Planes past [`MAX_PLANES`] are dropped with a warning.
    pub fn push(&mut self, plane: PlaneDescriptor<'a>) {
        if self.planes.try_push(plane).is_err() {
            warn!(?plane, "frame buffer has too many planes, ignoring the extra one");
        }
    }

    pub fn planes(&self) -> &[PlaneDescriptor<'a>] {
        &self.planes
    }
}

impl<'a> FromIterator<PlaneDescriptor<'a>> for FrameBufferView<'a> {
    fn from_iter<T: IntoIterator<Item = PlaneDescriptor<'a>>>(iter: T) -> Self {
        let mut view = Self::new();
        for plane in iter {
            view.push(plane);
        }
        view
    }
}

/// A read-only, shared mapping of one plane.
///
/// The mapping can't outlive the buffer it came from, and is unmapped on drop.
#[derive(Debug)]
pub struct MappedPlane<'a> {
    /// Position of this plane within the frame buffer.
    index: usize,
    map: Mmap,
    _buffer: PhantomData<&'a ()>,
}

impl<'a> MappedPlane<'a> {
    pub fn map(index: usize, plane: &PlaneDescriptor<'a>) -> io::Result<Self> {
        if plane.length == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "plane has no data",
            ));
        }
        // SAFETY: the buffer behind the descriptor is owned by the camera stack, which doesn't
        // write to it while the request is not queued. The lifetime keeps the mapping from
        // outliving the borrow of the buffer.
        let map = unsafe {
            MmapOptions::new()
                .offset(plane.offset)
                .len(plane.length)
                .map(plane.fd.as_raw_fd())?
        };
        Ok(Self {
            index,
            map,
            _buffer: PhantomData,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Deref for MappedPlane<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

/// Map every plane of a frame buffer.
///
/// Planes that fail to map are logged and left out.
pub fn map_planes<'a>(view: &FrameBufferView<'a>) -> ArrayVec<MappedPlane<'a>, MAX_PLANES> {
    view.planes()
        .iter()
        .enumerate()
        .filter_map(|(index, plane)| match MappedPlane::map(index, plane) {
            Ok(mapped) => Some(mapped),
            Err(err) => {
                warn!(index, ?plane, %err, "unable to map frame buffer plane, skipping it");
                None
            }
        })
        .collect()
}

/// Pack the rows of a single-plane frame into tightly packed RGB8 (or L8 for greyscale).
///
/// Rows are read `stride` bytes apart, and any padding at the end of each row is left behind.
pub fn pack_rows(
    plane: &[u8],
    geometry: &StreamGeometry,
) -> Result<(Vec<u8>, ExtendedColorType), CameraError> {
    let format = geometry.pixel_format;
    let (bytes_per_pixel, order) = match (format.bytes_per_pixel(), format.channel_order()) {
        (Some(bytes_per_pixel), Some(order)) => (bytes_per_pixel, order),
        _ => return Err(CameraError::UnsupportedFormat(format)),
    };
    let width = geometry.width as usize;
    let height = geometry.height as usize;
    let stride = geometry.stride as usize;
    let row_bytes = width * bytes_per_pixel;
    if stride < row_bytes {
        return Err(CameraError::FrameTooSmall {
            expected: row_bytes,
            actual: stride,
        });
    }
    // The last row doesn't need its padding.
    let needed = match height {
        0 => 0,
        _ => stride * (height - 1) + row_bytes,
    };
    if plane.len() < needed {
        return Err(CameraError::FrameTooSmall {
            expected: needed,
            actual: plane.len(),
        });
    }
    let color_type = match order {
        ChannelOrder::Luma => ExtendedColorType::L8,
        _ => ExtendedColorType::Rgb8,
    };
    let mut packed = Vec::with_capacity(width * height * order.components());
    if row_bytes == 0 {
        return Ok((packed, color_type));
    }
    for row in plane.chunks(stride).take(height) {
        let pixels = &row[..row_bytes];
        match order {
            ChannelOrder::Luma | ChannelOrder::Rgb => packed.extend_from_slice(pixels),
            ChannelOrder::Bgr => pixels
                .chunks_exact(3)
                .for_each(|bgr| packed.extend_from_slice(&[bgr[2], bgr[1], bgr[0]])),
            ChannelOrder::Rgbx => pixels
                .chunks_exact(4)
                .for_each(|rgbx| packed.extend_from_slice(&rgbx[..3])),
            ChannelOrder::Bgrx => pixels
                .chunks_exact(4)
                .for_each(|bgrx| packed.extend_from_slice(&[bgrx[2], bgrx[1], bgrx[0]])),
        }
    }
    Ok((packed, color_type))
}

fn write_raw(planes: &[MappedPlane<'_>], destination: &Path) -> Result<(), CameraError> {
    let mut writer = BufWriter::new(File::create(destination)?);
    for plane in planes {
        writer.write_all(plane)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_jpeg(
    planes: &[MappedPlane<'_>],
    geometry: &StreamGeometry,
    quality: u8,
    destination: &Path,
) -> Result<(), CameraError> {
    // Packed formats only have the one plane.
    let plane = planes
        .iter()
        .find(|plane| plane.index() == 0)
        .ok_or(CameraError::MapFailure)?;
    let (pixels, color_type) = pack_rows(plane, geometry)?;
    let mut writer = BufWriter::new(File::create(destination)?);
    JpegEncoder::new_with_quality(&mut writer, quality).encode(
        &pixels,
        geometry.width,
        geometry.height,
        color_type,
    )?;
    writer.flush()?;
    Ok(())
}

/// Write a frame buffer to `destination` in the requested output format.
pub fn write_frame(
    view: &FrameBufferView<'_>,
    geometry: &StreamGeometry,
    output: &OutputFormat,
    destination: &Path,
) -> Result<(), CameraError> {
    let planes = map_planes(view);
    if planes.is_empty() {
        return Err(CameraError::MapFailure);
    }
    match output {
        OutputFormat::Raw => write_raw(&planes, destination)?,
        OutputFormat::Jpeg { quality } => write_jpeg(&planes, geometry, *quality, destination)?,
    }
    info!(
        path = %destination.display(),
        format = %geometry.pixel_format,
        width = geometry.width,
        height = geometry.height,
        ?output,
        "wrote frame"
    );
    Ok(())
}
