// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! [`CameraStack`] on top of libcamera.
//!
//! libcamera only allows one camera manager per process, so the manager is created by the
//! application and borrowed by [`LibcameraStack`].
//!
//! ```no_run
//! # use horus::camera::libcamera::{CameraManager, LibcameraStack};
//! # use horus::{CaptureConfig, CaptureController};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = CameraManager::new()?;
//! let mut controller = CaptureController::new(LibcameraStack::new(&manager), CaptureConfig::default());
//! controller.start()?;
//! controller.capture(std::path::Path::new("still.jpg"))?;
//! # Ok(())
//! # }
//! ```
use std::fmt;
use std::io;
use std::os::unix::io::BorrowedFd;
use std::sync::{Arc, Mutex};

use ::libcamera::camera::{ActiveCamera, CameraConfiguration, CameraConfigurationStatus};
use ::libcamera::framebuffer::AsFrameBuffer;
use ::libcamera::framebuffer_allocator::{FrameBuffer, FrameBufferAllocator};
use ::libcamera::request::{self, ReuseFlag};
use ::libcamera::stream::{Stream, StreamRole};
use tracing::{debug, warn};

pub use ::libcamera::camera_manager::CameraManager;

use super::{
    CameraHandle, CameraStack, CompletionNotifier, ConfigurationStatus, FrameBufferView,
    PixelFormat, PlaneDescriptor, QueueMode, RequestStatus, StreamGeometry,
};
use crate::error::CameraError;

pub struct LibcameraStack<'m> {
    manager: &'m CameraManager,
}

impl<'m> LibcameraStack<'m> {
    pub fn new(manager: &'m CameraManager) -> Self {
        Self { manager }
    }
}

impl<'m> fmt::Debug for LibcameraStack<'m> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibcameraStack")
            .field("cameras", &self.camera_ids())
            .finish()
    }
}

impl<'m> CameraStack for LibcameraStack<'m> {
    type Camera = LibcameraCamera<'m>;

    fn camera_ids(&self) -> Vec<String> {
        let cameras = self.manager.cameras();
        (0..cameras.len())
            .filter_map(|index| cameras.get(index))
            .map(|camera| camera.id().to_string())
            .collect()
    }

    fn acquire(&self, id: &str) -> Result<Self::Camera, CameraError> {
        let cameras = self.manager.cameras();
        let camera = (0..cameras.len())
            .filter_map(|index| cameras.get(index))
            .find(|camera| camera.id() == id)
            .ok_or(CameraError::NoDevice)?;
        let active = camera.acquire().map_err(|source| CameraError::Acquisition {
            id: id.to_string(),
            source,
        })?;
        Ok(LibcameraCamera {
            id: id.to_string(),
            request: Arc::new(Mutex::new(None)),
            buffers: Vec::new(),
            allocator: None,
            planes: Vec::new(),
            stream: None,
            configuration: None,
            active,
        })
    }
}

/// Where a plane of the request's buffer lives.
#[derive(Clone, Copy, Debug)]
struct PlaneLocation {
    fd: i32,
    offset: u64,
    length: usize,
}

// Fields drop in order, and the buffers have to go before the camera is released.
pub struct LibcameraCamera<'m> {
    id: String,
    /// The request while it isn't queued. The completion callback puts it back.
    request: Arc<Mutex<Option<request::Request>>>,
    buffers: Vec<FrameBuffer>,
    allocator: Option<FrameBufferAllocator>,
    /// Recorded when the buffer is attached, as the request owns it from then on.
    planes: Vec<PlaneLocation>,
    stream: Option<Stream>,
    configuration: Option<CameraConfiguration>,
    active: ActiveCamera<'m>,
}

impl<'m> fmt::Debug for LibcameraCamera<'m> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibcameraCamera")
            .field("id", &self.id)
            .field("planes", &self.planes)
            .finish()
    }
}

fn lock_error<T>(_: T) -> CameraError {
    CameraError::RequestQueue("request slot poisoned".to_string())
}

impl<'m> CameraHandle for LibcameraCamera<'m> {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate_configuration(
        &mut self,
        pixel_format: PixelFormat,
    ) -> Result<ConfigurationStatus, CameraError> {
        let mut configuration = self
            .active
            .generate_configuration(&[StreamRole::StillCapture])
            .ok_or(CameraError::InvalidConfiguration(pixel_format))?;
        configuration
            .get_mut(0)
            .ok_or(CameraError::InvalidConfiguration(pixel_format))?
            .set_pixel_format(::libcamera::pixel_format::PixelFormat::new(
                pixel_format.fourcc(),
                0,
            ));
        let status = match configuration.validate() {
            CameraConfigurationStatus::Valid => ConfigurationStatus::Valid,
            CameraConfigurationStatus::Adjusted => ConfigurationStatus::Adjusted,
            CameraConfigurationStatus::Invalid => ConfigurationStatus::Invalid,
        };
        debug!(?status, "validated stream configuration");
        self.configuration = Some(configuration);
        Ok(status)
    }

    fn configure(&mut self) -> Result<StreamGeometry, CameraError> {
        let configuration = self.configuration.as_mut().ok_or_else(|| {
            CameraError::Configuration(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no configuration generated",
            ))
        })?;
        self.active
            .configure(configuration)
            .map_err(CameraError::Configuration)?;
        let stream_config = configuration.get(0).ok_or_else(|| {
            CameraError::Configuration(io::Error::new(
                io::ErrorKind::InvalidData,
                "configuration has no streams",
            ))
        })?;
        let fourcc = stream_config.get_pixel_format().fourcc();
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::Configuration(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown pixel format {:#010x}", fourcc),
            ))
        })?;
        let size = stream_config.get_size();
        self.stream = stream_config.stream();
        Ok(StreamGeometry {
            pixel_format,
            width: size.width,
            height: size.height,
            stride: stream_config.get_stride(),
        })
    }

    fn allocate_buffers(&mut self) -> Result<usize, CameraError> {
        let stream = self.stream.as_ref().ok_or_else(|| {
            CameraError::BufferAllocation(io::Error::new(
                io::ErrorKind::InvalidInput,
                "camera is not configured",
            ))
        })?;
        let mut allocator = FrameBufferAllocator::new(&self.active);
        self.buffers = allocator
            .alloc(stream)
            .map_err(CameraError::BufferAllocation)?;
        self.allocator = Some(allocator);
        Ok(self.buffers.len())
    }

    fn create_request(&mut self) -> Result<(), CameraError> {
        let stream = self.stream.as_ref().ok_or(CameraError::RequestCreation)?;
        if self.buffers.is_empty() {
            return Err(CameraError::RequestCreation);
        }
        let buffer = self.buffers.remove(0);
        let planes = buffer.planes();
        self.planes = (0..planes.len())
            .filter_map(|index| planes.get(index))
            .map(|plane| PlaneLocation {
                fd: plane.fd(),
                offset: plane.offset().unwrap_or(0) as u64,
                length: plane.len(),
            })
            .collect();
        drop(planes);
        let mut request = self
            .active
            .create_request(None)
            .ok_or(CameraError::RequestCreation)?;
        request
            .add_buffer(stream, buffer)
            .map_err(CameraError::BufferAttach)?;
        *self.request.lock().map_err(lock_error)? = Some(request);
        Ok(())
    }

    fn on_request_completed(&mut self, notifier: CompletionNotifier) {
        let slot = Arc::clone(&self.request);
        self.active.on_request_completed(move |request| {
            let status = match request.status() {
                request::RequestStatus::Complete => RequestStatus::Complete,
                _ => RequestStatus::Cancelled,
            };
            match slot.lock() {
                Ok(mut slot) => *slot = Some(request),
                Err(_) => warn!("dropping completed request, slot poisoned"),
            }
            notifier.notify(status);
        });
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.active.start(None).map_err(CameraError::StreamStart)
    }

    fn queue_request(&mut self, mode: QueueMode) -> Result<(), CameraError> {
        let mut request = self
            .request
            .lock()
            .map_err(lock_error)?
            .take()
            .ok_or_else(|| CameraError::RequestQueue("request is still in flight".to_string()))?;
        if mode == QueueMode::ReuseBuffers {
            request.reuse(ReuseFlag::REUSE_BUFFERS);
        }
        self.active
            .queue_request(request)
            .map_err(|(_, err)| CameraError::RequestQueue(err.to_string()))
    }

    fn stop(&mut self) -> io::Result<()> {
        self.active.stop()
    }

    fn frame_buffer(&self) -> Result<FrameBufferView<'_>, CameraError> {
        if self.planes.is_empty() {
            return Err(CameraError::MapFailure);
        }
        Ok(self
            .planes
            .iter()
            .map(|plane| PlaneDescriptor {
                // The descriptors belong to the buffer attached to our request, which lives as
                // long as this camera does.
                fd: unsafe { BorrowedFd::borrow_raw(plane.fd) },
                offset: plane.offset,
                length: plane.length,
            })
            .collect())
    }
}
