// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::AsFd;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::camera::{
    CameraHandle, CameraStack, CompletionNotifier, ConfigurationStatus, FrameBufferView,
    PixelFormat, PlaneDescriptor, QueueMode, RequestStatus, StreamGeometry,
};
use crate::error::CameraError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CameraOperation {
    Acquire(String),
    GenerateConfiguration(PixelFormat),
    Configure,
    AllocateBuffers,
    CreateRequest,
    Start,
    Queue(QueueMode),
    Stop,
    Release,
}

/// How the mock camera should behave.
#[derive(Clone, Debug)]
pub(crate) struct MockBehaviour {
    pub(crate) cameras: Vec<String>,
    pub(crate) acquire_fails: bool,
    pub(crate) configuration_status: ConfigurationStatus,
    pub(crate) buffer_count: usize,
    pub(crate) start_fails: bool,
    /// The status every queued request completes with, or `None` to never complete.
    pub(crate) completion: Option<RequestStatus>,
    pub(crate) geometry: StreamGeometry,
    pub(crate) frame: Vec<u8>,
}

/// A small BGR frame with 32 bytes of padding on every row.
fn padded_bgr_frame(geometry: &StreamGeometry) -> Vec<u8> {
    let stride = geometry.stride as usize;
    let mut frame = vec![0xFF; stride * geometry.height as usize];
    for row in frame.chunks_mut(stride) {
        for bgr in row[..(geometry.width as usize * 3)].chunks_exact_mut(3) {
            bgr.copy_from_slice(&[0x20, 0x60, 0xA0]);
        }
    }
    frame
}

impl Default for MockBehaviour {
    fn default() -> Self {
        let geometry = StreamGeometry {
            pixel_format: PixelFormat::Rgb888,
            width: 32,
            height: 24,
            stride: 128,
        };
        Self {
            cameras: vec!["/base/soc/i2c0mux/i2c@1/imx708@1a".to_string()],
            acquire_fails: false,
            configuration_status: ConfigurationStatus::Valid,
            buffer_count: 4,
            start_fails: false,
            completion: Some(RequestStatus::Complete),
            frame: padded_bgr_frame(&geometry),
            geometry,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MockCameraStack {
    behaviour: MockBehaviour,
    operations: Arc<Mutex<Vec<CameraOperation>>>,
}

impl MockCameraStack {
    pub(crate) fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            operations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every operation performed on this stack and its cameras, oldest first.
    pub(crate) fn operations(&self) -> Vec<CameraOperation> {
        self.operations.lock().unwrap().clone()
    }

    pub(crate) fn clear_operations(&self) {
        self.operations.lock().unwrap().clear()
    }

    fn record(&self, operation: CameraOperation) {
        self.operations.lock().unwrap().push(operation)
    }
}

impl CameraStack for MockCameraStack {
    type Camera = MockCamera;

    fn camera_ids(&self) -> Vec<String> {
        self.behaviour.cameras.clone()
    }

    fn acquire(&self, id: &str) -> Result<Self::Camera, CameraError> {
        self.record(CameraOperation::Acquire(id.to_string()));
        if self.behaviour.acquire_fails {
            return Err(CameraError::Acquisition {
                id: id.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "Device or resource busy"),
            });
        }
        Ok(MockCamera {
            id: id.to_string(),
            stack: self.clone(),
            notifier: None,
            plane: None,
            streaming: false,
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockCamera {
    id: String,
    stack: MockCameraStack,
    notifier: Option<CompletionNotifier>,
    plane: Option<File>,
    streaming: bool,
}

impl MockCamera {
    fn behaviour(&self) -> &MockBehaviour {
        &self.stack.behaviour
    }
}

impl CameraHandle for MockCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn generate_configuration(
        &mut self,
        pixel_format: PixelFormat,
    ) -> Result<ConfigurationStatus, CameraError> {
        self.stack
            .record(CameraOperation::GenerateConfiguration(pixel_format));
        Ok(self.behaviour().configuration_status)
    }

    fn configure(&mut self) -> Result<StreamGeometry, CameraError> {
        self.stack.record(CameraOperation::Configure);
        Ok(self.behaviour().geometry)
    }

    fn allocate_buffers(&mut self) -> Result<usize, CameraError> {
        self.stack.record(CameraOperation::AllocateBuffers);
        let count = self.behaviour().buffer_count;
        if count == 0 {
            return Err(CameraError::BufferAllocation(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "Cannot allocate memory",
            )));
        }
        let mut plane = tempfile::tempfile()?;
        plane.write_all(&self.behaviour().frame)?;
        self.plane = Some(plane);
        Ok(count)
    }

    fn create_request(&mut self) -> Result<(), CameraError> {
        self.stack.record(CameraOperation::CreateRequest);
        if self.plane.is_none() {
            return Err(CameraError::RequestCreation);
        }
        Ok(())
    }

    fn on_request_completed(&mut self, notifier: CompletionNotifier) {
        self.notifier = Some(notifier);
    }

    fn start(&mut self) -> Result<(), CameraError> {
        self.stack.record(CameraOperation::Start);
        if self.behaviour().start_fails {
            return Err(CameraError::StreamStart(io::Error::new(
                io::ErrorKind::Other,
                "Broken pipe",
            )));
        }
        self.streaming = true;
        Ok(())
    }

    fn queue_request(&mut self, mode: QueueMode) -> Result<(), CameraError> {
        self.stack.record(CameraOperation::Queue(mode));
        if !self.streaming {
            return Err(CameraError::RequestQueue("camera is not streaming".to_string()));
        }
        if let (Some(status), Some(notifier)) = (self.behaviour().completion, &self.notifier) {
            // Completions come in on a thread the camera stack owns.
            let notifier = notifier.clone();
            thread::spawn(move || notifier.notify(status));
        }
        Ok(())
    }

    fn stop(&mut self) -> io::Result<()> {
        self.stack.record(CameraOperation::Stop);
        self.streaming = false;
        Ok(())
    }

    fn frame_buffer(&self) -> Result<FrameBufferView<'_>, CameraError> {
        let plane = self.plane.as_ref().ok_or(CameraError::MapFailure)?;
        Ok(std::iter::once(PlaneDescriptor {
            fd: plane.as_fd(),
            offset: 0,
            length: self.behaviour().frame.len(),
        })
        .collect())
    }

    fn release(self) {
        self.stack.record(CameraOperation::Release);
    }
}
