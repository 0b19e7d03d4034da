// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::path::Path;

use tracing::{debug, info, warn};

use super::convergence::converge;
use super::frame::write_frame;
use super::{
    CameraHandle, CameraStack, Completion, ConfigurationStatus, ControllerState, StreamGeometry,
};
use crate::config::CaptureConfig;
use crate::error::CameraError;

/// Drives one camera through the still capture lifecycle.
///
/// ```text
/// Unconfigured --start--> Acquired --> Configured <--capture--> Streaming
///                             \             |
///                              `---stop-----+--> Stopped
/// ```
///
/// [`start`][Self::start] leaves the camera configured with its buffers allocated and one request
/// built. Each [`capture`][Self::capture] streams just long enough to run the exposure
/// convergence loop and then stops again, so the sensor isn't left running between captures.
/// [`stop`][Self::stop] (or dropping the controller) releases the camera. A stopped controller
/// can't be restarted, create a new one instead.
///
/// If `start` fails partway through, the camera stays acquired until `stop` is called.
pub struct CaptureController<S: CameraStack> {
    stack: S,
    config: CaptureConfig,
    camera: Option<S::Camera>,
    geometry: Option<StreamGeometry>,
    completion: Completion,
    state: ControllerState,
    /// Whether the request has been queued at least once, after which it must be reused.
    submitted: bool,
}

impl<S: CameraStack> CaptureController<S> {
    pub fn new(stack: S, config: CaptureConfig) -> Self {
        Self {
            stack,
            config,
            camera: None,
            geometry: None,
            completion: Completion::new(),
            state: ControllerState::Unconfigured,
            submitted: false,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// The stream geometry, once configured.
    pub fn geometry(&self) -> Option<StreamGeometry> {
        self.geometry
    }

    pub fn camera_id(&self) -> Option<&str> {
        self.camera.as_ref().map(|camera| camera.id())
    }

    fn invalid_state(&self, operation: &'static str) -> CameraError {
        CameraError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Acquire the first camera and get it ready for still capture.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.state != ControllerState::Unconfigured {
            return Err(self.invalid_state("start"));
        }
        let ids = self.stack.camera_ids();
        let id = ids.first().ok_or(CameraError::NoDevice)?;
        let camera = self.camera.insert(self.stack.acquire(id)?);
        self.state = ControllerState::Acquired;
        info!(camera = %id, "acquired camera");

        let pixel_format = self.config.pixel_format;
        match camera.generate_configuration(pixel_format)? {
            ConfigurationStatus::Valid => (),
            ConfigurationStatus::Adjusted => {
                info!(%pixel_format, "camera adjusted the stream configuration")
            }
            ConfigurationStatus::Invalid => {
                return Err(CameraError::InvalidConfiguration(pixel_format))
            }
        }
        let geometry = camera.configure()?;
        if geometry.pixel_format != pixel_format {
            warn!(
                requested = %pixel_format,
                configured = %geometry.pixel_format,
                "camera is using a different pixel format"
            );
        }
        let buffer_count = camera.allocate_buffers()?;
        camera.create_request()?;
        camera.on_request_completed(self.completion.notifier());
        debug!(?geometry, buffer_count, "camera configured");
        self.geometry = Some(geometry);
        self.state = ControllerState::Configured;
        Ok(())
    }

    /// Capture a still to `destination`.
    ///
    /// This blocks for the whole convergence loop, about a second with the default settings.
    /// Streaming is always stopped again before returning, even when the capture fails.
    pub fn capture(&mut self, destination: &Path) -> Result<(), CameraError> {
        if self.state != ControllerState::Configured {
            return Err(self.invalid_state("capture"));
        }
        let (camera, geometry) = match (self.camera.as_mut(), self.geometry) {
            (Some(camera), Some(geometry)) => (camera, geometry),
            _ => {
                return Err(CameraError::InvalidState {
                    operation: "capture",
                    state: self.state,
                })
            }
        };
        camera.start()?;
        self.state = ControllerState::Streaming;
        let converged = converge(
            camera,
            &self.completion,
            self.config.convergence_frames(),
            self.config.completion_timeout,
            &mut self.submitted,
        );
        if let Err(err) = camera.stop() {
            warn!(%err, "unable to stop streaming");
        }
        self.state = ControllerState::Configured;
        converged?;

        let buffer = camera.frame_buffer()?;
        write_frame(&buffer, &geometry, &self.config.output, destination)
    }

    /// Stop the camera and release it. Does nothing if no camera is held.
    pub fn stop(&mut self) {
        let mut camera = match self.camera.take() {
            Some(camera) => camera,
            None => return,
        };
        if matches!(
            self.state,
            ControllerState::Configured | ControllerState::Streaming
        ) {
            if let Err(err) = camera.stop() {
                warn!(%err, "unable to stop camera");
            }
        }
        let id = camera.id().to_string();
        camera.release();
        info!(camera = %id, "released camera");
        self.geometry = None;
        self.state = ControllerState::Stopped;
    }
}

impl<S: CameraStack> Drop for CaptureController<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
