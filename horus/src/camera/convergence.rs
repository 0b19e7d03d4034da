// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::time::Duration;

use tracing::debug;

use super::{CameraHandle, Completion, QueueMode};
use crate::error::CameraError;

/// Cycle the capture request through the camera a fixed number of times.
///
/// There's no attempt to detect when exposure has settled, every frame of the budget is used. The
/// frame left in the buffer afterwards is the one from the final iteration.
///
/// `submitted` tracks whether the request has ever been queued. Once it has, every later
/// submission has to ask for buffer reuse.
pub(crate) fn converge<C: CameraHandle>(
    camera: &mut C,
    completion: &Completion,
    frames: u32,
    timeout: Duration,
    submitted: &mut bool,
) -> Result<(), CameraError> {
    for frame in 0..frames {
        completion.reset();
        let mode = if *submitted {
            QueueMode::ReuseBuffers
        } else {
            QueueMode::Fresh
        };
        camera.queue_request(mode)?;
        *submitted = true;
        completion.wait(timeout)?;
        debug!(frame, frames, "frame completed");
    }
    Ok(())
}
