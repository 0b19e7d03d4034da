// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
mod mock_camera;

use horus_test_data::{HUMIDITY_CALIBRATION, TEMPERATURE_PRESSURE_CALIBRATION};

use crate::calibration::Calibration;

pub(crate) use mock_camera::*;

/// The trim values from the datasheet's worked example.
pub(crate) fn datasheet_calibration() -> Calibration {
    Calibration::from_data(&TEMPERATURE_PRESSURE_CALIBRATION, &HUMIDITY_CALIBRATION)
}
