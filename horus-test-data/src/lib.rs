// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
mod calibration_data;
mod i2c_mock;

pub use calibration_data::{
    datasheet_register_file, CHIP_ID, HUMIDITY_CALIBRATION, REFERENCE_RAW_SAMPLE,
    REGISTER_FILE_LENGTH, TEMPERATURE_PRESSURE_CALIBRATION,
};
pub use i2c_mock::{datasheet_bme280_at_address, I2cOperation, MockError, MockSensorBus};
