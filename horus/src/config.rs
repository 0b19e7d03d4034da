// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::path::PathBuf;
use std::time::Duration;

use crate::bus::LinuxBus;
use crate::camera::PixelFormat;
use crate::register::{
    ConfigRegister, Filter, HumidityControl, MeasurementControl, Mode, Oversampling, StandbyTime,
    PRIMARY_ADDRESS,
};

/// Where to find the sensor, and how to set it up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SensorConfig {
    /// The number of the I²C bus, as in `/dev/i2c-N`.
    pub bus: u8,

    /// The 7-bit device address. BME280s answer on either 0x76 or 0x77 depending on how SDO is
    /// wired, so this has to come from whoever knows the board.
    pub address: u8,

    pub settings: SensorSettings,
}

impl SensorConfig {
    pub fn new(bus: u8, address: u8) -> Self {
        Self {
            bus,
            address,
            settings: SensorSettings::default(),
        }
    }

    pub fn with_settings(self, settings: SensorSettings) -> Self {
        Self { settings, ..self }
    }

    pub fn bus_path(&self) -> PathBuf {
        LinuxBus::bus_path(self.bus)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::new(1, PRIMARY_ADDRESS)
    }
}

/// Measurement settings written to the sensor during initialization.
///
/// The defaults are the "weather monitoring" style settings: one sample of everything, normal
/// mode with a one second standby, and no filtering.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SensorSettings {
    pub humidity_oversampling: Oversampling,
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub mode: Mode,
    pub standby_time: StandbyTime,
    pub filter: Filter,
}

impl SensorSettings {
    pub fn humidity_control(&self) -> HumidityControl {
        HumidityControl::new(self.humidity_oversampling)
    }

    pub fn measurement_control(&self) -> MeasurementControl {
        MeasurementControl::new(
            self.temperature_oversampling,
            self.pressure_oversampling,
            self.mode,
        )
    }

    pub fn config_register(&self) -> ConfigRegister {
        ConfigRegister::new(self.standby_time, self.filter)
    }
}

/// What to do with the frame once it has been captured.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    /// Encode the frame as a JPEG with the given quality (1-100).
    Jpeg { quality: u8 },

    /// Write the mapped planes out back to back, exactly as the camera produced them.
    Raw,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Jpeg { quality: 90 }
    }
}

/// Still capture settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CaptureConfig {
    /// The pixel format forced onto the still capture stream.
    pub pixel_format: PixelFormat,

    /// How many requests to run through the camera before keeping one. The auto exposure and
    /// white balance loops need a few frames of feedback to settle.
    convergence_frames: u32,

    /// How long to wait for any single request to complete.
    pub completion_timeout: Duration,

    pub output: OutputFormat,
}

impl CaptureConfig {
    /// Roughly one second of frames at 30 fps.
    pub const DEFAULT_CONVERGENCE_FRAMES: u32 = 30;

    pub fn convergence_frames(&self) -> u32 {
        self.convergence_frames
    }

    /// At least one frame is always captured.
    pub fn with_convergence_frames(self, frames: u32) -> Self {
        Self {
            convergence_frames: frames.max(1),
            ..self
        }
    }

    pub fn with_pixel_format(self, pixel_format: PixelFormat) -> Self {
        Self {
            pixel_format,
            ..self
        }
    }

    pub fn with_completion_timeout(self, completion_timeout: Duration) -> Self {
        Self {
            completion_timeout,
            ..self
        }
    }

    pub fn with_output(self, output: OutputFormat) -> Self {
        Self { output, ..self }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::Rgb888,
            convergence_frames: Self::DEFAULT_CONVERGENCE_FRAMES,
            completion_timeout: Duration::from_secs(2),
            output: OutputFormat::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_sensor_config() {
        let config = SensorConfig::default();
        assert_eq!(config.bus, 1);
        assert_eq!(config.address, 0x76);
        assert_eq!(config.bus_path().to_str(), Some("/dev/i2c-1"));
    }

    #[test]
    fn default_settings_registers() {
        let settings = SensorSettings::default();
        assert_eq!(u8::from(settings.humidity_control()), 0x01);
        assert_eq!(u8::from(settings.measurement_control()), 0x27);
        assert_eq!(u8::from(settings.config_register()), 0xA0);
    }

    #[test]
    fn convergence_frames_floor() {
        let config = CaptureConfig::default();
        assert_eq!(config.convergence_frames(), 30);
        assert_eq!(config.with_convergence_frames(0).convergence_frames(), 1);
        assert_eq!(config.with_convergence_frames(5).convergence_frames(), 5);
    }

    #[test]
    fn capture_builders() {
        let config = CaptureConfig::default()
            .with_pixel_format(PixelFormat::R8)
            .with_completion_timeout(Duration::from_millis(250))
            .with_output(OutputFormat::Raw);
        assert_eq!(config.pixel_format, PixelFormat::R8);
        assert_eq!(config.completion_timeout, Duration::from_millis(250));
        assert_eq!(config.output, OutputFormat::Raw);
        assert_eq!(config.convergence_frames(), 30);
    }
}
