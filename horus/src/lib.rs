// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
//! Environmental sensing and still capture for small Linux edge devices.
//!
//! This crate covers the two halves of a field monitoring node: reading temperature, pressure and
//! humidity from a Bosch BME280 over I²C, and capturing still images from a camera driven through
//! a libcamera-style request pipeline.
//!
//! # BME280
//! ```no_run
//! use horus::{Bme280, SensorConfig};
//!
//! // Bus #1 (`/dev/i2c-1`), with the sensor's SDO pin pulled low (address 0x76)
//! let mut sensor = Bme280::open(&SensorConfig::default())?;
//! let reading = sensor.read_all()?;
//! println!(
//!     "{:.2} °C, {:.2} hPa, {:.2} %RH",
//!     reading.temperature, reading.pressure, reading.humidity
//! );
//! # Ok::<(), horus::Error<std::io::Error>>(())
//! ```
//! [`Bme280`] is generic over the [`embedded-hal`][embedded-hal] I²C traits, so any
//! implementation of them can be used in place of the [`LinuxBus`] that `open` sets up. The
//! factory calibration is read once when the driver is created and kept in a [`Calibration`].
//!
//! Pressure and humidity compensation both depend on an intermediate value computed while
//! compensating temperature, the [`FineTemperature`]. The driver keeps the most recent one around,
//! and the free functions in [`calculations`] take it as an argument, so it isn't possible to
//! compensate pressure or humidity without having compensated a temperature first.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//!
//! # Still Capture
//! [`CaptureController`] owns a camera for its whole lifetime. Starting it acquires the first
//! camera the stack reports and configures a single still capture stream. Each capture then runs
//! the same request through the camera for a fixed number of frames, giving automatic exposure
//! and white balance time to settle, and writes the final frame out as a JPEG (or the raw plane
//! bytes). The camera stack sits behind the [`camera::CameraStack`] trait, with a libcamera
//! implementation available with the `libcamera` feature.

pub mod bus;
pub mod calculations;
pub mod calibration;
pub mod camera;
pub mod config;
#[doc(hidden)]
pub mod driver;
#[doc(hidden)]
pub mod error;
pub mod register;
mod util;

#[cfg(test)]
mod test;

pub use bus::LinuxBus;
pub use calculations::{EnvironmentalReading, FineTemperature, RawSample};
pub use calibration::{Calibration, FromI2C};
pub use camera::CaptureController;
pub use config::{CaptureConfig, OutputFormat, SensorConfig, SensorSettings};
#[doc(inline)]
pub use driver::Bme280;
#[doc(inline)]
pub use error::{CameraError, Error};
