use criterion::{criterion_group, criterion_main, Criterion};

use horus::calibration::FromI2C;
use horus::Calibration;
use horus_test_data::{
    datasheet_bme280_at_address, HUMIDITY_CALIBRATION, TEMPERATURE_PRESSURE_CALIBRATION,
};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Calibration Loading");

    group.bench_with_input(
        "from data",
        &(TEMPERATURE_PRESSURE_CALIBRATION, HUMIDITY_CALIBRATION),
        |b, (temperature_pressure, humidity)| {
            b.iter(|| Calibration::from_data(temperature_pressure, humidity))
        },
    );
    group.bench_function("over I2C", |b| {
        let mut bus = datasheet_bme280_at_address(0x76);
        b.iter(|| Calibration::from_i2c(&mut bus, 0x76).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
