// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::cell::{Ref, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use embedded_hal::blocking::i2c;

use crate::calibration_data::{datasheet_register_file, REGISTER_FILE_LENGTH};

const RECENT_OPERATIONS_QUEUE_LENGTH: usize = 32;

const RESET_REGISTER: u8 = 0xE0;

const RESET_COMMAND: u8 = 0xB6;

/// The registers a controller is allowed to write to.
const WRITABLE_REGISTERS: [u8; 4] = [RESET_REGISTER, 0xF2, 0xF4, 0xF5];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MockError {
    /// An unknown I2C address was given.
    UnknownI2cAddress(u8),

    /// The given register is read-only (or doesn't exist).
    IllegalWriteAddress(u8),

    /// The requested operation is not allowed.
    ///
    /// This covers write-read transactions that write more than the single register address, and
    /// writes that aren't made of register/value pairs.
    IllegalOperation,

    /// The sensor stopped responding partway through a burst read.
    ShortRead { register: u8, length: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum I2cOperation {
    Write { register: u8, value: u8 },
    Read { register: u8, length: usize },
}

/// A register-file level simulation of a BME280 on an I²C bus.
///
/// Clones share the same state, so a test can keep a clone around to inspect the operations a
/// driver performed after the driver has taken ownership of the bus.
#[derive(Clone, Debug)]
pub struct MockSensorBus {
    i2c_address: u8,
    registers: Rc<RefCell<[u8; REGISTER_FILE_LENGTH]>>,
    failing_reads: Rc<RefCell<HashSet<u8>>>,
    failing_writes: Rc<RefCell<HashSet<u8>>>,
    recent_operations: Rc<RefCell<VecDeque<I2cOperation>>>,
}

impl MockSensorBus {
    pub fn new(i2c_address: u8, registers: [u8; REGISTER_FILE_LENGTH]) -> Self {
        Self {
            i2c_address,
            registers: Rc::new(RefCell::new(registers)),
            failing_reads: Rc::new(RefCell::new(HashSet::new())),
            failing_writes: Rc::new(RefCell::new(HashSet::new())),
            recent_operations: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers.borrow()[register as usize]
    }

    pub fn set_register(&self, register: u8, value: u8) {
        self.registers.borrow_mut()[register as usize] = value;
    }

    /// Replace the measurement data registers (0xF7 through 0xFE).
    ///
    /// This simulates the sensor finishing a new measurement.
    pub fn set_measurement(&self, burst: &[u8; 8]) {
        self.registers.borrow_mut()[0xF7..=0xFE].copy_from_slice(burst);
    }

    /// Make any burst read starting at `register` come back short.
    pub fn fail_reads_from(&self, register: u8) {
        self.failing_reads.borrow_mut().insert(register);
    }

    /// Make any write to `register` be rejected by the bus.
    pub fn fail_writes_to(&self, register: u8) {
        self.failing_writes.borrow_mut().insert(register);
    }

    fn add_operation(&self, operation: I2cOperation) {
        let mut recent_ops = self.recent_operations.borrow_mut();
        recent_ops.push_front(operation);
        recent_ops.truncate(RECENT_OPERATIONS_QUEUE_LENGTH);
    }

    /// The most recent operations, newest first.
    pub fn recent_operations(&self) -> Ref<VecDeque<I2cOperation>> {
        self.recent_operations.borrow()
    }

    pub fn clear_recent_operations(&self) {
        self.recent_operations.borrow_mut().clear()
    }

    fn store(&self, register: u8, value: u8) -> Result<(), MockError> {
        if !WRITABLE_REGISTERS.contains(&register) || self.failing_writes.borrow().contains(&register)
        {
            return Err(MockError::IllegalWriteAddress(register));
        }
        let mut registers = self.registers.borrow_mut();
        if register == RESET_REGISTER {
            // Anything other than the magic value is ignored by the sensor.
            if value == RESET_COMMAND {
                registers[0xF2] = 0x00;
                registers[0xF4] = 0x00;
                registers[0xF5] = 0x00;
            }
        } else {
            registers[register as usize] = value;
        }
        Ok(())
    }
}

impl i2c::Write for MockSensorBus {
    type Error = MockError;

    fn write(&mut self, i2c_address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        // Writes are a sequence of register address/value pairs.
        if bytes.is_empty() || bytes.len() % 2 != 0 {
            return Err(MockError::IllegalOperation);
        }
        for pair in bytes.chunks_exact(2) {
            let (register, value) = (pair[0], pair[1]);
            self.store(register, value)?;
            self.add_operation(I2cOperation::Write { register, value });
        }
        Ok(())
    }
}

impl i2c::WriteRead for MockSensorBus {
    type Error = MockError;

    fn write_read(
        &mut self,
        i2c_address: u8,
        write_buffer: &[u8],
        out_buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        if i2c_address != self.i2c_address {
            return Err(MockError::UnknownI2cAddress(i2c_address));
        }
        if write_buffer.len() != 1 || out_buffer.is_empty() {
            return Err(MockError::IllegalOperation);
        }
        let register = write_buffer[0];
        let length = out_buffer.len();
        self.add_operation(I2cOperation::Read { register, length });
        let start = register as usize;
        let end = start + length;
        if end > REGISTER_FILE_LENGTH || self.failing_reads.borrow().contains(&register) {
            return Err(MockError::ShortRead { register, length });
        }
        out_buffer.copy_from_slice(&self.registers.borrow()[start..end]);
        Ok(())
    }
}

/// A BME280 loaded with the datasheet trim values and reference measurement.
pub fn datasheet_bme280_at_address(i2c_address: u8) -> MockSensorBus {
    MockSensorBus::new(i2c_address, datasheet_register_file())
}
