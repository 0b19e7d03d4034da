// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross

/// A very small cursor over a byte slice, just enough to walk the BME280 trim blocks.
///
/// The sensor stores its multi-byte trim values little-endian.
pub(crate) trait Buffer {
    fn advance(&mut self, cnt: usize);
    fn get_u8(&mut self) -> u8;
    fn get_i8(&mut self) -> i8;
    fn get_u16_le(&mut self) -> u16;
    fn get_i16_le(&mut self) -> i16;
}

impl Buffer for &[u8] {
    fn advance(&mut self, cnt: usize) {
        *self = &self[cnt..];
    }

    fn get_u8(&mut self) -> u8 {
        let (byte, rest) = self.split_at(1);
        *self = rest;
        byte[0]
    }

    fn get_i8(&mut self) -> i8 {
        let (byte, rest) = self.split_at(1);
        *self = rest;
        i8::from_le_bytes([byte[0]])
    }

    fn get_u16_le(&mut self) -> u16 {
        let (bytes, rest) = self.split_at(2);
        *self = rest;
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn get_i16_le(&mut self) -> i16 {
        let (bytes, rest) = self.split_at(2);
        *self = rest;
        i16::from_le_bytes([bytes[0], bytes[1]])
    }
}

/// Check if the n-th bit is set.
///
/// Bits are 0-indexed, from the LSB.
pub(crate) fn is_bit_set(value: u8, index: u8) -> bool {
    value & (1 << index) != 0
}

/// Assemble a 20-bit ADC value from its MSB, LSB, and XLSB registers.
///
/// Only the upper nibble of the XLSB register holds data.
pub(crate) fn adc_20_bit(msb: u8, lsb: u8, xlsb: u8) -> i32 {
    (i32::from(msb) << 12) | (i32::from(lsb) << 4) | (i32::from(xlsb) >> 4)
}
