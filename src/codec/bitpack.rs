use crate::error::{Error, Result};

/// Reads the terrain bit stream.
///
/// Bits come out of each byte most significant first. A value wider than
/// eight bits is assembled a byte at a time, least significant byte first,
/// each byte taking up to eight consecutive stream bits.
pub struct BitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    fn read_run(&mut self, count: u8) -> Result<u32> {
        let mut result = 0u32;
        let mut bits_read = 0u8;

        while bits_read < count {
            let Some(byte) = self.data.get(self.byte_pos) else {
                return Err(Error::protocol("terrain bit stream ended early"));
            };

            let bits_available = 8 - self.bit_pos;
            let bits_to_read = bits_available.min(count - bits_read);
            let mask = ((1u16 << bits_to_read) - 1) as u8;
            let shift = 8 - self.bit_pos - bits_to_read;
            let bits = (byte >> shift) & mask;

            result = (result << bits_to_read) | bits as u32;
            bits_read += bits_to_read;
            self.bit_pos += bits_to_read;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
        }
        Ok(result)
    }

    /// Reads a value of up to 32 bits.
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32);
        let mut value = 0u32;
        let mut remaining = count;
        let mut shift = 0;
        while remaining > 0 {
            let chunk = remaining.min(8);
            value |= self.read_run(chunk)? << shift;
            shift += 8;
            remaining -= chunk;
        }
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_run(1)? != 0)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_bits(32)?))
    }

    pub fn bits_remaining(&self) -> usize {
        (self.data.len().saturating_sub(self.byte_pos)) * 8 - self.bit_pos as usize
    }
}

/// Produces streams [`BitReader`] consumes.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    bit_pos: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_run(&mut self, value: u32, count: u8) {
        for bit in (0..count).rev() {
            self.current = (self.current << 1) | ((value >> bit) & 1) as u8;
            self.bit_pos += 1;
            if self.bit_pos == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.bit_pos = 0;
            }
        }
    }

    pub fn write_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= 32);
        let mut remaining = count;
        let mut shift = 0;
        while remaining > 0 {
            let chunk = remaining.min(8);
            self.write_run((value >> shift) & ((1u32 << chunk) - 1), chunk);
            shift += 8;
            remaining -= chunk;
        }
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_run(value as u32, 1);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bits(value.to_bits(), 32);
    }

    /// Pads the final partial byte with zeros.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_pos > 0 {
            self.current <<= 8 - self.bit_pos;
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn wide_values_are_little_endian_byte_runs() {
        // 10-bit 0x2A5: low byte 0xA5 first, then the two high bits.
        let mut reader = BitReader::new(&[0xA5, 0b1000_0000]);
        assert_eq!(reader.read_bits(10).unwrap(), 0x2A5);
    }

    #[test]
    fn single_bits_are_msb_first() {
        let mut reader = BitReader::new(&[0b1010_0000]);
        assert!(reader.read_bool().unwrap());
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.bits_remaining(), 5);
    }

    #[test]
    fn writer_matches_reader_layout() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_bits(0x2A5, 10);
        writer.write_f32(-3.25);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_bits(10).unwrap(), 0x2A5);
        assert_eq!(reader.read_f32().unwrap(), -3.25);
    }

    #[test]
    fn truncation_is_protocol_corruption() {
        let mut reader = BitReader::new(&[0xff]);
        let err = reader.read_bits(16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);
    }
}
