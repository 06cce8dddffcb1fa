//! DCT compressed terrain patches as they arrive in layer data messages.

pub mod bitpack;
pub mod dct;

use tracing::error;

use crate::error::{Error, Result};
use bitpack::{BitReader, BitWriter};
use dct::{DctTables, MAX_PATCH_SIZE};

/// Quantisation byte that terminates the patch list.
pub const END_OF_PATCHES: u8 = 97;
/// Default precision exponent used by [`PatchEncoder`].
pub const DEFAULT_PRECISION: u8 = 8;

/// Layer kinds carried by terrain messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    /// Regular land, patch ids packed into 10 bits.
    Land,
    /// Land on large regions, patch ids packed into 32 bits.
    ExtendedLand,
}

impl LayerType {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b'L' => Ok(Self::Land),
            b'M' => Ok(Self::ExtendedLand),
            other => Err(Error::protocol(format!("unknown terrain layer type {other:#04x}"))),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Land => b'L',
            Self::ExtendedLand => b'M',
        }
    }

    fn id_bits(self) -> u8 {
        match self {
            Self::Land => 10,
            Self::ExtendedLand => 32,
        }
    }

    fn split_id(self, id: u32) -> (u32, u32) {
        match self {
            Self::Land => (id >> 5, id & 0x1f),
            Self::ExtendedLand => (id >> 16, id & 0xffff),
        }
    }

    fn join_id(self, i: u32, j: u32) -> u32 {
        match self {
            Self::Land => ((i & 0x1f) << 5) | (j & 0x1f),
            Self::ExtendedLand => ((i & 0xffff) << 16) | (j & 0xffff),
        }
    }
}

/// Shared header at the start of every layer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupHeader {
    pub stride: u16,
    pub patch_size: u8,
    pub layer: LayerType,
}

impl GroupHeader {
    fn read(reader: &mut BitReader) -> Result<Self> {
        let stride = reader.read_bits(16)? as u16;
        let patch_size = reader.read_bits(8)? as u8;
        let layer = LayerType::from_byte(reader.read_bits(8)? as u8)?;
        Ok(Self {
            stride,
            patch_size,
            layer,
        })
    }

    fn write(&self, writer: &mut BitWriter) {
        writer.write_bits(self.stride as u32, 16);
        writer.write_bits(self.patch_size as u32, 8);
        writer.write_bits(self.layer.to_byte() as u32, 8);
    }
}

/// Per-patch header preceding its coefficient block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchHeader {
    pub quant_wbits: u8,
    pub dc_offset: f32,
    pub range: u16,
    pub patch_id: u32,
}

impl PatchHeader {
    pub fn word_bits(&self) -> u8 {
        (self.quant_wbits & 0x0f) + 2
    }

    pub fn precision(&self) -> u8 {
        (self.quant_wbits >> 4) + 2
    }
}

/// One decoded patch: `size * size` heights, row-major from the south-west.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPatch {
    pub i: u32,
    pub j: u32,
    pub header: PatchHeader,
    pub heights: Vec<f32>,
}

/// Pulls patches out of a layer message one at a time.
pub struct PatchDecoder<'a> {
    reader: BitReader<'a>,
    group: GroupHeader,
    tables: DctTables,
    finished: bool,
}

impl<'a> PatchDecoder<'a> {
    /// Reads the group header; the patch size must be a power of two no
    /// larger than [`MAX_PATCH_SIZE`].
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut reader = BitReader::new(data);
        let group = GroupHeader::read(&mut reader)?;
        let size = group.patch_size as u32;
        if size < 2 || size > MAX_PATCH_SIZE || !size.is_power_of_two() {
            error!("Terrain group header has invalid patch size {}", size);
            return Err(Error::protocol(format!("invalid patch size {size}")));
        }
        Ok(Self {
            reader,
            group,
            tables: DctTables::new(size),
            finished: false,
        })
    }

    pub fn group(&self) -> &GroupHeader {
        &self.group
    }

    fn read_header(&mut self) -> Result<Option<PatchHeader>> {
        let quant_wbits = self.reader.read_bits(8)? as u8;
        if quant_wbits == END_OF_PATCHES {
            return Ok(None);
        }
        let dc_offset = self.reader.read_f32()?;
        let range = self.reader.read_bits(16)? as u16;
        let patch_id = self.reader.read_bits(self.group.layer.id_bits())?;
        Ok(Some(PatchHeader {
            quant_wbits,
            dc_offset,
            range,
            patch_id,
        }))
    }

    fn read_coefficients(&mut self, word_bits: u8) -> Result<Vec<i32>> {
        let count = self.tables.size() * self.tables.size();
        let mut coefficients = vec![0; count];
        for slot in coefficients.iter_mut() {
            if !self.reader.read_bool()? {
                continue;
            }
            if !self.reader.read_bool()? {
                // End of block, the rest stay zero.
                break;
            }
            let negative = self.reader.read_bool()?;
            let magnitude = self.reader.read_bits(word_bits)? as i32;
            *slot = if negative { -magnitude } else { magnitude };
        }
        Ok(coefficients)
    }

    /// The next patch, or `None` once the end marker is read.
    pub fn next_patch(&mut self) -> Result<Option<DecodedPatch>> {
        if self.finished {
            return Ok(None);
        }
        let Some(header) = self.read_header()? else {
            self.finished = true;
            return Ok(None);
        };

        let coefficients = self.read_coefficients(header.word_bits())?;
        let mut block = self.tables.dequantize(&coefficients);
        self.tables.inverse(&mut block);

        let precision = header.precision() as i32;
        let mult = header.range as f32 / (1u32 << precision) as f32;
        let addval = mult * (1u32 << (precision - 1)) as f32 + header.dc_offset;
        for v in block.iter_mut() {
            *v = *v * mult + addval;
        }

        let (i, j) = self.group.layer.split_id(header.patch_id);
        Ok(Some(DecodedPatch {
            i,
            j,
            header,
            heights: block,
        }))
    }
}

/// Writes layer messages in the format [`PatchDecoder`] reads.
pub struct PatchEncoder {
    writer: BitWriter,
    group: GroupHeader,
    tables: DctTables,
    precision: u8,
}

impl PatchEncoder {
    pub fn new(group: GroupHeader) -> Result<Self> {
        let size = group.patch_size as u32;
        if size < 2 || size > MAX_PATCH_SIZE || !size.is_power_of_two() {
            return Err(Error::protocol(format!("invalid patch size {size}")));
        }
        let mut writer = BitWriter::new();
        group.write(&mut writer);
        Ok(Self {
            writer,
            group,
            tables: DctTables::new(size),
            precision: DEFAULT_PRECISION,
        })
    }

    /// Precision exponent between 2 and 17.
    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision.clamp(2, 17);
        self
    }

    /// Compresses one `size * size` patch of heights.
    pub fn push_patch(&mut self, i: u32, j: u32, heights: &[f32]) -> Result<()> {
        let size = self.tables.size();
        if heights.len() != size * size {
            return Err(Error::protocol(format!(
                "patch has {} heights, expected {}",
                heights.len(),
                size * size
            )));
        }

        let (min, max) = heights
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), h| (lo.min(*h), hi.max(*h)));
        let range = (max - min + 1.0).ceil().clamp(1.0, u16::MAX as f32);
        let dc_offset = min;

        let precision = self.precision as i32;
        let mult = range / (1u32 << precision) as f32;
        let addval = mult * (1u32 << (precision - 1)) as f32 + dc_offset;
        let mut block: Vec<f32> = heights.iter().map(|h| (h - addval) / mult).collect();
        self.tables.forward(&mut block);
        let coefficients = self.tables.quantize(&block);

        let peak = coefficients.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0);
        let needed = (32 - peak.leading_zeros()) as u8;
        let mut word_bits = needed.clamp(2, 17);
        let mut quant_wbits = ((self.precision - 2) << 4) | (word_bits - 2);
        if quant_wbits == END_OF_PATCHES {
            word_bits += 1;
            quant_wbits = ((self.precision - 2) << 4) | (word_bits - 2);
        }
        let word_max = (1u32 << word_bits) - 1;

        self.writer.write_bits(quant_wbits as u32, 8);
        self.writer.write_f32(dc_offset);
        self.writer.write_bits(range as u32, 16);
        let layer = self.group.layer;
        self.writer.write_bits(layer.join_id(i, j), layer.id_bits());

        let last_nonzero = coefficients.iter().rposition(|c| *c != 0);
        for (k, c) in coefficients.iter().enumerate() {
            if last_nonzero.map_or(true, |last| k > last) {
                self.writer.write_bool(true);
                self.writer.write_bool(false);
                break;
            }
            if *c == 0 {
                self.writer.write_bool(false);
                continue;
            }
            self.writer.write_bool(true);
            self.writer.write_bool(true);
            self.writer.write_bool(*c < 0);
            self.writer.write_bits(c.unsigned_abs().min(word_max), word_bits);
        }
        Ok(())
    }

    /// Appends the end marker and returns the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.writer.write_bits(END_OF_PATCHES as u32, 8);
        self.writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn land(size: u8) -> GroupHeader {
        GroupHeader {
            stride: 264,
            patch_size: size,
            layer: LayerType::Land,
        }
    }

    #[test]
    fn flat_patch_survives_exactly() {
        let mut encoder = PatchEncoder::new(land(16)).unwrap();
        encoder.push_patch(3, 7, &[21.5; 256]).unwrap();
        let bytes = encoder.finish();

        let mut decoder = PatchDecoder::new(&bytes).unwrap();
        let patch = decoder.next_patch().unwrap().unwrap();
        assert_eq!((patch.i, patch.j), (3, 7));
        assert!(patch.heights.iter().all(|h| (h - 21.5).abs() < 1e-3));
        assert!(decoder.next_patch().unwrap().is_none());
        assert!(decoder.next_patch().unwrap().is_none());
    }

    #[test]
    fn unknown_layer_is_rejected() {
        let mut writer = BitWriter::new();
        writer.write_bits(264, 16);
        writer.write_bits(16, 8);
        writer.write_bits(b'W' as u32, 8);
        let bytes = writer.finish();
        let err = PatchDecoder::new(&bytes).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);
    }

    #[test]
    fn oversized_patches_are_rejected() {
        let mut writer = BitWriter::new();
        writer.write_bits(264, 16);
        writer.write_bits(64, 8);
        writer.write_bits(b'L' as u32, 8);
        assert!(PatchDecoder::new(&writer.finish()).is_err());
    }

    #[test]
    fn extended_ids_carry_wide_coordinates() {
        let group = GroupHeader {
            stride: 264,
            patch_size: 16,
            layer: LayerType::ExtendedLand,
        };
        let mut encoder = PatchEncoder::new(group).unwrap();
        encoder.push_patch(40, 63, &[0.0; 256]).unwrap();
        let bytes = encoder.finish();
        let patch = PatchDecoder::new(&bytes).unwrap().next_patch().unwrap().unwrap();
        assert_eq!((patch.i, patch.j), (40, 63));
    }

    #[test]
    fn truncated_block_is_corruption() {
        let mut encoder = PatchEncoder::new(land(16)).unwrap();
        let ramp: Vec<f32> = (0..256).map(|k| (k % 16) as f32).collect();
        encoder.push_patch(0, 0, &ramp).unwrap();
        let bytes = encoder.finish();
        let cut = &bytes[..bytes.len() / 2];
        let mut decoder = PatchDecoder::new(cut).unwrap();
        assert_eq!(decoder.next_patch().unwrap_err().kind(), ErrorKind::ProtocolCorruption);
    }
}
