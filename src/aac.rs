//! AudioSpecificConfig serialization (ISO/IEC 14496-3 §1.6.2.1).
//!
//! The SDP generator embeds this blob, lower-case hex, in the audio
//! `fmtp` line's `config=` parameter.

use bitstream_io::{BigEndian, BitWrite, BitWriter};

use crate::error::{DemuxError, Result};

/// Sampling frequencies addressable by index; anything else is written
/// with the explicit 24-bit escape.
const SAMPLING_FREQUENCIES: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// Serializes an AudioSpecificConfig for an AAC stream.
///
/// `frame_length` must be 1024 or 960.
pub fn create_audio_specific_config(
    object_type: u8,
    sampling_frequency: u32,
    channels: u8,
    frame_length: u16,
) -> Result<Vec<u8>> {
    if object_type == 0 || object_type > 30 {
        return Err(DemuxError::ReservedValue("audio object type"));
    }
    if channels > 7 {
        return Err(DemuxError::ReservedValue("channel configuration"));
    }
    if frame_length != 1024 && frame_length != 960 {
        return Err(DemuxError::ReservedValue("frame length"));
    }

    let mut writer = BitWriter::endian(Vec::new(), BigEndian);
    writer.write::<5, u8>(object_type)?;
    match SAMPLING_FREQUENCIES
        .iter()
        .position(|&f| f == sampling_frequency)
    {
        Some(index) => writer.write::<4, u8>(index as u8)?,
        None => {
            writer.write::<4, u8>(0x0F)?;
            writer.write::<24, u32>(sampling_frequency)?;
        }
    }
    writer.write::<4, u8>(channels)?;
    // GASpecificConfig
    writer.write_bit(frame_length == 960)?; // frame_length_flag
    writer.write_bit(false)?; // depends_on_core_coder
    writer.write_bit(false)?; // extension_flag
    writer.byte_align()?;
    Ok(writer.into_writer())
}
