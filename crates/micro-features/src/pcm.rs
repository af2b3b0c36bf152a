//! Byte-level PCM decoding

/// Decode little-endian 16-bit samples; a trailing odd byte is ignored
pub fn decode_le_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
