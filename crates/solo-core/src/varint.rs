//! Bitcoin variable-length integer ("CompactSize") encoding.

/// Append `value` to `output` as a Bitcoin varint.
pub fn encode_varint(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffff_ffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}

/// Encode `value` as a standalone varint.
pub fn varint(value: u64) -> Vec<u8> {
    let mut output = Vec::with_capacity(9);
    encode_varint(value, &mut output);
    output
}
