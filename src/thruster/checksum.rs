// XOR lane checksum
//
// The frame is folded as 16-bit little-endian words: the low byte of the
// checksum is the XOR of every even-position byte, the high byte the XOR of
// every odd-position byte. A trailing unpaired byte is not covered.

/// Compute the `[lsb, msb]` checksum over `data`
pub fn checksum(data: &[u8]) -> [u8; 2] {
    data.chunks_exact(2)
        .fold([0u8; 2], |[lsb, msb], pair| [lsb ^ pair[0], msb ^ pair[1]])
}

/// Check `data` against a received checksum
pub fn verify(data: &[u8], expected: [u8; 2]) -> bool {
    checksum(data) == expected
}
