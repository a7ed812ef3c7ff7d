/*!
Encoded handle codec: pack integer handles into a single `f64`.

The VM module boundary only carries 32-bit integers and 64-bit floats, so any
call that needs to return a pointer together with a size smuggles both through
one double. The payload lives in the raw bit pattern of the float, never in
its numeric value:

```text
encode(ptr, len)
    bytes[0..4] = ptr (u32, little-endian)
    bytes[4..8] = len (u32, little-endian)

encode_matrix(ptr, width, height)
    bytes[0..2] = ptr & 0xFFFF   (u16, little-endian)
    bytes[2..4] = ptr >> 16      (u16, little-endian)
    bytes[4..6] = width          (u16, little-endian)
    bytes[6..8] = height         (u16, little-endian)
```

Both layouts are total bijections over their inputs. Some bit patterns are NaN
payloads; `f64::from_bits`/`to_bits` preserve them untouched as long as no
arithmetic is performed on the carrier, which this module never does.
*/

/// Pack a pointer and a byte length into one encoded scalar.
#[inline]
pub fn encode(ptr: u32, len: u32) -> f64 {
    let mut bytes = [0u8; 8];
    bytes[0..4].copy_from_slice(&ptr.to_le_bytes());
    bytes[4..8].copy_from_slice(&len.to_le_bytes());
    f64::from_bits(u64::from_le_bytes(bytes))
}

/// Unpack an encoded scalar produced by [`encode`] into `(ptr, len)`.
#[inline]
pub fn decode(value: f64) -> (u32, u32) {
    let bytes = value.to_bits().to_le_bytes();
    let ptr = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    (ptr, len)
}

/// Pack a pointer and 16-bit matrix dimensions into one encoded scalar.
#[inline]
pub fn encode_matrix(ptr: u32, width: u16, height: u16) -> f64 {
    let fields = [(ptr & 0xFFFF) as u16, (ptr >> 16) as u16, width, height];
    let mut bytes = [0u8; 8];
    for (chunk, field) in bytes.chunks_exact_mut(2).zip(fields) {
        chunk.copy_from_slice(&field.to_le_bytes());
    }
    f64::from_bits(u64::from_le_bytes(bytes))
}

/// Unpack an encoded scalar produced by [`encode_matrix`] into `(ptr, width, height)`.
#[inline]
pub fn decode_matrix(value: f64) -> (u32, u16, u16) {
    let bytes = value.to_bits().to_le_bytes();
    let field = |i: usize| u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);
    let ptr = (field(0) as u32) | ((field(1) as u32) << 16);
    (ptr, field(2), field(3))
}
