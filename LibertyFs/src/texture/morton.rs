//! Morton (Z-order) coordinate interleaving
//!
//! X occupies the even bits of the index and Y the odd bits. Encoding is
//! table driven, one byte of each coordinate at a time.

const fn spread_bits(shift: u32) -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut value = 0u32;
        let mut bit = 0;
        while bit < 8 {
            if (i >> bit) & 1 != 0 {
                value |= 1 << (2 * bit + shift);
            }
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
}

/// Byte of X spread onto even bit positions
static MORTON_X: [u32; 256] = spread_bits(0);
/// Byte of Y spread onto odd bit positions
static MORTON_Y: [u32; 256] = spread_bits(1);

/// Interleave the low 16 bits of `x` and `y`.
#[must_use]
pub fn morton_encode(x: u32, y: u32) -> u32 {
    let low = MORTON_X[(x & 0xFF) as usize] | MORTON_Y[(y & 0xFF) as usize];
    let high = MORTON_X[((x >> 8) & 0xFF) as usize] | MORTON_Y[((y >> 8) & 0xFF) as usize];
    low | (high << 16)
}

/// Split an index back into `(x, y)`.
#[must_use]
pub fn morton_decode(morton: u32) -> (u32, u32) {
    let mut x = 0;
    let mut y = 0;
    for i in 0..16 {
        x |= ((morton >> (2 * i)) & 1) << i;
        y |= ((morton >> (2 * i + 1)) & 1) << i;
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_match_known_values() {
        assert_eq!(MORTON_X[0x01], 0x0001);
        assert_eq!(MORTON_X[0x03], 0x0005);
        assert_eq!(MORTON_X[0xFF], 0x5555);
        assert_eq!(MORTON_Y[0x01], 0x0002);
        assert_eq!(MORTON_Y[0x0F], 0x00AA);
        assert_eq!(MORTON_Y[0xFF], 0xAAAA);
    }

    #[test]
    fn test_encode_small() {
        assert_eq!(morton_encode(0, 0), 0);
        assert_eq!(morton_encode(1, 0), 1);
        assert_eq!(morton_encode(0, 1), 2);
        assert_eq!(morton_encode(1, 1), 3);
        assert_eq!(morton_encode(2, 0), 4);
        assert_eq!(morton_encode(0xFFFF, 0xFFFF), 0xFFFF_FFFF);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let samples = [0u32, 1, 2, 3, 7, 8, 127, 128, 255, 256, 1000, 4095, 4096, 32767, 32768, 65534, 65535];
        for &x in &samples {
            for &y in &samples {
                assert_eq!(morton_decode(morton_encode(x, y)), (x, y), "x={x} y={y}");
            }
        }
        // A full row and column sweep
        for v in 0..=0xFFFF {
            assert_eq!(morton_decode(morton_encode(v, 0xFFFF - v)), (v, 0xFFFF - v));
        }
    }
}
