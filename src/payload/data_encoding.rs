//! # M-Bus Data Encoding and Decoding
//!
//! Integer, fixed-point and manufacturer code helpers for the data fields of variable
//! data records and the fixed header.

/// Little-endian unsigned integer of up to 8 bytes.
pub fn decode_uint_le(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Little-endian two's complement integer, sign-extended from the field width.
pub fn decode_int_le(data: &[u8]) -> i64 {
    let width = data.len().min(8);
    if width == 0 {
        return 0;
    }
    let shift = 64 - 8 * width as u32;
    ((decode_uint_le(data) << shift) as i64) >> shift
}

/// Render `raw * 10^-decimals` exactly, e.g. `(1000, 3)` -> `"1.000"`.
pub fn format_fixed_point(raw: i64, decimals: u32) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let sign = if raw < 0 { "-" } else { "" };
    let magnitude = raw.unsigned_abs();
    let divisor = 10u64.pow(decimals);
    format!(
        "{sign}{}.{:0width$}",
        magnitude / divisor,
        magnitude % divisor,
        width = decimals as usize
    )
}

/// Convert the 2-byte manufacturer field into its three-letter FLAG id.
pub fn manufacturer_id_to_string(id: u16) -> String {
    [10u16, 5, 0]
        .iter()
        .map(|shift| {
            let letter = ((id >> shift) & 0x1F) as u8;
            if (1..=26).contains(&letter) {
                (letter + b'A' - 1) as char
            } else {
                '?'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uint_le() {
        assert_eq!(decode_uint_le(&[0xE8, 0x03, 0x00, 0x00]), 1000);
        assert_eq!(decode_uint_le(&[0xDC, 0x00]), 220);
        assert_eq!(decode_uint_le(&[]), 0);
        assert_eq!(decode_uint_le(&[0xFF; 8]), u64::MAX);
    }

    #[test]
    fn test_decode_int_le() {
        assert_eq!(decode_int_le(&[0x9C, 0xFF]), -100);
        assert_eq!(decode_int_le(&[0xFB, 0xFF]), -5);
        assert_eq!(decode_int_le(&[0xD0, 0x07]), 2000);
        assert_eq!(decode_int_le(&[0xFF, 0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(decode_int_le(&[0x80]), -128);
        assert_eq!(decode_int_le(&[0xFF; 8]), -1);
        assert_eq!(decode_int_le(&[]), 0);
    }

    #[test]
    fn test_format_fixed_point() {
        assert_eq!(format_fixed_point(1000, 3), "1.000");
        assert_eq!(format_fixed_point(12_345, 3), "12.345");
        assert_eq!(format_fixed_point(7, 2), "0.07");
        assert_eq!(format_fixed_point(220, 0), "220");
        assert_eq!(format_fixed_point(-100, 2), "-1.00");
        assert_eq!(format_fixed_point(-5, 2), "-0.05");
        assert_eq!(format_fixed_point(-5, 0), "-5");
    }

    #[test]
    fn test_manufacturer_code() {
        // "KAM" = Kamstrup
        let kam = ((b'K' - b'A' + 1) as u16) << 10
            | ((b'A' - b'A' + 1) as u16) << 5
            | (b'M' - b'A' + 1) as u16;
        assert_eq!(manufacturer_id_to_string(kam), "KAM");
        assert_eq!(manufacturer_id_to_string(0), "???");
    }
}
