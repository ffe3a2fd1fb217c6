/// CRC16-CCITT as used on the rotator link.
///
/// Polynomial 0x1021, initial value 0xFFFF, MSB first, no final XOR
/// (the "CCITT-FALSE" parameter set).
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    crc16_update(0xFFFF, data)
}

/// Continue a running CRC over more bytes.
pub fn crc16_update(mut crc: u16, data: &[u8]) -> u16 {
    for &b in data {
        crc ^= (b as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

pub fn verify_crc16(data: &[u8], crc: u16) -> bool {
    crc16_ccitt(data) == crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_initial_value() {
        assert_eq!(crc16_ccitt(&[]), 0xFFFF);
    }

    #[test]
    fn check_value() {
        // CRC-16/CCITT-FALSE check value
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = [0x02, 0x20, 0x08, 0x43, 0x87, 0x00, 0x00, 0x42, 0x70, 0x00, 0x00];
        let (a, b) = data.split_at(3);
        assert_eq!(crc16_update(crc16_update(0xFFFF, a), b), crc16_ccitt(&data));
    }

    #[test]
    fn verify_rejects_wrong_crc() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        let crc = crc16_ccitt(&data);
        assert!(verify_crc16(&data, crc));
        assert!(!verify_crc16(&data, crc ^ 0x0001));
    }
}
