use rand::Rng;

const ALPHABET: &[u8] = b"0123456789532108";

/// FNV-style checksum the gateway expects after the device digits.
fn checksum(digits: &str) -> String {
    let mut v: u32 = 0x811c9dc5;
    for b in digits.bytes() {
        v ^= u32::from(b);
        v = v.wrapping_add(
            (v << 1)
                .wrapping_add(v << 4)
                .wrapping_add(v << 7)
                .wrapping_add(v << 8)
                .wrapping_add(v << 24),
        );
    }
    v.to_string()
}

/// Random device fingerprint: ten digits, a dot and their checksum.
pub fn random_device() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..10)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    let control = checksum(&digits);
    format!("{digits}.{control}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_checksum(digits: &str) -> u32 {
        let mut v: u64 = 0x811c9dc5;
        for b in digits.bytes() {
            v ^= u64::from(b);
            v += (v << 1) + (v << 4) + (v << 7) + (v << 8) + (v << 24);
            v &= 0xFFFF_FFFF;
        }
        v as u32
    }

    #[test]
    fn checksum_matches_wide_arithmetic() {
        for digits in ["0000000000", "1234567890", "9876543210", "5321085321"] {
            assert_eq!(checksum(digits), reference_checksum(digits).to_string());
        }
    }

    #[test]
    fn device_has_ten_digits_and_valid_checksum() {
        for _ in 0..20 {
            let device = random_device();
            let (digits, control) = device.split_once('.').unwrap();
            assert_eq!(digits.len(), 10);
            assert!(digits.bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(control, checksum(digits));
        }
    }
}
