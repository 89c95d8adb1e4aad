//! Quiz share codes.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts before giving up on a free share code.
pub const MAX_SHARE_CODE_ATTEMPTS: u32 = 5;

/// Random code of `length` characters from `A-Z0-9`.
pub fn generate_share_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_has_requested_length_and_alphabet() {
        for len in [1, 8, 12] {
            let code = generate_share_code(len);
            assert_eq!(code.len(), len);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_vary() {
        let a = generate_share_code(8);
        let distinct = (0..20).any(|_| generate_share_code(8) != a);
        assert!(distinct);
    }
}
