//! Token estimation.

/// Estimate the token count of `text`: Unicode scalar values divided by
/// `chars_per_token`, rounded down. A zero divisor is treated as one.
pub fn estimate_tokens(text: &str, chars_per_token: usize) -> u64 {
    (text.chars().count() / chars_per_token.max(1)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn floors_per_item() {
        assert_eq!(estimate_tokens("abc", 4), 0);
        assert_eq!(estimate_tokens("abcd", 4), 1);
        assert_eq!(estimate_tokens("abcdefg", 4), 1);
        assert_eq!(estimate_tokens("", 4), 0);
    }

    #[test]
    fn counts_scalar_values_not_bytes() {
        // 4 scalar values, 8 bytes
        assert_eq!(estimate_tokens("αβγδ", 4), 1);
    }

    #[test]
    fn zero_divisor_counts_chars() {
        assert_eq!(estimate_tokens("abc", 0), 3);
    }

    proptest! {
        #[test]
        fn concatenation_never_loses_tokens(a in ".{0,200}", b in ".{0,200}", cpt in 1usize..8) {
            let joined = format!("{a}{b}");
            prop_assert!(estimate_tokens(&joined, cpt) >= estimate_tokens(&a, cpt) + estimate_tokens(&b, cpt));
        }

        #[test]
        fn bounded_by_char_count(s in ".{0,300}", cpt in 1usize..8) {
            prop_assert!(estimate_tokens(&s, cpt) <= s.chars().count() as u64);
        }
    }
}
