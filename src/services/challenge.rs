//! Emoji challenge shown to new users before their account counts as
//! verified.
//!
//! This only adds friction for scripted signups. The randomness comes from
//! the thread-local generator and the set is tiny, so it is not a security
//! control.

use rand::seq::{IndexedRandom, SliceRandom};

use crate::models::users::Challenge;

pub const PALETTE: [&str; 12] = [
    "😀", "😎", "🐼", "🚀", "⭐", "💰", "🎯", "🦁", "🐶", "🍎", "🍕", "⚽",
];

/// Symbols per challenge, shown as three rows of three.
pub const CHALLENGE_SIZE: usize = 9;

/// Draws `n` distinct symbols from the palette. Asking for more symbols
/// than the palette holds yields the whole palette.
pub fn generate(n: usize) -> Vec<String> {
    let mut rng = rand::rng();
    let mut symbols: Vec<String> = PALETTE
        .choose_multiple(&mut rng, n)
        .map(|s| s.to_string())
        .collect();
    symbols.shuffle(&mut rng);
    symbols
}

pub fn pick_target(symbols: &[String]) -> Option<String> {
    symbols.choose(&mut rand::rng()).cloned()
}

pub fn evaluate(selected: &str, target: &str) -> bool {
    selected == target
}

pub fn issue() -> Challenge {
    let symbols = generate(CHALLENGE_SIZE);
    // The palette is never empty, so neither is the draw.
    let target = pick_target(&symbols).unwrap_or_else(|| PALETTE[0].to_string());

    Challenge { symbols, target }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_symbols_are_distinct() {
        for _ in 0..200 {
            let symbols = generate(CHALLENGE_SIZE);
            let unique: HashSet<_> = symbols.iter().collect();
            assert_eq!(symbols.len(), CHALLENGE_SIZE);
            assert_eq!(unique.len(), CHALLENGE_SIZE);
            assert!(symbols.iter().all(|s| PALETTE.contains(&s.as_str())));
        }
    }

    #[test]
    fn oversized_request_is_capped_by_palette() {
        assert_eq!(generate(50).len(), PALETTE.len());
    }

    #[test]
    fn target_is_member_of_set() {
        for _ in 0..200 {
            let challenge = issue();
            assert!(challenge.symbols.contains(&challenge.target));
        }
    }

    #[test]
    fn empty_set_has_no_target() {
        assert!(pick_target(&[]).is_none());
    }

    #[test]
    fn evaluation_is_plain_equality() {
        assert!(evaluate("🐼", "🐼"));
        assert!(!evaluate("🐼", "🚀"));
    }
}
