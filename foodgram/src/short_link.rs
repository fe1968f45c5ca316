//! Short link codes for recipes.
//!
//! A code is a reversible encoding of the recipe id: the low [`BLOCK_SIZE`] bits of the id are
//! bit-reversed (so consecutive ids get unrelated-looking codes), then the number is written
//! in base 31 over [`ALPHABET`], left-padded with the zero symbol to [`MIN_LENGTH`].
//!
//! ```
//! use foodgram::short_link::{decode, encode};
//!
//! assert_eq!(encode(1), "867nv");
//! assert_eq!(decode("867nv"), Ok(1));
//! ```

use crate::types::RecipeId;
use thiserror::Error;

/// Symbols chosen to avoid look-alikes (no `0/o`, `1/l/i`)
pub const ALPHABET: &str = "mn6j2c4rv8bpygw95z7hsdaetxuk3fq";
pub const BLOCK_SIZE: u32 = 24;
pub const MIN_LENGTH: usize = 5;

const MASK: u64 = (1 << BLOCK_SIZE) - 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("short code is empty")]
    Empty,
    #[error("invalid symbol '{0}' in short code")]
    InvalidSymbol(char),
    #[error("short code is out of range")]
    Overflow,
}

/// Reverse the order of the low `BLOCK_SIZE` bits, leaving higher bits untouched.
/// The permutation is its own inverse.
fn permute(n: u64) -> u64 {
    let low = n & MASK;
    let reversed = low.reverse_bits() >> (u64::BITS - BLOCK_SIZE);
    (n & !MASK) | reversed
}

fn symbols() -> Vec<char> {
    ALPHABET.chars().collect()
}

/// Encode a (non-negative) recipe id as a short code.
pub fn encode(id: RecipeId) -> String {
    let symbols = symbols();
    let base = symbols.len() as u64;
    let mut n = permute(id.max(0) as u64);

    let mut digits = Vec::new();
    loop {
        digits.push(symbols[(n % base) as usize]);
        n /= base;
        if n == 0 {
            break;
        }
    }
    while digits.len() < MIN_LENGTH {
        digits.push(symbols[0]);
    }

    digits.iter().rev().collect()
}

/// Decode a short code back into the recipe id.
pub fn decode(code: &str) -> Result<RecipeId, DecodeError> {
    if code.is_empty() {
        return Err(DecodeError::Empty);
    }

    let symbols = symbols();
    let base = symbols.len() as u64;
    let mut n: u64 = 0;
    for c in code.chars() {
        let digit = symbols.iter().position(|s| *s == c).ok_or(DecodeError::InvalidSymbol(c))? as u64;
        n = n
            .checked_mul(base)
            .and_then(|n| n.checked_add(digit))
            .ok_or(DecodeError::Overflow)?;
    }

    RecipeId::try_from(permute(n)).map_err(|_| DecodeError::Overflow)
}
