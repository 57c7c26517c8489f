//! Benchmark Operands
//! Turns fixed or randomly generated strings into pairs of 64-bit inputs.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_LEFT: &str = "HelloWorld!";
pub const DEFAULT_RIGHT: &str = "HelloABM";
pub const DEFAULT_RADIX: u32 = 10;
/// 12 base-36 digits always fit in an i64.
pub const DEFAULT_RANDOM_LENGTH: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("could not convert '{input}' in base {radix}: no leading digits")]
    NoDigits { input: String, radix: u32 },
    #[error("'{input}' is out of range for a signed 64-bit value in base {radix}")]
    OutOfRange {
        input: String,
        radix: u32,
        negative: bool,
    },
    #[error("radix {0} is outside 2..=36")]
    InvalidRadix(u32),
}

impl ConversionError {
    /// The value a benchmark continues with after this error. Overflow
    /// saturates to the signed limit in the direction of the sign.
    pub fn fallback(&self) -> u64 {
        match self {
            ConversionError::OutOfRange { negative: false, .. } => i64::MAX as u64,
            ConversionError::OutOfRange { negative: true, .. } => i64::MIN as u64,
            ConversionError::NoDigits { .. } | ConversionError::InvalidRadix(_) => 0,
        }
    }
}

/// Parse the longest numeric prefix of `input` in `radix`.
///
/// Leading whitespace and a single sign are accepted. Trailing characters
/// after the digits are ignored. The value must fit in an i64 and is
/// returned as its two's-complement bit pattern.
pub fn parse_operand(input: &str, radix: u32) -> Result<u64, ConversionError> {
    if !(2..=36).contains(&radix) {
        return Err(ConversionError::InvalidRadix(radix));
    }

    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    // |i64::MIN| is one past i64::MAX.
    let limit = if negative {
        i64::MIN.unsigned_abs()
    } else {
        i64::MAX as u64
    };

    let mut value: u64 = 0;
    let mut seen = 0usize;
    let mut overflow = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else { break };
        seen += 1;
        match value
            .checked_mul(radix as u64)
            .and_then(|v| v.checked_add(d as u64))
            .filter(|&v| v <= limit)
        {
            Some(v) => value = v,
            None => overflow = true,
        }
    }

    if seen == 0 {
        return Err(ConversionError::NoDigits {
            input: input.to_string(),
            radix,
        });
    }
    if overflow {
        return Err(ConversionError::OutOfRange {
            input: input.to_string(),
            radix,
            negative,
        });
    }

    Ok(if negative { value.wrapping_neg() } else { value })
}

/// Like `parse_operand`, but logs the failure and continues with the
/// fallback value.
pub fn operand_or_fallback(input: &str, radix: u32) -> u64 {
    parse_operand(input, radix).unwrap_or_else(|e| {
        warn!(fallback = e.fallback(), "{e}");
        e.fallback()
    })
}

/// Where the benchmark's two inputs come from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// Two fixed strings, converted once per run.
    Fixed {
        left: String,
        right: String,
        radix: u32,
    },
    /// Fresh alphanumeric strings every iteration.
    Random {
        length: usize,
        radix: u32,
        seed: Option<u64>,
    },
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Fixed {
            left: DEFAULT_LEFT.to_string(),
            right: DEFAULT_RIGHT.to_string(),
            radix: DEFAULT_RADIX,
        }
    }
}

impl InputSource {
    pub fn random(length: usize, radix: u32, seed: Option<u64>) -> Self {
        InputSource::Random { length, radix, seed }
    }

    /// Start a stream of operand pairs for one run.
    pub fn operands(&self) -> Operands {
        match self {
            InputSource::Fixed { left, right, radix } => Operands::Fixed(
                operand_or_fallback(left, *radix),
                operand_or_fallback(right, *radix),
            ),
            InputSource::Random { length, radix, seed } => Operands::Random {
                length: *length,
                radix: *radix,
                rng: match seed {
                    Some(seed) => StdRng::seed_from_u64(*seed),
                    None => StdRng::from_entropy(),
                },
            },
        }
    }
}

pub enum Operands {
    Fixed(u64, u64),
    Random { length: usize, radix: u32, rng: StdRng },
}

impl Operands {
    pub fn next_pair(&mut self) -> (u64, u64) {
        match self {
            Operands::Fixed(a, b) => (*a, *b),
            Operands::Random { length, radix, rng } => {
                let left = random_string(rng, *length);
                let right = random_string(rng, *length);
                (
                    operand_or_fallback(&left, *radix),
                    operand_or_fallback(&right, *radix),
                )
            }
        }
    }
}

fn random_string<R: Rng>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
