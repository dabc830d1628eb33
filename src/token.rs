//! Electricity token codec.
//!
//! A token is 20 decimal digits whose digit sum is a multiple of 10. It is shown
//! to customers as five hyphen-separated groups of four digits. This mod-10 rule is
//! a placeholder validation and not a utility vendor algorithm.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of digits in a normalized token.
pub const TOKEN_DIGITS: usize = 20;

const GROUP: usize = 4;

/// Token shape errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("token must be {TOKEN_DIGITS} digits, got {0}")]
    WrongLength(usize),
    #[error("token contains non-digit character {0:?}")]
    NonDigit(char),
}

/// Token checksum errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("invalid token checksum: digit sum {sum} is not a multiple of 10")]
    BadChecksum { sum: u32 },
    #[error("{0}")]
    Malformed(#[from] FormatError),
}

/// Either failure of [`Token::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

/// A checksum-valid token, held as its 20 normalized digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Mint a fresh token from the thread-local generator.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Mint a token from `rng`: 19 free digits, the last one fixed by the checksum.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut digits = [0u8; TOKEN_DIGITS];
        for d in digits.iter_mut().take(TOKEN_DIGITS - 1) {
            *d = rng.gen_range(0..10);
        }
        let sum: u32 = digits.iter().map(|&d| u32::from(d)).sum();
        digits[TOKEN_DIGITS - 1] = ((10 - sum % 10) % 10) as u8;

        Token(digits.iter().map(|&d| char::from(b'0' + d)).collect())
    }

    /// Normalize and fully validate user input.
    pub fn parse(input: &str) -> Result<Self, TokenError> {
        let normalized = validate_format(input)?;
        validate_checksum(&normalized)?;
        Ok(Token(normalized))
    }

    /// The bare 20 digits.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// `dddd-dddd-dddd-dddd-dddd`
    pub fn formatted(&self) -> String {
        format(&self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Token::parse(s)
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formatted())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Token::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Generate a token already formatted for display.
pub fn generate() -> String {
    Token::generate().formatted()
}

/// Strip whitespace and hyphens.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Normalize `input` and check it is exactly 20 decimal digits.
pub fn validate_format(input: &str) -> Result<String, FormatError> {
    let normalized = normalize(input);
    if let Some(c) = normalized.chars().find(|c| !c.is_ascii_digit()) {
        return Err(FormatError::NonDigit(c));
    }
    if normalized.len() != TOKEN_DIGITS {
        return Err(FormatError::WrongLength(normalized.len()));
    }
    Ok(normalized)
}

/// Check the digit sum of a token is a multiple of 10.
///
/// Separators are tolerated; anything that is not 20 digits after normalization
/// is reported as [`ChecksumError::Malformed`].
pub fn validate_checksum(input: &str) -> Result<(), ChecksumError> {
    let normalized = validate_format(input)?;
    let sum = digit_sum(&normalized);
    if sum % 10 != 0 {
        return Err(ChecksumError::BadChecksum { sum });
    }
    Ok(())
}

/// Group a 20-character token into `dddd-dddd-dddd-dddd-dddd`.
///
/// Input that does not normalize to exactly 20 characters is returned unchanged.
/// Malformed input is not repaired.
pub fn format(input: &str) -> String {
    let normalized = normalize(input);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() != TOKEN_DIGITS {
        return input.to_string();
    }
    chars
        .chunks(GROUP)
        .map(|group| group.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-")
}

fn digit_sum(digits: &str) -> u32 {
    digits.chars().filter_map(|c| c.to_digit(10)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const VALID: &str = "12345678901234567890"; // digit sum 90

    #[test]
    fn generated_tokens_have_twenty_digits_and_valid_checksum() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let token = Token::generate_with(&mut rng);
            assert_eq!(token.digits().len(), TOKEN_DIGITS);
            assert_eq!(digit_sum(token.digits()) % 10, 0);
            assert!(validate_checksum(token.digits()).is_ok());
        }
    }

    #[test]
    fn generate_returns_formatted_string() {
        let token = generate();
        assert_eq!(token.len(), 24);
        let groups: Vec<&str> = token.split('-').collect();
        assert_eq!(groups.len(), 5);
        assert!(groups.iter().all(|g| g.len() == 4));
    }

    #[test]
    fn normalize_of_formatted_reproduces_digits() {
        let token = Token::generate();
        assert_eq!(normalize(&token.formatted()), token.digits());
    }

    #[test]
    fn validate_format_accepts_separators_and_whitespace() {
        let normalized = validate_format(" 1234-5678 9012-3456-7890 ").unwrap();
        assert_eq!(normalized, VALID);
    }

    #[test]
    fn validate_format_rejects_wrong_length() {
        assert_eq!(
            validate_format("1234-5678"),
            Err(FormatError::WrongLength(8))
        );
        assert_eq!(
            validate_format("123456789012345678901"),
            Err(FormatError::WrongLength(21))
        );
    }

    #[test]
    fn validate_format_rejects_non_digits() {
        assert_eq!(
            validate_format("1234-5678-9012-3456-789X"),
            Err(FormatError::NonDigit('X'))
        );
    }

    #[test]
    fn checksum_accepts_multiple_of_ten() {
        assert!(validate_checksum(VALID).is_ok());
        assert!(validate_checksum("00000000000000000000").is_ok());
    }

    #[test]
    fn checksum_rejects_other_sums() {
        assert_eq!(
            validate_checksum("12345678901234567895"),
            Err(ChecksumError::BadChecksum { sum: 95 })
        );
        assert_eq!(
            validate_checksum("00000000000000000001"),
            Err(ChecksumError::BadChecksum { sum: 1 })
        );
    }

    #[test]
    fn checksum_reports_malformed_input() {
        assert!(matches!(
            validate_checksum("123"),
            Err(ChecksumError::Malformed(FormatError::WrongLength(3)))
        ));
    }

    #[test]
    fn format_groups_twenty_digits() {
        assert_eq!(format(VALID), "1234-5678-9012-3456-7890");
    }

    #[test]
    fn format_is_idempotent() {
        let once = format(VALID);
        assert_eq!(format(&once), once);
    }

    #[test]
    fn format_passes_through_other_lengths() {
        assert_eq!(format("1234-5678"), "1234-5678");
        assert_eq!(format(""), "");
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        assert!(matches!(
            Token::parse("1234-5678-9012-3456-7895"),
            Err(TokenError::Checksum(ChecksumError::BadChecksum { .. }))
        ));
        assert!(matches!(
            Token::parse("not a token"),
            Err(TokenError::Format(_))
        ));
    }

    #[test]
    fn display_is_formatted() {
        let token: Token = VALID.parse().unwrap();
        assert_eq!(token.to_string(), "1234-5678-9012-3456-7890");
    }
}
