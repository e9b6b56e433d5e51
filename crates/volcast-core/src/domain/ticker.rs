use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_TICKER_LEN: usize = 15;

/// Instrument identifier.
///
/// Tickers are case-sensitive and never normalised: `ibm` and `IBM` address
/// different cache entries. The allowed alphabet (ASCII alphanumerics, `.`
/// and `-`) keeps a ticker safe to embed in artifact file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse a ticker, trimming surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTicker);
        }

        let len = trimmed.chars().count();
        if len > MAX_TICKER_LEN {
            return Err(ValidationError::TickerTooLong {
                len,
                max: MAX_TICKER_LEN,
            });
        }

        if let Some(first) = trimmed.chars().next() {
            if !first.is_ascii_alphanumeric() {
                return Err(ValidationError::TickerInvalidStart { ch: first });
            }
        }

        for (index, ch) in trimmed.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || ch == '.' || ch == '-';
            if !valid {
                return Err(ValidationError::TickerInvalidChar { ch, index });
            }
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Ticker {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}
