use std::fmt::{Display, Formatter};
use std::ops::Deref;

use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CODE_LENGTH: usize = 6;

/// A one-time-password code: six decimal digits, serialised as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code {
    code: [u8; CODE_LENGTH],
}

impl Code {
    /// Generate a random code.
    pub fn random() -> Self {
        let mut code = [0; CODE_LENGTH];
        let digit_dist = Uniform::from(0..=9);
        let mut rng = rand::thread_rng();
        for digit in &mut code {
            *digit = digit_dist.sample(&mut rng);
        }
        Self { code }
    }
}

impl Deref for Code {
    type Target = [u8; CODE_LENGTH];

    fn deref(&self) -> &Self::Target {
        &self.code
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for digit in self.code {
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    #[error("expected {CODE_LENGTH} digits, got {0} characters")]
    Length(usize),
    #[error("invalid digit {0:?}")]
    Digit(char),
}

impl TryFrom<String> for Code {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for Code {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let count = s.chars().count();
        if count != CODE_LENGTH {
            return Err(CodeError::Length(count));
        }
        let mut code = [0; CODE_LENGTH];
        for (slot, c) in code.iter_mut().zip(s.chars()) {
            *slot = c.to_digit(10).ok_or(CodeError::Digit(c))? as u8;
        }
        Ok(Self { code })
    }
}

impl From<Code> for String {
    fn from(code: Code) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_codes_are_digits() {
        for _ in 0..50 {
            let code = Code::random();
            let text = code.to_string();
            assert_eq!(text.len(), CODE_LENGTH);
            assert!(text.chars().all(|c| c.is_ascii_digit()));
            assert_eq!(text.parse::<Code>().unwrap(), code);
        }
    }

    #[test]
    fn rejects_bad_codes() {
        assert_eq!("12345".parse::<Code>(), Err(CodeError::Length(5)));
        assert_eq!("1234567".parse::<Code>(), Err(CodeError::Length(7)));
        assert_eq!("12a456".parse::<Code>(), Err(CodeError::Digit('a')));
    }

    #[test]
    fn serialises_as_string() {
        use rocket::serde::json::serde_json;

        let code: Code = "012345".parse().unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"012345\"");
        let back: Code = serde_json::from_str("\"012345\"").unwrap();
        assert_eq!(back, code);
        assert!(serde_json::from_str::<Code>("\"01234x\"").is_err());
    }
}
