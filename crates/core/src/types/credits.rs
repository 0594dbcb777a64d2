//! Credit balance.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A visitor's credit balance.
///
/// Non-negative by convention only: [`Credits::new`] accepts any value and
/// nothing in the session state machine guards against negatives. Balances
/// are always replaced wholesale, never incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credits(i64);

impl Credits {
    /// Balance shown to visitors who are not signed in.
    pub const SIGNED_OUT_DEFAULT: Self = Self(50);

    /// Balance assigned on every signed-in identity snapshot.
    pub const SIGNED_IN_DEFAULT: Self = Self(20);

    /// Wrap a raw balance.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw balance.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Format with thousands separators, e.g. `12,000`.
    #[must_use]
    pub fn grouped(self) -> String {
        let digits = self.0.unsigned_abs().to_string();
        let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
        if self.0 < 0 {
            out.push('-');
        }
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }
        out
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Credits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(Credits::SIGNED_OUT_DEFAULT.get(), 50);
        assert_eq!(Credits::SIGNED_IN_DEFAULT.get(), 20);
    }

    #[test]
    fn test_grouped() {
        assert_eq!(Credits::new(0).grouped(), "0");
        assert_eq!(Credits::new(999).grouped(), "999");
        assert_eq!(Credits::new(1000).grouped(), "1,000");
        assert_eq!(Credits::new(12000).grouped(), "12,000");
        assert_eq!(Credits::new(1_234_567).grouped(), "1,234,567");
        assert_eq!(Credits::new(-1500).grouped(), "-1,500");
    }

    #[test]
    fn test_negative_values_are_accepted() {
        assert_eq!(Credits::new(-5).get(), -5);
    }
}
