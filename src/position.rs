//! Parsing of human-friendly disk positions and test ranges.
//!
//! A position is a number followed by an optional unit suffix, e.g. `512s`,
//! `1.5Gi` or `50%`. A range is a position prefixed by an optional direction
//! sign: `+` moves forward from the origin, `-` or `~` moves backward and no
//! sign moves in both directions.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("\"{value}\" is not a valid numeric value.")]
    InvalidNumber { value: String },
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Unit suffix attached to a [`Quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// `M`, 10^6 bytes.
    Mega,
    /// `G`, 10^9 bytes.
    Giga,
    /// `T`, 10^12 bytes.
    Tera,
    /// `Mi`, 2^20 bytes.
    Mebi,
    /// `Gi`, 2^30 bytes.
    Gibi,
    /// `Ti`, 2^40 bytes.
    Tebi,
    /// `s`, one 512 byte sector.
    Sector,
    /// `p`, one 4096 byte page.
    Page,
    /// `%`, relative to the disk size.
    Percent,
}

/// Suffix and coefficient of every unit. Suffixes never end in one another,
/// so the order of this table does not affect matching.
const UNITS: [(Unit, &str, i64); 9] = [
    (Unit::Mega, "M", 1000 * 1000),
    (Unit::Giga, "G", 1000 * 1000 * 1000),
    (Unit::Tera, "T", 1000 * 1000 * 1000 * 1000),
    (Unit::Mebi, "Mi", 1024 * 1024),
    (Unit::Gibi, "Gi", 1024 * 1024 * 1024),
    (Unit::Tebi, "Ti", 1024 * 1024 * 1024 * 1024),
    (Unit::Sector, "s", 512),
    (Unit::Page, "p", 4096),
    (Unit::Percent, "%", 1),
];

impl Unit {
    pub fn suffix(self) -> &'static str {
        UNITS.iter().find(|(u, _, _)| *u == self).map_or("", |(_, s, _)| *s)
    }

    /// Bytes per unit. `Percent` has coefficient 1, its real scale is only
    /// known once the disk size is.
    pub fn coefficient(self) -> i64 {
        UNITS.iter().find(|(u, _, _)| *u == self).map_or(1, |(_, _, c)| *c)
    }

    fn split_suffix(text: &str) -> (&str, Option<Unit>) {
        for (unit, suffix, _) in UNITS.iter() {
            if let Some(rest) = text.strip_suffix(*suffix) {
                return (rest.trim(), Some(*unit));
            }
        }
        (text, None)
    }
}

/// Numeric literal as written by the user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn parse(text: &str) -> Result<Number> {
        if let Ok(v) = text.parse::<i64>() {
            return Ok(Number::Int(v));
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Number::Float(v)),
            _ => Err(ParseError::InvalidNumber { value: text.to_string() }),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A magnitude with an optional unit. Without a unit the value is in bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: Number,
    pub unit: Option<Unit>,
}

impl Quantity {
    pub fn bytes(value: i64) -> Self {
        Quantity { value: Number::Int(value), unit: None }
    }

    pub fn percent(value: i64) -> Self {
        Quantity { value: Number::Int(value), unit: Some(Unit::Percent) }
    }

    pub fn parse(text: &str) -> Result<Quantity> {
        let (number, unit) = Unit::split_suffix(text.trim());
        Ok(Quantity { value: Number::parse(number)?, unit })
    }

    pub fn is_relative(&self) -> bool {
        self.unit == Some(Unit::Percent)
    }

    /// Absolute byte value of this quantity on a disk of `disksize` bytes.
    ///
    /// Fractional results are rounded to the nearest byte, ties to even.
    pub fn resolve(&self, disksize: u64) -> i64 {
        let (numerator, denominator) = match self.unit {
            Some(Unit::Percent) => (disksize as i128, 100),
            unit => (unit.map_or(1, Unit::coefficient) as i128, 1),
        };
        match self.value {
            Number::Int(v) => saturate(div_round_even(v as i128 * numerator, denominator)),
            Number::Float(v) => {
                (v * numerator as f64 / denominator as f64).round_ties_even() as i64
            }
        }
    }
}

impl FromStr for Quantity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        Quantity::parse(s)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.map_or("", Unit::suffix))
    }
}

fn div_round_even(n: i128, d: i128) -> i128 {
    let q = n.div_euclid(d);
    let r = n.rem_euclid(d);
    match (2 * r).cmp(&d) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + q.rem_euclid(2),
    }
}

fn saturate(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Which way a [`Range`] extends from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
    Both,
}

impl Direction {
    pub fn sign(self) -> &'static str {
        match self {
            Direction::Forward => "+",
            Direction::Backward => "-",
            Direction::Both => "+-",
        }
    }
}

/// Distance to test relative to the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub direction: Direction,
    pub quantity: Quantity,
}

impl Range {
    pub fn parse(text: &str) -> Result<Range> {
        let text = text.trim();
        let (direction, rest) = if let Some(rest) = text.strip_prefix('+') {
            (Direction::Forward, rest)
        } else if let Some(rest) = text.strip_prefix(['-', '~']) {
            (Direction::Backward, rest)
        } else {
            (Direction::Both, text)
        };
        Ok(Range { direction, quantity: Quantity::parse(rest)? })
    }
}

impl FromStr for Range {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self> {
        Range::parse(s)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.direction.sign(), self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sectors_and_binary_units() {
        assert_eq!(Quantity::parse("512s").unwrap().resolve(0), 262144);
        assert_eq!(Quantity::parse("1Gi").unwrap().resolve(0), 1073741824);
        assert_eq!(Quantity::parse("3Mi").unwrap().resolve(0), 3 * 1024 * 1024);
        assert_eq!(Quantity::parse("2T").unwrap().resolve(0), 2_000_000_000_000);
        assert_eq!(Quantity::parse("1Ti").unwrap().resolve(0), 1 << 40);
        assert_eq!(Quantity::parse("12345").unwrap().resolve(0), 12345);
    }

    #[test]
    fn whitespace_around_number_and_suffix() {
        let q = Quantity::parse(" 7 G ").unwrap();
        assert_eq!(q.unit, Some(Unit::Giga));
        assert_eq!(q.resolve(0), 7_000_000_000);
        assert_eq!(Quantity::parse("2 p").unwrap().resolve(0), 8192);
    }

    #[test]
    fn percent_is_relative_to_disk_size() {
        let q = Quantity::parse("50%").unwrap();
        assert!(q.is_relative());
        assert_eq!(q.resolve(2_000_000), 1_000_000);
        assert_eq!(Quantity::parse("100%").unwrap().resolve(12345), 12345);
    }

    #[test]
    fn percent_rounds_half_to_even() {
        // 1% of 50 is 0.5, 3% of 50 is 1.5
        assert_eq!(Quantity::parse("1%").unwrap().resolve(50), 0);
        assert_eq!(Quantity::parse("3%").unwrap().resolve(50), 2);
        assert_eq!(Quantity::parse("33.3%").unwrap().resolve(1000), 333);
    }

    #[test]
    fn float_values_round_to_bytes() {
        assert_eq!(Quantity::parse("1.5M").unwrap().resolve(0), 1_500_000);
        assert_eq!(Quantity::parse("0.5p").unwrap().resolve(0), 2048);
        assert_eq!(Quantity::parse("2.5").unwrap().resolve(0), 2);
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert_eq!(
            Quantity::parse("abcM"),
            Err(ParseError::InvalidNumber { value: "abc".to_string() })
        );
        assert!(Quantity::parse("").is_err());
        assert!(Quantity::parse("%").is_err());
        assert!(Quantity::parse("inf").is_err());
        assert!(Quantity::parse("NaN").is_err());
        assert!(Quantity::parse("10k").is_err());
    }

    #[test]
    fn error_message_quotes_the_number() {
        let err = Quantity::parse("x1Gi").unwrap_err();
        assert_eq!(err.to_string(), "\"x1\" is not a valid numeric value.");
    }

    #[test]
    fn range_directions() {
        let r = Range::parse("+10M").unwrap();
        assert_eq!(r.direction, Direction::Forward);
        assert_eq!(r.quantity.resolve(0), 10_000_000);

        let r = Range::parse("~1p").unwrap();
        assert_eq!(r.direction, Direction::Backward);
        assert_eq!(r.quantity.resolve(0), 4096);

        let r = Range::parse("-5s").unwrap();
        assert_eq!(r.direction, Direction::Backward);
        assert_eq!(r.quantity.resolve(0), 2560);

        let r = Range::parse("25%").unwrap();
        assert_eq!(r.direction, Direction::Both);
        assert_eq!(r.quantity.resolve(400), 100);
    }

    #[test]
    fn range_rejects_bad_magnitude() {
        assert!(Range::parse("+").is_err());
        assert!(Range::parse("~fooGi").is_err());
    }

    #[test]
    fn display_round_trips_user_text() {
        assert_eq!(Range::parse("+100%").unwrap().to_string(), "+100%");
        assert_eq!(Range::parse("~1.5Gi").unwrap().to_string(), "-1.5Gi");
        assert_eq!(Range::parse("4s").unwrap().to_string(), "+-4s");
    }
}
