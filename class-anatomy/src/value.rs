//! Exact numeric values and inclusive ranges.
//!
//! Every metric produces a [`Value`]. Integers and ratios stay exact so that
//! range boundaries such as `0.677` compare without floating point drift.
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by value arithmetic and parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid numeric literal '{0}'")]
    InvalidLiteral(String),
}

/// A metric value.
///
/// `Undefined` means "not applicable" and is distinct from zero.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Integer(BigInt),
    Rational(BigRational),
    Real(f64),
}

impl Value {
    pub const UNDEFINED: Value = Value::Undefined;

    /// Build a real value. Non-finite numbers become `Undefined`.
    pub fn real(f: f64) -> Value {
        if f.is_finite() {
            Value::Real(f)
        } else {
            Value::Undefined
        }
    }

    /// Exact ratio of two counts.
    pub fn ratio(numerator: usize, denominator: usize) -> Result<Value, ValueError> {
        Value::from(numerator).divide(&Value::from(denominator))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Integer(i) => i.is_zero(),
            Value::Rational(r) => r.is_zero(),
            Value::Real(f) => *f == 0.0,
        }
    }

    /// Exact rational form. Reals are converted bit-exactly.
    pub fn to_rational(&self) -> Option<BigRational> {
        match self {
            Value::Undefined => None,
            Value::Integer(i) => Some(BigRational::from_integer(i.clone())),
            Value::Rational(r) => Some(r.clone()),
            Value::Real(f) => BigRational::from_float(*f),
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Undefined => None,
            Value::Integer(i) => i.to_f64(),
            Value::Rational(r) => r.to_f64(),
            Value::Real(f) => Some(*f),
        }
    }

    /// Integral part for integer values, `None` otherwise.
    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Value::Integer(i) => Some(i),
            _ => None,
        }
    }

    // exact operand, reals excluded
    fn exact(&self) -> Option<BigRational> {
        match self {
            Value::Integer(i) => Some(BigRational::from_integer(i.clone())),
            Value::Rational(r) => Some(r.clone()),
            _ => None,
        }
    }

    fn from_exact(r: BigRational) -> Value {
        if r.is_integer() {
            Value::Integer(r.to_integer())
        } else {
            Value::Rational(r)
        }
    }

    fn combine(
        &self,
        other: &Value,
        int: impl Fn(&BigInt, &BigInt) -> BigInt,
        rat: impl Fn(BigRational, BigRational) -> BigRational,
        real: impl Fn(f64, f64) -> f64,
    ) -> Value {
        match (self, other) {
            (Value::Undefined, _) | (_, Value::Undefined) => Value::Undefined,
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(int(a, b)),
            (Value::Real(_), _) | (_, Value::Real(_)) => match (self.to_f64(), other.to_f64()) {
                (Some(a), Some(b)) => Value::real(real(a, b)),
                _ => Value::Undefined,
            },
            _ => match (self.exact(), other.exact()) {
                (Some(a), Some(b)) => Value::Rational(rat(a, b)),
                _ => Value::Undefined,
            },
        }
    }

    pub fn plus(&self, other: &Value) -> Value {
        self.combine(other, |a, b| a + b, |a, b| a + b, |a, b| a + b)
    }

    pub fn minus(&self, other: &Value) -> Value {
        self.combine(other, |a, b| a - b, |a, b| a - b, |a, b| a - b)
    }

    pub fn times(&self, other: &Value) -> Value {
        self.combine(other, |a, b| a * b, |a, b| a * b, |a, b| a * b)
    }

    /// Divide, promoting integer operands to an exact ratio.
    ///
    /// Dividing by any zero value is an error. An undefined operand yields
    /// `Undefined`.
    pub fn divide(&self, other: &Value) -> Result<Value, ValueError> {
        if self.is_undefined() || other.is_undefined() {
            return Ok(Value::Undefined);
        }
        if other.is_zero() {
            return Err(ValueError::DivisionByZero);
        }
        if matches!(self, Value::Real(_)) || matches!(other, Value::Real(_)) {
            return Ok(match (self.to_f64(), other.to_f64()) {
                (Some(a), Some(b)) => Value::real(a / b),
                _ => Value::Undefined,
            });
        }
        match (self.exact(), other.exact()) {
            (Some(a), Some(b)) => Ok(Value::Rational(a / b)),
            _ => Ok(Value::Undefined),
        }
    }

    pub fn abs(&self) -> Value {
        match self {
            Value::Undefined => Value::Undefined,
            Value::Integer(i) => Value::Integer(i.abs()),
            Value::Rational(r) => Value::Rational(r.abs()),
            Value::Real(f) => Value::Real(f.abs()),
        }
    }

    /// Collapse a ratio with denominator one back into an integer.
    pub fn normalized(self) -> Value {
        match self {
            Value::Rational(r) => Value::from_exact(r),
            other => other,
        }
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(BigInt::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(BigInt::from(n))
    }
}

impl From<BigRational> for Value {
    fn from(r: BigRational) -> Self {
        Value::Rational(r)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::real(f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Undefined, _) | (_, Value::Undefined) => false,
            _ => self.to_rational() == other.to_rational(),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => Some(Ordering::Equal),
            (Value::Undefined, _) | (_, Value::Undefined) => None,
            _ => match (self.to_rational(), other.to_rational()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => None,
            },
        }
    }
}

impl Add for Value {
    type Output = Value;
    fn add(self, rhs: Value) -> Value {
        self.plus(&rhs)
    }
}

impl Sub for Value {
    type Output = Value;
    fn sub(self, rhs: Value) -> Value {
        self.minus(&rhs)
    }
}

impl Mul for Value {
    type Output = Value;
    fn mul(self, rhs: Value) -> Value {
        self.times(&rhs)
    }
}

impl Neg for Value {
    type Output = Value;
    fn neg(self) -> Value {
        match self {
            Value::Undefined => Value::Undefined,
            Value::Integer(i) => Value::Integer(-i),
            Value::Rational(r) => Value::Rational(-r),
            Value::Real(f) => Value::Real(-f),
        }
    }
}

fn format_decimal(f: f64) -> String {
    let s = format!("{:.4}", f);
    let trimmed = s.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{}0", trimmed)
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "N/A"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Rational(r) if r.is_integer() => write!(f, "{}", r.to_integer()),
            Value::Rational(r) => write!(f, "{}", format_decimal(r.to_f64().unwrap_or(f64::NAN))),
            Value::Real(x) => write!(f, "{}", format_decimal(*x)),
        }
    }
}

fn parse_integer(s: &str) -> Result<BigInt, ValueError> {
    BigInt::from_str(s).map_err(|_| ValueError::InvalidLiteral(s.to_string()))
}

impl FromStr for Value {
    type Err = ValueError;

    /// Parse `N/A`, integers, `a/b` ratios and decimals. Plain decimals are
    /// read exactly; scientific notation falls back to a real.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("n/a") {
            return Ok(Value::Undefined);
        }
        if let Some((n, d)) = s.split_once('/') {
            let n = parse_integer(n.trim())?;
            let d = parse_integer(d.trim())?;
            if d.is_zero() {
                return Err(ValueError::DivisionByZero);
            }
            return Ok(Value::Rational(BigRational::new(n, d)));
        }
        if s.contains(['e', 'E']) {
            return s
                .parse::<f64>()
                .map(Value::real)
                .map_err(|_| ValueError::InvalidLiteral(s.to_string()));
        }
        if let Some((int, frac)) = s.split_once('.') {
            if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ValueError::InvalidLiteral(s.to_string()));
            }
            let negative = int.starts_with('-');
            let digits = int.trim_start_matches(['-', '+']);
            let whole = if digits.is_empty() {
                BigInt::zero()
            } else {
                parse_integer(digits)?
            };
            let scale = BigInt::from(10u32).pow(frac.len() as u32);
            let numerator = whole * &scale + parse_integer(frac)?;
            let numerator = if negative { -numerator } else { numerator };
            return Ok(Value::Rational(BigRational::new(numerator, scale)));
        }
        parse_integer(s).map(Value::Integer)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined => serializer.serialize_none(),
            Value::Integer(i) => match i.to_i64() {
                Some(n) => serializer.serialize_i64(n),
                None => serializer.serialize_str(&i.to_string()),
            },
            Value::Rational(r) if r.is_integer() => match r.to_integer().to_i64() {
                Some(n) => serializer.serialize_i64(n),
                None => serializer.serialize_str(&r.to_integer().to_string()),
            },
            other => serializer.serialize_f64(other.to_f64().unwrap_or(f64::NAN)),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string or null")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Integer(BigInt::from(v)))
    }

    // decimal literals in config files are meant exactly, so reparse the shortest repr
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        if !v.is_finite() {
            return Ok(Value::Undefined);
        }
        let repr = format!("{:?}", v);
        Value::from_str(&repr)
            .map(Value::normalized)
            .or_else(|_| Ok(Value::real(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Value::from_str(v).map_err(E::custom)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Undefined)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Undefined)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
        d.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Inclusive interval of acceptable values.
///
/// A range with either bound undefined is [`Range::UNDEFINED`], which
/// includes every value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Range {
    from: Value,
    to: Value,
}

impl Range {
    pub const UNDEFINED: Range = Range {
        from: Value::Undefined,
        to: Value::Undefined,
    };

    /// Build a range; an undefined or inverted pair collapses to `UNDEFINED`.
    pub fn new(from: Value, to: Value) -> Range {
        match from.partial_cmp(&to) {
            Some(Ordering::Less) | Some(Ordering::Equal) if !from.is_undefined() => {
                Range { from, to }
            }
            _ => Range::UNDEFINED,
        }
    }

    pub fn from(&self) -> &Value {
        &self.from
    }

    pub fn to(&self) -> &Value {
        &self.to
    }

    pub fn is_undefined(&self) -> bool {
        self.from.is_undefined() || self.to.is_undefined()
    }

    /// Undefined values are never out of range.
    pub fn includes(&self, value: &Value) -> bool {
        if self.is_undefined() || value.is_undefined() {
            return true;
        }
        &self.from <= value && value <= &self.to
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            write!(f, "N/A")
        } else {
            write!(f, "[{}..{}]", self.from, self.to)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Value {
        s.parse().unwrap()
    }

    #[test]
    fn integer_and_real_compare_equal() {
        assert_eq!(Value::from(3usize), Value::real(3.0));
        assert!(Value::from(2usize) < v("2.5"));
    }

    #[test]
    fn integer_division_is_exact() {
        let r = Value::from(6usize).divide(&Value::from(28usize)).unwrap();
        assert_eq!(r, v("3/14"));
        assert!(matches!(r, Value::Rational(_)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(
            Value::from(1usize).divide(&Value::from(0usize)),
            Err(ValueError::DivisionByZero)
        );
        assert_eq!(
            Value::real(1.0).divide(&Value::real(0.0)),
            Err(ValueError::DivisionByZero)
        );
        assert_eq!("1/0".parse::<Value>(), Err(ValueError::DivisionByZero));
    }

    #[test]
    fn undefined_propagates() {
        let u = Value::Undefined;
        assert!(u.plus(&Value::from(1usize)).is_undefined());
        assert_eq!(Value::from(1usize).divide(&u), Ok(Value::Undefined));
        assert_ne!(u, Value::from(0usize));
        assert_eq!(u.partial_cmp(&Value::from(0usize)), None);
    }

    #[test]
    fn decimals_parse_exactly() {
        let x = v("0.677");
        assert_eq!(
            x.to_rational(),
            Some(BigRational::new(BigInt::from(677), BigInt::from(1000)))
        );
        assert_eq!(v("-0.5"), v("-1/2"));
        assert!(matches!(v("1e3"), Value::Real(_)));
        assert!("abc".parse::<Value>().is_err());
    }

    #[test]
    fn display_uses_four_decimals() {
        assert_eq!(v("3/14").to_string(), "0.2143");
        assert_eq!(Value::from(7usize).to_string(), "7");
        assert_eq!(Value::real(1.0).to_string(), "1.0");
        assert_eq!(Value::Undefined.to_string(), "N/A");
    }

    #[test]
    fn range_is_inclusive() {
        let r = Range::new(Value::from(0usize), v("0.677"));
        assert!(r.includes(&v("0.677")));
        assert!(r.includes(&Value::from(0usize)));
        assert!(!r.includes(&v("0.678")));
        assert!(r.includes(&Value::Undefined));
    }

    #[test]
    fn undefined_range_includes_everything() {
        assert!(Range::UNDEFINED.includes(&Value::from(1_000_000usize)));
        assert!(Range::new(Value::from(2usize), Value::from(1usize)).is_undefined());
        assert!(Range::new(Value::Undefined, Value::from(1usize)).is_undefined());
    }

    #[test]
    fn serializes_numbers_and_null() {
        let json = serde_json::to_string(&vec![
            Value::Undefined,
            Value::from(3usize),
            v("1/2"),
        ])
        .unwrap();
        assert_eq!(json, "[null,3,0.5]");
        let back: Vec<Value> = serde_json::from_str("[null, 4, 0.677, \"3/4\"]").unwrap();
        assert_eq!(back, vec![Value::Undefined, Value::from(4usize), v("0.677"), v("3/4")]);
    }
}
