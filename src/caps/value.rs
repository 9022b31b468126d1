//! Typed caps field values
//!
//! Covers the subset of GStreamer value types a raw video caps structure
//! uses: ints, int ranges, fractions, fraction ranges, strings and lists.

use std::cmp::Ordering;
use std::fmt;

/// A rational number with a positive denominator
#[derive(Debug, Clone, Copy)]
pub struct Fraction {
    pub num: i32,
    pub den: i32,
}

impl Fraction {
    /// Largest representable framerate (`max` in caps strings)
    pub const MAX: Fraction = Fraction {
        num: i32::MAX,
        den: 1,
    };
    pub const ZERO: Fraction = Fraction { num: 0, den: 1 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }
}

impl PartialEq for Fraction {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Fraction {}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i64 * other.den as i64;
        let rhs = other.num as i64 * self.den as i64;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// A caps field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    /// Inclusive range
    IntRange(i32, i32),
    Fraction(Fraction),
    /// Inclusive range
    FractionRange(Fraction, Fraction),
    Str(String),
    /// Alternatives, in preference order
    List(Vec<Value>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Build an int range, collapsing `[n, n]` to `n`
    pub fn int_range(min: i32, max: i32) -> Self {
        if min == max {
            Value::Int(min)
        } else {
            Value::IntRange(min, max)
        }
    }

    /// Build a fraction range, collapsing `[f, f]` to `f`
    pub fn fraction_range(min: Fraction, max: Fraction) -> Self {
        if min == max {
            Value::Fraction(min)
        } else {
            Value::FractionRange(min, max)
        }
    }

    /// Build a list, collapsing a single entry to a scalar
    ///
    /// Returns `None` for an empty list.
    pub fn list(values: Vec<Value>) -> Option<Self> {
        let mut flat: Vec<Value> = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::List(inner) => {
                    for v in inner {
                        if !flat.contains(&v) {
                            flat.push(v);
                        }
                    }
                }
                v => {
                    if !flat.contains(&v) {
                        flat.push(v);
                    }
                }
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Value::List(flat)),
        }
    }

    /// A fixed value describes exactly one possibility
    pub fn is_fixed(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Fraction(_) | Value::Str(_))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fraction(&self) -> Option<Fraction> {
        match self {
            Value::Fraction(f) => Some(*f),
            _ => None,
        }
    }

    /// Intersect two values
    ///
    /// When `self` is a list its order is kept, so the first operand decides
    /// preference.
    pub fn intersect(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::List(xs), _) => {
                Value::list(xs.iter().filter_map(|x| x.intersect(other)).collect())
            }
            (_, Value::List(ys)) => {
                Value::list(ys.iter().filter_map(|y| self.intersect(y)).collect())
            }
            (Value::Int(a), Value::Int(b)) => (a == b).then(|| Value::Int(*a)),
            (Value::Int(v), Value::IntRange(lo, hi)) | (Value::IntRange(lo, hi), Value::Int(v)) => {
                (lo <= v && v <= hi).then(|| Value::Int(*v))
            }
            (Value::IntRange(lo1, hi1), Value::IntRange(lo2, hi2)) => {
                let lo = *lo1.max(lo2);
                let hi = *hi1.min(hi2);
                (lo <= hi).then(|| Value::int_range(lo, hi))
            }
            (Value::Fraction(a), Value::Fraction(b)) => (a == b).then(|| Value::Fraction(*a)),
            (Value::Fraction(v), Value::FractionRange(lo, hi))
            | (Value::FractionRange(lo, hi), Value::Fraction(v)) => {
                (lo <= v && v <= hi).then(|| Value::Fraction(*v))
            }
            (Value::FractionRange(lo1, hi1), Value::FractionRange(lo2, hi2)) => {
                let lo = *lo1.max(lo2);
                let hi = *hi1.min(hi2);
                (lo <= hi).then(|| Value::fraction_range(lo, hi))
            }
            (Value::Str(a), Value::Str(b)) => (a == b).then(|| Value::Str(a.clone())),
            _ => None,
        }
    }

    /// Check whether every possibility of `self` is allowed by `other`
    pub fn is_subset(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(xs), _) => xs.iter().all(|x| x.is_subset(other)),
            (_, Value::List(ys)) => ys.iter().any(|y| self.is_subset(y)),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(v), Value::IntRange(lo, hi)) => lo <= v && v <= hi,
            (Value::IntRange(lo, hi), Value::Int(v)) => lo == v && hi == v,
            (Value::IntRange(lo1, hi1), Value::IntRange(lo2, hi2)) => lo2 <= lo1 && hi1 <= hi2,
            (Value::Fraction(a), Value::Fraction(b)) => a == b,
            (Value::Fraction(v), Value::FractionRange(lo, hi)) => lo <= v && v <= hi,
            (Value::FractionRange(lo, hi), Value::Fraction(v)) => lo == v && hi == v,
            (Value::FractionRange(lo1, hi1), Value::FractionRange(lo2, hi2)) => {
                lo2 <= lo1 && hi1 <= hi2
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) | Value::IntRange(..) => "int",
            Value::Fraction(_) | Value::FractionRange(..) => "fraction",
            Value::Str(_) => "string",
            Value::List(values) => values.first().map(Value::type_name).unwrap_or("string"),
        }
    }

    fn fmt_bare(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::IntRange(lo, hi) => write!(f, "[ {}, {} ]", lo, hi),
            Value::Fraction(v) => write!(f, "{}", v),
            Value::FractionRange(lo, hi) => write!(f, "[ {}, {} ]", lo, hi),
            Value::Str(s) => {
                if s.chars().all(|c| c.is_ascii_alphanumeric() || "_-:.+/".contains(c)) {
                    f.write_str(s)
                } else {
                    write!(f, "\"{}\"", s.replace('"', "\\\""))
                }
            }
            Value::List(values) => {
                f.write_str("{ ")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    v.fmt_bare(f)?;
                }
                f.write_str(" }")
            }
        }
    }
}

impl fmt::Display for Value {
    /// Caps string form with a type annotation, e.g. `(int)[ 1, 4096 ]`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.type_name())?;
        self.fmt_bare(f)
    }
}
