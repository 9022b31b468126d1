//! Caps string parser
//!
//! Accepts the usual `gst-launch` caps syntax:
//!
//! ```text
//! video/x-raw(memory:DMABuf), format=(string){ NV12, I420 }, width=[ 1, 8192 ], framerate=30/1; video/x-raw
//! ```

use super::structure::{Caps, CapsFeatures, Structure};
use super::value::{Fraction, Value};
use crate::error::{Error, Result};
use std::str::FromStr;

impl FromStr for Caps {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "EMPTY" {
            return Ok(Caps::new_empty());
        }
        let mut parser = Parser::new(trimmed);
        let mut caps = Caps::new_empty();
        loop {
            let (structure, features) = parser.structure()?;
            caps.append(structure, features);
            parser.skip_ws();
            match parser.next() {
                None => break,
                Some(';') => continue,
                Some(c) => return Err(parser.error(&format!("unexpected {c:?}"))),
            }
        }
        Ok(caps)
    }
}

/// Bare token before a range or list is typed
enum Scalar {
    Int(i32),
    Fraction(Fraction),
    Str(String),
    Max,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, msg: &str) -> Error {
        Error::CapsParse(format!("{} at offset {} in {:?}", msg, self.pos, self.src))
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, want: char) -> Result<()> {
        self.skip_ws();
        match self.next() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(&format!("expected {want:?}"))),
        }
    }

    /// Read until one of `stops` (or end), trimmed
    fn token(&mut self, stops: &[char]) -> &'a str {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.src[start..self.pos].trim()
    }

    fn structure(&mut self) -> Result<(Structure, CapsFeatures)> {
        let name = self.token(&['(', ',', ';']);
        if name.is_empty() {
            return Err(self.error("missing structure name"));
        }

        let mut features = CapsFeatures::default();
        if self.peek() == Some('(') {
            self.next();
            let inner = self.token(&[')']);
            self.expect(')')?;
            features = if inner == "ANY" {
                CapsFeatures::Any
            } else {
                CapsFeatures::Set(inner.split(',').map(|t| t.trim().to_string()).collect())
            };
        }

        let mut structure = Structure::new(name);
        loop {
            self.skip_ws();
            if self.peek() != Some(',') {
                break;
            }
            self.next();
            let key = self.token(&['=', ',', ';']);
            if key.is_empty() {
                return Err(self.error("missing field name"));
            }
            self.expect('=')?;
            let value = self.value()?;
            structure.set(key, value);
        }
        Ok((structure, features))
    }

    fn value(&mut self) -> Result<Value> {
        self.skip_ws();
        let mut hint = None;
        if self.peek() == Some('(') {
            self.next();
            hint = Some(self.token(&[')']));
            self.expect(')')?;
            self.skip_ws();
        }
        let force_string = hint == Some("string");

        match self.peek() {
            Some('[') => {
                self.next();
                let lo = self.scalar(&[','], force_string)?;
                self.expect(',')?;
                let hi = self.scalar(&[']'], force_string)?;
                self.expect(']')?;
                self.range(lo, hi)
            }
            Some('{') => {
                self.next();
                let mut values = Vec::new();
                loop {
                    let scalar = self.scalar(&[',', '}'], force_string)?;
                    values.push(self.scalar_value(scalar)?);
                    self.skip_ws();
                    match self.next() {
                        Some(',') => continue,
                        Some('}') => break,
                        _ => return Err(self.error("unterminated list")),
                    }
                }
                if values.is_empty() {
                    return Err(self.error("empty list"));
                }
                Ok(Value::List(values))
            }
            _ => {
                let scalar = self.scalar(&[',', ';'], force_string)?;
                self.scalar_value(scalar)
            }
        }
    }

    fn scalar(&mut self, stops: &[char], force_string: bool) -> Result<Scalar> {
        self.skip_ws();
        if self.peek() == Some('"') {
            self.next();
            let start = self.pos;
            while let Some(c) = self.next() {
                if c == '"' {
                    return Ok(Scalar::Str(self.src[start..self.pos - 1].to_string()));
                }
            }
            return Err(self.error("unterminated string"));
        }

        let tok = self.token(stops);
        if tok.is_empty() {
            return Err(self.error("missing value"));
        }
        if force_string {
            return Ok(Scalar::Str(tok.to_string()));
        }
        if tok == "max" {
            return Ok(Scalar::Max);
        }
        if let Some((n, d)) = tok.split_once('/') {
            if let (Ok(num), Ok(den)) = (n.trim().parse::<i32>(), d.trim().parse::<i32>()) {
                if den <= 0 {
                    return Err(self.error("fraction denominator must be positive"));
                }
                return Ok(Scalar::Fraction(Fraction::new(num, den)));
            }
        }
        if let Ok(v) = tok.parse::<i32>() {
            return Ok(Scalar::Int(v));
        }
        Ok(Scalar::Str(tok.to_string()))
    }

    fn scalar_value(&self, scalar: Scalar) -> Result<Value> {
        Ok(match scalar {
            Scalar::Int(v) => Value::Int(v),
            Scalar::Fraction(f) => Value::Fraction(f),
            Scalar::Str(s) => Value::Str(s),
            Scalar::Max => Value::Str("max".into()),
        })
    }

    fn range(&self, lo: Scalar, hi: Scalar) -> Result<Value> {
        let value = match (lo, hi) {
            (Scalar::Int(a), Scalar::Int(b)) => (a <= b).then(|| Value::int_range(a, b)),
            (Scalar::Int(a), Scalar::Max) => Some(Value::int_range(a, i32::MAX)),
            (Scalar::Fraction(a), Scalar::Fraction(b)) => {
                (a <= b).then(|| Value::fraction_range(a, b))
            }
            (Scalar::Fraction(a), Scalar::Max) => Some(Value::fraction_range(a, Fraction::MAX)),
            (Scalar::Int(a), Scalar::Fraction(b)) => {
                let a = Fraction::new(a, 1);
                (a <= b).then(|| Value::fraction_range(a, b))
            }
            _ => return Err(self.error("range bounds must be ints or fractions")),
        };
        value.ok_or_else(|| self.error("range lower bound exceeds upper bound"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let caps: Caps = "video/x-raw, format=NV12, width=1920, height=1080, framerate=30/1"
            .parse()
            .unwrap();
        let s = caps.structure(0).unwrap();
        assert_eq!(s.name(), "video/x-raw");
        assert_eq!(s.get("format"), Some(&Value::str("NV12")));
        assert_eq!(s.get("width"), Some(&Value::Int(1920)));
        assert_eq!(s.get("framerate"), Some(&Value::Fraction(Fraction::new(30, 1))));
        assert!(caps.is_fixed());
    }

    #[test]
    fn test_parse_ranges_lists_features() {
        let caps: Caps = "video/x-raw(memory:DMABuf), format=(string){ NV12, I420 }, \
                          width=(int)[ 1, 8192 ], framerate=(fraction)[ 0/1, max ]; video/x-raw(ANY)"
            .parse()
            .unwrap();
        assert_eq!(caps.len(), 2);
        let first = &caps.entries()[0];
        assert_eq!(first.features, CapsFeatures::dmabuf());
        assert_eq!(
            first.structure.get("format"),
            Some(&Value::List(vec![Value::str("NV12"), Value::str("I420")]))
        );
        assert_eq!(first.structure.get("width"), Some(&Value::IntRange(1, 8192)));
        assert_eq!(
            first.structure.get("framerate"),
            Some(&Value::FractionRange(Fraction::ZERO, Fraction::MAX))
        );
        assert!(caps.entries()[1].features.is_any());
    }

    #[test]
    fn test_string_hint_keeps_digits() {
        let caps: Caps = "video/x-raw, colorimetry=(string)\"bt709\", chroma-site=(string)mpeg2"
            .parse()
            .unwrap();
        let s = caps.structure(0).unwrap();
        assert_eq!(s.get("colorimetry"), Some(&Value::str("bt709")));
        assert_eq!(s.get("chroma-site"), Some(&Value::str("mpeg2")));
    }

    #[test]
    fn test_display_parses_back() {
        let text = "video/x-raw(memory:DMABuf), format=(string){ NV12, RGBA }, width=(int)[ 1, 4096 ]";
        let caps: Caps = text.parse().unwrap();
        assert_eq!(caps.to_string(), text);
        assert_eq!(caps.to_string().parse::<Caps>().unwrap(), caps);
    }

    #[test]
    fn test_multibyte_whitespace() {
        let caps: Caps = "video/x-raw,\u{3000}width=1".parse().unwrap();
        assert_eq!(caps.structure(0).unwrap().get("width"), Some(&Value::Int(1)));

        let caps: Caps = "video/x-raw,\u{00a0}format=(string)\"NV12\"\u{2003}".parse().unwrap();
        assert_eq!(caps.structure(0).unwrap().get("format"), Some(&Value::str("NV12")));

        assert!(matches!("video/x-raw,\u{3000}".parse::<Caps>(), Err(Error::CapsParse(_))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("video/x-raw, width=[ 10, 1 ]".parse::<Caps>(), Err(Error::CapsParse(_))));
        assert!("video/x-raw, width".parse::<Caps>().is_err());
        assert!("video/x-raw, format={ NV12".parse::<Caps>().is_err());
        assert!("EMPTY".parse::<Caps>().unwrap().is_empty());
    }
}
