//! Caps structures, features and caps sets

use super::value::Value;
use std::fmt;

/// System memory feature tag
pub const FEATURE_SYSTEM_MEMORY: &str = "memory:SystemMemory";
/// DMA-BUF memory feature tag
pub const FEATURE_DMABUF: &str = "memory:DMABuf";

/// A named set of typed fields
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    name: String,
    fields: Vec<(String, Value)>,
}

impl Structure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a field, replacing an existing one in place
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn remove_fields(&mut self, keys: &[&str]) {
        self.fields.retain(|(k, _)| !keys.contains(&k.as_str()));
    }

    pub fn is_fixed(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_fixed())
    }

    /// Every field of `other` must be present here and allow our value.
    /// Fields only present here narrow the structure, so they are fine.
    pub fn is_subset(&self, other: &Structure) -> bool {
        self.name == other.name
            && other
                .fields
                .iter()
                .all(|(k, theirs)| self.get(k).is_some_and(|ours| ours.is_subset(theirs)))
    }

    /// Field-wise intersection; field order follows `self`
    pub fn intersect(&self, other: &Structure) -> Option<Structure> {
        if self.name != other.name {
            return None;
        }
        let mut out = Structure::new(self.name.clone());
        for (k, ours) in &self.fields {
            let value = match other.get(k) {
                Some(theirs) => ours.intersect(theirs)?,
                None => ours.clone(),
            };
            out.fields.push((k.clone(), value));
        }
        for (k, theirs) in &other.fields {
            if !self.has_field(k) {
                out.fields.push((k.clone(), theirs.clone()));
            }
        }
        Some(out)
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (k, v) in &self.fields {
            write!(f, ", {}={}", k, v)?;
        }
        Ok(())
    }
}

/// Memory features attached to a caps structure
#[derive(Debug, Clone)]
pub enum CapsFeatures {
    /// Wildcard: matches any memory type
    Any,
    Set(Vec<String>),
}

impl CapsFeatures {
    pub fn system_memory() -> Self {
        CapsFeatures::Set(vec![FEATURE_SYSTEM_MEMORY.to_string()])
    }

    pub fn dmabuf() -> Self {
        CapsFeatures::Set(vec![FEATURE_DMABUF.to_string()])
    }

    pub fn is_any(&self) -> bool {
        matches!(self, CapsFeatures::Any)
    }

    pub fn is_system_memory(&self) -> bool {
        matches!(self, CapsFeatures::Set(tags) if tags.len() == 1 && tags[0] == FEATURE_SYSTEM_MEMORY)
    }

    pub fn intersect(&self, other: &CapsFeatures) -> Option<CapsFeatures> {
        match (self, other) {
            (CapsFeatures::Any, f) | (f, CapsFeatures::Any) => Some(f.clone()),
            (a, b) if a == b => Some(a.clone()),
            _ => None,
        }
    }
}

impl Default for CapsFeatures {
    fn default() -> Self {
        Self::system_memory()
    }
}

impl PartialEq for CapsFeatures {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CapsFeatures::Any, CapsFeatures::Any) => true,
            (CapsFeatures::Set(a), CapsFeatures::Set(b)) => {
                a.len() == b.len() && a.iter().all(|t| b.contains(t))
            }
            _ => false,
        }
    }
}

impl fmt::Display for CapsFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapsFeatures::Any => f.write_str("ANY"),
            CapsFeatures::Set(tags) => f.write_str(&tags.join(", ")),
        }
    }
}

/// One caps alternative
#[derive(Debug, Clone, PartialEq)]
pub struct CapsEntry {
    pub structure: Structure,
    pub features: CapsFeatures,
}

/// An ordered set of caps alternatives
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Caps {
    entries: Vec<CapsEntry>,
}

impl Caps {
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Single structure with system memory features
    pub fn from_structure(structure: Structure) -> Self {
        let mut caps = Self::new_empty();
        caps.append(structure, CapsFeatures::default());
        caps
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[CapsEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapsEntry> {
        self.entries.iter()
    }

    pub fn structure(&self, index: usize) -> Option<&Structure> {
        self.entries.get(index).map(|e| &e.structure)
    }

    /// Append unconditionally
    pub fn append(&mut self, structure: Structure, features: CapsFeatures) {
        self.entries.push(CapsEntry {
            structure,
            features,
        });
    }

    /// Append unless an existing entry already covers it
    pub fn merge(&mut self, structure: Structure, features: CapsFeatures) {
        if !self.is_subset_entry(&structure, &features) {
            self.append(structure, features);
        }
    }

    /// Check whether some entry already expresses `structure` with `features`
    ///
    /// Features must be equal. An `ANY` entry does not cover a concrete
    /// feature set, nor the other way round.
    pub fn is_subset_entry(&self, structure: &Structure, features: &CapsFeatures) -> bool {
        self.entries
            .iter()
            .any(|e| e.features == *features && structure.is_subset(&e.structure))
    }

    /// Every entry of `self` is covered by `other`
    pub fn is_subset(&self, other: &Caps) -> bool {
        self.entries
            .iter()
            .all(|e| other.is_subset_entry(&e.structure, &e.features))
    }

    /// Exactly one entry with only fixed values
    pub fn is_fixed(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].structure.is_fixed()
    }

    /// Intersection where `self` decides order and preference
    pub fn intersect_first(&self, other: &Caps) -> Caps {
        let mut out = Caps::new_empty();
        for first in &self.entries {
            for second in &other.entries {
                let Some(features) = first.features.intersect(&second.features) else {
                    continue;
                };
                if let Some(structure) = first.structure.intersect(&second.structure) {
                    out.merge(structure, features);
                }
            }
        }
        out
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return f.write_str("EMPTY");
        }
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(entry.structure.name())?;
            if !entry.features.is_system_memory() {
                write!(f, "({})", entry.features)?;
            }
            for (k, v) in entry.structure.fields() {
                write!(f, ", {}={}", k, v)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(width: Value) -> Structure {
        Structure::new("video/x-raw")
            .with_field("format", Value::str("NV12"))
            .with_field("width", width)
    }

    #[test]
    fn test_structure_subset() {
        let narrow = raw(Value::Int(1920));
        let wide = Structure::new("video/x-raw").with_field("width", Value::IntRange(1, 4096));
        assert!(narrow.is_subset(&wide));
        assert!(!wide.is_subset(&narrow));
        assert!(!narrow.is_subset(&Structure::new("video/x-bayer")));
    }

    #[test]
    fn test_structure_intersect_merges_fields() {
        let a = raw(Value::IntRange(1, 8192));
        let b = Structure::new("video/x-raw")
            .with_field("width", Value::Int(640))
            .with_field("height", Value::Int(480));
        let out = a.intersect(&b).unwrap();
        assert_eq!(out.get("width"), Some(&Value::Int(640)));
        assert_eq!(out.get("height"), Some(&Value::Int(480)));
        assert_eq!(out.get("format"), Some(&Value::str("NV12")));
    }

    #[test]
    fn test_features_must_match() {
        let mut caps = Caps::new_empty();
        caps.append(raw(Value::Int(64)), CapsFeatures::dmabuf());
        assert!(!caps.is_subset_entry(&raw(Value::Int(64)), &CapsFeatures::system_memory()));
        assert!(caps.is_subset_entry(&raw(Value::Int(64)), &CapsFeatures::dmabuf()));

        let mut any = Caps::new_empty();
        any.append(raw(Value::IntRange(1, 100)), CapsFeatures::Any);
        assert!(!any.is_subset_entry(&raw(Value::Int(64)), &CapsFeatures::dmabuf()));
        assert!(any.is_subset_entry(&raw(Value::Int(64)), &CapsFeatures::Any));
        assert!(!caps.is_subset_entry(&raw(Value::Int(64)), &CapsFeatures::Any));
    }

    #[test]
    fn test_merge_skips_subsumed() {
        let mut caps = Caps::from_structure(raw(Value::IntRange(1, 100)));
        caps.merge(raw(Value::Int(50)), CapsFeatures::default());
        assert_eq!(caps.len(), 1);
        caps.merge(raw(Value::Int(500)), CapsFeatures::default());
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn test_intersect_first_order() {
        let mut a = Caps::new_empty();
        a.append(raw(Value::Int(1)), CapsFeatures::default());
        a.append(raw(Value::Int(2)), CapsFeatures::default());
        let mut b = Caps::new_empty();
        b.append(raw(Value::Int(2)), CapsFeatures::default());
        b.append(raw(Value::Int(1)), CapsFeatures::default());

        let out = a.intersect_first(&b);
        assert_eq!(out.structure(0).unwrap().get("width"), Some(&Value::Int(1)));
        assert_eq!(out.structure(1).unwrap().get("width"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_display() {
        let caps = Caps::from_structure(raw(Value::IntRange(1, 4096)));
        assert_eq!(
            caps.to_string(),
            "video/x-raw, format=(string)NV12, width=(int)[ 1, 4096 ]"
        );
        assert_eq!(Caps::new_empty().to_string(), "EMPTY");
    }
}
