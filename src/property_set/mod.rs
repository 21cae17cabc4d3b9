//! Typed, named, dimensioned property bag exchanged across the plugin
//! boundary (spec §3 "Property set", §4.2).

use crate::foundation::error::{PropertyErrorKind, ToucanResult};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// The four value kinds a property-set entry may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyKind {
    /// Opaque handle/address, represented as an integer tag behind the
    /// safe facade (spec §9: "wrap PropertySet behind a safe facade").
    Pointer,
    /// Null-terminated string.
    String,
    /// Double-precision float.
    Double,
    /// Signed integer.
    Int,
}

/// A single property value, tagged by [`PropertyKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// See [`PropertyKind::Pointer`].
    Pointer(usize),
    /// See [`PropertyKind::String`].
    String(String),
    /// See [`PropertyKind::Double`].
    Double(f64),
    /// See [`PropertyKind::Int`].
    Int(i64),
}

impl PropertyValue {
    fn kind(&self) -> PropertyKind {
        match self {
            Self::Pointer(_) => PropertyKind::Pointer,
            Self::String(_) => PropertyKind::String,
            Self::Double(_) => PropertyKind::Double,
            Self::Int(_) => PropertyKind::Int,
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    kind: PropertyKind,
    values: SmallVec<[PropertyValue; 4]>,
}

/// A map from `name -> (type, values[])`. Types are fixed at first write;
/// indices are dense and 0-based.
#[derive(Clone, Debug, Default)]
pub struct PropertySet {
    entries: BTreeMap<String, Entry>,
}

fn default_for(kind: PropertyKind) -> PropertyValue {
    match kind {
        PropertyKind::Pointer => PropertyValue::Pointer(0),
        PropertyKind::String => PropertyValue::String(String::new()),
        PropertyKind::Double => PropertyValue::Double(0.0),
        PropertyKind::Int => PropertyValue::Int(0),
    }
}

impl PropertySet {
    /// An empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current dimension of `name`, or `0` if absent.
    pub fn dimension(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, |e| e.values.len())
    }

    /// Remove the entry for `name`. Fails with
    /// [`PropertyErrorKind::UnknownName`] when `name` was not present.
    pub fn reset(&mut self, name: &str) -> ToucanResult<()> {
        self.entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PropertyErrorKind::UnknownName(name.to_string()).into())
    }

    fn set_at(&mut self, name: &str, index: usize, kind: PropertyKind, value: PropertyValue) -> ToucanResult<()> {
        let entry = self.entries.entry(name.to_string()).or_insert_with(|| Entry {
            kind,
            values: SmallVec::new(),
        });
        if entry.kind != kind {
            return Err(PropertyErrorKind::WrongType(name.to_string()).into());
        }
        while entry.values.len() <= index {
            entry.values.push(default_for(kind));
        }
        entry.values[index] = value;
        Ok(())
    }

    fn get_at(&self, name: &str, index: usize, kind: PropertyKind) -> ToucanResult<&PropertyValue> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| PropertyErrorKind::UnknownName(name.to_string()))?;
        if entry.kind != kind {
            return Err(PropertyErrorKind::WrongType(name.to_string()).into());
        }
        entry.values.get(index).ok_or_else(|| {
            PropertyErrorKind::BadIndex {
                name: name.to_string(),
                index,
                dimension: entry.values.len(),
            }
            .into()
        })
    }

    /// Set `values[index]` as a pointer. Extends dimension as needed,
    /// zero-initializing any newly created lower slots.
    pub fn set_pointer(&mut self, name: &str, index: usize, value: usize) -> ToucanResult<()> {
        self.set_at(name, index, PropertyKind::Pointer, PropertyValue::Pointer(value))
    }

    /// Read `values[index]` as a pointer.
    pub fn get_pointer(&self, name: &str, index: usize) -> ToucanResult<usize> {
        match self.get_at(name, index, PropertyKind::Pointer)? {
            PropertyValue::Pointer(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    /// Set `values[index]` as a string.
    pub fn set_string(&mut self, name: &str, index: usize, value: impl Into<String>) -> ToucanResult<()> {
        self.set_at(name, index, PropertyKind::String, PropertyValue::String(value.into()))
    }

    /// Read `values[index]` as a string.
    pub fn get_string(&self, name: &str, index: usize) -> ToucanResult<&str> {
        match self.get_at(name, index, PropertyKind::String)? {
            PropertyValue::String(v) => Ok(v.as_str()),
            _ => unreachable!(),
        }
    }

    /// Set `values[index]` as a double.
    pub fn set_double(&mut self, name: &str, index: usize, value: f64) -> ToucanResult<()> {
        self.set_at(name, index, PropertyKind::Double, PropertyValue::Double(value))
    }

    /// Read `values[index]` as a double.
    pub fn get_double(&self, name: &str, index: usize) -> ToucanResult<f64> {
        match self.get_at(name, index, PropertyKind::Double)? {
            PropertyValue::Double(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    /// Set `values[index]` as an int.
    pub fn set_int(&mut self, name: &str, index: usize, value: i64) -> ToucanResult<()> {
        self.set_at(name, index, PropertyKind::Int, PropertyValue::Int(value))
    }

    /// Read `values[index]` as an int.
    pub fn get_int(&self, name: &str, index: usize) -> ToucanResult<i64> {
        match self.get_at(name, index, PropertyKind::Int)? {
            PropertyValue::Int(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    /// Set the entire dimension-`n` vector for `name` at once.
    pub fn set_n(&mut self, name: &str, values: &[PropertyValue]) -> ToucanResult<()> {
        for (i, v) in values.iter().enumerate() {
            self.set_at(name, i, v.kind(), v.clone())?;
        }
        Ok(())
    }

    /// Read the entire vector for `name`.
    pub fn get_n(&self, name: &str) -> ToucanResult<&[PropertyValue]> {
        self.entries
            .get(name)
            .map(|e| e.values.as_slice())
            .ok_or_else(|| PropertyErrorKind::UnknownName(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_int_extends_dimension_with_zeros() {
        let mut p = PropertySet::new();
        p.set_int("k", 2, 5).unwrap();
        assert_eq!(p.dimension("k"), 3);
        assert_eq!(p.get_int("k", 0).unwrap(), 0);
        assert_eq!(p.get_int("k", 1).unwrap(), 0);
        assert_eq!(p.get_int("k", 2).unwrap(), 5);
    }

    #[test]
    fn type_fixed_at_first_write() {
        let mut p = PropertySet::new();
        p.set_double("k", 0, 1.0).unwrap();
        let err = p.set_int("k", 0, 1).unwrap_err();
        assert!(matches!(
            err,
            crate::foundation::error::ToucanError::PropertyError(PropertyErrorKind::WrongType(_))
        ));
    }

    #[test]
    fn unknown_name_on_read() {
        let p = PropertySet::new();
        let err = p.get_double("missing", 0).unwrap_err();
        assert!(matches!(
            err,
            crate::foundation::error::ToucanError::PropertyError(PropertyErrorKind::UnknownName(_))
        ));
    }

    #[test]
    fn bad_index_on_read() {
        let mut p = PropertySet::new();
        p.set_double("k", 0, 1.0).unwrap();
        let err = p.get_double("k", 5).unwrap_err();
        assert!(matches!(
            err,
            crate::foundation::error::ToucanError::PropertyError(PropertyErrorKind::BadIndex { .. })
        ));
    }

    #[test]
    fn reset_removes_entry() {
        let mut p = PropertySet::new();
        p.set_string("k", 0, "a").unwrap();
        assert!(p.reset("k").is_ok());
        assert_eq!(p.dimension("k"), 0);
        assert!(p.reset("k").is_err());
    }

    #[test]
    fn dimension_zero_when_absent() {
        let p = PropertySet::new();
        assert_eq!(p.dimension("nope"), 0);
    }
}
