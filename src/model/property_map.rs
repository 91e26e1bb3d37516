//! PropertyMap — the key-value bag on materials, settings and edges.

use std::collections::HashMap;
use std::marker::PhantomData;

use super::{FromValue, Value};

/// A map of property names to values.
pub type PropertyMap = HashMap<String, Value>;

/// A named, typed key into a [`PropertyMap`] with a declared default.
///
/// Reads never fail: a missing entry, or one of the wrong type, yields
/// the default.
#[derive(Debug)]
pub struct Property<T> {
    pub name: &'static str,
    default: fn() -> T,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for Property<T> {}

impl<T: FromValue + Into<Value>> Property<T> {
    pub const fn new(name: &'static str, default: fn() -> T) -> Self {
        Self { name, default, _marker: PhantomData }
    }

    pub fn default_value(&self) -> T {
        (self.default)()
    }

    pub fn get(&self, props: &PropertyMap) -> T {
        props
            .get(self.name)
            .and_then(|v| T::from_value(v).ok())
            .unwrap_or_else(|| self.default_value())
    }

    pub fn set(&self, props: &mut PropertyMap, value: T) {
        props.insert(self.name.to_string(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASS: Property<f64> = Property::new("mass", || 70.0);

    #[test]
    fn test_property_default_and_set() {
        let mut props = PropertyMap::new();
        assert_eq!(MASS.get(&props), 70.0);
        MASS.set(&mut props, 12.5);
        assert_eq!(MASS.get(&props), 12.5);
    }

    #[test]
    fn test_property_wrong_type_falls_back() {
        let mut props = PropertyMap::new();
        props.insert("mass".into(), Value::from("heavy"));
        assert_eq!(MASS.get(&props), 70.0);
    }
}
