// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dynamically typed values stored in an entity's attribute store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A value that can live in a host attribute store.
///
/// Attribute stores only hold plain data, so this is deliberately a closed set
/// of primitive shapes rather than an arbitrary boxed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A boolean flag.
    Bool(bool),
    /// A double precision number. Integers are stored here as well.
    Number(f64),
    /// A UTF-8 string.
    Text(String),
    /// A three component vector.
    Vector([f64; 3]),
}

impl AttributeValue {
    /// Returns the value as a `bool`, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an `f64`, if it is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a string slice, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a vector, if it is one.
    pub fn as_vector(&self) -> Option<[f64; 3]> {
        match self {
            AttributeValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// A short name for the kind of value, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Number(_) => "number",
            AttributeValue::Text(_) => "text",
            AttributeValue::Vector(_) => "vector",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{v}"),
            AttributeValue::Number(v) => write!(f, "{v}"),
            AttributeValue::Text(v) => write!(f, "{v:?}"),
            AttributeValue::Vector([x, y, z]) => write!(f, "({x}, {y}, {z})"),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(f64::from(value))
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<[f64; 3]> for AttributeValue {
    fn from(value: [f64; 3]) -> Self {
        AttributeValue::Vector(value)
    }
}

/// An ordered attribute snapshot, keyed by attribute name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_variant() {
        let v = AttributeValue::from(3);
        assert_eq!(v.as_number(), Some(3.0));
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.kind(), "number");

        let t = AttributeValue::from("hello");
        assert_eq!(t.as_text(), Some("hello"));
        assert_eq!(t.to_string(), "\"hello\"");
    }

    #[test]
    fn test_vector_display() {
        let v = AttributeValue::from([1.0, 2.5, -3.0]);
        assert_eq!(v.to_string(), "(1, 2.5, -3)");
        assert_eq!(v.as_vector(), Some([1.0, 2.5, -3.0]));
    }
}
