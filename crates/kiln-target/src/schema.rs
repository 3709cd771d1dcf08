//! Value-type schemas for target attributes.

use std::fmt;

/// The declared type of a target attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Bool,
    Str,
    /// A nested target.
    Target,
    /// Homogeneous array with the given element type.
    Array(Box<ValueType>),
    /// Map with the given key and value types. Not expressible in raw
    /// flag strings.
    Map(Box<ValueType>, Box<ValueType>),
}

impl ValueType {
    pub fn array(element: ValueType) -> Self {
        ValueType::Array(Box::new(element))
    }

    pub fn map(key: ValueType, value: ValueType) -> Self {
        ValueType::Map(Box::new(key), Box::new(value))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "int"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Str => write!(f, "str"),
            ValueType::Target => write!(f, "Target"),
            ValueType::Array(elem) => write!(f, "Array<{elem}>"),
            ValueType::Map(k, v) => write!(f, "Map<{k}, {v}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested() {
        let ty = ValueType::map(ValueType::Str, ValueType::array(ValueType::Int));
        assert_eq!(ty.to_string(), "Map<str, Array<int>>");
    }
}
