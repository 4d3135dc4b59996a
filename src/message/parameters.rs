//! Message parameters
//!
//! Parameters are name/value pairs like headers, but their values carry
//! typed accessors: the stored representation is always a string, with
//! numeric and boolean conversions layered on lookup.

use std::fmt;

use super::{Error, Result};

/// A single parameter: a name with a string value and typed accessors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value: String,
}

impl Parameter {
    /// Create a parameter from a string value
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a parameter from an integer value
    pub fn from_integer(name: impl Into<String>, value: i64) -> Self {
        Parameter {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Create a parameter from a floating-point value
    pub fn from_float(name: impl Into<String>, value: f64) -> Self {
        Parameter {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Create a parameter from a boolean value
    pub fn from_bool(name: impl Into<String>, value: bool) -> Self {
        Parameter {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// The parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw string value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value converted to an integer
    pub fn as_integer(&self) -> Result<i64> {
        self.value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("{}: not an integer: {}", self.name, self.value)))
    }

    /// The value converted to a floating-point number
    pub fn as_float(&self) -> Result<f64> {
        self.value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidParameter(format!("{}: not a number: {}", self.name, self.value)))
    }

    /// The value converted to a boolean (`true`/`false`, `1`/`0`)
    pub fn as_bool(&self) -> Result<bool> {
        match self.value.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(Error::InvalidParameter(format!(
                "{}: not a boolean: {}",
                self.name, other
            ))),
        }
    }

    /// Whether this parameter may be carried by a message
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    /// Whether this parameter carries `name`, compared case-insensitively
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Ordered parameter collection with the same multiplicity rules as headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    parameters: Vec<Parameter>,
}

impl Parameters {
    /// Create an empty collection
    pub fn new() -> Self {
        Parameters {
            parameters: Vec::new(),
        }
    }

    /// Append a parameter, keeping any existing values under the same name
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.add_parameter(Parameter::new(name, value))
    }

    /// Append an already constructed parameter
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<()> {
        if !parameter.is_valid() {
            return Err(Error::InvalidParameter("empty parameter name".to_string()));
        }
        self.parameters.push(parameter);
        Ok(())
    }

    /// Replace every value under the parameter's name with this one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let parameter = Parameter::new(name, value);
        if !parameter.is_valid() {
            return Err(Error::InvalidParameter("empty parameter name".to_string()));
        }
        self.parameters.retain(|p| !p.matches(parameter.name()));
        self.parameters.push(parameter);
        Ok(())
    }

    /// First parameter under `name`, in insertion order
    pub fn get_first(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.matches(name))
    }

    /// Last parameter under `name`, in insertion order
    pub fn get_last(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().rev().find(|p| p.matches(name))
    }

    /// All parameters under `name`, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&Parameter> {
        self.parameters.iter().filter(|p| p.matches(name)).collect()
    }

    /// Whether any parameter carries `name`
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.matches(name))
    }

    /// Remove every parameter under `name`, returning how many were removed
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.parameters.len();
        self.parameters.retain(|p| !p.matches(name));
        before - self.parameters.len()
    }

    /// Remove one specific parameter, returning whether it was present
    pub fn remove_parameter(&mut self, parameter: &Parameter) -> bool {
        if let Some(pos) = self.parameters.iter().position(|p| p == parameter) {
            self.parameters.remove(pos);
            true
        } else {
            false
        }
    }

    /// Number of parameters in the collection
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Remove all parameters
    pub fn clear(&mut self) {
        self.parameters.clear();
    }

    /// Iterate over parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }
}
