use std::fmt::Display;

use four_cc::FourCC;
use strum::IntoEnumIterator;

use super::{Parameter, ParameterType, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// An enum parameter descriptor. Values are the string representations of the enum's variants.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumParameter {
    id: FourCC,
    name: &'static str,
    values: Vec<String>,
    default_index: usize,
}

impl EnumParameter {
    /// Create a new enum parameter descriptor from all variants of `E`.
    pub fn new<E: IntoEnumIterator + Display + PartialEq>(
        id: FourCC,
        name: &'static str,
        default: E,
    ) -> Self {
        let values = E::iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let default_index = E::iter().position(|v| v == default).unwrap_or(0);
        Self {
            id,
            name,
            values,
            default_index,
        }
    }

    /// Create a raw value update for this parameter.
    #[must_use]
    pub fn value_update<E: Send + Sync + 'static>(
        &self,
        value: E,
    ) -> (FourCC, ParameterValueUpdate) {
        (self.id, ParameterValueUpdate::Raw(Box::new(value)))
    }

    /// String representations of all values.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn default_index(&self) -> usize {
        self.default_index
    }

    /// Normalize the given value index to a 0.0-1.0 range.
    pub fn normalize_index(&self, index: usize) -> f32 {
        if self.values.len() > 1 {
            index.min(self.values.len() - 1) as f32 / (self.values.len() - 1) as f32
        } else {
            0.0
        }
    }

    /// Denormalize a 0.0-1.0 ranged value to the nearest value index.
    pub fn denormalize_index(&self, normalized: f32) -> usize {
        let normalized = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        (normalized * self.values.len().saturating_sub(1) as f32).round() as usize
    }
}

impl Parameter for EnumParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Enum {
            values: self.values.clone(),
            default_index: self.default_index,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_index(self.default_index)
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.values
            .get(self.denormalize_index(normalized))
            .cloned()
            .unwrap_or_default()
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let string = string.trim();
        let index = self
            .values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(string))?;
        Some(self.normalize_index(index))
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds an enum parameter value and its description.
#[derive(Debug, Clone)]
pub struct EnumParameterValue<T> {
    description: EnumParameter,
    value: T,
}

impl<T> EnumParameterValue<T>
where
    T: IntoEnumIterator + Display + Default + Copy + PartialEq + 'static,
{
    /// Create a new parameter value, initialized to the parameter's default value.
    pub fn from_description(description: EnumParameter) -> Self {
        let value = T::iter()
            .nth(description.default_index())
            .unwrap_or_default();
        Self { description, value }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &EnumParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> T {
        self.value
    }

    pub fn set_value(&mut self, value: T) {
        self.value = value;
    }

    /// Applies a parameter update. Updates with unexpected value types are ignored.
    pub fn apply_update(&mut self, update: &ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<T>() {
                    self.set_value(*value);
                } else if let Some(string) = raw.downcast_ref::<String>() {
                    if let Some(value) = T::iter().find(|v| v.to_string() == *string) {
                        self.set_value(value);
                    } else {
                        log::warn!(
                            "Invalid string value for enum parameter '{}'",
                            self.description.id()
                        );
                    }
                } else {
                    log::warn!(
                        "Invalid value type for enum parameter '{}'",
                        self.description.id()
                    );
                }
            }
            ParameterValueUpdate::Normalized(normalized) => {
                let index = self.description.denormalize_index(*normalized);
                if let Some(value) = T::iter().nth(index) {
                    self.set_value(value);
                }
            }
        }
    }
}

impl<T> Display for EnumParameterValue<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

// -------------------------------------------------------------------------------------------------
