use std::{
    fmt::{Debug, Display},
    ops::RangeInclusive,
};

use four_cc::FourCC;

use super::{Parameter, ParameterType, ParameterValueUpdate};
use crate::utils::clamp_finite;

// -------------------------------------------------------------------------------------------------

/// A continuous (float) parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    unit: &'static str,
    precision: usize,
}

impl FloatParameter {
    /// Create a new float parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Self {
        assert!(
            *range.start() < *range.end(),
            "Invalid parameter value range"
        );
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
            unit: "",
            precision: 2,
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    /// Number of decimal places in string displays. By default 2.
    pub const fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Create a raw value update for this parameter.
    #[must_use]
    pub fn value_update(&self, value: f32) -> (FourCC, ParameterValueUpdate) {
        (self.id, ParameterValueUpdate::Raw(Box::new(value)))
    }

    /// The parameter's value range.
    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Clamp the given plain value to the parameter's range. NaNs get clamped to the range start.
    pub fn clamp_value(&self, value: f32) -> f32 {
        clamp_finite(value, *self.range.start(), *self.range.end())
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        let (start, end) = (*self.range.start(), *self.range.end());
        (self.clamp_value(value) - start) / (end - start)
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> f32 {
        let (start, end) = (*self.range.start(), *self.range.end());
        start + clamp_finite(normalized, 0.0, 1.0) * (end - start)
    }

    /// Convert the given plain value to a string.
    pub fn value_to_string(&self, value: f32, include_unit: bool) -> String {
        let precision = self.precision;
        if include_unit && !self.unit.is_empty() {
            format!("{value:.precision$} {}", self.unit)
        } else {
            format!("{value:.precision$}")
        }
    }

    /// Convert the given string to a clamped plain value.
    pub fn string_to_value(&self, string: &str) -> Option<f32> {
        let value = string
            .trim()
            .trim_end_matches(self.unit)
            .trim()
            .parse::<f32>()
            .ok()?;
        Some(self.clamp_value(value))
    }
}

impl Parameter for FloatParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Float {
            range: self.range.clone(),
            default: self.default,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn normalized_value_to_string(&self, normalized: f32, include_unit: bool) -> String {
        self.value_to_string(self.denormalize_value(normalized), include_unit)
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = self.string_to_value(string)?;
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds a float parameter value and its description.
#[derive(Debug, Clone)]
pub struct FloatParameterValue {
    description: FloatParameter,
    value: f32,
}

impl FloatParameterValue {
    /// Create a new parameter value, initialized to the parameter's default value.
    pub fn from_description(description: FloatParameter) -> Self {
        let value = description.default_value();
        Self { description, value }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &FloatParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Set a new value, clamping it into the parameter's value range if necessary.
    pub fn set_value(&mut self, value: f32) {
        self.value = self.description.clamp_value(value);
    }

    /// Applies a parameter update. Updates with unexpected value types are ignored.
    pub fn apply_update(&mut self, update: &ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Raw(raw) => {
                if let Some(value) = raw.downcast_ref::<f32>() {
                    self.set_value(*value);
                } else if let Some(value) = raw.downcast_ref::<f64>() {
                    self.set_value(*value as f32);
                } else {
                    log::warn!(
                        "Invalid value type for float parameter '{}'",
                        self.description.id()
                    );
                }
            }
            ParameterValueUpdate::Normalized(normalized) => {
                self.value = self.description.denormalize_value(*normalized);
            }
        }
    }
}

impl From<FloatParameter> for FloatParameterValue {
    fn from(description: FloatParameter) -> Self {
        Self::from_description(description)
    }
}

impl Display for FloatParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let include_unit = true;
        f.write_str(&self.description.value_to_string(self.value, include_unit))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::assert_eq_with_epsilon;

    const DURATION: FloatParameter =
        FloatParameter::new(FourCC(*b"test"), "Duration", 20.0..=2000.0, 80.0).with_unit("ms");

    #[test]
    fn conversions() {
        assert_eq!(DURATION.denormalize_value(0.0), 20.0);
        assert_eq!(DURATION.denormalize_value(1.0), 2000.0);
        assert_eq!(DURATION.denormalize_value(-1.0), 20.0);
        assert_eq_with_epsilon!(DURATION.denormalize_value(0.5), 1010.0, 1e-3);
        assert_eq_with_epsilon!(DURATION.normalize_value(1010.0), 0.5, 1e-6);
        assert_eq!(DURATION.normalize_value(f32::NAN), 0.0);
        assert_eq_with_epsilon!(
            DURATION.default_normalized_value(),
            60.0 / 1980.0,
            1e-6
        );

        assert_eq!(DURATION.value_to_string(80.0, true), "80.00 ms");
        assert_eq!(DURATION.value_to_string(80.0, false), "80.00");
        assert_eq!(DURATION.string_to_value(" 100 ms"), Some(100.0));
        assert_eq!(DURATION.string_to_value("5000"), Some(2000.0));
        assert_eq!(DURATION.string_to_value("fast"), None);
    }

    #[test]
    fn value_updates() {
        let mut value = FloatParameterValue::from_description(DURATION);
        assert_eq!(value.value(), 80.0);
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(120.0f32)));
        assert_eq!(value.value(), 120.0);
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(1.0f64)));
        assert_eq!(value.value(), 20.0);
        value.apply_update(&ParameterValueUpdate::Normalized(1.0));
        assert_eq!(value.value(), 2000.0);
        // ignored
        value.apply_update(&ParameterValueUpdate::Raw(Box::new("100")));
        assert_eq!(value.value(), 2000.0);
        assert_eq!(value.to_string(), "2000.00 ms");

        let (id, update) = DURATION.value_update(42.0);
        assert_eq!(id, DURATION.id());
        value.apply_update(&update);
        assert_eq!(value.value(), 42.0);
    }
}
