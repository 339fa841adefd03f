use compact_str::{format_compact, CompactString, ToCompactString};
use pretty_dtoa::{dtoa, FmtFloatConfig};

use crate::unit::Unit;

pub type Real = f64;

/// A number tagged with the unit it is measured in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    value: Real,
    unit: Unit,
}

impl Quantity {
    pub fn new(value: Real, unit: Unit) -> Self {
        Quantity { value, unit }
    }

    pub fn from_scalar(value: Real) -> Self {
        Quantity::new(value, Unit::scalar())
    }

    pub fn value(&self) -> Real {
        self.value
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    /// Renders the value with at most six significant digits, switching to
    /// exponent notation for very large or very small magnitudes.
    pub fn pretty_print(&self) -> CompactString {
        let config = FmtFloatConfig::default()
            .max_significant_digits(6)
            .add_point_zero(false)
            .lower_e_break(-6)
            .upper_e_break(6)
            .round();

        let formatted = dtoa(self.value, config);

        let number = if formatted.contains('.') && !formatted.contains('e') {
            let trimmed = formatted.trim_end_matches('0');
            if trimmed.ends_with('.') {
                format_compact!("{trimmed}0")
            } else {
                trimmed.to_compact_string()
            }
        } else if formatted.contains('e') && !formatted.contains("e-") {
            formatted.replace('e', "e+").to_compact_string()
        } else {
            formatted.to_compact_string()
        };

        format_compact!("{number}{}", self.unit)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}
