//! Unit catalog and the rules for combining units.
//!
//! Every quantity carries exactly one [`BaseUnit`]. Units never carry exponents;
//! products and quotients are only defined where a [`CombinationRule`] says so.

use std::sync::OnceLock;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseUnit {
    /// No unit could be recognized. Never attached to a value.
    Null,
    Scalar,
    Volts,
    Amps,
    Ohms,
    Watts,
    Joules,
    Newtons,
    Seconds,
    Meters,
    Henries,
    Farads,
    MetersPerSecond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseUnitInfo {
    pub base_unit: BaseUnit,
    pub full_name: &'static str,
    pub shorthand: &'static str,
}

// Ordered like the `BaseUnit` variants.
static UNIT_INFOS: [BaseUnitInfo; 13] = [
    BaseUnitInfo {
        base_unit: BaseUnit::Null,
        full_name: "Null",
        shorthand: "?",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Scalar,
        full_name: "Scalar",
        shorthand: "",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Volts,
        full_name: "Volts",
        shorthand: "V",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Amps,
        full_name: "Amps",
        shorthand: "A",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Ohms,
        full_name: "Ohms",
        shorthand: "R",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Watts,
        full_name: "Watts",
        shorthand: "W",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Joules,
        full_name: "Joules",
        shorthand: "J",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Newtons,
        full_name: "Newtons",
        shorthand: "N",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Seconds,
        full_name: "Seconds",
        shorthand: "s",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Meters,
        full_name: "Meters",
        shorthand: "m",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Henries,
        full_name: "Henries",
        shorthand: "H",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::Farads,
        full_name: "Farads",
        shorthand: "F",
    },
    BaseUnitInfo {
        base_unit: BaseUnit::MetersPerSecond,
        full_name: "Meters per second",
        shorthand: "m/s",
    },
];

impl BaseUnit {
    pub fn info(self) -> &'static BaseUnitInfo {
        &UNIT_INFOS[self as usize]
    }

    pub fn full_name(self) -> &'static str {
        self.info().full_name
    }

    pub fn shorthand(self) -> &'static str {
        self.info().shorthand
    }

    /// All units a value can carry, i.e. everything but [`BaseUnit::Null`].
    pub fn all() -> impl Iterator<Item = BaseUnit> {
        UNIT_INFOS
            .iter()
            .map(|info| info.base_unit)
            .filter(|unit| *unit != BaseUnit::Null)
    }
}

/// Units that can be written as a suffix.
fn suffix_units() -> impl Iterator<Item = &'static BaseUnitInfo> {
    UNIT_INFOS
        .iter()
        .filter(|info| !matches!(info.base_unit, BaseUnit::Null | BaseUnit::Scalar))
}

/// Match `candidate` against the registered shorthands.
///
/// `already_matched` is how much of `candidate` an earlier call has already seen. A
/// candidate that did not grow past it cannot make progress and yields
/// `(BaseUnit::Null, false)`; otherwise the whole candidate is compared.
///
/// Returns the unit whose shorthand equals `candidate` exactly ([`BaseUnit::Null`] if
/// there is none), together with a flag telling whether some longer shorthand starts
/// with `candidate`, i.e. whether feeding more input could still produce a match.
/// Comparison is exact and case-sensitive.
pub fn find_unit(candidate: &str, already_matched: usize) -> (BaseUnit, bool) {
    if candidate.len() <= already_matched {
        return (BaseUnit::Null, false);
    }

    let mut found = BaseUnit::Null;
    let mut longer_match_available = false;

    for info in suffix_units() {
        let shorthand = info.shorthand.as_bytes();
        if !shorthand.starts_with(candidate.as_bytes()) {
            continue;
        }

        if shorthand.len() == candidate.len() {
            found = info.base_unit;
        } else {
            longer_match_available = true;
        }
    }

    (found, longer_match_available)
}

/// A metric prefix in front of a unit shorthand, like the `k` in `4.7kR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    pub symbol: &'static str,
    pub exponent: i32,
}

static PREFIXES: [Prefix; 10] = [
    Prefix::new("T", 12),
    Prefix::new("G", 9),
    Prefix::new("M", 6),
    Prefix::new("k", 3),
    Prefix::new("m", -3),
    Prefix::new("u", -6),
    Prefix::new("µ", -6),
    Prefix::new("n", -9),
    Prefix::new("p", -12),
    Prefix::new("f", -15),
];

impl Prefix {
    const fn new(symbol: &'static str, exponent: i32) -> Self {
        Prefix { symbol, exponent }
    }

    pub fn all() -> &'static [Prefix] {
        &PREFIXES
    }

    /// Scales `value` by `10^exponent`. Negative exponents divide, which keeps
    /// literals like `3m` exact to the last digit.
    pub fn apply(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.exponent.abs());
        if self.exponent < 0 {
            value / factor
        } else {
            value * factor
        }
    }
}

/// A recognized unit suffix, possibly carrying a metric prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitMatch {
    pub base_unit: BaseUnit,
    pub prefix: Option<Prefix>,
}

impl UnitMatch {
    pub fn scale(&self, value: f64) -> f64 {
        match self.prefix {
            Some(prefix) => prefix.apply(value),
            None => value,
        }
    }
}

/// Like [`find_unit`], but also reads `candidate` as a metric prefix followed by a
/// shorthand (`mA`, `kR`, `mm/s`).
///
/// A plain shorthand always wins over a prefixed reading, so `m` is Meters and `m/s`
/// is Meters per second, while `ms` is milliseconds. The flag reports whether either
/// reading could still grow into a longer match.
pub fn find_prefixed_unit(candidate: &str, already_matched: usize) -> (Option<UnitMatch>, bool) {
    let (exact, mut longer_match_available) = find_unit(candidate, already_matched);
    if candidate.len() <= already_matched {
        return (None, false);
    }

    let mut found = (exact != BaseUnit::Null).then_some(UnitMatch {
        base_unit: exact,
        prefix: None,
    });

    for prefix in Prefix::all() {
        let Some(rest) = candidate.strip_prefix(prefix.symbol) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let (base_unit, longer) = find_unit(rest, 0);
        longer_match_available |= longer;
        if found.is_none() && base_unit != BaseUnit::Null {
            found = Some(UnitMatch {
                base_unit,
                prefix: Some(*prefix),
            });
        }
    }

    (found, longer_match_available)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Unit(BaseUnit);

impl Unit {
    pub const fn new(base_unit: BaseUnit) -> Self {
        Unit(base_unit)
    }

    pub const fn scalar() -> Self {
        Unit(BaseUnit::Scalar)
    }

    pub fn base_unit(&self) -> BaseUnit {
        self.0
    }

    pub fn is_scalar(&self) -> bool {
        self.0 == BaseUnit::Scalar
    }

    pub fn full_name(&self) -> &'static str {
        self.0.full_name()
    }

    pub fn shorthand(&self) -> &'static str {
        self.0.shorthand()
    }

    pub fn combine(self, other: Unit, operation: Combination) -> Result<Unit, UnitMismatch> {
        let rules = combination_rules();
        let result = match operation {
            Combination::Multiply => rules.iter().find_map(|rule| rule.multiply(self.0, other.0)),
            Combination::Divide => rules.iter().find_map(|rule| rule.divide(self.0, other.0)),
        };

        result.map(Unit).ok_or(UnitMismatch {
            lhs: self,
            rhs: other,
        })
    }

    pub fn multiply(self, other: Unit) -> Result<Unit, UnitMismatch> {
        self.combine(other, Combination::Multiply)
    }

    pub fn divide(self, other: Unit) -> Result<Unit, UnitMismatch> {
        self.combine(other, Combination::Divide)
    }

    /// Addition and subtraction only accept identical units.
    pub fn same_as(self, other: Unit) -> Result<Unit, UnitMismatch> {
        if self == other {
            Ok(self)
        } else {
            Err(UnitMismatch {
                lhs: self,
                rhs: other,
            })
        }
    }
}

impl From<BaseUnit> for Unit {
    fn from(base_unit: BaseUnit) -> Self {
        Unit(base_unit)
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.shorthand())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combination {
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unit mismatch between {} and {}", lhs.full_name(), rhs.full_name())]
pub struct UnitMismatch {
    pub lhs: Unit,
    pub rhs: Unit,
}

/// `lhs × rhs = product`, in either order, together with the two quotients
/// `product / lhs = rhs` and `product / rhs = lhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinationRule {
    pub lhs: BaseUnit,
    pub rhs: BaseUnit,
    pub product: BaseUnit,
}

impl CombinationRule {
    const fn new(lhs: BaseUnit, rhs: BaseUnit, product: BaseUnit) -> Self {
        CombinationRule { lhs, rhs, product }
    }

    fn multiply(&self, a: BaseUnit, b: BaseUnit) -> Option<BaseUnit> {
        if (a == self.lhs && b == self.rhs) || (a == self.rhs && b == self.lhs) {
            Some(self.product)
        } else {
            None
        }
    }

    fn divide(&self, numerator: BaseUnit, denominator: BaseUnit) -> Option<BaseUnit> {
        if numerator != self.product {
            None
        } else if denominator == self.lhs {
            Some(self.rhs)
        } else if denominator == self.rhs {
            Some(self.lhs)
        } else {
            None
        }
    }
}

static PHYSICAL_RULES: [CombinationRule; 7] = [
    CombinationRule::new(BaseUnit::Ohms, BaseUnit::Amps, BaseUnit::Volts),
    CombinationRule::new(BaseUnit::Volts, BaseUnit::Amps, BaseUnit::Watts),
    CombinationRule::new(BaseUnit::Watts, BaseUnit::Seconds, BaseUnit::Joules),
    CombinationRule::new(BaseUnit::Newtons, BaseUnit::Meters, BaseUnit::Joules),
    CombinationRule::new(BaseUnit::Ohms, BaseUnit::Farads, BaseUnit::Seconds),
    CombinationRule::new(BaseUnit::Ohms, BaseUnit::Seconds, BaseUnit::Henries),
    CombinationRule::new(BaseUnit::MetersPerSecond, BaseUnit::Seconds, BaseUnit::Meters),
];

/// The complete, immutable rule table: the physical rules above plus
/// `Scalar × U = U` for every unit `U`.
pub fn combination_rules() -> &'static [CombinationRule] {
    static RULES: OnceLock<Vec<CombinationRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut rules = PHYSICAL_RULES.to_vec();
        rules.extend(
            BaseUnit::all().map(|unit| CombinationRule::new(BaseUnit::Scalar, unit, unit)),
        );
        rules
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(base_unit: BaseUnit) -> Unit {
        Unit::new(base_unit)
    }

    #[test]
    fn catalog_is_ordered_like_the_enum() {
        for (index, info) in UNIT_INFOS.iter().enumerate() {
            assert_eq!(info.base_unit as usize, index);
        }
    }

    #[test]
    fn shorthands_are_unique_ignoring_case() {
        let shorthands: Vec<String> = suffix_units()
            .map(|info| info.shorthand.to_lowercase())
            .collect();
        for (i, a) in shorthands.iter().enumerate() {
            for b in &shorthands[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(BaseUnit::Scalar.shorthand(), "");
    }

    #[test]
    fn find_unit_exact_matches() {
        for info in suffix_units() {
            let (found, _) = find_unit(info.shorthand, 0);
            assert_eq!(found, info.base_unit, "shorthand {:?}", info.shorthand);
        }

        assert_eq!(find_unit("V", 0), (BaseUnit::Volts, false));
        assert_eq!(find_unit("m/s", 0), (BaseUnit::MetersPerSecond, false));

        // 'm' is also the start of 'm/s'
        assert_eq!(find_unit("m", 0), (BaseUnit::Meters, true));
    }

    #[test]
    fn find_unit_partial_and_failed_matches() {
        assert_eq!(find_unit("m/", 1), (BaseUnit::Null, true));
        assert_eq!(find_unit("m/s", 2), (BaseUnit::MetersPerSecond, false));
        assert_eq!(find_unit("m/x", 2), (BaseUnit::Null, false));
        assert_eq!(find_unit("x", 0), (BaseUnit::Null, false));
        assert_eq!(find_unit("", 0), (BaseUnit::Null, false));
        assert_eq!(find_unit("v", 0), (BaseUnit::Null, false));
        assert_eq!(find_unit("VV", 0), (BaseUnit::Null, false));
        assert_eq!(find_unit("m", 1), (BaseUnit::Null, false));
    }

    #[test]
    fn prefixed_units() {
        use BaseUnit::*;

        let milli = Prefix::new("m", -3);
        let kilo = Prefix::new("k", 3);
        let with = |base_unit, prefix| Some(UnitMatch { base_unit, prefix });

        assert_eq!(find_prefixed_unit("mA", 0), (with(Amps, Some(milli)), false));
        assert_eq!(find_prefixed_unit("kR", 0), (with(Ohms, Some(kilo)), false));
        assert_eq!(find_prefixed_unit("ms", 0), (with(Seconds, Some(milli)), false));

        // plain shorthands take priority over prefixed readings
        assert_eq!(find_prefixed_unit("m", 0), (with(Meters, None), true));
        assert_eq!(find_prefixed_unit("m/s", 2), (with(MetersPerSecond, None), false));

        // 'mm' is millimeters, and could still become 'mm/s'
        assert_eq!(find_prefixed_unit("mm", 0), (with(Meters, Some(milli)), true));
        assert_eq!(find_prefixed_unit("mm/", 2), (None, true));
        assert_eq!(
            find_prefixed_unit("mm/s", 3),
            (with(MetersPerSecond, Some(milli)), false)
        );

        assert_eq!(find_prefixed_unit("k", 0), (None, false));
        assert_eq!(find_prefixed_unit("kx", 0), (None, false));
        assert_eq!(find_prefixed_unit("xA", 0), (None, false));
        assert_eq!(find_prefixed_unit("mA", 2), (None, false));
    }

    #[test]
    fn prefixes_scale_values() {
        let scaled: Vec<f64> = ["k", "m", "u", "p"]
            .iter()
            .map(|symbol| {
                Prefix::all()
                    .iter()
                    .find(|p| p.symbol == *symbol)
                    .unwrap()
                    .apply(3.0)
            })
            .collect();
        assert_eq!(scaled, [3000.0, 0.003, 3e-6, 3e-12]);

        // 'm' is the only prefix that is also a shorthand on its own
        let ambiguous: Vec<&str> = Prefix::all()
            .iter()
            .map(|prefix| prefix.symbol)
            .filter(|symbol| find_unit(symbol, 0).0 != BaseUnit::Null)
            .collect();
        assert_eq!(ambiguous, ["m"]);
    }

    #[test]
    fn rules_round_trip() {
        for rule in combination_rules() {
            let (a, b, product) = (unit(rule.lhs), unit(rule.rhs), unit(rule.product));

            assert_eq!(a.multiply(b), Ok(product));
            assert_eq!(b.multiply(a), Ok(product));
            assert_eq!(product.divide(a), Ok(b));
            assert_eq!(product.divide(b), Ok(a));
        }
    }

    #[test]
    fn electrical_rules() {
        use BaseUnit::*;

        assert_eq!(unit(Watts).multiply(unit(Seconds)), Ok(unit(Joules)));
        assert_eq!(unit(Volts).divide(unit(Ohms)), Ok(unit(Amps)));
        assert_eq!(unit(Ohms).multiply(unit(Farads)), Ok(unit(Seconds)));
        assert_eq!(unit(Meters).divide(unit(Seconds)), Ok(unit(MetersPerSecond)));
        assert_eq!(unit(Volts).divide(unit(Volts)), Ok(Unit::scalar()));
        assert_eq!(unit(Volts).multiply(Unit::scalar()), Ok(unit(Volts)));
        assert_eq!(unit(Volts).divide(Unit::scalar()), Ok(unit(Volts)));
    }

    #[test]
    fn missing_rules_are_mismatches() {
        use BaseUnit::*;

        let error = unit(Volts).multiply(unit(Volts)).unwrap_err();
        assert_eq!(
            error,
            UnitMismatch {
                lhs: unit(Volts),
                rhs: unit(Volts)
            }
        );
        assert_eq!(error.to_string(), "Unit mismatch between Volts and Volts");

        assert!(Unit::scalar().divide(unit(Seconds)).is_err());
        assert!(unit(Null).multiply(Unit::scalar()).is_err());
    }

    #[test]
    fn addition_requires_identical_units() {
        use BaseUnit::*;

        assert_eq!(unit(Volts).same_as(unit(Volts)), Ok(unit(Volts)));
        assert_eq!(
            unit(Volts).same_as(unit(Amps)).unwrap_err().to_string(),
            "Unit mismatch between Volts and Amps"
        );
    }
}
