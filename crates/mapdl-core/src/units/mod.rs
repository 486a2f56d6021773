//! Engine unit systems and conversion of stored quantities into them.

mod expr;

use expr::UnitExpr;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalCategory {
    Length,
    Mass,
    Time,
    Temperature,
    Speed,
    Force,
    Pressure,
    Heat,
}

impl PhysicalCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Mass => "mass",
            Self::Time => "time",
            Self::Temperature => "temperature",
            Self::Speed => "speed",
            Self::Force => "force",
            Self::Pressure => "pressure",
            Self::Heat => "heat",
        }
    }
}

impl Display for PhysicalCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Base units of one engine unit system; compound categories are derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSystem {
    code: i32,
    label: &'static str,
    base: Option<BaseUnits>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BaseUnits {
    length: &'static str,
    mass: &'static str,
    time: &'static str,
    temperature: &'static str,
    speed: &'static str,
}

const fn base(
    length: &'static str,
    mass: &'static str,
    temperature: &'static str,
) -> Option<BaseUnits> {
    Some(BaseUnits {
        length,
        mass,
        time: "s",
        temperature,
        speed: "rad/s",
    })
}

impl UnitSystem {
    pub const DEFAULT_CODE: i32 = -1;

    /// Looks up the engine's `/UNITS` code. `0` is the user-defined system,
    /// whose units cannot be resolved.
    pub fn from_code(code: i32) -> Option<Self> {
        let (label, base) = match code {
            -1 => ("default", base("m", "kg", "degK")),
            0 => ("USER", None),
            1 => ("SI", base("m", "kg", "degK")),
            2 => ("CGS", base("cm", "g", "degC")),
            3 => ("BFT", base("ft", "slug", "degF")),
            4 => ("BIN", base("inch", "lbm", "degF")),
            5 => ("MKS", base("m", "kg", "degC")),
            6 => ("MPA", base("mm", "Mg", "degC")),
            7 => ("uMKS", base("um", "kg", "degC")),
            _ => return None,
        };
        Some(Self { code, label, base })
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [-1, 0, 1, 2, 3, 4, 5, 6, 7]
            .into_iter()
            .filter_map(Self::from_code)
            .find(|system| system.label.eq_ignore_ascii_case(label))
    }

    pub fn si() -> Self {
        Self {
            code: 1,
            label: "SI",
            base: base("m", "kg", "degK"),
        }
    }

    pub const fn code(&self) -> i32 {
        self.code
    }

    pub const fn label(&self) -> &'static str {
        self.label
    }

    pub const fn is_resolvable(&self) -> bool {
        self.base.is_some()
    }

    /// Unit string this system uses for `category`, e.g. `(ft*slug)/(s**2)`
    /// for force in BFT.
    pub fn unit_for(&self, category: PhysicalCategory) -> Option<String> {
        let base = self.base.as_ref()?;
        let force = format!("({}*{})/({}**2)", base.length, base.mass, base.time);
        let unit = match category {
            PhysicalCategory::Length => base.length.to_string(),
            PhysicalCategory::Mass => base.mass.to_string(),
            PhysicalCategory::Time => base.time.to_string(),
            PhysicalCategory::Temperature => base.temperature.to_string(),
            PhysicalCategory::Speed => base.speed.to_string(),
            PhysicalCategory::Pressure => {
                format!("({})/(({})*({}**2))", base.mass, base.length, base.time)
            }
            PhysicalCategory::Heat => format!("({})*({})", force, base.length),
            PhysicalCategory::Force => force,
        };
        Some(unit)
    }

    pub fn describe(&self) -> String {
        let mut out = format!("UnitSystem {} ({})", self.label, self.code);
        if !self.is_resolvable() {
            out.push_str(" unresolvable");
            return out;
        }
        for category in [
            PhysicalCategory::Length,
            PhysicalCategory::Mass,
            PhysicalCategory::Time,
            PhysicalCategory::Temperature,
            PhysicalCategory::Speed,
            PhysicalCategory::Force,
            PhysicalCategory::Pressure,
            PhysicalCategory::Heat,
        ] {
            if let Some(unit) = self.unit_for(category) {
                out.push_str(&format!("\n   {}: {}", category, unit));
            }
        }
        out
    }
}

impl Default for UnitSystem {
    fn default() -> Self {
        Self {
            code: Self::DEFAULT_CODE,
            label: "default",
            base: base("m", "kg", "degK"),
        }
    }
}

/// A value as the caller stored it; `unit` of `None` means "already in
/// engine units".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Quantity {
    pub fn plain(value: f64) -> Self {
        Self { value, unit: None }
    }

    pub fn with_unit(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: Some(unit.into()),
        }
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Self::plain(value)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitError {
    #[error("empty unit expression")]
    Empty,
    #[error("malformed unit expression '{expression}'")]
    Malformed { expression: String },
    #[error("unknown unit '{symbol}'")]
    UnknownUnit { symbol: String },
    #[error("cannot convert '{from}' to '{to}': incompatible dimensions")]
    Incompatible { from: String, to: String },
    #[error("unit system {system} has no unit for {category}")]
    Unresolvable {
        system: &'static str,
        category: PhysicalCategory,
    },
}

/// Converts `value` expressed in `from` into `to`.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64, UnitError> {
    let source = UnitExpr::parse(from)?;
    let target = UnitExpr::parse(to)?;
    if source.dimension != target.dimension {
        return Err(UnitError::Incompatible {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    if source.affine && target.affine {
        let kelvin = value * source.factor + source.offset;
        return Ok((kelvin - target.offset) / target.factor);
    }
    Ok(value * source.factor / target.factor)
}

/// Converts a stored quantity into the unit `system` uses for `category`.
pub fn convert_to_system(
    quantity: &Quantity,
    category: PhysicalCategory,
    system: &UnitSystem,
) -> Result<f64, UnitError> {
    let Some(from) = quantity.unit.as_deref() else {
        return Ok(quantity.value);
    };
    let to = system
        .unit_for(category)
        .ok_or(UnitError::Unresolvable {
            system: system.label(),
            category,
        })?;
    convert(quantity.value, from, &to)
}

#[cfg(test)]
mod tests {
    use super::{PhysicalCategory, Quantity, UnitError, UnitSystem, convert, convert_to_system};

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1.0e-9 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn force_unit_strings_are_built_from_base_units() {
        let bft = UnitSystem::from_code(3).expect("BFT");
        assert_eq!(
            bft.unit_for(PhysicalCategory::Force).as_deref(),
            Some("(ft*slug)/(s**2)")
        );
        let mpa = UnitSystem::from_label("MPA").expect("MPA");
        assert_eq!(
            mpa.unit_for(PhysicalCategory::Force).as_deref(),
            Some("(mm*Mg)/(s**2)")
        );
        assert_eq!(
            mpa.unit_for(PhysicalCategory::Pressure).as_deref(),
            Some("(Mg)/((mm)*(s**2))")
        );
    }

    #[test]
    fn force_in_newtons_converts_into_british_feet_system() {
        let bft = UnitSystem::from_code(3).expect("BFT");
        let converted = convert_to_system(
            &Quantity::with_unit(4.448_221_615_260_5, "N"),
            PhysicalCategory::Force,
            &bft,
        )
        .expect("force converts");
        assert_close(converted, 1.0);

        let si = UnitSystem::si();
        let converted =
            convert_to_system(&Quantity::with_unit(1.0, "lbf"), PhysicalCategory::Force, &si)
                .expect("lbf converts");
        assert_close(converted, 4.448_221_615_260_5);
    }

    #[test]
    fn force_in_mpa_system_is_newtons() {
        let mpa = UnitSystem::from_code(6).expect("MPA");
        let converted =
            convert_to_system(&Quantity::with_unit(12.5, "N"), PhysicalCategory::Force, &mpa)
                .expect("N to mm*Mg/s^2");
        assert_close(converted, 12.5);
    }

    #[test]
    fn pressure_converts_psi_into_mpa_system() {
        let mpa = UnitSystem::from_code(6).expect("MPA");
        let converted = convert_to_system(
            &Quantity::with_unit(1.0e6, "Pa"),
            PhysicalCategory::Pressure,
            &mpa,
        )
        .expect("Pa to MPa system");
        assert_close(converted, 1.0);
    }

    #[test]
    fn temperatures_convert_affinely() {
        assert_close(convert(100.0, "degC", "degF").expect("C to F"), 212.0);
        assert_close(convert(300.0, "degK", "degC").expect("K to C"), 26.85);
        assert_close(convert(32.0, "degF", "K").expect("F to K"), 273.15);
    }

    #[test]
    fn speed_in_rpm_converts_to_radians_per_second() {
        let si = UnitSystem::si();
        let converted =
            convert_to_system(&Quantity::with_unit(60.0, "rpm"), PhysicalCategory::Speed, &si)
                .expect("rpm to rad/s");
        assert_close(converted, 2.0 * std::f64::consts::PI);
    }

    #[test]
    fn plain_quantities_pass_through() {
        let bin = UnitSystem::from_code(4).expect("BIN");
        let converted = convert_to_system(&Quantity::plain(7.5), PhysicalCategory::Length, &bin)
            .expect("plain value");
        assert_eq!(converted, 7.5);
    }

    #[test]
    fn user_system_and_mismatched_dimensions_are_errors() {
        let user = UnitSystem::from_code(0).expect("USER");
        assert!(!user.is_resolvable());
        let error = convert_to_system(&Quantity::with_unit(1.0, "m"), PhysicalCategory::Length, &user)
            .expect_err("user system cannot resolve");
        assert!(matches!(error, UnitError::Unresolvable { .. }));

        let error = convert(1.0, "N", "m").expect_err("force is not length");
        assert!(matches!(error, UnitError::Incompatible { .. }));
        assert!(UnitSystem::from_code(42).is_none());
    }
}
