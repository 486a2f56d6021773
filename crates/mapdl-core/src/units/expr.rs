use super::UnitError;

/// Exponents over length, mass, time, temperature, angle.
pub(super) type Dimension = [i32; 5];

const DIMENSIONLESS: Dimension = [0, 0, 0, 0, 0];
const LENGTH: Dimension = [1, 0, 0, 0, 0];
const MASS: Dimension = [0, 1, 0, 0, 0];
const TIME: Dimension = [0, 0, 1, 0, 0];
const TEMPERATURE: Dimension = [0, 0, 0, 1, 0];
const ANGLE: Dimension = [0, 0, 0, 0, 1];
const FORCE: Dimension = [1, 1, -2, 0, 0];
const PRESSURE: Dimension = [-1, 1, -2, 0, 0];
const ENERGY: Dimension = [2, 1, -2, 0, 0];

const FOOT: f64 = 0.3048;
const POUND_MASS: f64 = 0.453_592_37;
const POUND_FORCE: f64 = 4.448_221_615_260_5;
const SLUG: f64 = POUND_FORCE / FOOT;

struct AtomicUnit {
    symbol: &'static str,
    factor: f64,
    offset: f64,
    dimension: Dimension,
}

const fn unit(symbol: &'static str, factor: f64, dimension: Dimension) -> AtomicUnit {
    AtomicUnit {
        symbol,
        factor,
        offset: 0.0,
        dimension,
    }
}

const fn absolute_temperature(symbol: &'static str, factor: f64, offset: f64) -> AtomicUnit {
    AtomicUnit {
        symbol,
        factor,
        offset,
        dimension: TEMPERATURE,
    }
}

// Factors convert into SI base units; offsets apply only to a lone temperature.
const ATOMIC_UNITS: &[AtomicUnit] = &[
    unit("m", 1.0, LENGTH),
    unit("km", 1.0e3, LENGTH),
    unit("cm", 1.0e-2, LENGTH),
    unit("mm", 1.0e-3, LENGTH),
    unit("um", 1.0e-6, LENGTH),
    unit("ft", FOOT, LENGTH),
    unit("inch", 0.0254, LENGTH),
    unit("in", 0.0254, LENGTH),
    unit("kg", 1.0, MASS),
    unit("g", 1.0e-3, MASS),
    unit("Mg", 1.0e3, MASS),
    unit("t", 1.0e3, MASS),
    unit("slug", SLUG, MASS),
    unit("lbm", POUND_MASS, MASS),
    unit("s", 1.0, TIME),
    unit("ms", 1.0e-3, TIME),
    unit("min", 60.0, TIME),
    unit("h", 3600.0, TIME),
    unit("hr", 3600.0, TIME),
    absolute_temperature("degK", 1.0, 0.0),
    absolute_temperature("K", 1.0, 0.0),
    absolute_temperature("degC", 1.0, 273.15),
    absolute_temperature("degF", 5.0 / 9.0, 459.67 * 5.0 / 9.0),
    absolute_temperature("degR", 5.0 / 9.0, 0.0),
    unit("rad", 1.0, ANGLE),
    unit("deg", std::f64::consts::PI / 180.0, ANGLE),
    unit("rev", 2.0 * std::f64::consts::PI, ANGLE),
    unit("rpm", 2.0 * std::f64::consts::PI / 60.0, [0, 0, -1, 0, 1]),
    unit("N", 1.0, FORCE),
    unit("kN", 1.0e3, FORCE),
    unit("dyne", 1.0e-5, FORCE),
    unit("lbf", POUND_FORCE, FORCE),
    unit("Pa", 1.0, PRESSURE),
    unit("kPa", 1.0e3, PRESSURE),
    unit("MPa", 1.0e6, PRESSURE),
    unit("bar", 1.0e5, PRESSURE),
    unit("atm", 101_325.0, PRESSURE),
    unit("psi", POUND_FORCE / (0.0254 * 0.0254), PRESSURE),
    unit("J", 1.0, ENERGY),
];

/// A parsed unit expression reduced to SI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct UnitExpr {
    pub(super) factor: f64,
    pub(super) offset: f64,
    pub(super) dimension: Dimension,
    /// True when the expression is exactly one absolute-capable temperature unit.
    pub(super) affine: bool,
}

impl UnitExpr {
    fn scalar(factor: f64) -> Self {
        Self {
            factor,
            offset: 0.0,
            dimension: DIMENSIONLESS,
            affine: false,
        }
    }

    fn times(self, other: Self) -> Self {
        Self {
            factor: self.factor * other.factor,
            offset: 0.0,
            dimension: combine(self.dimension, other.dimension, 1),
            affine: false,
        }
    }

    fn divided_by(self, other: Self) -> Self {
        Self {
            factor: self.factor / other.factor,
            offset: 0.0,
            dimension: combine(self.dimension, other.dimension, -1),
            affine: false,
        }
    }

    fn powi(self, exponent: i32) -> Self {
        Self {
            factor: self.factor.powi(exponent),
            offset: 0.0,
            dimension: self.dimension.map(|d| d * exponent),
            affine: self.affine && exponent == 1,
        }
    }

    pub(super) fn parse(text: &str) -> Result<Self, UnitError> {
        let tokens = lex(text)?;
        if tokens.is_empty() {
            return Err(UnitError::Empty);
        }
        let mut parser = ExprParser {
            source: text,
            tokens,
            position: 0,
        };
        let expr = parser.product()?;
        if parser.position != parser.tokens.len() {
            return Err(parser.malformed());
        }
        Ok(expr)
    }
}

fn combine(left: Dimension, right: Dimension, sign: i32) -> Dimension {
    let mut out = left;
    for (slot, value) in out.iter_mut().zip(right) {
        *slot += sign * value;
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum UnitToken {
    Symbol(String),
    Number(f64),
    Star,
    Slash,
    Power,
    Open,
    Close,
    Minus,
}

fn lex(text: &str) -> Result<Vec<UnitToken>, UnitError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        match ch {
            c if c.is_whitespace() => index += 1,
            '*' if chars.get(index + 1) == Some(&'*') => {
                tokens.push(UnitToken::Power);
                index += 2;
            }
            '^' => {
                tokens.push(UnitToken::Power);
                index += 1;
            }
            '*' => {
                tokens.push(UnitToken::Star);
                index += 1;
            }
            '/' => {
                tokens.push(UnitToken::Slash);
                index += 1;
            }
            '(' => {
                tokens.push(UnitToken::Open);
                index += 1;
            }
            ')' => {
                tokens.push(UnitToken::Close);
                index += 1;
            }
            '-' => {
                tokens.push(UnitToken::Minus);
                index += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = index;
                while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.')
                {
                    index += 1;
                }
                let literal: String = chars[start..index].iter().collect();
                let value = literal.parse::<f64>().map_err(|_| UnitError::Malformed {
                    expression: text.to_string(),
                })?;
                tokens.push(UnitToken::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = index;
                while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_')
                {
                    index += 1;
                }
                tokens.push(UnitToken::Symbol(chars[start..index].iter().collect()));
            }
            _ => {
                return Err(UnitError::Malformed {
                    expression: text.to_string(),
                });
            }
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    source: &'a str,
    tokens: Vec<UnitToken>,
    position: usize,
}

impl ExprParser<'_> {
    fn malformed(&self) -> UnitError {
        UnitError::Malformed {
            expression: self.source.to_string(),
        }
    }

    fn peek(&self) -> Option<&UnitToken> {
        self.tokens.get(self.position)
    }

    fn product(&mut self) -> Result<UnitExpr, UnitError> {
        let mut expr = self.power()?;
        loop {
            match self.peek() {
                Some(UnitToken::Star) => {
                    self.position += 1;
                    expr = expr.times(self.power()?);
                }
                Some(UnitToken::Slash) => {
                    self.position += 1;
                    expr = expr.divided_by(self.power()?);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn power(&mut self) -> Result<UnitExpr, UnitError> {
        let base = self.primary()?;
        if self.peek() != Some(&UnitToken::Power) {
            return Ok(base);
        }
        self.position += 1;
        let negative = if self.peek() == Some(&UnitToken::Minus) {
            self.position += 1;
            true
        } else {
            false
        };
        match self.tokens.get(self.position) {
            Some(UnitToken::Number(value)) if value.fract() == 0.0 => {
                self.position += 1;
                let exponent = *value as i32;
                Ok(base.powi(if negative { -exponent } else { exponent }))
            }
            _ => Err(self.malformed()),
        }
    }

    fn primary(&mut self) -> Result<UnitExpr, UnitError> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        match token {
            Some(UnitToken::Symbol(symbol)) => atomic(&symbol),
            Some(UnitToken::Number(value)) => Ok(UnitExpr::scalar(value)),
            Some(UnitToken::Open) => {
                let inner = self.product()?;
                if self.peek() != Some(&UnitToken::Close) {
                    return Err(self.malformed());
                }
                self.position += 1;
                Ok(inner)
            }
            _ => Err(self.malformed()),
        }
    }
}

fn atomic(symbol: &str) -> Result<UnitExpr, UnitError> {
    ATOMIC_UNITS
        .iter()
        .find(|unit| unit.symbol == symbol)
        .map(|unit| UnitExpr {
            factor: unit.factor,
            offset: unit.offset,
            dimension: unit.dimension,
            affine: unit.dimension == TEMPERATURE,
        })
        .ok_or_else(|| UnitError::UnknownUnit {
            symbol: symbol.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{FORCE, PRESSURE, UnitExpr};

    #[test]
    fn compound_force_expression_reduces_to_si() {
        let expr = UnitExpr::parse("(ft*slug)/(s**2)").expect("force expression");
        assert_eq!(expr.dimension, FORCE);
        assert!((expr.factor - 4.448_221_615_260_5).abs() < 1.0e-12);
        assert!(!expr.affine);
    }

    #[test]
    fn caret_and_negative_powers_are_supported() {
        let expr = UnitExpr::parse("kg*m^-1*s**-2").expect("pressure expression");
        assert_eq!(expr.dimension, PRESSURE);
        assert_eq!(expr.factor, 1.0);
    }

    #[test]
    fn lone_temperature_is_affine_but_products_are_not() {
        assert!(UnitExpr::parse("degC").expect("degC").affine);
        assert!(!UnitExpr::parse("degC/s").expect("rate").affine);
    }

    #[test]
    fn malformed_and_unknown_units_are_errors() {
        assert!(UnitExpr::parse("(m*kg").is_err());
        assert!(UnitExpr::parse("m**x").is_err());
        assert!(UnitExpr::parse("furlong").is_err());
        assert!(UnitExpr::parse("  ").is_err());
    }
}
