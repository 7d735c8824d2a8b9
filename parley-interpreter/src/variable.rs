use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use num_traits::{Signed, Zero};
use parley_core::{Anomaly, AnomalyKind};

use crate::config::InterpreterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum VarType {
    Number = 0,
    Bool = 1,
    String = 2,
}

impl VarType {
    pub fn name(self) -> &'static str {
        match self {
            VarType::Number => "number",
            VarType::Bool => "bool",
            VarType::String => "string",
        }
    }
}

/// Context type of a binary operation, indexed `[left][right]`.
const RESULT_TYPES: [[VarType; 3]; 3] = [
    [VarType::Number, VarType::Number, VarType::Number],
    [VarType::Number, VarType::Bool, VarType::Bool],
    [VarType::String, VarType::String, VarType::String],
];

pub fn result_type(left: VarType, right: VarType) -> VarType {
    RESULT_TYPES[u8::from(left) as usize][u8::from(right) as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arithmetic {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Arithmetic {
    pub fn symbol(self) -> &'static str {
        match self {
            Arithmetic::Add => "+",
            Arithmetic::Sub => "-",
            Arithmetic::Mul => "*",
            Arithmetic::Div => "/",
            Arithmetic::Rem => "%",
            Arithmetic::Eq => "==",
            Arithmetic::Ne => "!=",
            Arithmetic::Lt => "<",
            Arithmetic::Gt => ">",
            Arithmetic::Le => "<=",
            Arithmetic::Ge => ">=",
        }
    }

    fn compare(self, ordering: Ordering) -> Option<bool> {
        match self {
            Arithmetic::Eq => Some(ordering == Ordering::Equal),
            Arithmetic::Ne => Some(ordering != Ordering::Equal),
            Arithmetic::Lt => Some(ordering == Ordering::Less),
            Arithmetic::Gt => Some(ordering == Ordering::Greater),
            Arithmetic::Le => Some(ordering != Ordering::Greater),
            Arithmetic::Ge => Some(ordering != Ordering::Less),
            _ => None,
        }
    }
}

/// A number, bool or string with lazily computed views in the other two types.
///
/// Reading a facet that is not the preferred one converts and caches it.
/// The cache is only dropped by reassignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    preferred: VarType,
    number: Option<BigDecimal>,
    boolean: Option<bool>,
    string: Option<String>,
}

impl Default for Variable {
    fn default() -> Self {
        Variable::integer(0)
    }
}

impl Variable {
    pub fn number(value: BigDecimal) -> Self {
        Variable {
            preferred: VarType::Number,
            number: Some(value),
            boolean: None,
            string: None,
        }
    }

    pub fn integer(value: i64) -> Self {
        Variable::number(BigDecimal::from(value))
    }

    pub fn boolean(value: bool) -> Self {
        Variable {
            preferred: VarType::Bool,
            number: None,
            boolean: Some(value),
            string: None,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Variable {
            preferred: VarType::String,
            number: None,
            boolean: None,
            string: Some(value.into()),
        }
    }

    pub fn preferred(&self) -> VarType {
        self.preferred
    }

    pub fn to_number(&mut self, config: &InterpreterConfig) -> Result<BigDecimal, Anomaly> {
        if let Some(number) = &self.number {
            return Ok(number.clone());
        }
        let number = match self.preferred {
            VarType::Bool => BigDecimal::from(i64::from(self.to_bool(config)?)),
            _ => parse_number(&self.to_text(config), config)?,
        };
        self.number = Some(number.clone());
        Ok(number)
    }

    pub fn to_bool(&mut self, config: &InterpreterConfig) -> Result<bool, Anomaly> {
        if let Some(boolean) = self.boolean {
            return Ok(boolean);
        }
        let boolean = match self.preferred {
            VarType::Number => !self.to_number(config)?.is_zero(),
            _ => {
                let text = self.to_text(config);
                match text.trim() {
                    "true" => true,
                    "false" | "" => false,
                    other => match parse_number(other, config) {
                        Ok(number) => !number.is_zero(),
                        Err(_) => {
                            return Err(Anomaly::new(
                                AnomalyKind::NoConversion,
                                format!("\"{text}\" is not a bool"),
                            ))
                        }
                    },
                }
            }
        };
        self.boolean = Some(boolean);
        Ok(boolean)
    }

    /// Text form. Every value has one.
    pub fn to_text(&mut self, config: &InterpreterConfig) -> String {
        if let Some(string) = &self.string {
            return string.clone();
        }
        let string = match (self.preferred, &self.number, self.boolean) {
            (VarType::Bool, _, Some(boolean)) => boolean.to_string(),
            (_, Some(number), _) => format_number(number, config),
            (_, _, Some(boolean)) => boolean.to_string(),
            _ => String::new(),
        };
        self.string = Some(string.clone());
        string
    }

    pub fn operate(
        &mut self,
        op: Arithmetic,
        right: &mut Variable,
        config: &InterpreterConfig,
    ) -> Result<Variable, Anomaly> {
        let context = result_type(self.preferred, right.preferred);
        let undefined = || {
            Anomaly::new(
                AnomalyKind::UndefinedOperator,
                format!("'{}' is not defined for {} values", op.symbol(), context.name()),
            )
        };
        match context {
            VarType::Number => {
                let left = self.to_number(config)?;
                let right = right.to_number(config)?;
                if let Some(result) = op.compare(left.cmp(&right)) {
                    return Ok(Variable::boolean(result));
                }
                let value = match op {
                    Arithmetic::Add => &left + &right,
                    Arithmetic::Sub => &left - &right,
                    Arithmetic::Mul => &left * &right,
                    Arithmetic::Div | Arithmetic::Rem if right.is_zero() => {
                        return Err(Anomaly::new(
                            AnomalyKind::UnsupportedOperation,
                            format!("{left} {} 0", op.symbol()),
                        ))
                    }
                    Arithmetic::Div => divide(&left, &right, config.precision),
                    Arithmetic::Rem => &left % &right,
                    _ => return Err(undefined()),
                };
                Ok(Variable::number(config.round(value)))
            }
            VarType::Bool => {
                let left = self.to_bool(config)?;
                let right = right.to_bool(config)?;
                op.compare(left.cmp(&right))
                    .map(Variable::boolean)
                    .ok_or_else(undefined)
            }
            VarType::String => {
                let left = self.to_text(config);
                let right = right.to_text(config);
                match op {
                    Arithmetic::Add => Ok(Variable::string(left + &right)),
                    Arithmetic::Eq => Ok(Variable::boolean(left == right)),
                    Arithmetic::Ne => Ok(Variable::boolean(left != right)),
                    // ordering compares lengths
                    _ => op
                        .compare(left.chars().count().cmp(&right.chars().count()))
                        .map(Variable::boolean)
                        .ok_or_else(undefined),
                }
            }
        }
    }

    pub fn negate(&mut self, config: &InterpreterConfig) -> Result<Variable, Anomaly> {
        let number = self.to_number(config)?;
        Ok(Variable::number(-number))
    }

    pub fn not(&mut self, config: &InterpreterConfig) -> Result<Variable, Anomaly> {
        Ok(Variable::boolean(!self.to_bool(config)?))
    }
}

/// Digits kept past the requested precision before the final rounding.
const GUARD_DIGITS: i64 = 3;

fn digit_count(value: &BigInt) -> i64 {
    value.magnitude().to_string().len() as i64
}

fn ten_to(exponent: i64) -> BigInt {
    num_traits::pow(BigInt::from(10u8), exponent as usize)
}

/// `left / right` carried to `precision` significant digits plus guard
/// digits. An inexact quotient gets a trailing sticky digit so rounding
/// never mistakes it for a tie.
fn divide(left: &BigDecimal, right: &BigDecimal, precision: u64) -> BigDecimal {
    let (numerator, left_scale) = left.as_bigint_and_exponent();
    let (denominator, right_scale) = right.as_bigint_and_exponent();
    let magnitude =
        (digit_count(&numerator) - left_scale) - (digit_count(&denominator) - right_scale);
    let scale = precision as i64 + GUARD_DIGITS - magnitude;
    let shift = right_scale + scale - left_scale;
    let (numerator, denominator) = if shift >= 0 {
        (numerator * ten_to(shift), denominator)
    } else {
        (numerator, denominator * ten_to(-shift))
    };

    let quotient = &numerator / &denominator;
    if (&numerator % &denominator).is_zero() {
        return BigDecimal::new(quotient, scale);
    }
    let sticky = if numerator.is_negative() != denominator.is_negative() {
        -1
    } else {
        1
    };
    BigDecimal::new(quotient * 10 + sticky, scale + 1)
}

fn parse_number(text: &str, config: &InterpreterConfig) -> Result<BigDecimal, Anomaly> {
    let text = text.trim();
    if let Ok(number) = BigDecimal::from_str(text) {
        return Ok(number);
    }
    if config.number_base != 10 {
        if let Ok(whole) = i64::from_str_radix(text, config.number_base) {
            return Ok(BigDecimal::from(whole));
        }
    }
    Err(Anomaly::new(
        AnomalyKind::NoConversion,
        format!("\"{text}\" is not a number"),
    ))
}

/// Renders `number` with `output_digits` significant digits in plain notation.
/// Whole numbers use `number_base`.
pub fn format_number(number: &BigDecimal, config: &InterpreterConfig) -> String {
    let rounded = config.round_to(number.clone(), config.output_digits).normalized();
    let (mantissa, scale) = rounded.as_bigint_and_exponent();

    if config.number_base != 10 && scale <= 0 {
        let (whole, _) = rounded.with_scale(0).as_bigint_and_exponent();
        return whole.to_str_radix(config.number_base);
    }

    let text = mantissa.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", text.as_str()),
    };
    let body = if scale <= 0 {
        format!("{digits}{}", "0".repeat(scale.unsigned_abs() as usize))
    } else {
        let scale = scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{digits}", "0".repeat(scale - digits.len() + 1))
        } else {
            digits.to_owned()
        };
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            whole.to_owned()
        } else {
            format!("{whole}.{fraction}")
        }
    };
    format!("{sign}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> InterpreterConfig {
        InterpreterConfig::default()
    }

    fn decimal(text: &str) -> BigDecimal {
        BigDecimal::from_str(text).unwrap()
    }

    #[test]
    fn result_type_table() {
        use VarType::*;
        let expected = [
            ((Number, Number), Number),
            ((Number, Bool), Number),
            ((Number, String), Number),
            ((Bool, Number), Number),
            ((Bool, Bool), Bool),
            ((Bool, String), Bool),
            ((String, Number), String),
            ((String, Bool), String),
            ((String, String), String),
        ];
        for ((left, right), result) in expected {
            assert_eq!(result_type(left, right), result, "{left:?} {right:?}");
        }
    }

    #[test]
    fn number_context_parses_strings() {
        let config = config();
        let mut left = Variable::integer(2);
        let mut right = Variable::string("40");
        let sum = left.operate(Arithmetic::Add, &mut right, &config).unwrap();
        assert_eq!(sum, Variable::number(decimal("42")));

        let mut word = Variable::string("forty");
        let error = left
            .operate(Arithmetic::Add, &mut word, &config)
            .unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::NoConversion));
    }

    #[test]
    fn string_context_concatenates_and_compares_lengths() {
        let config = config();
        let mut hello = Variable::string("hello");
        let mut three = Variable::integer(3);
        assert_eq!(
            hello.operate(Arithmetic::Add, &mut three, &config).unwrap(),
            Variable::string("hello3")
        );
        let mut abc = Variable::string("abc");
        assert_eq!(
            hello.operate(Arithmetic::Gt, &mut abc, &config).unwrap(),
            Variable::boolean(true)
        );
        assert_eq!(
            hello.operate(Arithmetic::Eq, &mut abc, &config).unwrap(),
            Variable::boolean(false)
        );
        let error = hello
            .operate(Arithmetic::Sub, &mut abc, &config)
            .unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::UndefinedOperator));
    }

    #[test]
    fn bool_context_only_compares() {
        let config = config();
        let mut yes = Variable::boolean(true);
        let mut word = Variable::string("false");
        assert_eq!(
            yes.operate(Arithmetic::Ne, &mut word, &config).unwrap(),
            Variable::boolean(true)
        );
        let mut no = Variable::boolean(false);
        let error = yes.operate(Arithmetic::Mul, &mut no, &config).unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::UndefinedOperator));
    }

    #[test]
    fn division_by_zero() {
        let config = config();
        let mut one = Variable::integer(1);
        let mut zero = Variable::integer(0);
        let error = one.operate(Arithmetic::Div, &mut zero, &config).unwrap_err();
        assert_eq!(error.kind(), Some(AnomalyKind::UnsupportedOperation));
    }

    #[test]
    fn arithmetic_is_rounded_to_precision() {
        let mut config = config();
        config.precision = 5;
        let mut one = Variable::integer(1);
        let mut three = Variable::integer(3);
        let third = one.operate(Arithmetic::Div, &mut three, &config).unwrap();
        assert_eq!(third, Variable::number(decimal("0.33333")));

        config.precision = 300;
        let mut third = one.operate(Arithmetic::Div, &mut three, &config).unwrap();
        let digits = third.to_number(&config).unwrap().normalized().as_bigint_and_exponent().1;
        assert_eq!(digits, 300);
        let mut two = Variable::integer(2);
        let mut two_thirds = two.operate(Arithmetic::Div, &mut three, &config).unwrap();
        let mut back = two_thirds.operate(Arithmetic::Mul, &mut three, &config).unwrap();
        assert_eq!(back.to_number(&config).unwrap(), decimal("2"));

        let mut minus_two = Variable::integer(-2);
        let negative = minus_two.operate(Arithmetic::Div, &mut three, &config).unwrap();
        assert_eq!(
            negative,
            Variable::number(-two_thirds.to_number(&config).unwrap())
        );
    }

    #[test]
    fn facets_are_cached() {
        let config = config();
        let mut value = Variable::string("12.50");
        assert_eq!(value.to_number(&config).unwrap(), decimal("12.5"));
        assert!(value.to_bool(&config).unwrap());
        // the cached facets do not change the preferred type
        assert_eq!(value.preferred(), VarType::String);
        assert_eq!(value.to_text(&config), "12.50");

        let mut empty = Variable::string("");
        assert!(!empty.to_bool(&config).unwrap());
        let mut word = Variable::string("maybe");
        assert_eq!(
            word.to_bool(&config).unwrap_err().kind(),
            Some(AnomalyKind::NoConversion)
        );
        assert_eq!(Variable::boolean(true).to_number(&config).unwrap(), decimal("1"));
    }

    #[test]
    fn formatting() {
        let mut config = config();
        assert_eq!(format_number(&decimal("11"), &config), "11");
        assert_eq!(format_number(&decimal("11.500"), &config), "11.5");
        assert_eq!(format_number(&decimal("-0.025"), &config), "-0.025");
        assert_eq!(format_number(&decimal("1E+3"), &config), "1000");
        assert_eq!(format_number(&decimal("0"), &config), "0");
        config.output_digits = 3;
        assert_eq!(format_number(&decimal("3.14159"), &config), "3.14");
        config.number_base = 16;
        assert_eq!(format_number(&decimal("255"), &config), "ff");
        assert_eq!(format_number(&decimal("2.5"), &config), "2.5");
    }

    #[test]
    fn unary() {
        let config = config();
        assert_eq!(
            Variable::integer(4).negate(&config).unwrap(),
            Variable::integer(-4)
        );
        assert_eq!(
            Variable::string("").not(&config).unwrap(),
            Variable::boolean(true)
        );
    }
}
