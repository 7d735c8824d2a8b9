use bigdecimal::{BigDecimal, RoundingMode};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use num_traits::ToPrimitive;
use parley_core::{Anomaly, AnomalyKind};

use crate::variable::{VarType, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Rounding {
    Up = 0,
    Down = 1,
    Ceiling = 2,
    Floor = 3,
    HalfUp = 4,
    HalfDown = 5,
    HalfEven = 6,
}

impl Rounding {
    pub const ALL: [Rounding; 7] = [
        Rounding::Up,
        Rounding::Down,
        Rounding::Ceiling,
        Rounding::Floor,
        Rounding::HalfUp,
        Rounding::HalfDown,
        Rounding::HalfEven,
    ];

    pub fn mode(self) -> RoundingMode {
        match self {
            Rounding::Up => RoundingMode::Up,
            Rounding::Down => RoundingMode::Down,
            Rounding::Ceiling => RoundingMode::Ceiling,
            Rounding::Floor => RoundingMode::Floor,
            Rounding::HalfUp => RoundingMode::HalfUp,
            Rounding::HalfDown => RoundingMode::HalfDown,
            Rounding::HalfEven => RoundingMode::HalfEven,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rounding::Up => "up",
            Rounding::Down => "down",
            Rounding::Ceiling => "ceiling",
            Rounding::Floor => "floor",
            Rounding::HalfUp => "half_up",
            Rounding::HalfDown => "half_down",
            Rounding::HalfEven => "half_even",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Rounding::ALL
            .into_iter()
            .find(|rounding| rounding.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Configuration values the script can see as variables in the root scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigBinding {
    NumberBase,
    OutputDigits,
    Precision,
    MinPrecision,
    MaxPrecision,
    RoundingMode,
    StrictLists,
}

impl ConfigBinding {
    pub const ALL: [ConfigBinding; 7] = [
        ConfigBinding::NumberBase,
        ConfigBinding::OutputDigits,
        ConfigBinding::Precision,
        ConfigBinding::MinPrecision,
        ConfigBinding::MaxPrecision,
        ConfigBinding::RoundingMode,
        ConfigBinding::StrictLists,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigBinding::NumberBase => "number_base",
            ConfigBinding::OutputDigits => "output_digits",
            ConfigBinding::Precision => "precision",
            ConfigBinding::MinPrecision => "min_precision",
            ConfigBinding::MaxPrecision => "max_precision",
            ConfigBinding::RoundingMode => "rounding_mode",
            ConfigBinding::StrictLists => "strict_lists",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    pub number_base: u32,
    /// Significant digits used when a number is rendered as text.
    pub output_digits: u64,
    /// Significant digits kept by arithmetic results.
    pub precision: u64,
    pub min_precision: u64,
    pub max_precision: u64,
    pub rounding: Rounding,
    pub strict_lists: bool,
    /// Nesting of block calls and sub-expressions before `ResourceExhausted`.
    pub max_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            number_base: 10,
            output_digits: 24,
            precision: 32,
            min_precision: 1,
            max_precision: 1000,
            rounding: Rounding::HalfUp,
            strict_lists: false,
            max_depth: 10_000,
        }
    }
}

fn out_of_range(what: &str, value: u64, low: u64, high: u64) -> Anomaly {
    Anomaly::new(
        AnomalyKind::PrecisionOutOfRange,
        format!("{what} {value} is outside {low}..={high}"),
    )
}

impl InterpreterConfig {
    pub fn validate(&self) -> Result<(), Anomaly> {
        if !(2..=36).contains(&self.number_base) {
            return Err(out_of_range("number base", self.number_base.into(), 2, 36));
        }
        if self.min_precision == 0 || self.min_precision > self.max_precision {
            return Err(out_of_range(
                "min_precision",
                self.min_precision,
                1,
                self.max_precision,
            ));
        }
        for (what, value) in [
            ("precision", self.precision),
            ("output_digits", self.output_digits),
        ] {
            if value < self.min_precision || value > self.max_precision {
                return Err(out_of_range(
                    what,
                    value,
                    self.min_precision,
                    self.max_precision,
                ));
            }
        }
        Ok(())
    }

    /// Rounds `value` to `digits` significant digits with the configured mode.
    pub fn round_to(&self, value: BigDecimal, digits: u64) -> BigDecimal {
        let (mantissa, scale) = value.as_bigint_and_exponent();
        let count = mantissa.to_string().trim_start_matches('-').len() as u64;
        if count <= digits {
            return value;
        }
        let excess = (count - digits) as i64;
        value.with_scale_round(scale - excess, self.rounding.mode())
    }

    pub fn round(&self, value: BigDecimal) -> BigDecimal {
        self.round_to(value, self.precision)
    }

    pub fn read(&self, binding: ConfigBinding) -> Variable {
        match binding {
            ConfigBinding::NumberBase => Variable::integer(self.number_base.into()),
            ConfigBinding::OutputDigits => Variable::integer(self.output_digits as i64),
            ConfigBinding::Precision => Variable::integer(self.precision as i64),
            ConfigBinding::MinPrecision => Variable::integer(self.min_precision as i64),
            ConfigBinding::MaxPrecision => Variable::integer(self.max_precision as i64),
            ConfigBinding::RoundingMode => Variable::string(self.rounding.name()),
            ConfigBinding::StrictLists => Variable::boolean(self.strict_lists),
        }
    }

    /// Writes a script value through to the configuration. Nothing changes
    /// unless the resulting configuration is valid.
    pub fn write(&mut self, binding: ConfigBinding, value: &mut Variable) -> Result<(), Anomaly> {
        let mut candidate = self.clone();
        match binding {
            ConfigBinding::NumberBase => {
                let base = whole(value, self)?;
                candidate.number_base = u32::try_from(base)
                    .map_err(|_| out_of_range("number base", base, 2, 36))?;
            }
            ConfigBinding::OutputDigits => candidate.output_digits = whole(value, self)?,
            ConfigBinding::Precision => candidate.precision = whole(value, self)?,
            ConfigBinding::MinPrecision => candidate.min_precision = whole(value, self)?,
            ConfigBinding::MaxPrecision => candidate.max_precision = whole(value, self)?,
            ConfigBinding::RoundingMode => candidate.rounding = rounding(value, self)?,
            ConfigBinding::StrictLists => candidate.strict_lists = value.to_bool(self)?,
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

fn whole(value: &mut Variable, config: &InterpreterConfig) -> Result<u64, Anomaly> {
    let number = value.to_number(config)?;
    number
        .to_u64()
        .filter(|whole| BigDecimal::from(*whole) == number)
        .ok_or_else(|| {
            Anomaly::new(
                AnomalyKind::PrecisionOutOfRange,
                format!("{number} is not a whole non-negative number"),
            )
        })
}

fn rounding(value: &mut Variable, config: &InterpreterConfig) -> Result<Rounding, Anomaly> {
    if value.preferred() == VarType::String {
        let name = value.to_text(config);
        if let Some(rounding) = Rounding::from_name(&name) {
            return Ok(rounding);
        }
    }
    let code = value.to_number(config)?;
    code.to_u8()
        .and_then(|code| Rounding::try_from(code).ok())
        .ok_or_else(|| Anomaly::new(AnomalyKind::NoConversion, format!("unknown rounding mode {code}")))
}
