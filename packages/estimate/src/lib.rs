#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistical estimates with margin-of-error propagation.
//!
//! An [`Estimate`] is a survey figure paired with its 90% margin of error
//! (MOE). Arithmetic between estimates follows the Census Bureau's ACS
//! General Handbook formulas (see [`moe`]), so every derived figure carries
//! a defensible error band.
//!
//! Null handling mirrors the upstream API: a missing MOE is treated as `0`
//! inside the formulas, but a missing *value* stays missing.

pub mod moe;
pub mod operand;
pub mod rounding;
pub mod terraced;

use serde::{Deserialize, Serialize};

pub use operand::Operand;
pub use terraced::TerracedEstimate;

/// Errors raised by invalid estimate arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArithmeticError {
    /// Two estimates were multiplied together.
    #[error("Cannot multiply an estimate by another estimate")]
    EstimateProduct,

    /// An estimate was added to an estimate that is already the numerator
    /// of a derived ratio.
    #[error("Cannot add another estimate to an estimate that is a numerator")]
    NumeratorAddition,

    /// One side of a division has no value.
    #[error("Cannot divide with a null-valued estimate")]
    NullOperand,

    /// Division by a plain zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// Two plain numbers reached an operation that needs an estimate.
    #[error("Unsupported operand combination: {message}")]
    Unsupported {
        /// Description of the operand combination.
        message: String,
    },
}

/// A single statistical figure with its margin of error.
///
/// `numerator` and `numerator_moe` are set when this estimate is the result
/// of a division, recording the figures that went on top of the ratio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// The estimate itself.
    pub value: Option<f64>,
    /// 90% margin of error.
    pub error: Option<f64>,
    /// Numerator of the ratio this estimate was derived from.
    pub numerator: Option<f64>,
    /// Margin of error of [`Self::numerator`], rounded to one decimal.
    pub numerator_moe: Option<f64>,
}

impl Estimate {
    /// Creates a plain estimate with a value and margin of error.
    #[must_use]
    pub const fn new(value: f64, error: f64) -> Self {
        Self {
            value: Some(value),
            error: Some(error),
            numerator: None,
            numerator_moe: None,
        }
    }

    /// Creates an estimate from nullable parts, as read from an API response.
    #[must_use]
    pub const fn from_parts(value: Option<f64>, error: Option<f64>) -> Self {
        Self {
            value,
            error,
            numerator: None,
            numerator_moe: None,
        }
    }

    /// Returns `true` if this estimate is the result of a division.
    #[must_use]
    pub const fn is_numerator(&self) -> bool {
        self.numerator_moe.is_some()
    }

    /// Sums two estimates. Errors combine as the root of the sum of squares.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::NumeratorAddition`] if `self` is already
    /// a ratio.
    pub fn add(self, other: &Self) -> Result<Self, ArithmeticError> {
        if self.is_numerator() {
            return Err(ArithmeticError::NumeratorAddition);
        }

        Ok(Self::from_parts(
            zip_with(self.value, other.value, |a, b| a + b),
            Some(moe::moe_add(self.error, other.error)),
        ))
    }

    /// Shifts the value by a plain number. Error and numerator fields are
    /// kept.
    #[must_use]
    pub fn add_scalar(self, other: f64) -> Self {
        Self {
            value: self.value.map(|v| v + other),
            ..self
        }
    }

    /// Subtracts `other` from this estimate.
    #[must_use]
    pub fn subtract(self, other: &Self) -> Self {
        Self::from_parts(
            zip_with(self.value, other.value, |a, b| a - b),
            Some(moe::moe_add(self.error, other.error)),
        )
    }

    /// Subtracts a plain number from this estimate.
    #[must_use]
    pub fn subtract_scalar(self, other: f64) -> Self {
        Self::from_parts(self.value.map(|v| v - other), self.error)
    }

    /// Subtracts this estimate from a plain number (`other - self`).
    #[must_use]
    pub fn subtract_from_scalar(self, other: f64) -> Self {
        Self::from_parts(self.value.map(|v| other - v), self.error)
    }

    /// Scales value and error by a plain number.
    ///
    /// An estimate with a null value or error passes through unchanged.
    #[must_use]
    pub fn multiply(self, scalar: f64) -> Self {
        match (self.value, self.error) {
            (Some(value), Some(error)) => Self {
                value: Some(value * scalar),
                error: Some(error * scalar),
                ..self
            },
            _ => self,
        }
    }

    /// Divides this estimate by another, producing a derived proportion.
    ///
    /// The error uses the derived-proportion formula, falling back to the
    /// derived-ratio formula when the proportion radicand is negative. A
    /// zero denominator yields null value and error.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::NullOperand`] if either value is null.
    pub fn divide(self, other: &Self) -> Result<Self, ArithmeticError> {
        let (Some(numerator), Some(denominator)) = (self.value, other.value) else {
            return Err(ArithmeticError::NullOperand);
        };

        let value = if denominator == 0.0 {
            None
        } else {
            Some(numerator / denominator)
        };

        Ok(Self {
            value,
            error: moe::moe_proportion(self.value, other.value, self.error, other.error),
            numerator: Some(numerator),
            numerator_moe: self.error.map(|e| rounding::round_to(e, 1)),
        })
    }

    /// Divides this estimate by a plain number. The error is kept as is and
    /// the undivided value is recorded as the numerator.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::DivisionByZero`] for a zero divisor and
    /// [`ArithmeticError::NullOperand`] for a null value.
    pub fn divide_scalar(self, divisor: f64) -> Result<Self, ArithmeticError> {
        if divisor == 0.0 {
            return Err(ArithmeticError::DivisionByZero);
        }
        let Some(value) = self.value else {
            return Err(ArithmeticError::NullOperand);
        };

        Ok(Self {
            value: Some(value / divisor),
            error: self.error,
            numerator: Some(value),
            numerator_moe: self.error.map(|e| rounding::round_to(e, 1)),
        })
    }

    /// Divides a plain number by this estimate (`dividend / self`).
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::NullOperand`] for a null value and
    /// [`ArithmeticError::DivisionByZero`] for a zero value.
    pub fn divide_into_scalar(self, dividend: f64) -> Result<Self, ArithmeticError> {
        match self.value {
            None => Err(ArithmeticError::NullOperand),
            Some(v) if v == 0.0 => Err(ArithmeticError::DivisionByZero),
            Some(v) => Ok(Self::from_parts(Some(dividend / v), self.error)),
        }
    }

    /// Margin of error as a percentage of the value, rounded to three
    /// decimals.
    #[must_use]
    pub fn error_ratio(&self) -> Option<f64> {
        match (self.value, self.error) {
            (Some(value), Some(error)) if value != 0.0 => {
                Some(rounding::round_to(error / value * 100.0, 3))
            }
            _ => None,
        }
    }
}

fn zip_with(a: Option<f64>, b: Option<f64>, f: impl FnOnce(f64, f64) -> f64) -> Option<f64> {
    a.zip(b).map(|(a, b)| f(a, b))
}
