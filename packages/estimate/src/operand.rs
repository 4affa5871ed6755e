//! Dynamically-typed operands for expression evaluation.
//!
//! Expressions mix estimates and plain numbers freely. [`Operand`] picks the
//! right [`Estimate`] operation for each combination and rejects the
//! combinations the MOE formulas don't cover.

use crate::{ArithmeticError, Estimate};

/// Either an estimate or a plain number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// An estimate with a margin of error.
    Estimate(Estimate),
    /// A plain number (literal or constant).
    Number(f64),
}

impl From<Estimate> for Operand {
    fn from(value: Estimate) -> Self {
        Self::Estimate(value)
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl Operand {
    /// `self + other`.
    ///
    /// # Errors
    ///
    /// Propagates [`Estimate::add`] failures.
    pub fn add(self, other: Self) -> Result<Self, ArithmeticError> {
        Ok(match (self, other) {
            (Self::Estimate(a), Self::Estimate(b)) => Self::Estimate(a.add(&b)?),
            (Self::Estimate(a), Self::Number(n)) | (Self::Number(n), Self::Estimate(a)) => {
                Self::Estimate(a.add_scalar(n))
            }
            (Self::Number(a), Self::Number(b)) => Self::Number(a + b),
        })
    }

    /// `self - other`.
    ///
    /// # Errors
    ///
    /// This operation is total; the `Result` keeps the operator signatures
    /// uniform.
    pub fn subtract(self, other: Self) -> Result<Self, ArithmeticError> {
        Ok(match (self, other) {
            (Self::Estimate(a), Self::Estimate(b)) => Self::Estimate(a.subtract(&b)),
            (Self::Estimate(a), Self::Number(n)) => Self::Estimate(a.subtract_scalar(n)),
            (Self::Number(n), Self::Estimate(a)) => Self::Estimate(a.subtract_from_scalar(n)),
            (Self::Number(a), Self::Number(b)) => Self::Number(a - b),
        })
    }

    /// `self * other`.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::EstimateProduct`] for two estimates.
    pub fn multiply(self, other: Self) -> Result<Self, ArithmeticError> {
        match (self, other) {
            (Self::Estimate(_), Self::Estimate(_)) => Err(ArithmeticError::EstimateProduct),
            (Self::Estimate(a), Self::Number(n)) | (Self::Number(n), Self::Estimate(a)) => {
                Ok(Self::Estimate(a.multiply(n)))
            }
            (Self::Number(a), Self::Number(b)) => Ok(Self::Number(a * b)),
        }
    }

    /// `self / other`.
    ///
    /// # Errors
    ///
    /// Propagates the division errors of [`Estimate`], and returns
    /// [`ArithmeticError::DivisionByZero`] for two numbers with a zero
    /// divisor.
    pub fn divide(self, other: Self) -> Result<Self, ArithmeticError> {
        match (self, other) {
            (Self::Estimate(a), Self::Estimate(b)) => a.divide(&b).map(Self::Estimate),
            (Self::Estimate(a), Self::Number(n)) => a.divide_scalar(n).map(Self::Estimate),
            (Self::Number(n), Self::Estimate(a)) => a.divide_into_scalar(n).map(Self::Estimate),
            (Self::Number(_), Self::Number(b)) if b == 0.0 => Err(ArithmeticError::DivisionByZero),
            (Self::Number(a), Self::Number(b)) => Ok(Self::Number(a / b)),
        }
    }

    /// Converts the final result of an expression into an estimate.
    ///
    /// # Errors
    ///
    /// Returns [`ArithmeticError::Unsupported`] when the expression reduced
    /// to a plain number.
    pub fn into_estimate(self) -> Result<Estimate, ArithmeticError> {
        match self {
            Self::Estimate(e) => Ok(e),
            Self::Number(n) => Err(ArithmeticError::Unsupported {
                message: format!("expression evaluated to the plain number {n}"),
            }),
        }
    }
}
