//! Value coercion at the `update` boundary
//!
//! Every value entering a metric goes through [`ToScalar`] so that metric
//! state is always a plain `f64`. Accepted inputs:
//!
//! - native numbers (`f64`, `f32`, integers) and `bool` (`1.0` / `0.0`)
//! - one-element containers (`[T; 1]`, slices, `Vec<T>`)
//! - one-element `ndarray` arrays of any dimension
//! - numeric strings and JSON values (`serde_json::Value`)
//!
//! Multi-element inputs and inputs with no numeric interpretation are
//! rejected with [`MetricError::ValueConversion`].
//!
//! # Example
//!
//! ```
//! use mlogger::coerce::ToScalar;
//! use ndarray::array;
//!
//! assert_eq!(3_i32.to_scalar().unwrap(), 3.0);
//! assert_eq!(vec![0.25_f64].to_scalar().unwrap(), 0.25);
//! assert_eq!(array![[1.5_f32]].to_scalar().unwrap(), 1.5);
//! assert!(vec![1.0, 2.0].to_scalar().is_err());
//! ```

use ndarray::{ArrayBase, Data, Dimension};

use crate::error::{MetricError, Result};

/// Conversion of a scalar-like value into `f64`.
pub trait ToScalar {
    /// Convert to `f64`, rejecting multi-element or non-numeric input.
    fn to_scalar(&self) -> Result<f64>;
}

impl<T: ToScalar + ?Sized> ToScalar for &T {
    fn to_scalar(&self) -> Result<f64> {
        (**self).to_scalar()
    }
}

impl ToScalar for f64 {
    fn to_scalar(&self) -> Result<f64> {
        Ok(*self)
    }
}

impl ToScalar for f32 {
    fn to_scalar(&self) -> Result<f64> {
        Ok(f64::from(*self))
    }
}

macro_rules! impl_to_scalar_int {
    ($($t:ty),*) => {
        $(
            impl ToScalar for $t {
                #[allow(clippy::cast_precision_loss, clippy::cast_lossless)]
                fn to_scalar(&self) -> Result<f64> {
                    Ok(*self as f64)
                }
            }
        )*
    };
}

impl_to_scalar_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl ToScalar for bool {
    fn to_scalar(&self) -> Result<f64> {
        Ok(if *self { 1.0 } else { 0.0 })
    }
}

impl ToScalar for str {
    fn to_scalar(&self) -> Result<f64> {
        self.trim()
            .parse::<f64>()
            .map_err(|e| MetricError::conversion(format!("'{self}' is not a number ({e})")))
    }
}

impl ToScalar for String {
    fn to_scalar(&self) -> Result<f64> {
        self.as_str().to_scalar()
    }
}

impl<T: ToScalar> ToScalar for [T] {
    fn to_scalar(&self) -> Result<f64> {
        match self {
            [single] => single.to_scalar(),
            _ => Err(single_element_error(self.len())),
        }
    }
}

impl<T: ToScalar, const N: usize> ToScalar for [T; N] {
    fn to_scalar(&self) -> Result<f64> {
        self.as_slice().to_scalar()
    }
}

impl<T: ToScalar> ToScalar for Vec<T> {
    fn to_scalar(&self) -> Result<f64> {
        self.as_slice().to_scalar()
    }
}

impl<A, S, D> ToScalar for ArrayBase<S, D>
where
    A: ToScalar,
    S: Data<Elem = A>,
    D: Dimension,
{
    fn to_scalar(&self) -> Result<f64> {
        if self.len() != 1 {
            return Err(single_element_error(self.len()));
        }
        match self.iter().next() {
            Some(value) => value.to_scalar(),
            None => Err(single_element_error(0)),
        }
    }
}

impl ToScalar for serde_json::Value {
    fn to_scalar(&self) -> Result<f64> {
        use serde_json::Value;

        match self {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| MetricError::conversion(format!("number {n} is not representable"))),
            Value::String(s) => s.to_scalar(),
            Value::Array(items) => items.as_slice().to_scalar(),
            Value::Null => Err(MetricError::conversion("null has no numeric value")),
            Value::Bool(b) => b.to_scalar(),
            Value::Object(_) => Err(MetricError::conversion("objects are not numeric")),
        }
    }
}

fn single_element_error(len: usize) -> MetricError {
    MetricError::conversion(format!("value should have one element (got {len})"))
}
