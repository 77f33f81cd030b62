//! One-shot derivative entry points on the working tape.

use crate::control::Control;
use crate::error::AdjointResult;
use crate::overloaded::Overloaded;
use crate::reduced_functional::ReducedFunctional;
use crate::value::Value;

/// Gradient of `functional` with respect to `controls`, one entry per
/// control.
///
/// # Example
///
/// ```rust
/// use adjoint_core::{compute_gradient, AdjFloat, Control};
///
/// let x = AdjFloat::new(3.0);
/// let j = x * x;
/// let dj = compute_gradient(&j, &[Control::new(&x).unwrap()]).unwrap();
/// assert_eq!(dj[0].to_scalar().unwrap(), 6.0);
/// ```
pub fn compute_gradient<T: Overloaded>(
    functional: &T,
    controls: &[Control],
) -> AdjointResult<Vec<Value>> {
    ReducedFunctional::new(functional, controls.to_vec())?.derivative()
}

/// Hessian of `functional` applied to `directions`, one entry per control.
pub fn compute_hessian<T: Overloaded>(
    functional: &T,
    controls: &[Control],
    directions: &[Value],
) -> AdjointResult<Vec<Value>> {
    Hessian::new(functional, controls)?.action(directions)
}

/// Reusable Hessian action of a functional.
#[derive(Debug, Clone)]
pub struct Hessian {
    reduced_functional: ReducedFunctional,
}

impl Hessian {
    /// Hessian of `functional` with respect to `controls`.
    pub fn new<T: Overloaded>(functional: &T, controls: &[Control]) -> AdjointResult<Self> {
        Ok(Self {
            reduced_functional: ReducedFunctional::new(functional, controls.to_vec())?,
        })
    }

    /// Hessian action of an existing reduced functional.
    pub fn from_reduced_functional(reduced_functional: ReducedFunctional) -> Self {
        Self { reduced_functional }
    }

    /// `H · directions`
    pub fn action(&self, directions: &[Value]) -> AdjointResult<Vec<Value>> {
        self.reduced_functional.hessian_vector_product(directions)
    }
}
