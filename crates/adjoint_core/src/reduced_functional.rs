//! A recorded computation viewed as a function of its controls.
//!
//! [`ReducedFunctional`] turns a tape into `Ĵ(m)`: evaluating it replays the
//! tape at new control values, and its derivative methods sweep the tape
//! at the most recent evaluation point.
//!
//! # Evaluation point
//!
//! Derivatives are only available at the point the functional was last
//! evaluated. Recording the tape counts as the first evaluation. Any later
//! change to the tape's checkpoints that did not go through this functional
//! (another functional replaying the same tape, a control update, a
//! placeholder relink) makes the point stale, and derivative queries fail
//! with [`AdjointError::StaleEvaluation`] until [`ReducedFunctional::call`]
//! is invoked again.

use crate::block_variable::BlockVariableId;
use crate::control::Control;
use crate::error::{AdjointError, AdjointResult};
use crate::overloaded::Overloaded;
use crate::tape::{get_working_tape, push_tape, stop_annotating, TapeHandle};
use crate::value::Value;
use tracing::debug;

/// Scalar functional of a list of controls, evaluated by tape replay.
#[derive(Debug, Clone)]
pub struct ReducedFunctional {
    tape: TapeHandle,
    functional: BlockVariableId,
    controls: Vec<Control>,
    scale: f64,
    evaluated_at: u64,
}

impl ReducedFunctional {
    /// Wraps `functional` recorded on the working tape.
    pub fn new<T: Overloaded>(functional: &T, controls: Vec<Control>) -> AdjointResult<Self> {
        Self::on_tape(get_working_tape(), functional.annotated_id()?, controls)
    }

    /// Wraps the scalar variable `functional` on `tape`.
    pub fn on_tape(
        tape: TapeHandle,
        functional: BlockVariableId,
        controls: Vec<Control>,
    ) -> AdjointResult<Self> {
        let evaluated_at = {
            let tape = tape.borrow();
            tape.saved_output(functional)?.to_scalar()?;
            for control in &controls {
                tape.saved_output(control.block_variable())?;
            }
            tape.revision()
        };
        debug!(functional = %functional, controls = controls.len(), "created reduced functional");
        Ok(Self {
            tape,
            functional,
            controls,
            scale: 1.0,
            evaluated_at,
        })
    }

    /// Multiplies the functional (and therefore every derivative) by
    /// `scale`.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Scale applied to the functional.
    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Controls in registration order.
    #[inline]
    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    /// Id of the functional variable.
    #[inline]
    pub fn functional(&self) -> BlockVariableId {
        self.functional
    }

    /// Tape this functional replays.
    #[inline]
    pub fn tape(&self) -> &TapeHandle {
        &self.tape
    }

    /// Functional value at the last evaluation point.
    pub fn value(&self) -> AdjointResult<f64> {
        let tape = self.tape.borrow();
        Ok(self.scale * tape.saved_output(self.functional)?.to_scalar()?)
    }

    /// Current control checkpoints, one per control.
    pub fn control_values(&self) -> AdjointResult<Vec<Value>> {
        let tape = self.tape.borrow();
        self.controls
            .iter()
            .map(|control| control.tape_value(&tape))
            .collect()
    }

    fn check_arity(&self, values: &[Value]) -> AdjointResult<()> {
        if values.len() != self.controls.len() {
            return Err(AdjointError::ControlCountMismatch {
                expected: self.controls.len(),
                actual: values.len(),
            });
        }
        let tape = self.tape.borrow();
        for (control, value) in self.controls.iter().zip(values) {
            tape.saved_output(control.block_variable())?
                .check_same_shape(value)?;
        }
        Ok(())
    }

    fn check_fresh(&self) -> AdjointResult<()> {
        if self.tape.borrow().revision() != self.evaluated_at {
            return Err(AdjointError::StaleEvaluation);
        }
        Ok(())
    }

    /// Evaluates the functional at `values`, one per control.
    ///
    /// Control checkpoints are only assigned once every value has been
    /// checked against its control's shape.
    pub fn call(&mut self, values: &[Value]) -> AdjointResult<f64> {
        self.check_arity(values)?;
        {
            let _scope = push_tape(self.tape.clone());
            let _annotation = stop_annotating();
            let mut tape = self.tape.borrow_mut();
            for (control, value) in self.controls.iter().zip(values) {
                control.update(&mut tape, value.clone())?;
            }
            tape.recompute()?;
            self.evaluated_at = tape.revision();
        }
        let value = self.value()?;
        debug!(value, "evaluated reduced functional");
        Ok(value)
    }

    /// Gradient of the functional with respect to every control at the last
    /// evaluation point.
    ///
    /// Controls the functional does not depend on get zeros.
    pub fn derivative(&self) -> AdjointResult<Vec<Value>> {
        self.check_fresh()?;
        let mut tape = self.tape.borrow_mut();
        tape.evaluate_adj(self.functional, Value::Scalar(self.scale))?;
        self.controls
            .iter()
            .map(|control| {
                let id = control.block_variable();
                match tape.adj_value(id)? {
                    Some(adj) => Ok(adj.clone()),
                    None => Ok(tape.saved_output(id)?.zeros_like()),
                }
            })
            .collect()
    }

    /// Hessian of the functional applied to `directions`, one per control,
    /// at the last evaluation point.
    pub fn hessian_vector_product(&self, directions: &[Value]) -> AdjointResult<Vec<Value>> {
        self.check_fresh()?;
        self.check_arity(directions)?;
        let mut tape = self.tape.borrow_mut();
        tape.reset_tlm_values();
        for (control, direction) in self.controls.iter().zip(directions) {
            tape.set_tlm_value(control.block_variable(), Some(direction.clone()))?;
        }
        tape.evaluate_hessian(self.functional, Value::Scalar(self.scale))?;
        self.controls
            .iter()
            .map(|control| {
                let id = control.block_variable();
                match tape.hessian_value(id)? {
                    Some(hess) => Ok(hess.clone()),
                    None => Ok(tape.saved_output(id)?.zeros_like()),
                }
            })
            .collect()
    }

    /// Removes blocks that do not connect the controls to the functional.
    /// Returns the number of blocks removed.
    pub fn optimize_tape(&self) -> AdjointResult<usize> {
        let controls: Vec<BlockVariableId> =
            self.controls.iter().map(Control::block_variable).collect();
        self.tape
            .borrow_mut()
            .optimize(&controls, &[self.functional])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::Tape;
    use crate::AdjFloat;
    use approx::assert_relative_eq;

    fn cubic() -> (TapeHandle, ReducedFunctional) {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let x = AdjFloat::new(2.0);
        let j = x * x * x;
        let rf = ReducedFunctional::new(&j, vec![Control::new(&x).unwrap()]).unwrap();
        (tape, rf)
    }

    #[test]
    fn test_call_and_derivative() {
        let (_tape, mut rf) = cubic();
        assert_relative_eq!(rf.value().unwrap(), 8.0);
        assert_relative_eq!(rf.derivative().unwrap()[0].to_scalar().unwrap(), 12.0);

        assert_relative_eq!(rf.call(&[Value::from(3.0)]).unwrap(), 27.0);
        assert_relative_eq!(rf.derivative().unwrap()[0].to_scalar().unwrap(), 27.0);
        assert_eq!(rf.control_values().unwrap(), vec![Value::Scalar(3.0)]);
    }

    #[test]
    fn test_hessian_vector_product() {
        let (_tape, mut rf) = cubic();
        rf.call(&[Value::from(1.5)]).unwrap();
        let hv = rf.hessian_vector_product(&[Value::from(2.0)]).unwrap();
        assert_relative_eq!(hv[0].to_scalar().unwrap(), 6.0 * 1.5 * 2.0);
    }

    #[test]
    fn test_scale() {
        let (_tape, rf) = cubic();
        let rf = rf.with_scale(-0.5);
        assert_relative_eq!(rf.value().unwrap(), -4.0);
        assert_relative_eq!(rf.derivative().unwrap()[0].to_scalar().unwrap(), -6.0);
        let hv = rf.hessian_vector_product(&[Value::from(1.0)]).unwrap();
        assert_relative_eq!(hv[0].to_scalar().unwrap(), -6.0);
    }

    #[test]
    fn test_control_count_checked() {
        let (_tape, mut rf) = cubic();
        assert_eq!(
            rf.call(&[]).unwrap_err(),
            AdjointError::ControlCountMismatch {
                expected: 1,
                actual: 0
            }
        );
        assert!(rf.call(&[Value::from(vec![1.0, 2.0])]).is_err());
        assert_relative_eq!(rf.value().unwrap(), 8.0);
    }

    #[test]
    fn test_stale_after_foreign_replay() {
        let (tape, mut rf) = cubic();
        let other = rf.clone();
        rf.call(&[Value::from(3.0)]).unwrap();
        assert_eq!(other.derivative().unwrap_err(), AdjointError::StaleEvaluation);
        assert!(other.hessian_vector_product(&[Value::from(1.0)]).is_err());

        tape.borrow_mut().recompute().unwrap();
        assert_eq!(rf.derivative().unwrap_err(), AdjointError::StaleEvaluation);
        rf.call(&[Value::from(3.0)]).unwrap();
        assert!(rf.derivative().is_ok());
    }

    #[test]
    fn test_independent_control_gets_zero() {
        let tape = Tape::shared();
        let _scope = push_tape(tape.clone());
        let x = AdjFloat::new(2.0);
        let unused = AdjFloat::new(5.0);
        let j = x.sin();
        let rf = ReducedFunctional::new(
            &j,
            vec![Control::new(&x).unwrap(), Control::new(&unused).unwrap()],
        )
        .unwrap();
        let dj = rf.derivative().unwrap();
        assert_relative_eq!(dj[0].to_scalar().unwrap(), 2.0_f64.cos());
        assert_eq!(dj[1], Value::Scalar(0.0));
    }

    #[test]
    fn test_functional_must_be_scalar() {
        let _scope = push_tape(Tape::shared());
        let v = crate::AdjVector::new(vec![1.0, 2.0]);
        assert_eq!(
            ReducedFunctional::new(&v, vec![]).unwrap_err(),
            AdjointError::DimensionMismatch {
                expected: 1,
                actual: 2
            }
        );
    }
}
