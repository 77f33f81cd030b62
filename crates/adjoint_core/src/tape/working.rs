//! Thread-local working tape and annotation state.
//!
//! Exactly one tape is the working tape at any time. It lives on top of a
//! per-thread stack so nested evaluations can install their own tape with
//! [`push_tape`] and get the previous one back when the returned guard is
//! dropped, including when the scope unwinds.
//!
//! Annotation (recording) is gated by a flag. [`stop_annotating`] clears it
//! for the lifetime of its guard and always restores the previous state.

use super::Tape;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

/// Shared handle to a tape.
pub type TapeHandle = Rc<RefCell<Tape>>;

thread_local! {
    static WORKING_TAPES: RefCell<Vec<TapeHandle>> = RefCell::new(vec![Tape::shared()]);
    static ANNOTATING: Cell<bool> = const { Cell::new(true) };
}

/// Returns the current working tape.
pub fn get_working_tape() -> TapeHandle {
    WORKING_TAPES.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.is_empty() {
            stack.push(Tape::shared());
        }
        Rc::clone(&stack[stack.len() - 1])
    })
}

/// Replaces the current working tape.
///
/// Inside a [`push_tape`] scope this replaces the pushed tape only; the
/// outer tape is still restored when the scope ends.
pub fn set_working_tape(tape: TapeHandle) {
    WORKING_TAPES.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last_mut() {
            Some(top) => *top = tape,
            None => stack.push(tape),
        }
    });
}

/// Installs `tape` as the working tape until the guard is dropped.
///
/// # Example
///
/// ```rust
/// use adjoint_core::tape::{get_working_tape, push_tape};
/// use adjoint_core::Tape;
/// use std::rc::Rc;
///
/// let outer = get_working_tape();
/// {
///     let inner = Tape::shared();
///     let _scope = push_tape(Rc::clone(&inner));
///     assert!(Rc::ptr_eq(&get_working_tape(), &inner));
/// }
/// assert!(Rc::ptr_eq(&get_working_tape(), &outer));
/// ```
#[must_use = "the previous tape is restored as soon as the guard is dropped"]
pub fn push_tape(tape: TapeHandle) -> TapeGuard {
    WORKING_TAPES.with(|stack| stack.borrow_mut().push(tape));
    TapeGuard {
        _not_send: PhantomData,
    }
}

/// Restores the previous working tape when dropped.
#[derive(Debug)]
pub struct TapeGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for TapeGuard {
    fn drop(&mut self) {
        WORKING_TAPES.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() > 1 {
                stack.pop();
            }
        });
    }
}

/// Whether operations are currently being recorded.
#[inline]
pub fn annotate_tape() -> bool {
    ANNOTATING.with(Cell::get)
}

/// Turns recording off until [`continue_annotation`] is called.
pub fn pause_annotation() {
    ANNOTATING.with(|flag| flag.set(false));
}

/// Turns recording back on.
pub fn continue_annotation() {
    ANNOTATING.with(|flag| flag.set(true));
}

/// Suppresses recording until the guard is dropped.
#[must_use = "annotation resumes as soon as the guard is dropped"]
pub fn stop_annotating() -> AnnotationGuard {
    let previous = ANNOTATING.with(|flag| flag.replace(false));
    AnnotationGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Restores the previous annotation state when dropped.
#[derive(Debug)]
pub struct AnnotationGuard {
    previous: bool,
    _not_send: PhantomData<*const ()>,
}

impl Drop for AnnotationGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        ANNOTATING.with(|flag| flag.set(previous));
    }
}

/// Runs `f` with recording suppressed.
pub fn no_annotations<R, F: FnOnce() -> R>(f: F) -> R {
    let _guard = stop_annotating();
    f()
}
