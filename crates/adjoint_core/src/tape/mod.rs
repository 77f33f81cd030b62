//! The recording structure and its graph traversals.
//!
//! A [`Tape`] owns an arena of [`BlockVariable`]s addressed by
//! [`BlockVariableId`] and the ordered list of recorded [`Block`]s.
//! Recording order is execution order and therefore a valid topological
//! order, so every sweep simply walks the block list forwards or
//! backwards.
//!
//! # Sweeps
//!
//! - [`Tape::recompute`]: forward replay writing output checkpoints
//! - [`Tape::evaluate_adj`]: reverse sweep accumulating adjoints
//! - [`Tape::evaluate_tlm`]: forward sweep propagating tangent-linear values
//! - [`Tape::evaluate_hessian`]: tangent-linear sweep followed by a reverse
//!   sweep accumulating first- and second-order adjoints
//!
//! # Placeholders
//!
//! Placeholder entries never hold a checkpoint of their own. Reads are
//! redirected through the tape's link map to the linked variable, or to the
//! variable the placeholder was created from when unlinked. Sensitivities
//! reaching an unlinked placeholder are forwarded to its origin; a linked
//! placeholder behaves as an independent input and keeps them.

mod working;

pub use working::{
    annotate_tape, continue_annotation, get_working_tape, no_annotations, pause_annotation,
    push_tape, set_working_tape, stop_annotating, AnnotationGuard, TapeGuard, TapeHandle,
};

use crate::block::{Block, BlockState};
use crate::block_variable::{BlockVariable, BlockVariableId, VariableKind};
use crate::error::{AdjointError, AdjointResult};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

static NEXT_TAPE_ID: AtomicU64 = AtomicU64::new(1);

fn next_tape_id() -> u64 {
    NEXT_TAPE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Ordered container of blocks and the variables they reference.
#[derive(Debug)]
pub struct Tape {
    id: u64,
    blocks: Vec<Box<dyn Block>>,
    variables: Vec<BlockVariable>,
    links: HashMap<BlockVariableId, BlockVariableId>,
    revision: u64,
    recording_error: Option<AdjointError>,
}

impl Default for Tape {
    fn default() -> Self {
        Self {
            id: next_tape_id(),
            blocks: Vec::new(),
            variables: Vec::new(),
            links: HashMap::new(),
            revision: 0,
            recording_error: None,
        }
    }
}

impl Tape {
    /// Creates an empty tape with a fresh identity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tape behind a shared handle.
    pub fn shared() -> TapeHandle {
        Rc::new(RefCell::new(Self::new()))
    }

    // =========================================================================
    // Recording
    // =========================================================================

    /// Adds a variable holding `value` and returns its id.
    pub fn create_block_variable(&mut self, value: Value) -> BlockVariableId {
        let id = BlockVariableId::new(self.id, self.variables.len());
        self.variables.push(BlockVariable::new(value));
        id
    }

    /// Adds a placeholder standing in for `origin`.
    pub fn create_placeholder(&mut self, origin: BlockVariableId) -> AdjointResult<BlockVariableId> {
        self.block_variable(origin)?;
        let id = BlockVariableId::new(self.id, self.variables.len());
        self.variables.push(BlockVariable::placeholder(origin));
        Ok(id)
    }

    /// Appends a block to the tape.
    ///
    /// Does nothing while annotation is suppressed. Fails if the block
    /// references unknown variables or lists a placeholder as an output.
    pub fn add_block<B: Block + 'static>(&mut self, block: B) -> AdjointResult<()> {
        self.add_boxed_block(Box::new(block))
    }

    /// Boxed variant of [`Tape::add_block`].
    pub fn add_boxed_block(&mut self, block: Box<dyn Block>) -> AdjointResult<()> {
        if !annotate_tape() {
            return Ok(());
        }
        for id in block.dependencies() {
            self.block_variable(*id)?;
        }
        for id in block.outputs() {
            if self.block_variable(*id)?.is_placeholder() {
                return Err(AdjointError::PlaceholderAsOutput(*id));
            }
        }

        let index = self.blocks.len();
        for id in block.outputs() {
            self.variables[id.index()].creator = Some(index);
        }
        trace!(block = block.name(), index, "recorded block");
        self.blocks.push(block);
        Ok(())
    }

    /// Drops every variable allocated after the first `len`.
    ///
    /// Used to undo a recording that failed before its block was added.
    pub(crate) fn truncate_variables(&mut self, len: usize) {
        self.variables.truncate(len);
    }

    /// Remembers a recording failure; later sweeps report it.
    ///
    /// Only the first failure is kept.
    pub(crate) fn record_failure(&mut self, err: AdjointError) {
        warn!(%err, "operation not recorded");
        if self.recording_error.is_none() {
            self.recording_error = Some(err);
        }
    }

    /// First error raised while recording an overloaded operation, if any.
    ///
    /// A tape with a recording error is missing an operation, so every
    /// sweep fails with this error until the tape is cleared.
    pub fn recording_error(&self) -> Option<&AdjointError> {
        self.recording_error.as_ref()
    }

    fn check_recording(&self) -> AdjointResult<()> {
        match &self.recording_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Discards all blocks and variables.
    ///
    /// The tape takes a fresh identity, so ids handed out before the clear
    /// no longer resolve on it.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.variables.clear();
        self.links.clear();
        self.recording_error = None;
        self.id = next_tape_id();
        self.revision += 1;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of recorded blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of variables in the arena, placeholders included.
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Recorded blocks in execution order.
    pub fn blocks(&self) -> impl Iterator<Item = &dyn Block> {
        self.blocks.iter().map(|b| &**b)
    }

    /// Identity stamped into every id this tape hands out.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Counter bumped whenever checkpoints may have changed.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Looks up a variable.
    ///
    /// Ids created by another tape, or by this tape before its last
    /// [`Tape::clear`], are unknown.
    pub fn block_variable(&self, id: BlockVariableId) -> AdjointResult<&BlockVariable> {
        if id.tape() != self.id {
            return Err(AdjointError::UnknownVariable(id));
        }
        self.variables
            .get(id.index())
            .ok_or(AdjointError::UnknownVariable(id))
    }

    fn block_variable_mut(&mut self, id: BlockVariableId) -> AdjointResult<&mut BlockVariable> {
        if id.tape() != self.id {
            return Err(AdjointError::UnknownVariable(id));
        }
        self.variables
            .get_mut(id.index())
            .ok_or(AdjointError::UnknownVariable(id))
    }

    /// Checkpoint of `id`, read through placeholder links.
    pub fn saved_output(&self, id: BlockVariableId) -> AdjointResult<&Value> {
        let source = self.resolve(id)?;
        self.variables[source.index()]
            .checkpoint
            .as_ref()
            .ok_or(AdjointError::MissingCheckpoint(id))
    }

    /// Overwrites the checkpoint of `id`.
    ///
    /// Placeholders hold no checkpoint. Writing to one fails with
    /// [`AdjointError::PlaceholderCheckpoint`]; set the value through a link.
    pub fn set_saved_output(&mut self, id: BlockVariableId, value: Value) -> AdjointResult<()> {
        let bv = self.block_variable_mut(id)?;
        if bv.is_placeholder() {
            return Err(AdjointError::PlaceholderCheckpoint(id));
        }
        match bv.checkpoint.as_mut() {
            Some(existing) => existing.assign(&value)?,
            None => bv.checkpoint = Some(value),
        }
        self.revision += 1;
        Ok(())
    }

    /// Adjoint accumulated for `id` by the last reverse sweep.
    pub fn adj_value(&self, id: BlockVariableId) -> AdjointResult<Option<&Value>> {
        let target = self.sensitivity_target(id)?;
        Ok(self.variables[target.index()].adj_value())
    }

    /// Tangent-linear value of `id`.
    pub fn tlm_value(&self, id: BlockVariableId) -> AdjointResult<Option<&Value>> {
        let target = self.sensitivity_target(id)?;
        Ok(self.variables[target.index()].tlm_value())
    }

    /// Second-order adjoint of `id` from the last Hessian sweep.
    pub fn hessian_value(&self, id: BlockVariableId) -> AdjointResult<Option<&Value>> {
        let target = self.sensitivity_target(id)?;
        Ok(self.variables[target.index()].hessian_value())
    }

    /// Seeds (or clears) the tangent-linear value of `id`.
    pub fn set_tlm_value(&mut self, id: BlockVariableId, value: Option<Value>) -> AdjointResult<()> {
        let target = self.sensitivity_target(id)?;
        if let Some(seed) = value.as_ref() {
            self.saved_output(target)?.check_same_shape(seed)?;
        }
        self.variables[target.index()].tlm_value = value;
        Ok(())
    }

    /// Flags `id` as a control. Control checkpoints are never overwritten by
    /// replay and control tangent-linear seeds are never overwritten by the
    /// forward sweep.
    ///
    /// A placeholder cannot be a control: it has no checkpoint to assign.
    pub fn mark_control(&mut self, id: BlockVariableId) -> AdjointResult<()> {
        let bv = self.block_variable_mut(id)?;
        if bv.is_placeholder() {
            return Err(AdjointError::PlaceholderCheckpoint(id));
        }
        bv.is_control = true;
        Ok(())
    }

    // =========================================================================
    // Placeholders
    // =========================================================================

    /// Redirects checkpoint reads of `placeholder` to `target`.
    pub fn link_placeholder(
        &mut self,
        placeholder: BlockVariableId,
        target: BlockVariableId,
    ) -> AdjointResult<()> {
        if !self.block_variable(placeholder)?.is_placeholder() {
            return Err(AdjointError::NotAPlaceholder(placeholder));
        }
        self.block_variable(target)?;
        if self.resolve_linked(target, placeholder)? {
            return Err(AdjointError::PlaceholderCycle(placeholder));
        }
        self.links.insert(placeholder, target);
        self.revision += 1;
        Ok(())
    }

    /// Removes the link of `placeholder`, reading its origin again.
    pub fn unlink_placeholder(&mut self, placeholder: BlockVariableId) -> AdjointResult<()> {
        if !self.block_variable(placeholder)?.is_placeholder() {
            return Err(AdjointError::NotAPlaceholder(placeholder));
        }
        if self.links.remove(&placeholder).is_some() {
            self.revision += 1;
        }
        Ok(())
    }

    /// Variable `placeholder` is currently linked to.
    pub fn linked_variable(&self, placeholder: BlockVariableId) -> Option<BlockVariableId> {
        self.links.get(&placeholder).copied()
    }

    /// Whether resolving `start` passes through `needle`.
    fn resolve_linked(&self, start: BlockVariableId, needle: BlockVariableId) -> AdjointResult<bool> {
        let mut current = start;
        for _ in 0..=self.variables.len() {
            if current == needle {
                return Ok(true);
            }
            match self.block_variable(current)?.kind() {
                VariableKind::Regular => return Ok(false),
                VariableKind::Placeholder { origin } => {
                    current = self.links.get(&current).copied().unwrap_or(origin);
                }
            }
        }
        Ok(true)
    }

    /// Variable whose checkpoint `id` reads.
    fn resolve(&self, id: BlockVariableId) -> AdjointResult<BlockVariableId> {
        let mut current = id;
        for _ in 0..=self.variables.len() {
            match self.block_variable(current)?.kind() {
                VariableKind::Regular => return Ok(current),
                VariableKind::Placeholder { origin } => {
                    current = self.links.get(&current).copied().unwrap_or(origin);
                }
            }
        }
        Err(AdjointError::MissingCheckpoint(id))
    }

    /// Every variable whose checkpoint a read of `id` may pass through:
    /// `id` itself, then each link target or origin down to a regular
    /// variable.
    fn read_chain(&self, id: BlockVariableId) -> AdjointResult<Vec<BlockVariableId>> {
        let mut chain = vec![id];
        let mut current = id;
        for _ in 0..=self.variables.len() {
            match self.block_variable(current)?.kind() {
                VariableKind::Regular => return Ok(chain),
                VariableKind::Placeholder { origin } => {
                    current = self.links.get(&current).copied().unwrap_or(origin);
                    chain.push(current);
                }
            }
        }
        Err(AdjointError::PlaceholderCycle(id))
    }

    /// Variable that receives sensitivities addressed to `id`.
    fn sensitivity_target(&self, id: BlockVariableId) -> AdjointResult<BlockVariableId> {
        let mut current = id;
        for _ in 0..=self.variables.len() {
            match self.block_variable(current)?.kind() {
                VariableKind::Placeholder { origin } if !self.links.contains_key(&current) => {
                    current = origin;
                }
                _ => return Ok(current),
            }
        }
        Ok(id)
    }

    // =========================================================================
    // Resets
    // =========================================================================

    /// Clears adjoint, tangent-linear and Hessian slots of every variable.
    pub fn reset_variables(&mut self) {
        for bv in &mut self.variables {
            bv.reset_variables();
        }
    }

    /// Clears every adjoint slot.
    pub fn reset_adjoints(&mut self) {
        for bv in &mut self.variables {
            bv.adj_value = None;
        }
    }

    /// Clears every tangent-linear slot.
    pub fn reset_tlm_values(&mut self) {
        for bv in &mut self.variables {
            bv.tlm_value = None;
        }
    }

    /// Clears every Hessian slot.
    pub fn reset_hessian_values(&mut self) {
        for bv in &mut self.variables {
            bv.hessian_value = None;
        }
    }

    // =========================================================================
    // Sweeps
    // =========================================================================

    fn gather_inputs(&self, ids: &[BlockVariableId]) -> AdjointResult<Vec<Value>> {
        ids.iter().map(|id| self.saved_output(*id).cloned()).collect()
    }

    fn gather_tlm(&self, ids: &[BlockVariableId]) -> AdjointResult<Vec<Option<Value>>> {
        ids.iter()
            .map(|id| Ok(self.tlm_value(*id)?.cloned()))
            .collect()
    }

    fn gather_targets(&self, ids: &[BlockVariableId]) -> AdjointResult<Vec<BlockVariableId>> {
        ids.iter().map(|id| self.sensitivity_target(*id)).collect()
    }

    /// Output slots of a block with absent entries replaced by zeros.
    /// Returns `None` when every slot is absent.
    fn filled_slots(slots: Vec<Option<Value>>, outputs: &[Value]) -> Option<Vec<Value>> {
        if slots.iter().all(Option::is_none) {
            return None;
        }
        Some(
            slots
                .into_iter()
                .zip(outputs)
                .map(|(slot, out)| slot.unwrap_or_else(|| out.zeros_like()))
                .collect(),
        )
    }

    /// Replays every block, refreshing all output checkpoints.
    pub fn recompute(&mut self) -> AdjointResult<()> {
        self.recompute_from(0)
    }

    /// Replays blocks starting at index `start`.
    ///
    /// Outputs flagged as controls keep their checkpoint.
    pub fn recompute_from(&mut self, start: usize) -> AdjointResult<()> {
        if start > self.blocks.len() {
            return Err(AdjointError::BlockIndexOutOfRange {
                index: start,
                len: self.blocks.len(),
            });
        }
        self.check_recording()?;
        let _annotation = stop_annotating();
        debug!(start, blocks = self.blocks.len(), "recomputing tape");

        for index in start..self.blocks.len() {
            let block = &self.blocks[index];
            let inputs = self.gather_inputs(block.dependencies())?;
            let values = block.recompute(&inputs)?;
            let outputs = block.outputs().to_vec();
            if values.len() != outputs.len() {
                return Err(AdjointError::DimensionMismatch {
                    expected: outputs.len(),
                    actual: values.len(),
                });
            }
            for (id, value) in outputs.into_iter().zip(values) {
                let bv = &mut self.variables[id.index()];
                if !bv.is_control {
                    bv.checkpoint = Some(value);
                }
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// Reverse sweep seeded at `seed` with `seed_value`.
    ///
    /// Clears all adjoints first. Each block whose outputs carry an adjoint
    /// adds its contribution into every dependency, so variables consumed
    /// by several blocks receive the sum of all contributions.
    pub fn evaluate_adj(&mut self, seed: BlockVariableId, seed_value: Value) -> AdjointResult<()> {
        self.check_recording()?;
        let _annotation = stop_annotating();
        self.reset_adjoints();
        self.seed_adjoint(seed, seed_value)?;
        debug!(seed = %seed, blocks = self.blocks.len(), "evaluating adjoint");

        for index in (0..self.blocks.len()).rev() {
            let block = &self.blocks[index];
            let adj_slots: Vec<Option<Value>> = block
                .outputs()
                .iter()
                .map(|id| self.variables[id.index()].adj_value.clone())
                .collect();
            let outputs = self.gather_inputs(block.outputs())?;
            let Some(adj_outputs) = Self::filled_slots(adj_slots, &outputs) else {
                continue;
            };

            let inputs = self.gather_inputs(block.dependencies())?;
            let tlm_inputs = vec![None; inputs.len()];
            let state = BlockState {
                inputs: &inputs,
                outputs: &outputs,
                tlm_inputs: &tlm_inputs,
            };
            let targets = self.gather_targets(block.dependencies())?;
            let contributions = (0..targets.len())
                .map(|dep| block.adjoint_contribution(&state, dep, &adj_outputs))
                .collect::<AdjointResult<Vec<_>>>()?;
            trace!(block = block.name(), index, "adjoint contribution");

            for (target, value) in targets.into_iter().zip(contributions) {
                self.variables[target.index()].add_adj_output(value)?;
            }
        }
        Ok(())
    }

    fn seed_adjoint(&mut self, seed: BlockVariableId, seed_value: Value) -> AdjointResult<()> {
        let target = self.sensitivity_target(seed)?;
        self.saved_output(target)?.check_same_shape(&seed_value)?;
        self.variables[target.index()].adj_value = Some(seed_value);
        Ok(())
    }

    /// Forward sweep propagating the seeded tangent-linear values.
    ///
    /// Each non-control output gets the sum of the per-dependency
    /// contributions over dependencies with a defined tangent-linear value;
    /// outputs with no such dependency are left undefined.
    pub fn evaluate_tlm(&mut self) -> AdjointResult<()> {
        self.check_recording()?;
        let _annotation = stop_annotating();
        debug!(blocks = self.blocks.len(), "evaluating tangent linear model");

        for index in 0..self.blocks.len() {
            let block = &self.blocks[index];
            let tlm_inputs = self.gather_tlm(block.dependencies())?;
            let output_ids = block.outputs().to_vec();

            let mut results = Vec::with_capacity(output_ids.len());
            if tlm_inputs.iter().any(Option::is_some) {
                let inputs = self.gather_inputs(block.dependencies())?;
                let outputs = self.gather_inputs(&output_ids)?;
                let state = BlockState {
                    inputs: &inputs,
                    outputs: &outputs,
                    tlm_inputs: &tlm_inputs,
                };
                for out in 0..output_ids.len() {
                    let mut total: Option<Value> = None;
                    for (dep, tlm) in tlm_inputs.iter().enumerate() {
                        let Some(tlm) = tlm else { continue };
                        let term = block.tangent_linear_contribution(&state, out, dep, tlm)?;
                        match total.as_mut() {
                            Some(acc) => acc.add_assign(&term)?,
                            None => total = Some(term),
                        }
                    }
                    results.push(total);
                }
            } else {
                results.resize(output_ids.len(), None);
            }

            for (id, tlm) in output_ids.into_iter().zip(results) {
                let bv = &mut self.variables[id.index()];
                if !bv.is_control {
                    bv.tlm_value = tlm;
                }
            }
        }
        Ok(())
    }

    /// Second-order sweep realising a Hessian-vector product.
    ///
    /// Runs [`Tape::evaluate_tlm`] with the currently seeded directions, then
    /// one reverse sweep that accumulates first-order adjoints and, for each
    /// dependency, `adjoint_contribution(hessian outputs)` plus the block's
    /// second-order term into the Hessian slot.
    pub fn evaluate_hessian(&mut self, seed: BlockVariableId, seed_value: Value) -> AdjointResult<()> {
        self.evaluate_tlm()?;

        let _annotation = stop_annotating();
        self.reset_adjoints();
        self.reset_hessian_values();
        self.seed_adjoint(seed, seed_value)?;
        debug!(seed = %seed, blocks = self.blocks.len(), "evaluating hessian");

        for index in (0..self.blocks.len()).rev() {
            let block = &self.blocks[index];
            let outputs = self.gather_inputs(block.outputs())?;
            let adj_slots: Vec<Option<Value>> = block
                .outputs()
                .iter()
                .map(|id| self.variables[id.index()].adj_value.clone())
                .collect();
            let hess_slots: Vec<Option<Value>> = block
                .outputs()
                .iter()
                .map(|id| self.variables[id.index()].hessian_value.clone())
                .collect();
            let adj_outputs = Self::filled_slots(adj_slots, &outputs);
            let hess_outputs = Self::filled_slots(hess_slots, &outputs);
            if adj_outputs.is_none() && hess_outputs.is_none() {
                continue;
            }

            let inputs = self.gather_inputs(block.dependencies())?;
            let tlm_inputs = self.gather_tlm(block.dependencies())?;
            let any_tlm = tlm_inputs.iter().any(Option::is_some);
            let state = BlockState {
                inputs: &inputs,
                outputs: &outputs,
                tlm_inputs: &tlm_inputs,
            };
            let targets = self.gather_targets(block.dependencies())?;

            let mut adj_terms = Vec::with_capacity(targets.len());
            let mut hess_terms = Vec::with_capacity(targets.len());
            for dep in 0..targets.len() {
                let adj_term = match adj_outputs.as_ref() {
                    Some(adj) => Some(block.adjoint_contribution(&state, dep, adj)?),
                    None => None,
                };
                let mut hess_term = match hess_outputs.as_ref() {
                    Some(hess) => Some(block.adjoint_contribution(&state, dep, hess)?),
                    None => None,
                };
                if let (Some(adj), true) = (adj_outputs.as_ref(), any_tlm) {
                    let second = block.hessian_contribution(&state, dep, adj)?;
                    match hess_term.as_mut() {
                        Some(acc) => acc.add_assign(&second)?,
                        None => hess_term = Some(second),
                    }
                }
                adj_terms.push(adj_term);
                hess_terms.push(hess_term);
            }
            trace!(block = block.name(), index, "hessian contribution");

            for ((target, adj), hess) in targets.into_iter().zip(adj_terms).zip(hess_terms) {
                let bv = &mut self.variables[target.index()];
                if let Some(adj) = adj {
                    bv.add_adj_output(adj)?;
                }
                if let Some(hess) = hess {
                    bv.add_hessian_output(hess)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Optimisation
    // =========================================================================

    /// Drops blocks that lie on no path from `controls` to `functionals`.
    ///
    /// Paths follow placeholder links in both directions: a block reading a
    /// placeholder depends on whatever the placeholder currently reads.
    /// Returns the number of blocks removed. Checkpoints of variables
    /// produced by removed blocks are kept, so a later replay still sees
    /// their last values.
    pub fn optimize(
        &mut self,
        controls: &[BlockVariableId],
        functionals: &[BlockVariableId],
    ) -> AdjointResult<usize> {
        self.check_recording()?;
        let mut reached: HashSet<BlockVariableId> = HashSet::new();
        for id in controls {
            reached.insert(*id);
            reached.insert(self.sensitivity_target(*id)?);
        }
        let chains = self
            .blocks
            .iter()
            .map(|block| {
                let mut chain = Vec::new();
                for id in block.dependencies() {
                    chain.extend(self.read_chain(*id)?);
                }
                Ok(chain)
            })
            .collect::<AdjointResult<Vec<_>>>()?;

        // A link may point at a variable produced later on the tape, so both
        // passes repeat until nothing changes.
        let mut forward = vec![false; self.blocks.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (index, block) in self.blocks.iter().enumerate() {
                if !forward[index] && chains[index].iter().any(|id| reached.contains(id)) {
                    forward[index] = true;
                    reached.extend(block.outputs().iter().copied());
                    changed = true;
                }
            }
        }

        let mut needed: HashSet<BlockVariableId> = HashSet::new();
        for id in functionals {
            needed.extend(self.read_chain(*id)?);
        }
        let mut visited = vec![false; self.blocks.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for index in (0..self.blocks.len()).rev() {
                let outputs = self.blocks[index].outputs();
                if !visited[index] && outputs.iter().any(|id| needed.contains(id)) {
                    visited[index] = true;
                    needed.extend(chains[index].iter().copied());
                    changed = true;
                }
            }
        }
        let keep: Vec<bool> = forward.iter().zip(&visited).map(|(f, v)| *f && *v).collect();

        let before = self.blocks.len();
        let blocks = std::mem::take(&mut self.blocks);
        for bv in &mut self.variables {
            bv.creator = None;
        }
        for (block, kept) in blocks.into_iter().zip(keep) {
            if kept {
                let index = self.blocks.len();
                for id in block.outputs() {
                    self.variables[id.index()].creator = Some(index);
                }
                self.blocks.push(block);
            }
        }
        let removed = before - self.blocks.len();
        debug!(removed, kept = self.blocks.len(), "optimized tape");
        Ok(removed)
    }
}
