//! # Input/output blocks
//!
//! A block is a named unit with an ordered list of input, output and state
//! signals. Blocks are wired together by signal name in
//! [`crate::interconnect`], so the names declared in a block's
//! [`BlockSchema`] are the only thing the wiring relies on.
//!
//! Continuous blocks provide the derivative of their state, memoryless blocks
//! declare no states.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::HashSet;
use std::fmt;
use nalgebra::DVector;
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The ordered signal names of a block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSchema {
    inputs: Vec<String>,
    outputs: Vec<String>,
    states: Vec<String>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The kind of a signal within a schema.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SignalKind {
    Input,
    Output,
    State
}

/// Errors associated with blocks and their schemas.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("Signal names must not be empty ({0} list)")]
    EmptySignalName(SignalKind),

    #[error("{kind} signal \"{name}\" is declared more than once")]
    DuplicateSignal {
        kind: SignalKind,
        name: String
    },

    #[error("Block \"{block}\" expected {expected} {kind} values, found {found}")]
    SignalCount {
        block: String,
        kind: SignalKind,
        expected: usize,
        found: usize
    },

    #[error("Block \"{block}\" failed to evaluate: {reason}")]
    EvalFailed {
        block: String,
        reason: String
    }
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A named input/output block.
///
/// Implementors must return vectors of exactly the lengths declared in
/// their schema.
pub trait Block: Send + Sync {
    /// The name of the block, used to prefix its states in a composite.
    fn name(&self) -> &str;

    /// The block's signal schema.
    fn schema(&self) -> &BlockSchema;

    /// True if the outputs depend on the inputs at the same instant.
    fn direct_feedthrough(&self) -> bool {
        true
    }

    /// The time derivative of the block state.
    fn derivative(
        &self,
        _t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema().check(self.name(), x, u)?;
        Ok(DVector::zeros(0))
    }

    /// The block outputs.
    fn output(
        &self,
        t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BlockSchema {
    /// Create a new schema, checking that each list has unique, non-empty
    /// names.
    pub fn new<I, O, S>(inputs: I, outputs: O, states: S) -> Result<Self, BlockError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>
    {
        let inputs = collect_unique(inputs, SignalKind::Input)?;
        let outputs = collect_unique(outputs, SignalKind::Output)?;
        let states = collect_unique(states, SignalKind::State)?;

        Ok(Self { inputs, outputs, states })
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Index of the named input.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s == name)
    }

    /// Index of the named output.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s == name)
    }

    /// Check that state and input vectors have the declared lengths.
    pub fn check(
        &self,
        block: &str,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<(), BlockError> {
        check_count(block, SignalKind::State, self.num_states(), x.len())?;
        check_count(block, SignalKind::Input, self.num_inputs(), u.len())
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Input => write!(f, "input"),
            SignalKind::Output => write!(f, "output"),
            SignalKind::State => write!(f, "state")
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check a signal count against the expected value.
pub fn check_count(
    block: &str,
    kind: SignalKind,
    expected: usize,
    found: usize
) -> Result<(), BlockError> {
    if expected != found {
        return Err(BlockError::SignalCount {
            block: block.to_string(),
            kind,
            expected,
            found
        })
    }

    Ok(())
}

fn collect_unique<I>(names: I, kind: SignalKind) -> Result<Vec<String>, BlockError>
where
    I: IntoIterator,
    I::Item: Into<String>
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    {
        let mut seen = HashSet::new();

        for name in names.iter() {
            if name.is_empty() {
                return Err(BlockError::EmptySignalName(kind))
            }
            if !seen.insert(name.as_str()) {
                return Err(BlockError::DuplicateSignal {
                    kind,
                    name: name.clone()
                })
            }
        }
    }

    Ok(names)
}
