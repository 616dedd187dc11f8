//! Signal labels of the tracking block

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Names of the signals of a tracking block.
///
/// The block's inputs are `states`, then `desired_states`, then
/// `desired_inputs`. Its outputs are `outputs`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalLabels {
    pub states: Vec<String>,
    pub desired_states: Vec<String>,
    pub desired_inputs: Vec<String>,
    pub outputs: Vec<String>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SignalLabels {
    /// Labels for a plant with the given state and input names, where the
    /// desired signals carry a `d` suffix (`x` becomes `xd`).
    pub fn with_desired_suffix<S: AsRef<str>>(states: &[S], inputs: &[S]) -> Self {
        let suffixed = |names: &[S]| -> Vec<String> {
            names.iter().map(|n| format!("{}d", n.as_ref())).collect()
        };

        Self {
            states: states.iter().map(|s| s.as_ref().to_string()).collect(),
            desired_states: suffixed(states),
            desired_inputs: suffixed(inputs),
            outputs: inputs.iter().map(|s| s.as_ref().to_string()).collect()
        }
    }

    /// All input names in block order.
    pub fn inputs(&self) -> Vec<String> {
        self.states
            .iter()
            .chain(self.desired_states.iter())
            .chain(self.desired_inputs.iter())
            .cloned()
            .collect()
    }
}
