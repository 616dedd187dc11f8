//! # Block interconnection
//!
//! Wires a set of blocks into a single composite block by signal name. Each
//! block input is connected to the block output of the same name, or to the
//! declared external input of that name. Any other input is a wiring error.
//!
//! All wiring is resolved when the interconnect is built, so evaluation only
//! gathers and scatters vectors by precomputed index.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::{HashMap, HashSet, VecDeque};
use log::{debug, info};
use nalgebra::DVector;

// Internal
use crate::block::{check_count, Block, BlockError, BlockSchema, SignalKind};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A composite block made of named, wired blocks.
pub struct Interconnect {
    name: String,
    blocks: Vec<Box<dyn Block>>,
    schema: BlockSchema,

    /// Start index of each block's states in the composite state.
    state_offsets: Vec<usize>,

    /// Source of each input of each block.
    input_sources: Vec<Vec<Source>>,

    /// Block evaluation order for outputs.
    order: Vec<usize>,

    /// Block and output index of each composite output.
    output_sources: Vec<(usize, usize)>,

    direct_feedthrough: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where a block input comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    Block {
        block: usize,
        output: usize
    },
    External(usize)
}

/// Errors which can occur while building an interconnect.
#[derive(Debug, thiserror::Error)]
pub enum InterconnectError {
    #[error("An interconnect must contain at least one block")]
    NoBlocks,

    #[error("Block name \"{0}\" is used more than once")]
    DuplicateBlock(String),

    #[error("Signal \"{signal}\" is an output of both \"{first}\" and \"{second}\"")]
    AmbiguousSignal {
        signal: String,
        first: String,
        second: String
    },

    #[error("Requested output \"{0}\" is not an output of any block")]
    UnknownOutput(String),

    #[error("Input \"{signal}\" of \"{block}\" is neither a block output nor a declared external input")]
    UnconnectedInput {
        signal: String,
        block: String
    },

    #[error("External input \"{signal}\" is also an output of \"{block}\"")]
    ProducedInput {
        signal: String,
        block: String
    },

    #[error("Algebraic loop between blocks {0:?}")]
    AlgebraicLoop(Vec<String>),

    #[error("Invalid composite schema: {0}")]
    Schema(#[from] BlockError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Interconnect {
    /// Wire the blocks together, exposing the named block outputs.
    ///
    /// `inputs` lists the external inputs of the composite, in order. Every
    /// block input must be either a block output or one of these.
    pub fn new<I: AsRef<str>, S: AsRef<str>>(
        name: &str,
        blocks: Vec<Box<dyn Block>>,
        inputs: &[I],
        outputs: &[S]
    ) -> Result<Self, InterconnectError> {
        if blocks.is_empty() {
            return Err(InterconnectError::NoBlocks)
        }

        // ---- BLOCK NAMES ----

        let mut names = HashSet::new();
        for b in blocks.iter() {
            if !names.insert(b.name()) {
                return Err(InterconnectError::DuplicateBlock(b.name().to_string()))
            }
        }

        // ---- SIGNAL PRODUCERS ----

        let mut producers: HashMap<&str, (usize, usize)> = HashMap::new();
        for (bi, b) in blocks.iter().enumerate() {
            for (oi, signal) in b.schema().outputs().iter().enumerate() {
                if let Some(&(first, _)) = producers.get(signal.as_str()) {
                    return Err(InterconnectError::AmbiguousSignal {
                        signal: signal.clone(),
                        first: blocks[first].name().to_string(),
                        second: b.name().to_string()
                    })
                }
                producers.insert(signal.as_str(), (bi, oi));
            }
        }

        // ---- INPUT RESOLUTION ----

        let external: Vec<String> = inputs.iter().map(|i| i.as_ref().to_string()).collect();
        for signal in external.iter() {
            if let Some(&(block, _)) = producers.get(signal.as_str()) {
                return Err(InterconnectError::ProducedInput {
                    signal: signal.clone(),
                    block: blocks[block].name().to_string()
                })
            }
        }

        let mut input_sources = Vec::with_capacity(blocks.len());

        for b in blocks.iter() {
            let sources = b.schema()
                .inputs()
                .iter()
                .map(|signal| match producers.get(signal.as_str()) {
                    Some(&(block, output)) => Ok(Source::Block { block, output }),
                    None => external
                        .iter()
                        .position(|e| e == signal)
                        .map(Source::External)
                        .ok_or_else(|| InterconnectError::UnconnectedInput {
                            signal: signal.clone(),
                            block: b.name().to_string()
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            input_sources.push(sources);
        }

        // ---- OUTPUTS ----

        let output_sources = outputs
            .iter()
            .map(|o| producers
                .get(o.as_ref())
                .copied()
                .ok_or_else(|| InterconnectError::UnknownOutput(o.as_ref().to_string()))
            )
            .collect::<Result<Vec<_>, _>>()?;

        // ---- STATES ----

        let mut state_offsets = Vec::with_capacity(blocks.len());
        let mut states = Vec::new();
        for b in blocks.iter() {
            state_offsets.push(states.len());
            states.extend(
                b.schema().states().iter().map(|s| format!("{}.{}", b.name(), s))
            );
        }

        // ---- ORDER ----

        let order = eval_order(&blocks, &input_sources)?;

        let direct_feedthrough = !external.is_empty()
            && blocks.iter().any(|b| b.direct_feedthrough());

        let schema = BlockSchema::new(
            external,
            outputs.iter().map(|o| o.as_ref().to_string()),
            states
        )?;

        info!(
            "Interconnect \"{}\" built from {} blocks: {} states, {} external inputs, {} outputs",
            name,
            blocks.len(),
            schema.num_states(),
            schema.num_inputs(),
            schema.num_outputs()
        );
        debug!(
            "Evaluation order: {:?}",
            order.iter().map(|&i| blocks[i].name()).collect::<Vec<_>>()
        );

        Ok(Self {
            name: name.to_string(),
            blocks,
            schema,
            state_offsets,
            input_sources,
            order,
            output_sources,
            direct_feedthrough
        })
    }

    /// Evaluate the outputs of every block.
    fn block_outputs(
        &self,
        t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<Vec<DVector<f64>>, BlockError> {
        let mut outputs = vec![DVector::zeros(0); self.blocks.len()];

        for &bi in self.order.iter() {
            let block = &self.blocks[bi];

            // Outputs of blocks without feedthrough do not depend on their
            // inputs, which may not have been evaluated yet
            let bu = if block.direct_feedthrough() {
                self.gather_inputs(bi, u, &outputs)
            }
            else {
                DVector::zeros(block.schema().num_inputs())
            };

            let y = block.output(t, &self.block_state(bi, x), &bu)?;
            check_count(block.name(), SignalKind::Output, block.schema().num_outputs(), y.len())?;

            outputs[bi] = y;
        }

        Ok(outputs)
    }

    fn block_state(&self, bi: usize, x: &DVector<f64>) -> DVector<f64> {
        let n = self.blocks[bi].schema().num_states();
        x.rows(self.state_offsets[bi], n).clone_owned()
    }

    fn gather_inputs(
        &self,
        bi: usize,
        u: &DVector<f64>,
        outputs: &[DVector<f64>]
    ) -> DVector<f64> {
        DVector::from_iterator(
            self.input_sources[bi].len(),
            self.input_sources[bi].iter().map(|s| match *s {
                Source::Block { block, output } => outputs[block][output],
                Source::External(i) => u[i]
            })
        )
    }
}

impl Block for Interconnect {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &BlockSchema {
        &self.schema
    }

    fn direct_feedthrough(&self) -> bool {
        self.direct_feedthrough
    }

    fn derivative(
        &self,
        t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(&self.name, x, u)?;

        let outputs = self.block_outputs(t, x, u)?;
        let mut dx = DVector::zeros(x.len());

        for (bi, block) in self.blocks.iter().enumerate() {
            let n = block.schema().num_states();
            if n == 0 {
                continue
            }

            let bu = self.gather_inputs(bi, u, &outputs);
            let bdx = block.derivative(t, &self.block_state(bi, x), &bu)?;
            check_count(block.name(), SignalKind::State, n, bdx.len())?;

            dx.rows_mut(self.state_offsets[bi], n).copy_from(&bdx);
        }

        Ok(dx)
    }

    fn output(
        &self,
        t: f64,
        x: &DVector<f64>,
        u: &DVector<f64>
    ) -> Result<DVector<f64>, BlockError> {
        self.schema.check(&self.name, x, u)?;

        let outputs = self.block_outputs(t, x, u)?;

        Ok(DVector::from_iterator(
            self.output_sources.len(),
            self.output_sources.iter().map(|&(b, o)| outputs[b][o])
        ))
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Topologically sort the blocks so that each feedthrough block comes after
/// the blocks feeding it.
fn eval_order(
    blocks: &[Box<dyn Block>],
    input_sources: &[Vec<Source>]
) -> Result<Vec<usize>, InterconnectError> {
    let num = blocks.len();
    let mut dependants: Vec<Vec<usize>> = vec![Vec::new(); num];
    let mut num_deps = vec![0usize; num];

    for (bi, sources) in input_sources.iter().enumerate() {
        if !blocks[bi].direct_feedthrough() {
            continue
        }

        let mut feeding: Vec<usize> = sources
            .iter()
            .filter_map(|s| match *s {
                Source::Block { block, .. } => Some(block),
                Source::External(_) => None
            })
            .collect();
        feeding.sort_unstable();
        feeding.dedup();

        for src in feeding {
            dependants[src].push(bi);
            num_deps[bi] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..num).filter(|&i| num_deps[i] == 0).collect();
    let mut order = Vec::with_capacity(num);

    while let Some(bi) = ready.pop_front() {
        order.push(bi);
        for &d in dependants[bi].iter() {
            num_deps[d] -= 1;
            if num_deps[d] == 0 {
                ready.push_back(d);
            }
        }
    }

    if order.len() != num {
        let looped = (0..num)
            .filter(|&i| num_deps[i] > 0)
            .map(|i| blocks[i].name().to_string())
            .collect();
        return Err(InterconnectError::AlgebraicLoop(looped))
    }

    Ok(order)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    /// `y = gain * u`, memoryless.
    struct Gain {
        name: String,
        gain: f64,
        schema: BlockSchema
    }

    /// `x' = u`, `y = x`.
    struct Integrator {
        name: String,
        schema: BlockSchema
    }

    /// Declares two outputs but only produces one.
    struct Short {
        schema: BlockSchema
    }

    impl Gain {
        fn boxed(name: &str, input: &str, output: &str, gain: f64) -> Box<dyn Block> {
            Box::new(Self {
                name: name.to_string(),
                gain,
                schema: BlockSchema::new(vec![input], vec![output], Vec::<String>::new())
                    .unwrap()
            })
        }
    }

    impl Integrator {
        fn boxed(name: &str, input: &str, output: &str) -> Box<dyn Block> {
            Box::new(Self {
                name: name.to_string(),
                schema: BlockSchema::new(vec![input], vec![output], vec!["q"]).unwrap()
            })
        }
    }

    impl Block for Gain {
        fn name(&self) -> &str { &self.name }
        fn schema(&self) -> &BlockSchema { &self.schema }

        fn output(&self, _t: f64, x: &DVector<f64>, u: &DVector<f64>)
            -> Result<DVector<f64>, BlockError>
        {
            self.schema.check(&self.name, x, u)?;
            Ok(u * self.gain)
        }
    }

    impl Block for Integrator {
        fn name(&self) -> &str { &self.name }
        fn schema(&self) -> &BlockSchema { &self.schema }
        fn direct_feedthrough(&self) -> bool { false }

        fn derivative(&self, _t: f64, x: &DVector<f64>, u: &DVector<f64>)
            -> Result<DVector<f64>, BlockError>
        {
            self.schema.check(&self.name, x, u)?;
            Ok(u.clone())
        }

        fn output(&self, _t: f64, x: &DVector<f64>, u: &DVector<f64>)
            -> Result<DVector<f64>, BlockError>
        {
            self.schema.check(&self.name, x, u)?;
            Ok(x.clone())
        }
    }

    impl Block for Short {
        fn name(&self) -> &str { "short" }
        fn schema(&self) -> &BlockSchema { &self.schema }
        fn direct_feedthrough(&self) -> bool { false }

        fn output(&self, _t: f64, _x: &DVector<f64>, _u: &DVector<f64>)
            -> Result<DVector<f64>, BlockError>
        {
            Ok(DVector::from_vec(vec![1.0]))
        }
    }

    #[test]
    fn test_feedback_loop() {
        // q' = -2 q + r, with r external
        let sys = Interconnect::new(
            "loop",
            vec![
                Gain::boxed("sum", "e", "qdot", 1.0),
                Gain::boxed("neg", "q", "fb", -2.0),
                Integrator::boxed("int", "qdot", "q"),
                Gain::boxed("err", "fb", "e", 1.0),
            ],
            &[] as &[&str],
            &["q", "e"]
        ).unwrap();

        assert_eq!(sys.schema().num_inputs(), 0);
        assert_eq!(sys.schema().states(), &["int.q".to_string()]);
        assert!(!sys.direct_feedthrough());

        let x = DVector::from_vec(vec![3.0]);
        let u = DVector::zeros(0);
        assert_relative_eq!(sys.derivative(0.0, &x, &u).unwrap()[0], -6.0);
        assert_eq!(sys.output(0.0, &x, &u).unwrap().as_slice(), &[3.0, -6.0]);
    }

    #[test]
    fn test_external_inputs() {
        let sys = Interconnect::new(
            "ext",
            vec![
                Gain::boxed("a", "r", "ya", 2.0),
                Gain::boxed("b", "r", "yb", 3.0),
                Gain::boxed("c", "s", "yc", 4.0),
            ],
            &["r", "s"],
            &["yc", "ya"]
        ).unwrap();

        assert_eq!(sys.schema().inputs(), &["r".to_string(), "s".to_string()]);
        assert!(sys.direct_feedthrough());

        let y = sys.output(
            0.0,
            &DVector::zeros(0),
            &DVector::from_vec(vec![1.0, 0.5])
        ).unwrap();
        assert_eq!(y.as_slice(), &[2.0, 2.0]);

        assert!(matches!(
            sys.output(0.0, &DVector::zeros(0), &DVector::zeros(1)),
            Err(BlockError::SignalCount { .. })
        ));
    }

    #[test]
    fn test_ambiguous_signal() {
        match Interconnect::new(
            "amb",
            vec![Gain::boxed("a", "r", "y", 1.0), Gain::boxed("b", "r", "y", 1.0)],
            &["r"],
            &["y"]
        ) {
            Err(InterconnectError::AmbiguousSignal { signal, first, second }) => {
                assert_eq!(signal, "y");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            },
            r => panic!("Expected an ambiguous signal error, got {:?}", r.err())
        }
    }

    #[test]
    fn test_unknown_output() {
        assert!(matches!(
            Interconnect::new("unk", vec![Gain::boxed("a", "r", "y", 1.0)], &["r"], &["z"]).err(),
            Some(InterconnectError::UnknownOutput(s)) if s == "z"
        ));
    }

    #[test]
    fn test_algebraic_loop() {
        let r = Interconnect::new(
            "alg",
            vec![
                Gain::boxed("a", "yb", "ya", 1.0),
                Gain::boxed("b", "ya", "yb", 0.5),
                Gain::boxed("c", "ya", "yc", 1.0),
            ],
            &[] as &[&str],
            &["yc"]
        );

        match r.err() {
            Some(InterconnectError::AlgebraicLoop(blocks)) => {
                assert!(blocks.contains(&"a".to_string()));
                assert!(blocks.contains(&"b".to_string()));
            },
            e => panic!("Expected an algebraic loop, got {:?}", e)
        }
    }

    #[test]
    fn test_duplicate_block() {
        assert!(matches!(
            Interconnect::new(
                "dup",
                vec![Gain::boxed("a", "r", "y", 1.0), Gain::boxed("a", "y", "z", 1.0)],
                &["r"],
                &["z"]
            ).err(),
            Some(InterconnectError::DuplicateBlock(_))
        ));
    }

    #[test]
    fn test_unconnected_input() {
        // "qdot" is misspelled on the producing side
        let r = Interconnect::new(
            "typo",
            vec![
                Gain::boxed("sum", "q", "q_dot", -1.0),
                Integrator::boxed("int", "qdot", "q"),
            ],
            &[] as &[&str],
            &["q"]
        );

        match r.err() {
            Some(InterconnectError::UnconnectedInput { signal, block }) => {
                assert_eq!(signal, "qdot");
                assert_eq!(block, "int");
            },
            e => panic!("Expected an unconnected input, got {:?}", e)
        }
    }

    #[test]
    fn test_produced_input() {
        assert!(matches!(
            Interconnect::new("prod", vec![Gain::boxed("a", "r", "y", 1.0)], &["r", "y"], &["y"]).err(),
            Some(InterconnectError::ProducedInput { signal, .. }) if signal == "y"
        ));
    }

    #[test]
    fn test_short_block_output() {
        let short = Box::new(Short {
            schema: BlockSchema::new(Vec::<String>::new(), vec!["a", "b"], Vec::<String>::new())
                .unwrap()
        });
        let sys = Interconnect::new(
            "short_sys",
            vec![short as Box<dyn Block>, Gain::boxed("g", "b", "y", 1.0)],
            &[] as &[&str],
            &["a", "y"]
        ).unwrap();

        let x = DVector::zeros(0);
        let u = DVector::zeros(0);
        assert!(matches!(
            sys.output(0.0, &x, &u),
            Err(BlockError::SignalCount { .. })
        ));
        assert!(matches!(
            sys.derivative(0.0, &x, &u),
            Err(BlockError::SignalCount { .. })
        ));
    }
}
