//! Shared fixtures: the list/number/aggregate graph and a rule-recording tracer.

#![allow(dead_code, unused_macros)]

use std::sync::{Arc, Mutex};

use anyhow::Context;
use layer_flow::{GraphRuntime, NodeId, Tracer, ValidationStrategy};

pub const FILE_CONTENTS: &str = "FILE_CONTENTS";
pub const EXTRACT_LIST: &str = "EXTRACT_LIST";
pub const EXTRACT_NUMBER: &str = "EXTRACT_NUMBER";
pub const AGGREGATE: &str = "AGGREGATE";

/// Records every rule invocation, in order.
#[derive(Default)]
pub struct RuleRecorder {
    calls: Mutex<Vec<(String, String)>>,
}

impl RuleRecorder {
    /// Take the recorded calls, leaving the log empty.
    pub fn take(&self) -> Vec<(String, String)> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl Tracer for RuleRecorder {
    fn on_rule_start(&self, node: &NodeId) {
        self.calls
            .lock()
            .unwrap()
            .push((node.layer().to_string(), node.key().to_string()));
    }
}

/// Build the expected trace from `(layer, key)` pairs.
pub fn calls(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(layer, key)| (layer.to_string(), key.to_string()))
        .collect()
}

/// A graph whose lists are newline separated, with blank lines ignored.
pub struct TracedGraph {
    pub runtime: GraphRuntime,
    pub recorder: Arc<RuleRecorder>,
}

impl TracedGraph {
    pub fn new(validation: ValidationStrategy) -> Self {
        let recorder = Arc::new(RuleRecorder::default());
        let runtime = GraphRuntime::builder()
            .source::<String>(FILE_CONTENTS)
            .derived(EXTRACT_LIST, |ctx, file| {
                let contents = ctx.get_value::<String>(FILE_CONTENTS, file)?;
                Ok(contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<String>>())
            })
            .derived(EXTRACT_NUMBER, |ctx, file| {
                let contents = ctx.get_value::<String>(FILE_CONTENTS, file)?;
                let number = contents
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("{} does not hold a number", file))?;
                Ok(number)
            })
            .derived(AGGREGATE, |ctx, file| {
                let list = ctx.get_value::<Vec<String>>(EXTRACT_LIST, file)?;
                let mut sum = 0i64;
                for item in list.iter() {
                    sum += *ctx.get_value::<i64>(EXTRACT_NUMBER, item)?;
                }
                Ok(sum)
            })
            .tracer(recorder.clone())
            .validation(validation)
            .build();
        Self { runtime, recorder }
    }

    pub fn set(&mut self, file: &str, contents: &str) {
        self.runtime
            .set_input(FILE_CONTENTS, file, contents.to_string())
            .unwrap();
    }

    pub fn number(&mut self, file: &str) -> i64 {
        *self.runtime.get_value::<i64>(EXTRACT_NUMBER, file).unwrap()
    }

    pub fn aggregate(&mut self, file: &str) -> i64 {
        *self.runtime.get_value::<i64>(AGGREGATE, file).unwrap()
    }

    /// Take the rule invocations recorded since the last call.
    pub fn trace(&self) -> Vec<(String, String)> {
        self.recorder.take()
    }

    /// Lists `x.dat` and `y.dat` holding 1 and 2, aggregated once, trace cleared.
    pub fn with_aggregated_list(validation: ValidationStrategy) -> Self {
        let mut g = Self::new(validation);
        g.set("list.txt", "x.dat\ny.dat");
        g.set("x.dat", "1");
        g.set("y.dat", "2");
        assert_eq!(g.aggregate("list.txt"), 3);
        g.trace();
        g
    }
}

/// Generate one test per validation strategy from a scenario function.
macro_rules! for_each_strategy {
    ($($name:ident => $scenario:ident;)*) => {
        $(
            mod $name {
                #[test]
                fn full() {
                    super::$scenario(layer_flow::ValidationStrategy::Full);
                }

                #[test]
                fn sources_first() {
                    super::$scenario(layer_flow::ValidationStrategy::SourcesFirst);
                }
            }
        )*
    };
}
