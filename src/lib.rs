//! Layer-Flow: a demand-driven incremental computation engine.
//!
//! A graph is a fixed set of named layers. A *source layer* holds values set
//! from outside with [`GraphRuntime::set_input`]. A *derived layer* has one
//! rule that computes the value for a key by reading other `(layer, key)`
//! pairs through a [`RuleContext`]. Reads are recorded as dependencies, so a
//! later [`GraphRuntime::get_value`] re-runs only the rules whose inputs
//! actually changed.
//!
//! # Key Features
//!
//! - **Demand-driven**: nothing is computed until it is queried
//! - **Logical clock**: advances only when a source value really changes
//! - **Early cutoff**: a re-run rule producing an equal value does not
//!   invalidate its dependents
//! - **Within-pass memoization**: a node read many times during one query is
//!   validated once
//! - **Type-safe reads**: each layer fixes its value type, checked at the
//!   read and write boundary
//!
//! # Example
//!
//! ```
//! use layer_flow::{GraphError, GraphRuntime};
//!
//! let mut runtime = GraphRuntime::builder()
//!     .source::<String>("CONTENTS")
//!     .derived("LIST", |ctx, file| {
//!         let contents = ctx.get_value::<String>("CONTENTS", file)?;
//!         Ok(contents.split(',').map(str::to_string).collect::<Vec<_>>())
//!     })
//!     .derived("NUM", |ctx, file| {
//!         let contents = ctx.get_value::<String>("CONTENTS", file)?;
//!         Ok(contents.trim().parse::<i64>().map_err(GraphError::rule)?)
//!     })
//!     .derived("SUM", |ctx, file| {
//!         let list = ctx.get_value::<Vec<String>>("LIST", file)?;
//!         let mut sum = 0;
//!         for entry in list.iter() {
//!             sum += *ctx.get_value::<i64>("NUM", entry)?;
//!         }
//!         Ok(sum)
//!     })
//!     .build();
//!
//! runtime.set_input("CONTENTS", "a", "x,y".to_string())?;
//! runtime.set_input("CONTENTS", "x", "13".to_string())?;
//! runtime.set_input("CONTENTS", "y", "42".to_string())?;
//! assert_eq!(*runtime.get_value::<i64>("SUM", "a")?, 55);
//!
//! runtime.set_input("CONTENTS", "y", "24".to_string())?;
//! assert_eq!(*runtime.get_value::<i64>("SUM", "a")?, 37);
//! # Ok::<(), GraphError>(())
//! ```
//!
//! # Observability
//!
//! Install a [`Tracer`] with [`GraphRuntimeBuilder::tracer`] to observe rule
//! runs, cache checks and early cutoff decisions. Diagnostic logs are emitted
//! through the `tracing` crate.

mod context;
mod db;
mod error;
mod key;
mod layer;
pub mod output_eq;
mod revision;
mod runtime;
#[cfg(feature = "shared-runtime")]
mod shared;
pub mod tracer;

pub use context::RuleContext;
pub use db::Db;
pub use error::GraphError;
pub use key::{LayerName, NodeId};
pub use revision::LogicalTime;
pub use runtime::{GraphRuntime, GraphRuntimeBuilder, Polled, ValidationStrategy};
#[cfg(feature = "shared-runtime")]
pub use shared::SharedGraphRuntime;
pub use tracer::{ExecutionResult, NoopTracer, Tracer};
