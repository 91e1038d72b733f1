//! BPMN 2.0 process compiler.
//!
//! Turns a `definitions` document into one [`ProcessGraph`] per executable
//! process: activities with behavior descriptors, transitions, scopes and
//! event scopes, event subscription and job declarations. All semantic
//! problems of a document are reported together in a [`DiagnosticReport`].
//!
//! ```ignore
//! let output = bpmn_parse_core::compile_str("order.bpmn", &xml)?;
//! for graph in &output.processes {
//!     println!("{} {}", graph.key, hex(graph.fingerprint()));
//! }
//! ```

pub mod config;
pub mod context;
pub mod definitions;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod model;
pub mod xml;

mod builder;
mod compiler;

pub use compiler::{compile_str, BpmnCompiler, CompileOutput};
pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, DiagnosticReport, Severity};
pub use error::CompileError;
pub use hooks::{HookEvent, ParseHooks};
pub use model::{ActivityBehavior, ActivityId, ActivityNode, ProcessGraph, ScopeRef, TransitionId, TransitionNode};
