//! Logic Compiler
//!
//! Translates an elaborated hardware model (nets of wired-together signals
//! plus clocked or combinational update blocks) into a C++ translation unit,
//! builds it into a shared library with an external compiler and binds the
//! result as a cycle-level simulation handle.
//!
//! ```no_run
//! use logic_compiler::{translate, BuildConfig, ElaboratedModel};
//!
//! # fn main() -> logic_compiler::Result<()> {
//! let json = std::fs::read_to_string("register.json")?;
//! let model = ElaboratedModel::from_json(&json)?;
//! let mut sim = translate(model, &BuildConfig::default().with_env_overrides())?;
//! sim.poke("in_", 8)?;
//! sim.cycle();
//! assert_eq!(sim.peek("out")?, 8);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod decls;
pub mod error;
pub mod interp;
pub mod layout;
pub mod model;
pub mod names;
pub mod pipeline;
pub mod sim;
pub mod translate;
pub mod types;

pub use codegen::GeneratedUnit;
pub use config::BuildConfig;
pub use error::{Error, Result};
pub use interp::Interpreter;
pub use model::{BlockKind, ElaboratedModel, ModelBuilder, SignalValue};
pub use pipeline::{generate_source, translate, Failure, Pipeline, Stage};
pub use sim::BoundSimulation;
