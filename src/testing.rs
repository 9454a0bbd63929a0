//! Testing utilities for row pipelines.
//!
//! - **Capture**: collect the rows a pipeline emits ([`Capture`], [`run_collect`])
//! - **Assertions**: compare captured rows and statistics with expectations
//! - **Fixtures**: small ready-made datasets and scratch files
//! - **Debug**: log rows as they pass a point in the chain
//!
//! ```
//! use rowflow::*;
//! use rowflow::testing::*;
//!
//! # fn main() -> rowflow::Result<()> {
//! let (rows, stats) = run_collect(&from_rows(people()).as_int("age").sort(["age"]))?;
//! assert_column_values(&rows, "age", &[Value::Int(25), Value::Int(30), Value::Int(32), Value::Int(41)]);
//! assert_eq!(stats.loaded(), 4);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod capture;
pub mod debug;
pub mod fixtures;

pub use assertions::*;
pub use capture::*;
pub use fixtures::*;
