//! # Rowflow
//!
//! A **row-oriented ETL engine** for Rust. Rows flow one at a time through a
//! fixed chain of named steps; each step may pass a row on, replace it, or
//! reject it with a category and a reason. Rejections are counted, never
//! fatal, and can be routed to a rejection pipeline of their own.
//!
//! ## Key Features
//!
//! - **Fluent pipeline API** - filter, trim, rename, type conversion, defaults, limits
//! - **Tracked rejections** - per category and per step, with an optional rejection pipeline
//! - **Structural combinators** - branch, exchange, inject, concat, group-by, sort
//! - **Delimited-text codec** - multi-character separators, quoted fields, BOM detection
//! - **Transparent compression** - gzip and zstd files (feature flags)
//! - **Per-step timings** - collected into a [`LoadStatistic`] for every run
//!
//! ## Quick Start
//!
//! ```
//! use rowflow::*;
//!
//! # fn main() -> rowflow::Result<()> {
//! let stats = from_rows(vec![
//!     row! { "name" => " Ada ", "age" => "36" },
//!     row! { "name" => "Grace", "age" => "unknown" },
//! ])
//! .trim()
//! .as_int("age")
//! .go()?;
//!
//! assert_eq!(stats.loaded(), 1);
//! assert_eq!(stats.rejections_in(RejectionCategory::InvalidFormat), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! A [`Pipeline`] owns a [`Source`], an ordered list of steps, completion
//! callbacks and a [`LoadStatistic`]. Builder methods consume and return the
//! pipeline; handles are cheap clones of the same pipeline. A pipeline runs
//! once: [`Pipeline::start`] drives the source, runs the completion
//! callbacks in registration order, and marks it completed.
//!
//! ### Rows and values
//!
//! A [`Row`] is an ordered, string-keyed map of [`Value`]s. Delimited files
//! produce text values; steps such as [`as_int`](Pipeline::as_int) convert
//! them to typed values explicitly.
//!
//! ### Rejections and halts
//!
//! A step rejects a row by returning it with a [`Rejection`] attached
//! ([`Row::reject`]). The row skips the remaining steps, gains the columns
//! `rejectionCategory`, `rejectionReason` and `rejectionStep`, and is handed
//! to the rejection pipeline set up with [`on_rejection`](Pipeline::on_rejection).
//!
//! Returning [`Emit::Halt`] stops the run early without failing it; the
//! completion callbacks still run. Only step errors and I/O failures are
//! fatal, reported as [`EtlError`].
//!
//! ```
//! use rowflow::*;
//! use rowflow::testing::*;
//!
//! # fn main() -> rowflow::Result<()> {
//! let rejected = Capture::new();
//! let sink = rejected.sink();
//! let stats = from_rows(people())
//!     .filter(Condition::new().eq("gender", "female"))
//!     .on_rejection(move |rejections| rejections.add_step("collect", sink))
//!     .go()?;
//!
//! assert_eq!(stats.loaded(), 2);
//! assert_eq!(rejected.len(), 2);
//! assert_eq!(
//!     rejected.rows()[0].get(REJECTION_CATEGORY),
//!     Some(&Value::from("IGNORE_ROW"))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! Execution is single-threaded and synchronous. Child pipelines run inside
//! the parent's step on the same stack, so deep branch nesting costs stack
//! depth. Pipelines are not `Send`.
//!
//! ## Feature Flags
//!
//! - `compression-gzip` - read and write `.gz` files (default)
//! - `compression-zstd` - read and write `.zst` files (default)
//!
//! ## Module Overview
//!
//! - [`pipeline`] - the engine: steps, processing, lifecycle
//! - [`helpers`] - transformation steps and structural combinators
//! - [`source`] - collection, delimited-text and chained sources
//! - [`io`] - delimited-text codec and compression
//! - [`condition`] - declarative column predicates
//! - [`statistic`] - run statistics
//! - [`testing`] - capture, assertions and fixtures for tests

pub mod condition;
pub mod error;
pub mod helpers;
pub mod io;
pub mod pipeline;
pub mod row;
pub mod source;
pub mod statistic;
pub mod step;
pub mod testing;
pub mod value;

pub use condition::{Condition, Criterion};
pub use error::{EtlError, Result};
pub use helpers::*;
pub use io::{CsvOptions, CsvWriter, read_csv, write_csv};
pub use pipeline::Pipeline;
pub use row::{REJECTION_CATEGORY, REJECTION_REASON, REJECTION_STEP, Rejection, RejectionCategory, Row};
pub use source::{ChainedSource, CollectionSource, CsvSource, Feed, Source, csv, csv_reader, csv_with, from_iter, from_rows};
pub use statistic::{DONE_CALLBACKS, LoadStatistic};
pub use step::{Emit, Flow, Step, StepOutput};
pub use value::Value;
