//! Row producers.
//!
//! A [`Source`] drives a pipeline: `start` pushes every row it has through
//! [`Pipeline::process`] with a 1-based line number, stopping early when a
//! row comes back with [`Flow::Halt`]. Completion callbacks are not a
//! source's concern; [`Pipeline::start`] runs them once the source returns.

mod chained;
mod collection;
mod csv;

pub use chained::{ChainedSource, Feed};
pub use collection::{CollectionSource, from_rows, from_iter};
pub use csv::{CsvSource, csv, csv_reader, csv_with};

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::step::Flow;

pub trait Source {
    fn name(&self) -> &str;

    /// Push every row into `pipeline`. Returns the halt that stopped the
    /// source early, if any.
    fn start(&mut self, pipeline: &Pipeline) -> Result<Flow>;

    /// A pipeline named after this source and driven by it.
    fn into_pipeline(self) -> Pipeline
    where
        Self: Sized + 'static,
    {
        let name = self.name().to_string();
        Pipeline::with_source(name, self)
    }
}
