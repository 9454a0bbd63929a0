use crate::error::Result;
use crate::pipeline::{Pipeline, WeakPipeline};
use crate::row::Row;
use crate::source::Source;
use crate::step::Flow;
use std::cell::Cell;

/// Source of a pipeline created by a combinator (sort, group-by, exchange,
/// inject). Starting it runs the upstream pipeline to completion; rows reach
/// the downstream pipeline through a [`Feed`] while that happens.
pub struct ChainedSource {
    name: String,
    upstream: Pipeline,
}

impl ChainedSource {
    pub fn new(upstream: Pipeline) -> Self {
        Self {
            name: upstream.name(),
            upstream,
        }
    }
}

impl Source for ChainedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _pipeline: &Pipeline) -> Result<Flow> {
        self.upstream.start()?;
        Ok(Flow::Continue)
    }
}

/// Push point into a downstream pipeline.
///
/// Holds the downstream weakly: the upstream owns the feed through its steps
/// and callbacks, while the downstream owns the upstream through its source.
/// Lines are numbered from 1 in push order.
pub struct Feed {
    name: String,
    target: WeakPipeline,
    line: Cell<usize>,
}

impl Feed {
    pub(crate) fn new(name: impl Into<String>, target: &Pipeline) -> Self {
        Self {
            name: name.into(),
            target: target.downgrade(),
            line: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn next_line(&self) -> usize {
        self.line.set(self.line.get() + 1);
        self.line.get()
    }

    pub fn push(&self, row: Row) -> Result<Flow> {
        let line = self.next_line();
        self.target.upgrade()?.process(row, line)
    }

    /// Push rows in order. Rows that already carry a rejection marker go
    /// straight to the downstream rejection path under this feed's name.
    pub fn push_all(&self, rows: impl IntoIterator<Item = Row>) -> Result<Flow> {
        for row in rows {
            let flow = if row.is_rejected() {
                self.reject(row, &self.name)?
            } else {
                self.push(row)?
            };
            if flow.is_halt() {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }

    pub fn reject(&self, row: Row, step: &str) -> Result<Flow> {
        self.target
            .upgrade()?
            .do_rejections(row, step, self.line.get())
    }
}
