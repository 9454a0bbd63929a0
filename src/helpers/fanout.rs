//! Structural combinators that fan rows out to other pipelines.
//!
//! Child pipelines run synchronously inside the parent's step: a branch
//! five levels deep is five nested `process` calls on the same stack.

use crate::condition::Condition;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::row::{RejectionCategory, Row};
use crate::source::{ChainedSource, Feed};
use crate::step::{Emit, Flow, Step};
use std::cell::RefCell;
use std::rc::Rc;

fn emit(flow: Flow, row: Row) -> Emit {
    match flow {
        Flow::Continue => Emit::Row(row),
        Flow::Halt(reason) => Emit::Halt(reason),
    }
}

impl Pipeline {
    /// Copy every row into an unnamed child pipeline configured by `configure`.
    ///
    /// `configure` receives the child and returns the last pipeline of its
    /// chain; the completion callbacks of both run after this pipeline's
    /// source is exhausted. The parent row continues unchanged.
    pub fn branch<F>(self, configure: F) -> Self
    where
        F: FnOnce(Pipeline) -> Pipeline,
    {
        self.branch_named("No Name Branch", configure)
    }

    pub fn branch_named<F>(self, name: impl Into<String>, configure: F) -> Self
    where
        F: FnOnce(Pipeline) -> Pipeline,
    {
        let child = Pipeline::new(name);
        let tail = configure(child.clone());
        self.attach_branch("branch()".to_string(), child, tail, None)
    }

    /// Like [`branch`](Self::branch), but only rows matching `selection` are copied.
    ///
    /// ```
    /// use rowflow::*;
    /// use std::{cell::RefCell, rc::Rc};
    ///
    /// # fn main() -> rowflow::Result<()> {
    /// let seen = Rc::new(RefCell::new(Vec::new()));
    /// let sink = Rc::clone(&seen);
    /// from_rows(vec![row! { "id" => 1, "kind" => "a" }, row! { "id" => 2, "kind" => "b" }])
    ///     .branch_when(Condition::new().eq("kind", "b"), move |child| {
    ///         child.add_step("collect", move |row: Row| {
    ///             sink.borrow_mut().push(row.clone());
    ///             Ok(row)
    ///         })
    ///     })
    ///     .start()?;
    /// assert_eq!(seen.borrow().len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn branch_when<F>(self, selection: Condition, configure: F) -> Self
    where
        F: FnOnce(Pipeline) -> Pipeline,
    {
        let child = Pipeline::new(format!("Branch( {selection})"));
        let tail = configure(child.clone());
        let name = format!("branch({selection})");
        self.attach_branch(name, child, tail, Some(selection))
    }

    fn attach_branch(self, name: String, child: Pipeline, tail: Pipeline, selection: Option<Condition>) -> Self {
        let runner = child.clone();
        self.on_complete(Box::new(move || {
            child.finish()?;
            if tail != child {
                tail.finish()?;
            }
            Ok(Flow::Continue)
        }));
        self.push_step(Step::flow(name, move |row: Row| {
            if let Some(selection) = &selection
                && !selection.test(&row)?
            {
                return Ok(Emit::Row(row));
            }
            let flow = runner.process(row.clone(), 0)?;
            Ok(emit(flow, row))
        }));
        self
    }

    /// Run a fresh pipeline per row and collect everything those pipelines
    /// produce into the returned downstream pipeline.
    ///
    /// The downstream pipeline's source is this pipeline: starting it runs
    /// this one to completion. Its statistic starts from this pipeline's.
    pub fn exchange<F>(self, mut open: F) -> Pipeline
    where
        F: FnMut(&Row) -> anyhow::Result<Pipeline> + 'static,
    {
        let next = Pipeline::with_source(self.name(), ChainedSource::new(self.clone()));
        let feed = Rc::new(Feed::new(self.name(), &next));
        self.push_step(Step::flow("exchange()", move |row: Row| {
            let sub = open(&row)?;
            let feed = Rc::clone(&feed);
            sub.start_with(move |current: Row| {
                let flow = feed.push(current.clone())?;
                Ok(emit(flow, current))
            })?;
            Ok(Emit::Row(row))
        }));
        next.copy_statistics_from(&self);
        next
    }

    /// [`inject_named`](Self::inject_named) with the step name `inject()`.
    pub fn inject<F>(self, expand: F) -> Pipeline
    where
        F: FnMut(&Row) -> anyhow::Result<Option<Vec<Row>>> + 'static,
    {
        self.inject_named("inject()", expand)
    }

    /// Expand each row into zero or more rows pushed into the returned
    /// downstream pipeline.
    ///
    /// `None` rejects the row in the downstream pipeline as `REJECTION` with
    /// reason `Unknown reason`. Produced rows that already carry a rejection
    /// go straight to the downstream rejection path.
    pub fn inject_named<F>(self, name: impl Into<String>, mut expand: F) -> Pipeline
    where
        F: FnMut(&Row) -> anyhow::Result<Option<Vec<Row>>> + 'static,
    {
        let name = name.into();
        let next = Pipeline::with_source(name.clone(), ChainedSource::new(self.clone()));
        let feed = Feed::new(self.name(), &next);
        let step = name.clone();
        self.push_step(Step::flow(name, move |row: Row| {
            let flow = match expand(&row)? {
                Some(rows) => feed.push_all(rows)?,
                None => {
                    let rejected = row
                        .clone()
                        .reject("Unknown reason", RejectionCategory::Rejection);
                    feed.reject(rejected, &step)?
                }
            };
            Ok(emit(flow, row))
        }));
        next.copy_statistics_from(&self);
        next
    }

    /// Append `other`'s rows to this pipeline's stream.
    ///
    /// Once this pipeline's own source is exhausted, and before any
    /// completion callback runs, `other` is started and each of its rows runs
    /// through this pipeline's steps, numbering lines after this pipeline's
    /// last. A halt ends the whole stream, skipping later concatenations.
    pub fn concat(self, other: Pipeline) -> Self {
        self.push_concatenated(other);
        self
    }

    /// Run every pipeline queued by [`concat`](Self::concat), in order.
    pub(crate) fn drain_concatenated(&self) -> Result<Flow> {
        for other in self.take_concatenated() {
            let halted = Rc::new(RefCell::new(None));
            let seen = Rc::clone(&halted);
            let target = self.downgrade();
            let mut line = self.last_line();
            let name = format!("concat({})", other.name());
            other.push_step(Step::flow(name, move |row: Row| {
                line += 1;
                let flow = target.upgrade()?.process(row.clone(), line)?;
                if let Flow::Halt(reason) = &flow {
                    *seen.borrow_mut() = Some(reason.clone());
                }
                Ok(emit(flow, row))
            }));
            other.start()?;
            if let Some(reason) = halted.borrow_mut().take() {
                return Ok(Flow::Halt(reason));
            }
        }
        Ok(Flow::Continue)
    }
}
