//! The row pipeline: an ordered chain of named steps fed by a [`Source`].
//!
//! A [`Pipeline`] is a cheap handle; clones share the same steps, statistic
//! and source, the same way every combinator hands back handles to the
//! pipelines it wires together. Execution is single-threaded and push-based:
//! the source calls [`Pipeline::process`] inline for every row, and child
//! pipelines (branches, exchanges) run recursively from inside a parent's
//! step. Stack depth therefore grows with the nesting depth of branches.
//!
//! Lifecycle: unstarted, then running while the source pushes rows, then
//! completing while the completion callbacks run in registration order, then
//! done. A finished pipeline cannot be restarted.

use crate::error::{EtlError, Result};
use crate::row::{REJECTION_CATEGORY, REJECTION_REASON, REJECTION_STEP, Rejection, RejectionCategory, Row};
use crate::source::Source;
use crate::statistic::{DONE_CALLBACKS, LoadStatistic};
use crate::step::{Emit, Flow, Step, StepOutput};
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;
use tracing::{debug, trace, warn};

pub(crate) type Callback = Box<dyn FnOnce() -> Result<Flow>>;

pub struct Pipeline {
    pub(crate) inner: Rc<PipelineInner>,
}

pub(crate) struct PipelineInner {
    statistic: RefCell<LoadStatistic>,
    source: RefCell<Option<Box<dyn Source>>>,
    steps: RefCell<Vec<Step>>,
    after: RefCell<Vec<Callback>>,
    rejections: RefCell<Option<Pipeline>>,
    concatenated: RefCell<Vec<Pipeline>>,
    completed: Cell<bool>,
    last_line: Cell<usize>,
}

/// Non-owning handle, used wherever a pipeline's own steps or callbacks need
/// to reach back to it (or to a downstream pipeline) without a reference cycle.
#[derive(Clone)]
pub(crate) struct WeakPipeline {
    name: String,
    inner: Weak<PipelineInner>,
}

impl WeakPipeline {
    pub(crate) fn upgrade(&self) -> Result<Pipeline> {
        self.inner
            .upgrade()
            .map(|inner| Pipeline { inner })
            .ok_or_else(|| EtlError::Detached(self.name.clone()))
    }
}

/// Allow `Pipeline` cloning.
impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Pipeline {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name())
            .field("steps", &self.step_names())
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl Pipeline {
    /// A pipeline with no source. It can be driven through
    /// [`process`](Self::process) directly, as branch and rejection
    /// pipelines are.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(PipelineInner {
                statistic: RefCell::new(LoadStatistic::new(name)),
                source: RefCell::new(None),
                steps: RefCell::new(Vec::new()),
                after: RefCell::new(Vec::new()),
                rejections: RefCell::new(None),
                concatenated: RefCell::new(Vec::new()),
                completed: Cell::new(false),
                last_line: Cell::new(0),
            }),
        }
    }

    pub fn with_source(name: impl Into<String>, source: impl Source + 'static) -> Self {
        let p = Self::new(name);
        p.set_source(source);
        p
    }

    pub fn set_source(&self, source: impl Source + 'static) {
        *self.inner.source.borrow_mut() = Some(Box::new(source));
    }

    pub fn name(&self) -> String {
        self.inner.statistic.borrow().name().to_string()
    }

    /// Snapshot of the statistic as it stands now.
    pub fn statistic(&self) -> LoadStatistic {
        self.inner.statistic.borrow().clone()
    }

    pub(crate) fn stat_mut(&self) -> RefMut<'_, LoadStatistic> {
        self.inner.statistic.borrow_mut()
    }

    pub fn is_completed(&self) -> bool {
        self.inner.completed.get()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.inner
            .steps
            .borrow()
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Highest line number this pipeline has processed so far.
    pub fn last_line(&self) -> usize {
        self.inner.last_line.get()
    }

    pub fn is_rejected(&self, row: &Row) -> bool {
        row.is_rejected()
    }

    pub(crate) fn downgrade(&self) -> WeakPipeline {
        WeakPipeline {
            name: self.name(),
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub(crate) fn push_step(&self, step: Step) {
        self.inner.steps.borrow_mut().push(step);
    }

    pub(crate) fn push_concatenated(&self, other: Pipeline) {
        self.inner.concatenated.borrow_mut().push(other);
    }

    pub(crate) fn take_concatenated(&self) -> Vec<Pipeline> {
        std::mem::take(&mut *self.inner.concatenated.borrow_mut())
    }

    pub(crate) fn on_complete(&self, callback: Callback) {
        self.inner.after.borrow_mut().push(callback);
    }

    /// Append a named step.
    ///
    /// The closure may return the same row, a different row, a rejected row
    /// (see [`Row::reject`]), `None` (rejected as `Unknown reason`) or an
    /// [`Emit`] directly. An `Err` is fatal for the whole run.
    pub fn add_step<F, R>(self, name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(Row) -> anyhow::Result<R> + 'static,
        R: StepOutput,
    {
        self.push_step(Step::new(name, f));
        self
    }

    /// Register a completion callback. Callbacks run once, in registration
    /// order, after the source is exhausted or halted.
    pub fn after<F>(self, f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + 'static,
    {
        let name = self.name();
        self.on_complete(Box::new(move || {
            f().map_err(|e| EtlError::Callback {
                pipeline: name,
                source: e.into(),
            })?;
            Ok(Flow::Continue)
        }));
        self
    }

    /// Attach steps to this pipeline's rejection pipeline, creating it on
    /// first use. Every rejected row is processed by it after its rejection
    /// columns are filled in.
    pub fn on_rejection<F>(self, configure: F) -> Self
    where
        F: FnOnce(Pipeline) -> Pipeline,
    {
        let existing = self.inner.rejections.borrow().clone();
        let rejections = match existing {
            Some(p) => p,
            None => {
                let p = Pipeline::new(format!("Rejections({})", self.name()));
                *self.inner.rejections.borrow_mut() = Some(p.clone());
                p
            }
        };
        let tail = configure(rejections.clone());
        self.on_complete(Box::new(move || {
            rejections.finish()?;
            if tail != rejections {
                tail.finish()?;
            }
            Ok(Flow::Continue)
        }));
        self
    }

    /// Push one row through the step chain.
    ///
    /// Each step is timed into this pipeline's statistic. A rejected row is
    /// routed through [`do_rejections`](Self::do_rejections) and never reaches
    /// the following steps; a row that passes every step counts as loaded.
    pub fn process(&self, row: Row, line: usize) -> Result<Flow> {
        if line > self.inner.last_line.get() {
            self.inner.last_line.set(line);
        }
        let keep_input = self.inner.rejections.borrow().is_some();
        let context = if line == 0 { Some(row.clone()) } else { None };

        let outcome = {
            let mut steps = self
                .inner
                .steps
                .try_borrow_mut()
                .map_err(|_| EtlError::Reentrant(self.name()))?;
            let mut current = row;
            let mut outcome = Outcome::Loaded;
            for step in steps.iter_mut() {
                let input = (keep_input && step.keeps_input).then(|| current.clone());
                let started = Instant::now();
                let result = step.apply(current);
                self.stat_mut().record_timing(&step.name, started.elapsed());
                match result {
                    Ok(Emit::Row(next)) if next.is_rejected() => {
                        outcome = Outcome::Rejected(next, step.name.clone());
                        break;
                    }
                    Ok(Emit::Row(next)) => current = next,
                    Ok(Emit::Nothing) => {
                        let row = input
                            .unwrap_or_default()
                            .reject("Unknown reason", RejectionCategory::Rejection);
                        outcome = Outcome::Rejected(row, step.name.clone());
                        break;
                    }
                    Ok(Emit::Halt(reason)) => {
                        outcome = Outcome::Halt(reason);
                        break;
                    }
                    Err(source) => {
                        let line = match context {
                            Some(row) => format!("{row:?}"),
                            None => line.to_string(),
                        };
                        return Err(EtlError::Step {
                            pipeline: self.name(),
                            step: step.name.clone(),
                            line,
                            source: source.into(),
                        });
                    }
                }
            }
            outcome
        };

        match outcome {
            Outcome::Loaded => {
                self.stat_mut().increment_loaded();
                Ok(Flow::Continue)
            }
            Outcome::Rejected(row, step) => self.do_rejections(row, &step, line),
            Outcome::Halt(reason) => Ok(Flow::Halt(reason)),
        }
    }

    /// Consume a row's rejection marker: stamp the step, copy the rejection
    /// into the row's columns, count it, and hand the row to the rejection
    /// pipeline if one is attached.
    pub fn do_rejections(&self, mut row: Row, step: &str, line: usize) -> Result<Flow> {
        let mut rejection = row
            .take_rejection()
            .unwrap_or_else(|| Rejection::new("Unknown reason", RejectionCategory::Rejection));
        rejection.step = Some(step.to_string());
        row.insert(REJECTION_CATEGORY, rejection.category.as_str());
        row.insert(REJECTION_REASON, rejection.reason.as_str());
        row.insert(REJECTION_STEP, step);
        trace!(
            pipeline = %self.name(),
            step,
            line,
            category = %rejection.category,
            reason = %rejection.reason,
            "row rejected"
        );
        self.stat_mut().reject(&rejection);

        let rejections = self.inner.rejections.borrow().clone();
        match rejections {
            Some(p) => p.process(row, line),
            None => Ok(Flow::Continue),
        }
    }

    /// Drive the source to exhaustion, then any concatenated pipelines, then
    /// run the completion callbacks.
    pub fn start(&self) -> Result<()> {
        if self.is_completed() {
            return Err(EtlError::Completed(self.name()));
        }
        let source = self.inner.source.borrow_mut().take();
        self.stat_mut().mark_start();
        let result = match source {
            Some(mut source) => {
                debug!(pipeline = %self.name(), source = source.name(), "starting pipeline");
                source.start(self)
            }
            None => {
                warn!(pipeline = %self.name(), "pipeline has no source; nothing to drive");
                Ok(Flow::Continue)
            }
        };
        let result = match result {
            Ok(Flow::Continue) => self.drain_concatenated(),
            other => other,
        };
        self.stat_mut().mark_end();
        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Halt(reason)) => {
                debug!(pipeline = %self.name(), %reason, "pipeline halted");
            }
            Err(e) => {
                self.inner.completed.set(true);
                return Err(e);
            }
        }
        self.finish()?;
        let stat = self.inner.statistic.borrow();
        debug!(
            pipeline = %stat.name(),
            loaded = stat.loaded(),
            rejected = stat.rejections(),
            "pipeline finished"
        );
        Ok(())
    }

    /// Append `tail` as a final step named `tail`, then [`start`](Self::start).
    pub fn start_with<F, R>(&self, tail: F) -> Result<()>
    where
        F: FnMut(Row) -> anyhow::Result<R> + 'static,
        R: StepOutput,
    {
        self.push_step(Step::new("tail", tail));
        self.start()
    }

    /// [`start`](Self::start), then hand back the final statistic.
    pub fn go(&self) -> Result<LoadStatistic> {
        self.start()?;
        Ok(self.statistic())
    }

    /// Run and drain the completion callbacks, then mark the pipeline done.
    ///
    /// A halt raised by a callback (for example while replaying sorted rows
    /// into a limited downstream pipeline) ends that callback only.
    pub(crate) fn finish(&self) -> Result<()> {
        let callbacks = std::mem::take(&mut *self.inner.after.borrow_mut());
        let started = Instant::now();
        for callback in callbacks {
            if let Flow::Halt(reason) = callback()? {
                debug!(pipeline = %self.name(), %reason, "halt raised during completion");
            }
        }
        self.stat_mut()
            .record_timing(DONE_CALLBACKS, started.elapsed());
        self.inner.completed.set(true);
        Ok(())
    }

    /// Register a callback that merges `src`'s statistic into this one.
    pub(crate) fn copy_statistics_from(&self, src: &Pipeline) {
        let target = self.downgrade();
        let src = src.clone();
        self.on_complete(Box::new(move || {
            let target = target.upgrade()?;
            let snapshot = src.statistic();
            target.stat_mut().copy(&snapshot);
            Ok(Flow::Continue)
        }));
    }
}

enum Outcome {
    Loaded,
    Rejected(Row, String),
    Halt(String),
}
