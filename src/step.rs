//! Named transformation steps and the control-flow values they return.

use crate::row::Row;
use std::fmt;

/// What a step hands back to the chain.
#[derive(Debug)]
pub enum Emit {
    /// Continue with this row. A row carrying a rejection marker is routed to
    /// the rejection path instead of the next step.
    Row(Row),
    /// The step produced no row; recorded as a `REJECTION` with reason
    /// `Unknown reason`.
    Nothing,
    /// Stop the whole run early without failing.
    Halt(String),
}

/// Values a step closure may hand back.
pub trait StepOutput {
    /// Whether this type can say "no row". Steps returning such a type keep a
    /// copy of their input while a rejection pipeline is attached, so the
    /// dropped row can still be routed there.
    const MAY_DROP_ROW: bool;

    fn into_emit(self) -> Emit;
}

impl StepOutput for Row {
    const MAY_DROP_ROW: bool = false;

    fn into_emit(self) -> Emit {
        Emit::Row(self)
    }
}

impl StepOutput for Option<Row> {
    const MAY_DROP_ROW: bool = true;

    fn into_emit(self) -> Emit {
        self.map_or(Emit::Nothing, Emit::Row)
    }
}

impl StepOutput for Emit {
    const MAY_DROP_ROW: bool = true;

    fn into_emit(self) -> Emit {
        self
    }
}

/// Result of pushing a row (or a whole source) through a pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A halt was requested; unwinds to the nearest `start`.
    Halt(String),
}

impl Flow {
    pub fn is_halt(&self) -> bool {
        matches!(self, Flow::Halt(_))
    }
}

pub(crate) type Transform = Box<dyn FnMut(Row) -> anyhow::Result<Emit>>;

/// A named transform. Steps are fixed once appended.
pub struct Step {
    pub(crate) name: String,
    pub(crate) transform: Transform,
    pub(crate) keeps_input: bool,
}

impl Step {
    pub fn new<F, R>(name: impl Into<String>, mut f: F) -> Self
    where
        F: FnMut(Row) -> anyhow::Result<R> + 'static,
        R: StepOutput,
    {
        Self {
            name: name.into(),
            transform: Box::new(move |row| f(row).map(StepOutput::into_emit)),
            keeps_input: R::MAY_DROP_ROW,
        }
    }

    /// A built-in step that answers with a row or a halt, never with nothing.
    pub(crate) fn flow<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(Row) -> anyhow::Result<Emit> + 'static,
    {
        Self {
            name: name.into(),
            transform: Box::new(f),
            keeps_input: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn apply(&mut self, row: Row) -> anyhow::Result<Emit> {
        (self.transform)(row)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// Render `name(a,b,c)` for step names built from column lists.
pub(crate) fn render_name<S: AsRef<str>>(name: &str, columns: &[S]) -> String {
    let cols = columns
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}({cols})")
}
