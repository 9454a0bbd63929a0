//! Collecting the output of a pipeline.

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::statistic::LoadStatistic;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared buffer of rows, filled by the step returned from [`Capture::sink`].
#[derive(Clone, Debug, Default)]
pub struct Capture {
    rows: Rc<RefCell<Vec<Row>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A step closure that records a copy of each row and passes it on.
    pub fn sink(&self) -> impl FnMut(Row) -> anyhow::Result<Row> + 'static {
        let rows = Rc::clone(&self.rows);
        move |row| {
            rows.borrow_mut().push(row.clone());
            Ok(row)
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.borrow().is_empty()
    }
}

/// Start `pipeline` with a capturing tail and return what reached it.
pub fn run_collect(pipeline: &Pipeline) -> Result<(Vec<Row>, LoadStatistic)> {
    let capture = Capture::new();
    pipeline.start_with(capture.sink())?;
    Ok((capture.rows(), pipeline.statistic()))
}
