use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::source::Source;
use crate::step::Flow;

/// Replays an in-memory list of rows, numbering lines from 1.
pub struct CollectionSource {
    name: String,
    rows: Vec<Row>,
}

impl CollectionSource {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            name: format!("Collection({})", rows.len()),
            rows,
        }
    }

    pub fn named(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

impl Source for CollectionSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, pipeline: &Pipeline) -> Result<Flow> {
        for (i, row) in std::mem::take(&mut self.rows).into_iter().enumerate() {
            let flow = pipeline.process(row, i + 1)?;
            if flow.is_halt() {
                return Ok(flow);
            }
        }
        Ok(Flow::Continue)
    }
}

/// Pipeline over an in-memory list of rows, named `Collection(n)`.
pub fn from_rows(rows: Vec<Row>) -> Pipeline {
    CollectionSource::new(rows).into_pipeline()
}

/// Like [`from_rows`], collecting any iterator of rows first.
pub fn from_iter<I: IntoIterator<Item = Row>>(rows: I) -> Pipeline {
    from_rows(rows.into_iter().collect())
}
