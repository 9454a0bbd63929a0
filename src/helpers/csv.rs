use crate::error::Result;
use crate::io::csv::{CsvOptions, CsvWriter};
use crate::pipeline::Pipeline;
use crate::row::Row;
use crate::step::Flow;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

impl Pipeline {
    /// Write every row reaching this step to `path` with default options.
    pub fn save(self, path: impl AsRef<Path>) -> Result<Self> {
        self.save_with(path, CsvOptions::default())
    }

    /// Write every row reaching this step to `path`, closing the file when
    /// the pipeline completes. A write failure fails the run.
    pub fn save_with(self, path: impl AsRef<Path>, options: CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let writer = Rc::new(RefCell::new(CsvWriter::create(path, options)?));

        let closing = Rc::clone(&writer);
        self.on_complete(Box::new(move || {
            closing.borrow_mut().close()?;
            Ok(Flow::Continue)
        }));
        Ok(self.add_step(format!("Save to {file_name}"), move |row: Row| {
            writer.borrow_mut().write_row(&row)?;
            Ok(row)
        }))
    }
}
