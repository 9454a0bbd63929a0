use crate::error::{EtlError, Result};
use crate::io::csv::{CsvFile, CsvOptions, RowCallback, to_row};
use crate::pipeline::Pipeline;
use crate::source::Source;
use crate::step::Flow;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

type HeaderCallback = Box<dyn FnMut(&[String]) -> anyhow::Result<()>>;

enum Input {
    Path(PathBuf),
    Reader(Option<Box<dyn BufRead>>),
}

/// Delimited-text source. Each data line becomes a row keyed by header name;
/// lines shorter than the header get null for the missing trailing columns.
pub struct CsvSource {
    name: String,
    input: Input,
    options: CsvOptions,
    header_callback: Option<HeaderCallback>,
}

impl CsvSource {
    pub fn of(path: impl AsRef<Path>) -> Self {
        Self::with_options(path, CsvOptions::default())
    }

    pub fn with_options(path: impl AsRef<Path>, options: CsvOptions) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            name,
            input: Input::Path(path),
            options,
            header_callback: None,
        }
    }

    /// Read from an already open stream, decoded as UTF-8.
    pub fn from_reader(name: impl Into<String>, reader: impl Read + 'static, options: CsvOptions) -> Self {
        Self {
            name: name.into(),
            input: Input::Reader(Some(Box::new(BufReader::new(reader)))),
            options,
            header_callback: None,
        }
    }

    /// Called once with the header names before any row is processed.
    pub fn header(mut self, f: impl FnMut(&[String]) -> anyhow::Result<()> + 'static) -> Self {
        self.header_callback = Some(Box::new(f));
        self
    }
}

struct Forward<'a> {
    pipeline: &'a Pipeline,
    header_callback: Option<&'a mut HeaderCallback>,
    halt: Option<String>,
}

impl RowCallback for Forward<'_> {
    fn process_headers(&mut self, headers: &[String]) -> Result<()> {
        if let Some(f) = self.header_callback.as_mut() {
            f(headers).map_err(|e| EtlError::Callback {
                pipeline: self.pipeline.name(),
                source: e.into(),
            })?;
        }
        Ok(())
    }

    fn process_row(&mut self, line: usize, headers: &[String], fields: Vec<String>) -> Result<bool> {
        let row = to_row(headers, fields)?;
        match self.pipeline.process(row, line)? {
            Flow::Continue => Ok(false),
            Flow::Halt(reason) => {
                self.halt = Some(reason);
                Ok(true)
            }
        }
    }
}

impl Source for CsvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, pipeline: &Pipeline) -> Result<Flow> {
        let file = CsvFile::new(self.options.clone())?;
        let mut forward = Forward {
            pipeline,
            header_callback: self.header_callback.as_mut(),
            halt: None,
        };
        match &mut self.input {
            Input::Path(path) => file.parse_path(path, &mut forward)?,
            Input::Reader(reader) => match reader.take() {
                Some(reader) => file.parse(reader, &mut forward)?,
                None => 0,
            },
        };
        Ok(forward.halt.map_or(Flow::Continue, Flow::Halt))
    }
}

/// Pipeline reading `path` with default options.
pub fn csv(path: impl AsRef<Path>) -> Pipeline {
    CsvSource::of(path).into_pipeline()
}

pub fn csv_with(path: impl AsRef<Path>, options: CsvOptions) -> Pipeline {
    CsvSource::with_options(path, options).into_pipeline()
}

pub fn csv_reader(name: impl Into<String>, reader: impl Read + 'static, options: CsvOptions) -> Pipeline {
    CsvSource::from_reader(name, reader, options).into_pipeline()
}
