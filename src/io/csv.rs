//! Delimited-text reading and writing.
//!
//! The dialect is line based:
//! - the separator is any non-empty literal string, not just one character;
//! - a field wrapped in double quotes may contain the separator, and inside
//!   it `\"` decodes to `"`, `\n` to a newline and `\\` to a backslash
//!   (any other backslash pair is kept as written);
//! - an unquoted field is taken verbatim up to the next separator;
//! - blank lines are skipped.
//!
//! [`CsvWriter`] quotes every field and escapes embedded backslashes, quotes
//! and newlines the same way, so written files read back as the same values.
//! Null values are written as `""` and read back as empty strings.
//!
//! **Compression**: paths ending in `.gz` or `.zst` are decompressed on read
//! and compressed on write when the matching feature is enabled.

use crate::error::{EtlError, Result};
use crate::io::compression::{auto_detect_reader, auto_detect_writer};
use crate::row::Row;
use crate::value::Value;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Reader and writer configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvOptions {
    pub separator: String,
    /// Explicit column names. On read they replace the file's own header
    /// names; on write they fix the header and the column order.
    pub headers: Option<Vec<String>>,
    /// Whether the first non-blank line is a header line.
    pub has_header: bool,
    /// When `false`, the writer drops rows whose values repeat an earlier row.
    pub allow_duplicate_rows: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            separator: ",".to_string(),
            headers: None,
            has_header: true,
            allow_duplicate_rows: true,
        }
    }
}

impl CsvOptions {
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn headers<S: Into<String>>(mut self, headers: impl IntoIterator<Item = S>) -> Self {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn allow_duplicate_rows(mut self, allow: bool) -> Self {
        self.allow_duplicate_rows = allow;
        self
    }
}

/// Splits one line into fields.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    pattern: Regex,
    separator: String,
}

impl Tokenizer {
    pub fn new(separator: &str) -> Result<Self> {
        if separator.is_empty() || separator.contains(['\n', '\r']) {
            return Err(EtlError::Separator(separator.to_string()));
        }
        let sep = regex::escape(separator);
        let pattern = Regex::new(&format!(r#"^(?:"((?:[^"\\]|\\.)*)"|(.*?))(?:{sep}|$)"#))
            .map_err(|_| EtlError::Separator(separator.to_string()))?;
        Ok(Self {
            pattern,
            separator: separator.to_string(),
        })
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Tokenize `line`. A line ending in the separator yields a final empty field.
    pub fn tokenize(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut pos = 0;
        let mut trailing_separator = false;
        while pos < line.len() {
            let rest = &line[pos..];
            let Some(caps) = self.pattern.captures(rest) else {
                fields.push(rest.to_string());
                break;
            };
            let whole = caps.get(0).map_or(0, |m| m.end());
            match (caps.get(1), caps.get(2)) {
                (Some(quoted), _) => fields.push(unescape(quoted.as_str())),
                (None, Some(plain)) => fields.push(plain.as_str().to_string()),
                (None, None) => fields.push(String::new()),
            }
            trailing_separator = rest[..whole].ends_with(&self.separator);
            if whole == 0 {
                break;
            }
            pos += whole;
        }
        if trailing_separator {
            fields.push(String::new());
        }
        fields
    }
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            // Unknown escapes stay as written.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn escape(field: &str) -> String {
    field
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Receives parse events from [`CsvFile::parse`].
pub trait RowCallback {
    fn process_headers(&mut self, headers: &[String]) -> Result<()>;

    /// Handle one data line. Return `true` to stop reading.
    fn process_row(&mut self, line: usize, headers: &[String], fields: Vec<String>) -> Result<bool>;

    fn after_processing(&mut self) {}
}

/// A reader bound to one set of [`CsvOptions`].
#[derive(Clone, Debug)]
pub struct CsvFile {
    options: CsvOptions,
    tokenizer: Tokenizer,
}

impl CsvFile {
    pub fn new(options: CsvOptions) -> Result<Self> {
        let tokenizer = Tokenizer::new(&options.separator)?;
        Ok(Self { options, tokenizer })
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Open `path`, decode it, and [`parse`](Self::parse) it.
    pub fn parse_path(&self, path: impl AsRef<Path>, callback: &mut dyn RowCallback) -> Result<usize> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading delimited file");
        let reader = open_text(path)?;
        self.parse(reader, callback)
    }

    /// Feed every line of `reader` to `callback`.
    ///
    /// Returns the number of header and data lines consumed. Line numbers in
    /// errors and callbacks are physical, 1-based line numbers. Callback
    /// failures are reported as [`EtlError::Parse`], except step failures
    /// raised by a pipeline downstream, which pass through unchanged.
    pub fn parse(&self, mut reader: impl BufRead, callback: &mut dyn RowCallback) -> Result<usize> {
        let mut headers = match (&self.options.headers, self.options.has_header) {
            (Some(explicit), false) => {
                callback
                    .process_headers(explicit)
                    .map_err(|e| EtlError::Header {
                        line: 0,
                        text: explicit.join(&self.options.separator),
                        source: e.into(),
                    })?;
                Some(explicit.clone())
            }
            (None, false) => {
                return Err(EtlError::Header {
                    line: 0,
                    text: String::new(),
                    source: "no header line and no explicit headers".into(),
                });
            }
            (_, true) => None,
        };

        let mut buf = String::new();
        let mut line = 0;
        let mut consumed = 0;
        loop {
            buf.clear();
            let read = reader.read_line(&mut buf).map_err(|e| EtlError::Parse {
                line: line + 1,
                text: String::new(),
                source: e.into(),
            })?;
            if read == 0 {
                break;
            }
            line += 1;
            let text = buf.trim_end_matches(['\n', '\r']);
            if text.trim().is_empty() {
                continue;
            }

            if headers.is_none() {
                let names = self
                    .options
                    .headers
                    .clone()
                    .unwrap_or_else(|| self.tokenizer.tokenize(text));
                callback
                    .process_headers(&names)
                    .map_err(|e| EtlError::Header {
                        line,
                        text: text.to_string(),
                        source: e.into(),
                    })?;
                headers = Some(names);
                consumed += 1;
                continue;
            }
            let names = headers.as_deref().unwrap_or_default();

            let fields = self.tokenizer.tokenize(text);
            let stop = callback
                .process_row(line, names, fields)
                .map_err(|e| match e {
                    step @ EtlError::Step { .. } => step,
                    e => EtlError::Parse {
                        line,
                        text: text.to_string(),
                        source: e.into(),
                    },
                })?;
            consumed += 1;
            if stop {
                trace!(line, "reader stopped early");
                break;
            }
        }
        callback.after_processing();
        Ok(consumed)
    }
}

/// Map tokenized fields onto header names. Missing trailing fields are null.
pub fn to_row(headers: &[String], fields: Vec<String>) -> Result<Row> {
    if fields.len() > headers.len() {
        return Err(EtlError::missing_column(
            format!("#{}", headers.len() + 1),
            format!("line has {} fields but only {} headers", fields.len(), headers.len()),
        ));
    }
    let mut row = Row::with_capacity(headers.len());
    let mut fields = fields.into_iter();
    for name in headers {
        row.insert(name.as_str(), fields.next().map_or(Value::Null, Value::Text));
    }
    Ok(row)
}

/// Open `path` for reading: decompress by extension or magic bytes, then
/// decode by byte-order mark (UTF-8 when there is none).
pub fn open_text(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = auto_detect_reader(file, path)?;
    decode_bom(reader)
}

fn decode_bom(reader: Box<dyn Read>) -> Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(reader);
    let head: Vec<u8> = reader.fill_buf()?.iter().take(3).copied().collect();
    if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
        reader.consume(3);
        return Ok(Box::new(reader));
    }
    let little_endian = match head.as_slice() {
        [0xFF, 0xFE, ..] => true,
        [0xFE, 0xFF, ..] => false,
        _ => return Ok(Box::new(reader)),
    };
    reader.consume(2);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            let pair = [pair[0], pair[1]];
            if little_endian {
                u16::from_le_bytes(pair)
            } else {
                u16::from_be_bytes(pair)
            }
        })
        .collect();
    let text = String::from_utf16(&units)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Box::new(Cursor::new(text.into_bytes())))
}

/// Read a whole file into rows.
pub fn read_csv(path: impl AsRef<Path>, options: CsvOptions) -> Result<Vec<Row>> {
    struct Collect(Vec<Row>);

    impl RowCallback for Collect {
        fn process_headers(&mut self, _headers: &[String]) -> Result<()> {
            Ok(())
        }

        fn process_row(&mut self, _line: usize, headers: &[String], fields: Vec<String>) -> Result<bool> {
            self.0.push(to_row(headers, fields)?);
            Ok(false)
        }
    }

    let mut rows = Collect(Vec::new());
    CsvFile::new(options)?.parse_path(path, &mut rows)?;
    Ok(rows.0)
}

/// Write `rows` to `path`, returning how many data rows were written.
pub fn write_csv(path: impl AsRef<Path>, options: CsvOptions, rows: &[Row]) -> Result<usize> {
    let mut writer = CsvWriter::create(path, options)?;
    for row in rows {
        writer.write_row(row)?;
    }
    writer.close()?;
    Ok(writer.rows())
}

/// Incremental writer. A path-backed writer creates its file (and parent
/// directories) on the first write, or on [`close`](Self::close) if nothing
/// was written.
pub struct CsvWriter {
    path: Option<PathBuf>,
    sink: Option<Box<dyn Write>>,
    separator: String,
    headers: Option<Vec<String>>,
    header_written: bool,
    allow_duplicate_rows: bool,
    seen: HashSet<Vec<u8>>,
    rows: usize,
    closed: bool,
}

impl CsvWriter {
    pub fn create(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self> {
        let mut writer = Self::with_options(options)?;
        writer.path = Some(path.as_ref().to_path_buf());
        Ok(writer)
    }

    pub fn from_writer(sink: impl Write + 'static, options: CsvOptions) -> Result<Self> {
        let mut writer = Self::with_options(options)?;
        writer.sink = Some(Box::new(sink));
        Ok(writer)
    }

    fn with_options(options: CsvOptions) -> Result<Self> {
        Tokenizer::new(&options.separator)?;
        Ok(Self {
            path: None,
            sink: None,
            separator: options.separator,
            headers: options.headers,
            header_written: false,
            allow_duplicate_rows: options.allow_duplicate_rows,
            seen: HashSet::new(),
            rows: 0,
            closed: false,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Data rows written so far, not counting the header or dropped duplicates.
    pub fn rows(&self) -> usize {
        self.rows
    }

    fn sink(&mut self) -> Result<&mut Box<dyn Write>> {
        if self.closed {
            return Err(std::io::Error::other("writer is closed").into());
        }
        if self.sink.is_none() {
            let path = self
                .path
                .clone()
                .ok_or_else(|| std::io::Error::other("writer has no destination"))?;
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                create_dir_all(parent)?;
            }
            let file = File::create(&path)?;
            self.sink = Some(auto_detect_writer(file, &path)?);
        }
        self.sink
            .as_mut()
            .ok_or_else(|| std::io::Error::other("writer has no destination").into())
    }

    fn write_line(&mut self, values: &[&Value]) -> Result<()> {
        let line = values
            .iter()
            .map(|v| match v {
                Value::Null => "\"\"".to_string(),
                v => format!("\"{}\"", escape(&v.to_string())),
            })
            .collect::<Vec<_>>()
            .join(&self.separator);
        let sink = self.sink()?;
        sink.write_all(line.as_bytes())?;
        sink.write_all(b"\n")?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let names: Vec<Value> = self
            .headers
            .iter()
            .flatten()
            .map(|h| Value::from(h.as_str()))
            .collect();
        self.write_line(&names.iter().collect::<Vec<_>>())?;
        self.header_written = true;
        Ok(())
    }

    /// Write `values` as one data line. Returns `false` when the line was
    /// dropped as a duplicate.
    pub fn write_values(&mut self, values: &[&Value]) -> Result<bool> {
        if !self.allow_duplicate_rows {
            let mut hasher = Sha256::new();
            for v in values {
                hasher.update(b"_");
                hasher.update(v.to_string().as_bytes());
            }
            if !self.seen.insert(hasher.finalize().to_vec()) {
                trace!("dropping duplicate row");
                return Ok(false);
            }
        }
        self.write_line(values)?;
        self.rows += 1;
        Ok(true)
    }

    /// Write one row in header order. Without explicit headers, the first
    /// row's keys become the header.
    pub fn write_row(&mut self, row: &Row) -> Result<bool> {
        if self.headers.is_none() {
            self.headers = Some(row.keys().map(str::to_string).collect());
        }
        self.write_header()?;
        let values: Vec<&Value> = self
            .headers
            .iter()
            .flatten()
            .map(|h| row.get(h).unwrap_or(&Value::Null))
            .collect();
        self.write_values(&values)
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Flush and release the destination. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.sink.is_none() && self.path.is_some() {
            self.sink()?;
        }
        if self.headers.is_some() {
            self.write_header()?;
        }
        self.flush()?;
        self.sink = None;
        self.closed = true;
        debug!(path = ?self.path, rows = self.rows, "writer closed");
        Ok(())
    }
}
