//! Transparent compression for delimited-text files.
//!
//! Files whose name ends in a known extension are wrapped with the matching
//! codec on both read and write; on read, an unrecognised extension falls
//! back to sniffing magic bytes. With no compression feature enabled both
//! entry points are plain buffered pass-throughs.
//!
//! Built-in codecs, each behind a feature flag:
//! - **Gzip** (`.gz`) via `flate2` (feature: `compression-gzip`)
//! - **Zstd** (`.zst`) via `zstd` (feature: `compression-zstd`)
//!
//! ```no_run
//! use rowflow::io::compression::{auto_detect_reader, auto_detect_writer};
//! use std::fs::File;
//! # fn main() -> std::io::Result<()> {
//! let reader = auto_detect_reader(File::open("people.csv.gz")?, "people.csv.gz")?;
//! let writer = auto_detect_writer(File::create("out.csv.zst")?, "out.csv.zst")?;
//! # Ok(())
//! # }
//! ```

use std::io::{BufRead, BufReader, BufWriter, Read, Result, Write};
use std::path::Path;
use tracing::debug;

/// A compression algorithm the codec layer can wrap streams with.
pub trait CompressionCodec {
    fn name(&self) -> &str;

    /// Lowercase extensions including the leading dot.
    fn extensions(&self) -> &[&str];

    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader(&self, reader: Box<dyn Read>) -> Result<Box<dyn Read>>;

    fn wrap_writer(&self, writer: Box<dyn Write>) -> Result<Box<dyn Write>>;
}

fn codecs() -> Vec<Box<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Box::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Box::new(ZstdCodec),
    ]
}

/// Codec whose extension matches the end of `path`, case-insensitively.
pub fn detect_from_extension(path: impl AsRef<Path>) -> Option<Box<dyn CompressionCodec>> {
    let name = path.as_ref().to_string_lossy().to_lowercase();
    codecs()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
}

// Peeks without consuming.
fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Box<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    codecs().into_iter().find(|codec| {
        codec
            .magic_bytes()
            .is_some_and(|magic| buf.starts_with(magic))
    })
}

/// Wrap `reader` with decompression when the path or the leading bytes say so.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    let path = path_hint.as_ref();
    if let Some(codec) = detect_from_extension(path) {
        debug!(codec = codec.name(), path = %path.display(), "decompressing by extension");
        return codec.wrap_reader(Box::new(reader));
    }

    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        debug!(codec = codec.name(), path = %path.display(), "decompressing by magic bytes");
        return codec.wrap_reader(Box::new(buffered));
    }
    Ok(Box::new(buffered))
}

/// Wrap `writer` with compression when the path's extension names a codec.
/// The returned writer finishes its stream when dropped.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write>> {
    let buffered: Box<dyn Write> = Box::new(BufWriter::new(writer));
    match detect_from_extension(&path_hint) {
        Some(codec) => {
            debug!(codec = codec.name(), path = %path_hint.as_ref().display(), "compressing output");
            codec.wrap_writer(buffered)
        }
        None => Ok(buffered),
    }
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: Box<dyn Read>) -> Result<Box<dyn Read>> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer(&self, writer: Box<dyn Write>) -> Result<Box<dyn Write>> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader(&self, reader: Box<dyn Read>) -> Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }

    fn wrap_writer(&self, writer: Box<dyn Write>) -> Result<Box<dyn Write>> {
        zstd::stream::write::Encoder::new(writer, 3)
            .map(|e| Box::new(e.auto_finish()) as Box<dyn Write>)
    }
}
