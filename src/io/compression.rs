//! Transparent (de)compression chosen by file extension.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use xz2::read::XzDecoder;
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

use crate::error::{Error, Result};

const XZ_PRESET: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    /// Legacy `.lzma` ("lzma_alone") container.
    Lzma,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("bz2") => Compression::Bzip2,
            Some("xz") => Compression::Xz,
            Some("lzma") => Compression::Lzma,
            _ => Compression::None,
        }
    }

    pub fn reader<'a, R: Read + 'a>(self, inner: R) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => Box::new(inner),
            Compression::Gzip => Box::new(MultiGzDecoder::new(inner)),
            Compression::Bzip2 => Box::new(MultiBzDecoder::new(inner)),
            Compression::Xz => Box::new(XzDecoder::new_multi_decoder(inner)),
            Compression::Lzma => {
                let stream = Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::from)?;
                Box::new(XzDecoder::new_stream(inner, stream))
            }
        })
    }

    pub fn writer<W: Write>(self, inner: W) -> io::Result<CompressedWriter<W>> {
        Ok(match self {
            Compression::None => CompressedWriter::Plain(inner),
            Compression::Gzip => {
                CompressedWriter::Gzip(GzEncoder::new(inner, flate2::Compression::default()))
            }
            Compression::Bzip2 => {
                CompressedWriter::Bzip2(BzEncoder::new(inner, bzip2::Compression::default()))
            }
            Compression::Xz => CompressedWriter::Xz(XzEncoder::new(inner, XZ_PRESET)),
            Compression::Lzma => {
                let options = LzmaOptions::new_preset(XZ_PRESET).map_err(io::Error::from)?;
                let stream = Stream::new_lzma_encoder(&options).map_err(io::Error::from)?;
                CompressedWriter::Xz(XzEncoder::new_stream(inner, stream))
            }
        })
    }
}

/// Open a file for reading, decompressing it if the extension says so.
pub fn open_with_auto_compression(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Compression::from_path(path)
        .reader(BufReader::new(file))
        .map_err(|e| Error::io(path, e))
}

/// A writer that must be explicitly finished so the compressed stream
/// gets its trailer.
pub enum CompressedWriter<W: Write> {
    Plain(W),
    Gzip(GzEncoder<W>),
    Bzip2(BzEncoder<W>),
    Xz(XzEncoder<W>),
}

impl<W: Write> CompressedWriter<W> {
    pub fn finish(self) -> io::Result<W> {
        match self {
            CompressedWriter::Plain(w) => Ok(w),
            CompressedWriter::Gzip(e) => e.finish(),
            CompressedWriter::Bzip2(e) => e.finish(),
            CompressedWriter::Xz(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for CompressedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressedWriter::Plain(w) => w.write(buf),
            CompressedWriter::Gzip(e) => e.write(buf),
            CompressedWriter::Bzip2(e) => e.write(buf),
            CompressedWriter::Xz(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressedWriter::Plain(w) => w.flush(),
            CompressedWriter::Gzip(e) => e.flush(),
            CompressedWriter::Bzip2(e) => e.flush(),
            CompressedWriter::Xz(e) => e.flush(),
        }
    }
}
