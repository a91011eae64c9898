//! Stream compression codecs, detected from file extensions.
//!
//! The archive helper picks its codec from the archive file name (`.tar` is
//! plain, `.tar.gz`/`.tgz` is gzip, `.tar.zst` is zstd). Codecs wrap readers
//! and writers transparently; when a compression feature is disabled its
//! extension is simply not recognized.

use anyhow::{Result, bail};
use std::io::{BufReader, BufWriter, Read, Write};

/// A stream codec understood by the archive helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-zstd")]
    Zstd,
}

impl Codec {
    /// Detect a codec from a file name.
    ///
    /// # Errors
    /// Returns an error for a compressed extension whose feature is disabled
    /// or an extension no codec claims.
    pub fn from_name(name: &str) -> Result<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar") {
            return Ok(Codec::Plain);
        }
        if lower.ends_with(".gz") || lower.ends_with(".tgz") {
            #[cfg(feature = "compression-gzip")]
            return Ok(Codec::Gzip);
            #[cfg(not(feature = "compression-gzip"))]
            bail!("{name}: gzip support not compiled in (feature `compression-gzip`)");
        }
        if lower.ends_with(".zst") || lower.ends_with(".zstd") {
            #[cfg(feature = "compression-zstd")]
            return Ok(Codec::Zstd);
            #[cfg(not(feature = "compression-zstd"))]
            bail!("{name}: zstd support not compiled in (feature `compression-zstd`)");
        }
        bail!("{name}: unrecognized archive extension")
    }

    /// Wrap a writer with this codec's compressor. Compressed wrappers finish
    /// their stream on drop.
    ///
    /// # Errors
    /// Returns an error if the compressor cannot be constructed.
    pub fn wrap_writer<W: Write + 'static>(self, writer: W) -> Result<Box<dyn Write>> {
        Ok(match self {
            Codec::Plain => Box::new(BufWriter::new(writer)),
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Box::new(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::default(),
            )),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Box::new(zstd::stream::write::Encoder::new(writer, 3)?.auto_finish()),
        })
    }

    /// Wrap a reader with this codec's decompressor.
    ///
    /// # Errors
    /// Returns an error if the decompressor cannot be constructed.
    pub fn wrap_reader<R: Read + 'static>(self, reader: R) -> Result<Box<dyn Read>> {
        Ok(match self {
            Codec::Plain => Box::new(BufReader::new(reader)),
            #[cfg(feature = "compression-gzip")]
            Codec::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            #[cfg(feature = "compression-zstd")]
            Codec::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}
