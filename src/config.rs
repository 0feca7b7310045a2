//! Configuration for writing a PDF.

use crate::encryption::EncryptionConfig;
use crate::error::{Error, Result};
use bitflags::bitflags;

/// Default number of objects packed into one object stream.
pub const DEFAULT_OBJECT_STREAM_SIZE: usize = 200;

/// Most objects one object stream can index: cross-reference rows store the
/// index in two bytes.
pub const MAX_OBJECT_STREAM_ITEMS: usize = 1 << 16;

/// Default maximum uncompressed size of one object stream.
pub const DEFAULT_OBJECT_STREAM_MAX_LENGTH: usize = 256 * 1024;

/// Number of live entries after which an incremental xref stream is flushed.
pub const XREF_STREAM_MAX_SIZE: usize = 10_000;

bitflags! {
    /// Creation flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CreateFlags: u32 {
        /// Append an incremental update to the source file
        const INCREMENTAL = 1 << 0;
        /// With INCREMENTAL: write only the update, not the original bytes
        const NO_ORIGINAL = 1 << 1;
        /// Stop after setup; the caller drives the write with `continue_write`
        const PROGRESSIVE = 1 << 2;
        /// Pack eligible objects into object streams and write an xref stream
        const OBJECT_STREAM = 1 << 3;
    }
}

/// Options for one write of a document.
///
/// ```
/// use pdf_creator::config::SaveOptions;
///
/// let options = SaveOptions::incremental()
///     .with_object_streams(true)
///     .with_id_seed(42);
/// assert!(options.flags().contains(pdf_creator::config::CreateFlags::OBJECT_STREAM));
/// ```
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Append to the original file
    pub incremental: bool,
    /// Incremental update only, without the original bytes
    pub no_original: bool,
    /// Use object streams and cross-reference streams
    pub object_streams: bool,
    /// Setup only; drive with `continue_write`
    pub progressive: bool,
    /// Target version as two digits (14 = PDF 1.4); `None` keeps the source version
    pub version: Option<u8>,
    /// Objects per object stream before it is flushed
    pub object_stream_size: usize,
    /// Raw bytes per object stream before it is flushed
    pub object_stream_max_length: usize,
    /// Seed for document ID generation; `None` uses the clock
    pub id_seed: Option<u64>,
    /// New standard security to apply
    pub encryption: Option<EncryptionConfig>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::full_rewrite()
    }
}

impl SaveOptions {
    /// Options for a full rewrite (default).
    pub fn full_rewrite() -> Self {
        Self {
            incremental: false,
            no_original: false,
            object_streams: false,
            progressive: false,
            version: None,
            object_stream_size: DEFAULT_OBJECT_STREAM_SIZE,
            object_stream_max_length: DEFAULT_OBJECT_STREAM_MAX_LENGTH,
            id_seed: None,
            encryption: None,
        }
    }

    /// Options for an incremental update.
    pub fn incremental() -> Self {
        Self {
            incremental: true,
            ..Self::full_rewrite()
        }
    }

    /// Pack objects into object streams.
    pub fn with_object_streams(mut self, enable: bool) -> Self {
        self.object_streams = enable;
        self
    }

    /// Skip copying the original bytes in incremental mode.
    pub fn with_no_original(mut self, enable: bool) -> Self {
        self.no_original = enable;
        self
    }

    /// Progressive writing.
    pub fn with_progressive(mut self, enable: bool) -> Self {
        self.progressive = enable;
        self
    }

    /// Target PDF version as two digits (10..=17).
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = Some(version);
        self
    }

    /// Objects per object stream.
    pub fn with_object_stream_size(mut self, size: usize) -> Self {
        self.object_stream_size = size.clamp(1, MAX_OBJECT_STREAM_ITEMS);
        self
    }

    /// Raw byte ceiling per object stream.
    pub fn with_object_stream_max_length(mut self, length: usize) -> Self {
        self.object_stream_max_length = length.max(1);
        self
    }

    /// Fixed ID seed, for reproducible output.
    pub fn with_id_seed(mut self, seed: u64) -> Self {
        self.id_seed = Some(seed);
        self
    }

    /// Encrypt the output. Forces a full rewrite.
    pub fn with_encryption(mut self, config: EncryptionConfig) -> Self {
        self.incremental = false;
        self.encryption = Some(config);
        self
    }

    /// Flags equivalent to these options.
    pub fn flags(&self) -> CreateFlags {
        let mut flags = CreateFlags::empty();
        flags.set(CreateFlags::INCREMENTAL, self.incremental);
        flags.set(CreateFlags::NO_ORIGINAL, self.no_original);
        flags.set(CreateFlags::PROGRESSIVE, self.progressive);
        flags.set(CreateFlags::OBJECT_STREAM, self.object_streams);
        flags
    }

    /// Reject out-of-range settings before a write starts.
    pub fn validate(&self) -> Result<()> {
        if let Some(version) = self.version {
            validate_version(version)?;
        }
        Ok(())
    }
}

/// Check a two-digit PDF version (10 = 1.0 ... 17 = 1.7).
pub fn validate_version(version: u8) -> Result<()> {
    if (10..=17).contains(&version) {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion(version))
    }
}
