//! Engine error types
//!
//! Error codes:
//! - RANGEDB_STORAGE_IO_ERROR (ERROR severity)
//! - RANGEDB_STORAGE_WRITE_FAILED (ERROR severity)
//! - RANGEDB_STORAGE_READ_FAILED (ERROR severity)
//! - RANGEDB_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

/// Severity of an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, node continues
    Error,
    /// Node must terminate
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Directory or metadata I/O failure
    IoError,
    /// Put or delete failed
    WriteFailed,
    /// Get or scan failed
    ReadFailed,
    /// Stored bytes fail their checksum or cannot be decoded
    DataCorruption,
}

impl StorageErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::IoError => "RANGEDB_STORAGE_IO_ERROR",
            StorageErrorCode::WriteFailed => "RANGEDB_STORAGE_WRITE_FAILED",
            StorageErrorCode::ReadFailed => "RANGEDB_STORAGE_READ_FAILED",
            StorageErrorCode::DataCorruption => "RANGEDB_DATA_CORRUPTION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::DataCorruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with key context
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    /// Printable form of the key involved, if any
    key: Option<String>,
    source: Option<io::Error>,
}

impl StorageError {
    fn new(code: StorageErrorCode, message: impl Into<String>, source: Option<io::Error>) -> Self {
        Self {
            code,
            message: message.into(),
            key: None,
            source,
        }
    }

    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::IoError, message, Some(source))
    }

    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::WriteFailed, message, Some(source))
    }

    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::new(StorageErrorCode::ReadFailed, message, Some(source))
    }

    /// Corruption (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::DataCorruption, message, None)
    }

    /// Attach the key the failed operation touched.
    pub fn with_key(mut self, key: &[u8]) -> Self {
        self.key = Some(printable_key(key));
        self
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Render a key with non-printable bytes hex-escaped.
pub fn printable_key(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key {
        if b.is_ascii_graphic() {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\x{:02x}", b));
        }
    }
    out
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref key) = self.key {
            write!(f, " (key: {})", key)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for engine operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(StorageErrorCode::IoError.code(), "RANGEDB_STORAGE_IO_ERROR");
        assert_eq!(StorageErrorCode::WriteFailed.code(), "RANGEDB_STORAGE_WRITE_FAILED");
        assert_eq!(StorageErrorCode::ReadFailed.code(), "RANGEDB_STORAGE_READ_FAILED");
        assert_eq!(StorageErrorCode::DataCorruption.code(), "RANGEDB_DATA_CORRUPTION");
    }

    #[test]
    fn test_only_corruption_is_fatal() {
        assert!(StorageError::data_corruption("bad crc").is_fatal());
        assert!(!StorageError::write_failed("disk full", io::Error::other("disk full")).is_fatal());
        assert!(!StorageError::read_failed("eio", io::Error::other("eio")).is_fatal());
    }

    #[test]
    fn test_display_includes_key_and_source() {
        let err = StorageError::write_failed("put", io::Error::other("disk full"))
            .with_key(b"\x01rabc");
        let display = err.to_string();
        assert!(display.contains("RANGEDB_STORAGE_WRITE_FAILED"));
        assert!(display.contains("key: \\x01rabc"));
        assert!(display.contains("disk full"));
        assert!(display.starts_with("[ERROR]"));
    }

    #[test]
    fn test_printable_key() {
        assert_eq!(printable_key(b"ab\x00"), "ab\\x00");
    }
}
