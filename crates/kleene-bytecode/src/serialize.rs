//! Program persistence.
//!
//! A program file is a fixed little-endian header followed by a postcard
//! payload holding the [`Program`]. The header carries a CRC32 of the
//! payload; loading checks it before decoding and runs [`verify`] on the
//! decoded program, so everything past this module can trust the words.

use std::io;
use std::path::Path;

use crate::program::Program;
use crate::verify::{VerifyError, verify};

/// Magic bytes: b"KLNP".
pub const MAGIC: [u8; 4] = *b"KLNP";

/// Format version.
pub const VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Program file load/save failure.
#[derive(Debug, thiserror::Error)]
pub enum ProgramFileError {
    #[error("invalid magic: expected KLNP")]
    InvalidMagic,
    #[error("unsupported version: {0} (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("file too small: {0} bytes (minimum {HEADER_SIZE})")]
    FileTooSmall(usize),
    #[error("size mismatch: header says {header} payload bytes, got {actual}")]
    SizeMismatch { header: u32, actual: usize },
    #[error("checksum mismatch: header says {header:#010x}, payload hashes to {actual:#010x}")]
    ChecksumMismatch { header: u32, actual: u32 },
    #[error("malformed payload: {0}")]
    Payload(#[from] postcard::Error),
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Fixed-size file header, all fields little-endian.
struct Header {
    magic: [u8; 4],
    version: u32,
    /// CRC32 of everything after the header.
    checksum: u32,
    /// Payload size in bytes.
    payload_size: u32,
}

impl Header {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            payload_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        bytes
    }
}

impl Program {
    /// Encode as header plus postcard payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProgramFileError> {
        let payload = postcard::to_allocvec(self)?;
        let header = Header {
            magic: MAGIC,
            version: VERSION,
            checksum: crc32fast::hash(&payload),
            payload_size: payload.len() as u32,
        };
        let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
        output.extend_from_slice(&header.to_bytes());
        output.extend_from_slice(&payload);
        Ok(output)
    }

    /// Decode from bytes, checking the header and verifying the program.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProgramFileError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProgramFileError::FileTooSmall(bytes.len()));
        }
        let header = Header::from_bytes(&bytes[..HEADER_SIZE]);
        if header.magic != MAGIC {
            return Err(ProgramFileError::InvalidMagic);
        }
        if header.version != VERSION {
            return Err(ProgramFileError::UnsupportedVersion(header.version));
        }
        let payload = &bytes[HEADER_SIZE..];
        if header.payload_size as usize != payload.len() {
            return Err(ProgramFileError::SizeMismatch {
                header: header.payload_size,
                actual: payload.len(),
            });
        }
        let actual = crc32fast::hash(payload);
        if actual != header.checksum {
            return Err(ProgramFileError::ChecksumMismatch {
                header: header.checksum,
                actual,
            });
        }
        let program: Program = postcard::from_bytes(payload)?;
        verify(&program)?;
        Ok(program)
    }

    /// Write to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProgramFileError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProgramFileError> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}
