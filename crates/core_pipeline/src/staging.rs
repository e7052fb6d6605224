//! Transient on-disk staging for uploaded images
//!
//! The staged file lives exactly as long as the `StagedUpload` value and is
//! deleted when it is dropped, whether the analysis succeeded or not.

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// An uploaded file written to a temporary location
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Write `bytes` to a new temporary file named after the MIME subtype
    pub fn stage(bytes: &[u8], mime_type: &str) -> io::Result<Self> {
        let suffix = format!(".{}", extension_for(mime_type));
        let mut file = tempfile::Builder::new()
            .prefix("medanalysis-upload-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the staged bytes back
    pub fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(self.path())
    }
}

/// `image/png` -> `png`; anything odd -> `bin`
fn extension_for(mime_type: &str) -> String {
    let subtype = mime_type.split('/').nth(1).unwrap_or("");
    let cleaned: String = subtype
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned.to_ascii_lowercase()
    }
}
