use std::fs::File;
use std::io::{Read, Result as IoResult};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

const BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 over the raw byte stream of `path`, read in fixed-size blocks.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    read_in_chunks(&mut file, |chunk| {
        hasher.update(chunk);
        Ok(())
    })?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 over an in-memory byte buffer (used for decoded pixel data).
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn read_in_chunks<F>(reader: &mut File, mut f: F) -> Result<()>
where
    F: FnMut(&[u8]) -> IoResult<()>,
{
    let mut buffer = vec![0_u8; BUFFER_SIZE];
    loop {
        let bytes = reader.read(&mut buffer)?;
        if bytes == 0 {
            break;
        }
        f(&buffer[..bytes])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn sha256_file_is_deterministic_and_hex_encoded() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "hello world")?;
        let digest = sha256_file(file.path())?;
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, sha256_file(file.path())?);
        Ok(())
    }

    #[test]
    fn sha256_file_differs_for_different_content() -> Result<()> {
        let mut a = NamedTempFile::new()?;
        write!(a, "content a")?;
        let mut b = NamedTempFile::new()?;
        write!(b, "content b")?;
        assert_ne!(sha256_file(a.path())?, sha256_file(b.path())?);
        Ok(())
    }

    #[test]
    fn sha256_bytes_is_deterministic() {
        let a = sha256_bytes(b"pixels");
        let b = sha256_bytes(b"pixels");
        assert_eq!(a, b);
        assert_ne!(a, sha256_bytes(b"other pixels"));
    }
}
