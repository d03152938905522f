use std::{fs, io};
use std::path::{Path, PathBuf};
use std::fmt::Debug;

use crate::error::{Result, Chainable};

/// A destination for rendered bytes.
pub trait Sink: Debug {
    fn write<B: AsRef<[u8]>>(&self, bytes: B) -> Result<()> where Self: Sized {
        self.write_bytes(bytes.as_ref())
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()>;
}

impl Sink for fs::File {
    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        use io::Write;

        let mut file = io::BufWriter::new(self);
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }
}

/// Writing to a path creates any missing parent directories first.
impl Sink for &Path {
    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.parent() {
            fs::create_dir_all(parent).chain_with(|| error! {
                "failed to create output directory",
                "directory" => parent.display()
            })?;
        }

        fs::File::create(self)
            .chain(error! {
                "failed to open/create file for writing",
                "file path" => self.display()
            })?
            .write_bytes(bytes)
    }
}

impl Sink for PathBuf {
    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.as_path().write_bytes(bytes)
    }
}

impl<T: Sink> Sink for &T {
    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        <T as Sink>::write_bytes(self, bytes)
    }
}
