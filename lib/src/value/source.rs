use std::{fs, io};
use std::path::Path;
use std::fmt::Debug;
use std::sync::Arc;

use either::Either;

use crate::error::{Result, Chainable};
use crate::fstree::Entry;
use crate::value::Sink;

/// Something that can be read in full: file contents or an in-memory string.
pub trait Source: Debug {
    /// Reads the source. Valid UTF-8 comes back as `Left`, anything else as
    /// raw bytes in `Right`.
    fn read(self) -> Result<Either<String, Vec<u8>>>;

    /// Reads the source as text, failing if it isn't UTF-8.
    fn read_text(self) -> Result<Arc<str>> where Self: Sized {
        let path = self.path().map(|p| p.display().to_string()).unwrap_or_default();
        match self.read()? {
            Either::Left(string) => Ok(string.into()),
            Either::Right(_) => err! {
                "expected text input, found binary data",
                "path" => path,
            }
        }
    }

    fn path(&self) -> Option<&Path> {
        None
    }

    #[inline]
    fn read_to<S: Sink>(self, sink: S) -> Result<()> where Self: Sized {
        match self.read()? {
            Either::Left(string) => sink.write(string),
            Either::Right(bytes) => sink.write(bytes),
        }
    }
}

impl Source for String {
    fn read(self) -> Result<Either<String, Vec<u8>>> {
        Ok(Either::Left(self))
    }
}

impl Source for &str {
    fn read(self) -> Result<Either<String, Vec<u8>>> {
        Ok(Either::Left(self.to_string()))
    }
}

impl Source for &fs::File {
    fn read(self) -> Result<Either<String, Vec<u8>>> {
        use io::Read;

        let mut data = Vec::new();
        let mut file = io::BufReader::new(self);
        file.read_to_end(&mut data)?;

        let value = String::from_utf8(data)
            .map(Either::Left)
            .unwrap_or_else(|e| Either::Right(e.into_bytes()));

        Ok(value)
    }
}

impl Source for &Path {
    fn read(self) -> Result<Either<String, Vec<u8>>> {
        let file = fs::File::open(self).chain(error! {
            "failed to open file for reading",
            "file path" => self.display()
        })?;

        (&file).read()
    }

    fn path(&self) -> Option<&Path> {
        Some(self)
    }
}

impl Source for &Entry {
    fn read(self) -> Result<Either<String, Vec<u8>>> {
        self.path.as_ref().read()
    }

    fn path(&self) -> Option<&Path> {
        Some(&*self.path)
    }
}
