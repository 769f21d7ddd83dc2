use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

/// Hands out fresh, never-before-existing file names in one directory.
///
/// Models are written to one of these and then renamed into place.
#[derive(Clone)]
pub struct TmpDir {
    dir: PathBuf,
    n: usize,
}

/// How many taken names `create` skips before giving up.
const MAX_COLLISIONS: usize = 999;

impl TmpDir {
    pub fn new<P: AsRef<Path>>(dir: P) -> TmpDir {
        TmpDir {
            dir: dir.as_ref().to_owned(),
            n: 1,
        }
    }

    /// Hidden, process-specific name for the next candidate file.
    fn next_path(&mut self) -> PathBuf {
        let name = format!(".vhash-{}-{:08x}.tmp", std::process::id(), self.n);
        self.n += 1;
        self.dir.join(name)
    }

    /// Create a new empty file, skipping names that are already taken.
    pub fn create(&mut self) -> io::Result<(PathBuf, BufWriter<File>)> {
        let mut collisions = 0;
        loop {
            let path = self.next_path();
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, BufWriter::new(file))),
                Err(err)
                    if err.kind() == io::ErrorKind::AlreadyExists
                        && collisions < MAX_COLLISIONS =>
                {
                    collisions += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
