//! Local persistence of private key material.

use camino::Utf8PathBuf;
use cap_std::{ambient_authority, fs_utf8::Dir};

/// Writes `<dir>/<name>.pem` files through a capability directory handle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyMaterialStore {
    dir: Utf8PathBuf,
}

impl KeyMaterialStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path the material for `name` is written to.
    #[must_use]
    pub fn path_for(&self, name: &str) -> Utf8PathBuf {
        self.dir.join(file_name(name))
    }

    /// Writes the material, replacing any previous file for the same key.
    ///
    /// # Errors
    ///
    /// Returns the I/O error message when the directory cannot be opened or
    /// the file cannot be written.
    pub fn persist(&self, name: &str, material: &str) -> Result<Utf8PathBuf, String> {
        let dir = Dir::open_ambient_dir(&self.dir, ambient_authority())
            .map_err(|err| format!("open {}: {err}", self.dir))?;
        let file = file_name(name);
        dir.write(&file, material.as_bytes())
            .map_err(|err| format!("write {file}: {err}"))?;
        Ok(self.path_for(name))
    }
}

fn file_name(name: &str) -> String {
    format!("{name}.pem")
}
