//! One pretty-printed JSON file per testcase.

use dfg_common::schema::check_compatible;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{validate_testcase_name, StoreError, TestcaseStore};
use crate::model::Testcase;

const EXTENSION: &str = "json";

/// Stores `<dir>/<name>.json`, written atomically via a temp file.
#[derive(Debug, Clone)]
pub struct FileTestcaseStore {
    dir: PathBuf,
}

impl FileTestcaseStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_testcase_name(name)?;
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl TestcaseStore for FileTestcaseStore {
    fn write(&self, name: &str, testcase: &Testcase) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;

        let json = serde_json::to_vec_pretty(testcase).map_err(|source| StoreError::Json {
            name: name.to_string(),
            source,
        })?;

        // Write atomically
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(io_error(&tmp_path))?;
            file.write_all(&json).map_err(io_error(&tmp_path))?;
            file.flush().map_err(io_error(&tmp_path))?;
        }
        fs::rename(&tmp_path, &path).map_err(io_error(&path))?;

        debug!(path = %path.display(), expectations = testcase.expectations.len(), "testcase written");
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Testcase, StoreError> {
        let path = self.path_for(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(io_error(&path)(e)),
        };
        let testcase: Testcase =
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                name: name.to_string(),
                source,
            })?;
        check_compatible(&testcase.schema_version).map_err(|source| {
            StoreError::IncompatibleSchema {
                name: name.to_string(),
                source,
            }
        })?;
        Ok(testcase)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(io_error(&path)(e)),
        }
    }
}
