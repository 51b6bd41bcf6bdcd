//! In-memory testcase store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{validate_testcase_name, StoreError, TestcaseStore};
use crate::model::Testcase;

/// Keeps testcases in a map and counts writes.
#[derive(Debug, Default)]
pub struct MemoryTestcaseStore {
    testcases: Mutex<BTreeMap<String, Testcase>>,
    writes: AtomicUsize,
}

impl MemoryTestcaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `testcases`, keyed by their names.
    pub fn with_testcases(testcases: impl IntoIterator<Item = Testcase>) -> Self {
        let store = Self::new();
        {
            let mut map = store.map();
            for tc in testcases {
                map.insert(tc.name.clone(), tc);
            }
        }
        store
    }

    /// Number of successful `write` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn map(&self) -> MutexGuard<'_, BTreeMap<String, Testcase>> {
        self.testcases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TestcaseStore for MemoryTestcaseStore {
    fn write(&self, name: &str, testcase: &Testcase) -> Result<(), StoreError> {
        validate_testcase_name(name)?;
        self.map().insert(name.to_string(), testcase.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Testcase, StoreError> {
        validate_testcase_name(name)?;
        self.map()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.map().keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        validate_testcase_name(name)?;
        self.map()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                name: name.to_string(),
            })
    }
}
