// src/ingest/ledger.rs
//! Newline-delimited file of source ids that were fully handled by an earlier run.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct SeenLedger {
    path: Option<PathBuf>,
    ids: HashSet<String>,
}

impl SeenLedger {
    /// Ledger that is never persisted (dry runs, tests).
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load ids from `path`. A missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let ids = match fs::read_to_string(&path) {
            Ok(s) => s
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: Some(path),
            ids,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Remember `id` and append it to the backing file.
    pub fn record(&mut self, id: &str) -> io::Result<()> {
        if !self.ids.insert(id.to_string()) {
            return Ok(());
        }
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let mut f = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(f, "{id}")
    }
}
