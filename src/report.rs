//! The JSON report describing what was backed up where.

use std::fs::File;
use std::path::Path;

use failure::{Error, ResultExt};
use serde_derive::Serialize;

use crate::model::BackupModel;
use crate::repo::Repository;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Entry<'a> {
    path: &'a Path,
    #[serde(flatten)]
    repository: &'a Repository,
}

/// Write one entry per model entry, in discovery order.
pub fn write_json(model: &BackupModel, path: &Path) -> Result<(), Error> {
    let entries: Vec<Entry> = model
        .iter()
        .map(|(path, repository)| Entry {
            path: path.as_path(),
            repository,
        })
        .collect();

    let file = File::create(path)
        .with_context(|_| format!("Couldn't create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &entries)
        .context("Couldn't serialize the backup report")?;

    Ok(())
}
