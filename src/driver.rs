//! The glue tying discovery, resolution, cloning and reporting together.

use std::io::Write;

use failure::Error;
use failure_derive::Fail;
use log::{info, warn};

use crate::config::Config;
use crate::git;
use crate::model::{build_model, BackupModel};
use crate::providers;
use crate::report;

/// Drives an entire backup run.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    config: Config,
}

impl Driver {
    pub fn with_config(config: Config) -> Driver {
        Driver { config }
    }

    pub fn run(&self) -> Result<(), Error> {
        let providers = providers::from_config(&self.config)?;

        let model = build_model(
            &providers,
            &self.config.usernames,
            &self.config.backup_name,
            &self.config.path_spec,
        )?;
        info!("Discovered {} repositories", model.len());

        if let Some(report_path) = &self.config.json_report {
            report::write_json(&model, report_path)?;
            info!("Wrote the backup report to {}", report_path.display());
        }

        self.update_repos(&model)?;

        Ok(())
    }

    fn update_repos(&self, model: &BackupModel) -> Result<(), UpdateFailure> {
        info!("Updating repositories");
        let mut errors = Vec::new();

        for (path, repo) in model.iter() {
            let dest = self.config.backup_root.join(path.as_path());
            if let Err(e) = git::backup_repo(repo, &dest) {
                warn!("Updating {} failed, {}", repo.full_name(), e);
                errors.push((repo.full_name(), e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(UpdateFailure { errors })
        }
    }
}

/// One or more repositories couldn't be backed up.
#[derive(Debug, Fail)]
#[fail(display = "one or more errors encountered while updating repos")]
pub struct UpdateFailure {
    errors: Vec<(String, Error)>,
}

impl UpdateFailure {
    pub fn display<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        writeln!(
            writer,
            "There were {} errors updating repositories",
            self.errors.len()
        )?;

        for (name, err) in &self.errors {
            writeln!(writer, "Error: {} failed with {}", name, err)?;
            for cause in err.iter_causes() {
                writeln!(writer, "\tCaused By: {}", cause)?;
            }
        }

        Ok(())
    }
}
