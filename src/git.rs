//! Cloning and updating the repositories of the final model.

use std::fs;
use std::path::Path;
use std::process::{Command, ExitStatus};

use failure::{Error, ResultExt};
use failure_derive::Fail;
use log::{debug, info, trace};

use crate::repo::Repository;

/// Back up a single repository at `dest`.
///
/// If `dest` doesn't exist yet the repository is cloned into it (submodules
/// included); otherwise we pull and update submodules in place.
pub fn backup_repo(repo: &Repository, dest: &Path) -> Result<(), Error> {
    info!("Backing up {}", repo.full_name());

    if let Some(parent) = dest.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).with_context(|_| {
                format!("Couldn't create the target directory ({})", parent.display())
            })?;
        }
    }

    if !dest.exists() {
        let dir = dest
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&repo.name);
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        run_command(
            repo,
            parent,
            &["clone", "--recurse-submodules", &repo.url, dir],
        )?;
    } else {
        run_command(repo, dest, &["pull", "--all"])?;
        run_command(repo, dest, &["submodule", "update", "--recursive", "--init"])?;
    }

    info!("{} is up to date", repo.full_name());
    Ok(())
}

fn run_command(repo: &Repository, dir: &Path, args: &[&str]) -> Result<(), Error> {
    trace!("({}) Running git {:?}", repo.full_name(), args);

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|_| format!("Couldn't run git {:?}", args))?;

    trace!("({}) Exit Status: {}", repo.full_name(), output.status);
    if !output.stdout.is_empty() {
        trace!(
            "({}) Stdout: {:?}",
            repo.full_name(),
            String::from_utf8_lossy(&output.stdout)
        );
    }

    if output.status.success() {
        Ok(())
    } else {
        debug!(
            "({}) stderr for failed command: {:?}",
            repo.full_name(),
            String::from_utf8_lossy(&output.stderr)
        );
        Err(CommandFailed {
            repository: repo.full_name(),
            command: format!("git {}", args.join(" ")),
            status: output.status,
        }
        .into())
    }
}

/// A git subcommand exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "({}) `{}` failed with {}", repository, command, status)]
pub struct CommandFailed {
    repository: String,
    command: String,
    status: ExitStatus,
}
