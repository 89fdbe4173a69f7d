//! What a single backup run looks like.

use std::fmt::Write;
use std::path::PathBuf;

use failure_derive::Fail;

use crate::repo::{GITHUB_URL, GITLAB_URL};
use crate::resolver::PathSpec;

/// Everything one backup run needs to know. Built and validated at the CLI
/// boundary before the core ever runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub usernames: Vec<String>,
    /// The name of the root backup folder, generated once per run.
    pub backup_name: String,
    /// The directory backups are placed under.
    pub backup_root: PathBuf,
    /// Include github.com.
    pub github: bool,
    /// Include gitlab.com.
    pub gitlab: bool,
    /// Custom GitLab hosts.
    pub custom_hosts: Vec<String>,
    pub keep_hierarchy: bool,
    pub path_spec: PathSpec,
    /// Where to write the JSON report, if anywhere.
    pub json_report: Option<PathBuf>,
}

impl Config {
    /// Reject contradictory configurations before any discovery happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.usernames.is_empty() {
            return Err(ConfigError::NoUsernames);
        }
        // Custom hosts don't excuse this; the official pair is mandatory.
        if !self.github && !self.gitlab {
            return Err(ConfigError::NoOfficialProviders);
        }
        // Flattening every level makes the hierarchy disappear, so asking
        // for both is contradictory.
        if self.keep_hierarchy && self.path_spec.flattened.is_all() {
            return Err(ConfigError::FlattenedHierarchy);
        }

        Ok(())
    }

    /// The human-readable run summary printed in verbose mode.
    pub fn summary(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "BACKUP SUMMARY:");
        let _ = writeln!(out, "Backing up the following users:");
        for user in &self.usernames {
            let _ = writeln!(out, "  - {}", user);
        }

        let _ = writeln!(out, "Using the following providers:");
        if self.github {
            let _ = writeln!(out, "  - GitHub ({})", GITHUB_URL);
        }
        if self.gitlab {
            let _ = writeln!(out, "  - GitLab ({})", GITLAB_URL);
        }
        for host in &self.custom_hosts {
            let _ = writeln!(out, "  - GitLab ({})", host);
        }

        let _ = writeln!(out, "* Backup run name:     {}", self.backup_name);
        let _ = writeln!(out, "* Backup folder:       {}", self.backup_root.display());
        match &self.json_report {
            Some(path) => {
                let _ = writeln!(out, "* JSON report:         {}", path.display());
            }
            None => {
                let _ = writeln!(out, "* JSON report:         disabled");
            }
        }
        let _ = writeln!(
            out,
            "* Keep hierarchy:      {}",
            if self.keep_hierarchy { "Yes" } else { "No" }
        );
        let _ = writeln!(out, "* Flattened levels:    {}", self.path_spec.flattened);
        let _ = writeln!(out, "* Collision strategy:  {}", self.path_spec.strategy);

        out
    }
}

/// A contradictory or unusable configuration.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum ConfigError {
    #[fail(display = "at least one username is required")]
    NoUsernames,
    #[fail(display = "GitHub and GitLab cannot both be excluded; at least one must remain")]
    NoOfficialProviders,
    #[fail(display = "flattening every level while keeping the hierarchy makes no sense")]
    FlattenedHierarchy,
    #[fail(
        display = "a collision strategy is pointless when the full hierarchy is kept and nothing is flattened"
    )]
    NeedlessStrategy,
}
