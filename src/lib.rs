//! Back up the git repositories a set of users can reach across GitHub,
//! GitLab and custom hosts.
//!
//! Discovery walks every configured provider for every username and feeds
//! each repository, in a fixed deterministic order, into a [`Resolver`]
//! which derives its on-disk path and settles collisions between
//! repositories that would land in the same place. The result is a
//! [`BackupModel`] mapping unique relative paths to repositories; the
//! [`Driver`] clones every entry under the backup root and optionally
//! writes a JSON report of the run.

pub mod config;
pub mod driver;
pub mod git;
pub mod model;
pub mod paths;
pub mod providers;
pub mod repo;
pub mod report;
pub mod resolver;
pub mod token;

pub use crate::config::{Config, ConfigError};
pub use crate::driver::{Driver, UpdateFailure};
pub use crate::model::{build_model, BackupModel};
pub use crate::paths::{compose, ComputedPath, FlattenLevel, LevelSet};
pub use crate::repo::{Provider, ProviderKind, Repository};
pub use crate::resolver::{CollisionStrategy, PathSpec, Resolver};
