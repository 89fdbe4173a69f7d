//! Deriving the on-disk location of a repository.

use std::fmt::{self, Debug, Display, Formatter};
use std::iter::FromIterator;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use failure::{err_msg, Error};

use crate::repo::Repository;

/// The delimiter used when a hierarchy level's value is folded into the
/// final path segment.
pub const DELIMITER: &str = "__";

/// A directory level of the backup hierarchy.
///
/// A full backup path reads `run-name/owner/provider/organization/repo`;
/// each of the first four levels can be flattened away from the directory
/// structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlattenLevel {
    Root,
    User,
    Provider,
    Organization,
}

impl FlattenLevel {
    /// Every level, widest first. This is the order segments appear in a
    /// path and the order folded values are appended to the final segment.
    pub const HIERARCHY: [FlattenLevel; 4] = [
        FlattenLevel::Root,
        FlattenLevel::User,
        FlattenLevel::Provider,
        FlattenLevel::Organization,
    ];

    /// The order the resolver escalates in: narrowest disambiguator first.
    pub const ESCALATION: [FlattenLevel; 4] = [
        FlattenLevel::Organization,
        FlattenLevel::Provider,
        FlattenLevel::User,
        FlattenLevel::Root,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FlattenLevel::Root => "ROOT",
            FlattenLevel::User => "USER",
            FlattenLevel::Provider => "PROVIDER",
            FlattenLevel::Organization => "ORGANIZATION",
        }
    }

    fn mask(self) -> u8 {
        match self {
            FlattenLevel::Root => 1,
            FlattenLevel::User => 1 << 1,
            FlattenLevel::Provider => 1 << 2,
            FlattenLevel::Organization => 1 << 3,
        }
    }
}

impl Display for FlattenLevel {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FlattenLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<FlattenLevel, Error> {
        match s.to_ascii_uppercase().as_str() {
            "ROOT" => Ok(FlattenLevel::Root),
            "USER" => Ok(FlattenLevel::User),
            "PROVIDER" => Ok(FlattenLevel::Provider),
            "ORGANIZATION" => Ok(FlattenLevel::Organization),
            other => Err(err_msg(format!(
                "unknown hierarchy level {:?} (expected ROOT, USER, PROVIDER or ORGANIZATION)",
                other
            ))),
        }
    }
}

/// A small set of [`FlattenLevel`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelSet(u8);

impl LevelSet {
    pub fn empty() -> LevelSet {
        LevelSet(0)
    }

    pub fn all() -> LevelSet {
        FlattenLevel::HIERARCHY.iter().copied().collect()
    }

    pub fn contains(self, level: FlattenLevel) -> bool {
        self.0 & level.mask() != 0
    }

    pub fn insert(&mut self, level: FlattenLevel) {
        self.0 |= level.mask();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_all(self) -> bool {
        self == LevelSet::all()
    }

    pub fn levels(self) -> impl Iterator<Item = FlattenLevel> {
        FlattenLevel::HIERARCHY
            .iter()
            .copied()
            .filter(move |level| self.contains(*level))
    }
}

impl FromIterator<FlattenLevel> for LevelSet {
    fn from_iter<I: IntoIterator<Item = FlattenLevel>>(iter: I) -> LevelSet {
        let mut set = LevelSet::empty();
        for level in iter {
            set.insert(level);
        }
        set
    }
}

impl Display for LevelSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }

        for (i, level) in self.levels().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            Display::fmt(&level, f)?;
        }
        Ok(())
    }
}

impl Debug for LevelSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "LevelSet({})", self)
    }
}

/// The relative path a repository will be backed up under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputedPath(PathBuf);

impl ComputedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ComputedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for ComputedPath {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Compute the candidate path for a repository.
///
/// Levels in `flattened` are left out of the directory structure; the
/// remaining levels appear as directories in hierarchy order, ending with
/// the repository name. Levels in `folded` have their value appended to the
/// name segment (hierarchy order, joined with [`DELIMITER`]), so the
/// filename carries exactly the information the resolver decided was needed
/// to keep the path unique.
///
/// The result depends only on the arguments; the resolver relies on this
/// when it recomputes candidates during escalation.
pub fn compose(repo: &Repository, flattened: LevelSet, folded: LevelSet) -> ComputedPath {
    let mut path = PathBuf::new();

    for level in FlattenLevel::HIERARCHY.iter() {
        if !flattened.contains(*level) {
            path.push(level_value(repo, *level).as_ref());
        }
    }

    let mut leaf = repo.name.clone();
    for level in FlattenLevel::HIERARCHY.iter() {
        if folded.contains(*level) {
            leaf.push_str(DELIMITER);
            leaf.push_str(level_value(repo, *level).as_ref());
        }
    }
    path.push(leaf);

    ComputedPath(path)
}

fn level_value(repo: &Repository, level: FlattenLevel) -> std::borrow::Cow<'_, str> {
    use std::borrow::Cow;

    match level {
        FlattenLevel::Root => Cow::Borrowed(repo.backup.as_str()),
        FlattenLevel::User => Cow::Borrowed(repo.owner.as_str()),
        FlattenLevel::Provider => repo.provider.label(),
        FlattenLevel::Organization => Cow::Borrowed(repo.organization.as_str()),
    }
}
