//! Resolving path collisions between discovered repositories.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use failure::{err_msg, Error};
use log::{debug, warn};

use crate::model::BackupModel;
use crate::paths::{compose, ComputedPath, FlattenLevel, LevelSet};
use crate::repo::Repository;

/// What to do when two repositories compute to the same backup path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionStrategy {
    /// Drop the later repository. Logged, non-fatal.
    Ignore,
    /// Fold one more level at a time into the new repository's filename
    /// until its path is free; the earlier entry keeps its shorter path.
    Shortest,
    /// Like `Shortest`, but once a repository name has collided every later
    /// repository with that name is escalated straight to the winning fold.
    ShortestSystematic,
    /// On collision, move every repository with that name to its maximally
    /// folded path, freeing the short one.
    Systematic,
}

impl Default for CollisionStrategy {
    fn default() -> CollisionStrategy {
        CollisionStrategy::ShortestSystematic
    }
}

impl CollisionStrategy {
    pub fn name(self) -> &'static str {
        match self {
            CollisionStrategy::Ignore => "IGNORE",
            CollisionStrategy::Shortest => "SHORTEST",
            CollisionStrategy::ShortestSystematic => "SHORTEST_SYSTEMATIC",
            CollisionStrategy::Systematic => "SYSTEMATIC",
        }
    }
}

impl Display for CollisionStrategy {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollisionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<CollisionStrategy, Error> {
        match s.to_ascii_uppercase().as_str() {
            "IGNORE" => Ok(CollisionStrategy::Ignore),
            // RENAME is the historical alias for the shortest-name strategy.
            "SHORTEST" | "RENAME" => Ok(CollisionStrategy::Shortest),
            "SHORTEST_SYSTEMATIC" => Ok(CollisionStrategy::ShortestSystematic),
            "SYSTEMATIC" => Ok(CollisionStrategy::Systematic),
            other => Err(err_msg(format!(
                "unknown collision strategy {:?} (expected IGNORE, SHORTEST, SHORTEST_SYSTEMATIC or SYSTEMATIC)",
                other
            ))),
        }
    }
}

/// How backup paths are laid out and what happens when they collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathSpec {
    /// Levels left out of the directory structure.
    pub flattened: LevelSet,
    pub strategy: CollisionStrategy,
}

/// Ingests repositories in discovery order and guarantees that every path
/// in the model maps to exactly one repository.
///
/// Must be fed strictly sequentially; escalation decisions depend on what
/// was ingested before.
#[derive(Debug, Clone)]
pub struct Resolver {
    spec: PathSpec,
    /// Repository names that have collided, and the fold that resolved them.
    escalated: HashMap<String, LevelSet>,
}

impl Resolver {
    pub fn new(spec: PathSpec) -> Resolver {
        Resolver {
            spec,
            escalated: HashMap::new(),
        }
    }

    /// Feed one discovered repository into the model.
    ///
    /// Always leaves the model with unique keys. A repository that can't be
    /// separated from an earlier one (identical in every path-relevant
    /// field) is dropped with a warning instead of looping.
    pub fn ingest(&mut self, repo: Repository, model: &mut BackupModel) {
        let folded = match self.spec.strategy {
            CollisionStrategy::ShortestSystematic | CollisionStrategy::Systematic => self
                .escalated
                .get(&repo.name)
                .copied()
                .unwrap_or_default(),
            _ => LevelSet::empty(),
        };

        let candidate = compose(&repo, self.spec.flattened, folded);
        if !model.contains(&candidate) {
            model.insert(candidate, repo);
            return;
        }

        match self.spec.strategy {
            CollisionStrategy::Ignore => {
                warn!(
                    "{} collides with an earlier repository at {}; skipping it",
                    repo.full_name(),
                    candidate
                );
            }
            CollisionStrategy::Shortest | CollisionStrategy::ShortestSystematic => {
                self.escalate(repo, folded, model)
            }
            CollisionStrategy::Systematic => self.make_systematic(repo, candidate, model),
        }
    }

    /// Fold one more flattened level at a time, narrowest first, until the
    /// candidate path is free.
    ///
    /// Only statically flattened levels are considered: a collision implies
    /// the two repositories already agree on every kept directory, so
    /// folding a kept level can never separate them.
    fn escalate(&mut self, repo: Repository, mut folded: LevelSet, model: &mut BackupModel) {
        for level in FlattenLevel::ESCALATION.iter() {
            if !self.spec.flattened.contains(*level) || folded.contains(*level) {
                continue;
            }

            folded.insert(*level);
            let candidate = compose(&repo, self.spec.flattened, folded);

            if !model.contains(&candidate) {
                debug!("Escalated {} to {}", repo.full_name(), candidate);
                if self.spec.strategy == CollisionStrategy::ShortestSystematic {
                    self.escalated.insert(repo.name.clone(), folded);
                }
                model.insert(candidate, repo);
                return;
            }
        }

        // Every flattened level is folded into the filename and the path is
        // still taken, so the repositories agree on every path-relevant
        // field. Keep the first.
        warn!(
            "{} was discovered more than once; keeping the first copy",
            repo.full_name()
        );
    }

    /// Move the colliding pair (and every later repository with this name)
    /// to their maximally folded paths, freeing the short one.
    fn make_systematic(
        &mut self,
        repo: Repository,
        collided: ComputedPath,
        model: &mut BackupModel,
    ) {
        let full = self.spec.flattened;
        self.escalated.insert(repo.name.clone(), full);

        if let Some(previous) = model.remove(&collided) {
            let previous_path = compose(&previous, self.spec.flattened, full);
            debug!("Moved {} to {}", previous.full_name(), previous_path);
            insert_or_drop(model, previous_path, previous);
        }

        let path = compose(&repo, self.spec.flattened, full);
        insert_or_drop(model, path, repo);
    }
}

fn insert_or_drop(model: &mut BackupModel, path: ComputedPath, repo: Repository) {
    if model.contains(&path) {
        warn!(
            "{} was discovered more than once; keeping the first copy",
            repo.full_name()
        );
    } else {
        model.insert(path, repo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Provider;
    use sec::Secret;
    use std::path::Path;

    fn github() -> Provider {
        Provider::github(Secret::new(String::from("tok")))
    }

    fn gitlab() -> Provider {
        Provider::gitlab(Secret::new(String::from("tok")))
    }

    fn custom() -> Provider {
        Provider::custom("https://git.example.com", Secret::new(String::from("tok")))
    }

    fn repo(provider: Provider, owner: &str, org: &str, name: &str) -> Repository {
        Repository::new("run", owner, provider, org, name)
    }

    fn spec(levels: &[FlattenLevel], strategy: CollisionStrategy) -> PathSpec {
        PathSpec {
            flattened: levels.iter().copied().collect(),
            strategy,
        }
    }

    fn ingest_all(spec: PathSpec, repos: Vec<Repository>) -> BackupModel {
        let mut resolver = Resolver::new(spec);
        let mut model = BackupModel::new();
        for repo in repos {
            resolver.ingest(repo, &mut model);
        }
        model
    }

    fn paths(model: &BackupModel) -> Vec<String> {
        model.iter().map(|(p, _)| p.to_string()).collect()
    }

    #[test]
    fn full_hierarchy_never_collides() {
        let spec = spec(&[], CollisionStrategy::Shortest);
        let model = ingest_all(
            spec,
            vec![
                repo(github(), "alice", "alice", "tool"),
                repo(github(), "alice", "acme", "tool"),
            ],
        );

        assert_eq!(
            paths(&model),
            vec!["run/alice/GITHUB/alice/tool", "run/alice/GITHUB/acme/tool"]
        );
    }

    #[test]
    fn ignore_keeps_the_first_discovered() {
        let spec = spec(&[FlattenLevel::Organization], CollisionStrategy::Ignore);
        let first = repo(github(), "alice", "alice", "tool");
        let model = ingest_all(
            spec,
            vec![first.clone(), repo(github(), "alice", "acme", "tool")],
        );

        assert_eq!(model.len(), 1);
        let (path, kept) = model.iter().next().unwrap();
        assert_eq!(path.as_path(), Path::new("run/alice/GITHUB/tool"));
        assert_eq!(kept, &first);
    }

    #[test]
    fn shortest_escalates_only_the_newcomer() {
        let spec = spec(&[FlattenLevel::Organization], CollisionStrategy::Shortest);
        let model = ingest_all(
            spec,
            vec![
                repo(github(), "alice", "alice", "tool"),
                repo(github(), "alice", "acme", "tool"),
            ],
        );

        assert_eq!(
            paths(&model),
            vec!["run/alice/GITHUB/tool", "run/alice/GITHUB/tool__acme"]
        );
    }

    #[test]
    fn shortest_escalates_step_by_step() {
        let spec = spec(
            &[FlattenLevel::Organization, FlattenLevel::Provider],
            CollisionStrategy::Shortest,
        );
        let model = ingest_all(
            spec,
            vec![
                repo(github(), "alice", "acme", "x"),
                repo(gitlab(), "alice", "acme", "x"),
                repo(custom(), "alice", "acme", "x"),
            ],
        );

        // Folding the organization was enough for the second repository;
        // the third needed the provider label as well.
        assert_eq!(
            paths(&model),
            vec![
                "run/alice/x",
                "run/alice/x__acme",
                "run/alice/x__GIT_EXAMPLE_COM__acme",
            ]
        );
    }

    #[test]
    fn escalation_terminates_on_distinct_identities() {
        let all = [
            FlattenLevel::Root,
            FlattenLevel::User,
            FlattenLevel::Provider,
            FlattenLevel::Organization,
        ];
        let spec = spec(&all, CollisionStrategy::Shortest);
        let model = ingest_all(
            spec,
            vec![
                repo(github(), "alice", "acme", "x"),
                repo(github(), "bob", "acme", "x"),
                repo(github(), "carol", "acme", "x"),
            ],
        );

        assert_eq!(model.len(), 3);
        let unique: std::collections::HashSet<_> = paths(&model).into_iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn true_duplicates_are_dropped_not_looped() {
        let spec = spec(
            &[FlattenLevel::Organization],
            CollisionStrategy::Shortest,
        );
        let twin = repo(github(), "alice", "acme", "tool");
        let model = ingest_all(spec, vec![twin.clone(), twin]);

        assert_eq!(model.len(), 1);
    }

    #[test]
    fn systematic_moves_both_to_full_names() {
        let spec = spec(&[FlattenLevel::Organization], CollisionStrategy::Systematic);
        let model = ingest_all(
            spec,
            vec![
                repo(github(), "alice", "alice", "tool"),
                repo(github(), "alice", "acme", "tool"),
                repo(github(), "alice", "zeta", "tool"),
            ],
        );

        // The short path is freed and stays free for this name.
        assert_eq!(
            paths(&model),
            vec![
                "run/alice/GITHUB/tool__alice",
                "run/alice/GITHUB/tool__acme",
                "run/alice/GITHUB/tool__zeta",
            ]
        );
    }

    #[test]
    fn systematic_drops_true_duplicates() {
        let spec = spec(&[FlattenLevel::Organization], CollisionStrategy::Systematic);
        let twin = repo(github(), "alice", "acme", "tool");
        let model = ingest_all(spec, vec![twin.clone(), twin]);

        assert_eq!(model.len(), 1);
        assert_eq!(paths(&model), vec!["run/alice/GITHUB/tool__acme"]);
    }

    #[test]
    fn shortest_systematic_reuses_the_winning_fold() {
        let spec = spec(
            &[FlattenLevel::Organization],
            CollisionStrategy::ShortestSystematic,
        );
        let model = ingest_all(
            spec,
            vec![
                repo(github(), "alice", "alice", "tool"),
                repo(github(), "alice", "acme", "tool"),
                // bob's candidate would be free, but the name is known to
                // collide so it goes straight to the winning fold.
                repo(github(), "bob", "bigco", "tool"),
            ],
        );

        assert_eq!(
            paths(&model),
            vec![
                "run/alice/GITHUB/tool",
                "run/alice/GITHUB/tool__acme",
                "run/bob/GITHUB/tool__bigco",
            ]
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let spec = spec(
            &[FlattenLevel::Organization, FlattenLevel::Provider],
            CollisionStrategy::ShortestSystematic,
        );
        let repos = vec![
            repo(github(), "alice", "acme", "x"),
            repo(gitlab(), "alice", "acme", "x"),
            repo(github(), "alice", "acme", "y"),
        ];

        let first = ingest_all(spec, repos.clone());
        let second = ingest_all(spec, repos);

        assert_eq!(first, second);
    }

    #[test]
    fn every_repository_lands_somewhere_unless_duplicate() {
        for strategy in &[
            CollisionStrategy::Shortest,
            CollisionStrategy::ShortestSystematic,
            CollisionStrategy::Systematic,
        ] {
            let spec = spec(&[FlattenLevel::Organization], *strategy);
            let model = ingest_all(
                spec,
                vec![
                    repo(github(), "alice", "alice", "tool"),
                    repo(github(), "alice", "acme", "tool"),
                    repo(github(), "alice", "alice", "other"),
                ],
            );

            assert_eq!(model.len(), 3, "strategy {}", strategy);
        }
    }

    #[test]
    fn strategy_parsing_accepts_the_rename_alias() {
        assert_eq!(
            "rename".parse::<CollisionStrategy>().unwrap(),
            CollisionStrategy::Shortest
        );
        assert_eq!(
            "SHORTEST_SYSTEMATIC".parse::<CollisionStrategy>().unwrap(),
            CollisionStrategy::ShortestSystematic
        );
        assert!("FULL".parse::<CollisionStrategy>().is_err());
    }
}
