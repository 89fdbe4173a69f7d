//! The backup model and the discovery loop that fills it.

use failure::{Error, ResultExt};
use indexmap::IndexMap;
use log::{debug, info};

use crate::paths::ComputedPath;
use crate::providers::ProviderClient;
use crate::repo::Repository;
use crate::resolver::{PathSpec, Resolver};

/// The final mapping from unique on-disk paths to repositories, the one
/// artifact the clone step and the report writer consume.
///
/// Keys are unique by construction and iteration follows discovery order.
#[derive(Debug, Clone, Default)]
pub struct BackupModel {
    entries: IndexMap<ComputedPath, Repository>,
}

impl PartialEq for BackupModel {
    /// Order-sensitive: two models are equal only when they hold the same
    /// entries in the same discovery order.
    fn eq(&self, other: &BackupModel) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|(a, b)| a == b)
    }
}

impl BackupModel {
    pub fn new() -> BackupModel {
        BackupModel::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &ComputedPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &ComputedPath) -> Option<&Repository> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ComputedPath, &Repository)> {
        self.entries.iter()
    }

    pub(crate) fn insert(&mut self, path: ComputedPath, repo: Repository) {
        self.entries.insert(path, repo);
    }

    pub(crate) fn remove(&mut self, path: &ComputedPath) -> Option<Repository> {
        self.entries.shift_remove(path)
    }
}

/// Discover every repository reachable from `usernames` through
/// `providers` and resolve each one into a fresh model.
///
/// The iteration order is fixed so the resolver sees repositories in a
/// deterministic sequence: providers in the given order, then usernames in
/// the given order, then the user's own namespace followed by their
/// organizations, then repositories as the provider reports them, then the
/// user's collaboration repositories. A provider failure aborts the whole
/// run.
pub fn build_model(
    providers: &[Box<dyn ProviderClient>],
    usernames: &[String],
    backup_name: &str,
    spec: &PathSpec,
) -> Result<BackupModel, Error> {
    let mut model = BackupModel::new();
    let mut resolver = Resolver::new(*spec);

    for provider in providers {
        for username in usernames {
            discover_user(
                provider.as_ref(),
                username,
                backup_name,
                &mut resolver,
                &mut model,
            )?;
        }
    }

    Ok(model)
}

fn discover_user(
    provider: &dyn ProviderClient,
    username: &str,
    backup_name: &str,
    resolver: &mut Resolver,
    model: &mut BackupModel,
) -> Result<(), Error> {
    info!(
        "Discovering repositories for {} on {}",
        username,
        provider.provider().base_url
    );

    let organizations = provider
        .organizations(username)
        .with_context(|_| format!("Unable to list the organizations of {}", username))?;

    // The user's own namespace always comes first.
    let mut namespaces = vec![username.to_string()];
    namespaces.extend(organizations.into_iter().filter(|org| org != username));

    for namespace in &namespaces {
        let repos = provider
            .repositories(namespace)
            .with_context(|_| format!("Unable to list the repositories under {}", namespace))?;
        debug!("Found {} repositories under {}", repos.len(), namespace);

        for name in repos {
            let repo = Repository::new(
                backup_name,
                username,
                provider.provider().clone(),
                namespace,
                &name,
            );
            resolver.ingest(repo, model);
        }
    }

    // Repositories the user can reach without owning them come last, under
    // the namespace they actually live in.
    let collaborations = provider
        .collaborations(username)
        .with_context(|_| format!("Unable to list the collaborations of {}", username))?;

    for (namespace, name) in collaborations {
        let repo = Repository::new(
            backup_name,
            username,
            provider.provider().clone(),
            &namespace,
            &name,
        );
        resolver.ingest(repo, model);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::{compose, LevelSet};
    use crate::repo::Provider;
    use failure::err_msg;
    use sec::Secret;
    use std::collections::HashMap;

    struct MockProvider {
        provider: Provider,
        organizations: Vec<String>,
        repositories: HashMap<String, Vec<String>>,
        collaborations: Vec<(String, String)>,
        fail_for: Option<String>,
    }

    impl MockProvider {
        fn new(orgs: &[&str], repos: &[(&str, &[&str])]) -> MockProvider {
            MockProvider {
                provider: Provider::github(Secret::new(String::from("tok"))),
                organizations: orgs.iter().map(|s| s.to_string()).collect(),
                repositories: repos
                    .iter()
                    .map(|(ns, names)| {
                        (
                            ns.to_string(),
                            names.iter().map(|n| n.to_string()).collect(),
                        )
                    })
                    .collect(),
                collaborations: Vec::new(),
                fail_for: None,
            }
        }
    }

    impl ProviderClient for MockProvider {
        fn provider(&self) -> &Provider {
            &self.provider
        }

        fn organizations(&self, username: &str) -> Result<Vec<String>, Error> {
            if self.fail_for.as_deref() == Some(username) {
                return Err(err_msg("the API fell over"));
            }
            Ok(self.organizations.clone())
        }

        fn repositories(&self, namespace: &str) -> Result<Vec<String>, Error> {
            Ok(self
                .repositories
                .get(namespace)
                .cloned()
                .unwrap_or_default())
        }

        fn collaborations(&self, _username: &str) -> Result<Vec<(String, String)>, Error> {
            Ok(self.collaborations.clone())
        }
    }

    fn boxed(provider: MockProvider) -> Vec<Box<dyn ProviderClient>> {
        vec![Box::new(provider)]
    }

    #[test]
    fn own_namespace_is_discovered_first() {
        let provider = MockProvider::new(
            &["acme"],
            &[("alice", &["tool", "dots"]), ("acme", &["tool"])],
        );
        let spec = PathSpec::default();

        let model =
            build_model(&boxed(provider), &[String::from("alice")], "run", &spec).unwrap();

        let owners: Vec<_> = model.iter().map(|(_, r)| r.organization.clone()).collect();
        assert_eq!(owners, vec!["alice", "alice", "acme"]);
    }

    #[test]
    fn duplicate_own_namespace_is_not_visited_twice() {
        // Some providers report the user's namespace as an organization.
        let provider = MockProvider::new(&["alice", "acme"], &[("alice", &["tool"])]);
        let spec = PathSpec::default();

        let model =
            build_model(&boxed(provider), &[String::from("alice")], "run", &spec).unwrap();

        assert_eq!(model.len(), 1);
    }

    #[test]
    fn the_run_name_is_threaded_through_every_identity() {
        let provider = MockProvider::new(&[], &[("alice", &["tool"])]);
        let spec = PathSpec::default();

        let model =
            build_model(&boxed(provider), &[String::from("alice")], "2024-01-01T10:00:00", &spec)
                .unwrap();

        let (path, repo) = model.iter().next().unwrap();
        assert_eq!(repo.backup, "2024-01-01T10:00:00");
        assert!(path.as_path().starts_with("2024-01-01T10:00:00"));
    }

    #[test]
    fn collaboration_repos_come_last_under_their_own_namespace() {
        let mut provider = MockProvider::new(&[], &[("alice", &["tool"])]);
        provider.collaborations = vec![(String::from("friend"), String::from("shared"))];
        let spec = PathSpec::default();

        let model =
            build_model(&boxed(provider), &[String::from("alice")], "run", &spec).unwrap();

        let paths: Vec<_> = model.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            paths,
            vec!["run/alice/GITHUB/alice/tool", "run/alice/GITHUB/friend/shared"]
        );

        let (_, shared) = model.iter().nth(1).unwrap();
        assert_eq!(shared.owner, "alice");
        assert_eq!(shared.organization, "friend");
        assert_eq!(shared.url, "https://github.com/friend/shared.git");
    }

    #[test]
    fn model_equality_is_order_sensitive() {
        let provider = Provider::github(Secret::new(String::from("tok")));
        let a = Repository::new("run", "alice", provider.clone(), "alice", "a");
        let b = Repository::new("run", "alice", provider, "alice", "b");
        let path_a = compose(&a, LevelSet::empty(), LevelSet::empty());
        let path_b = compose(&b, LevelSet::empty(), LevelSet::empty());

        let mut forward = BackupModel::new();
        forward.insert(path_a.clone(), a.clone());
        forward.insert(path_b.clone(), b.clone());

        let mut backward = BackupModel::new();
        backward.insert(path_b, b);
        backward.insert(path_a, a);

        assert_ne!(forward, backward);
    }

    #[test]
    fn building_twice_gives_identical_models() {
        let spec = PathSpec::default();
        let build = || {
            let provider = MockProvider::new(
                &["acme"],
                &[("alice", &["tool"]), ("acme", &["tool", "site"])],
            );
            build_model(&boxed(provider), &[String::from("alice")], "run", &spec).unwrap()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn provider_failures_abort_the_run() {
        let mut provider = MockProvider::new(&[], &[("alice", &["tool"])]);
        provider.fail_for = Some(String::from("alice"));
        let spec = PathSpec::default();

        let got = build_model(&boxed(provider), &[String::from("alice")], "run", &spec);

        assert!(got.is_err());
    }
}
