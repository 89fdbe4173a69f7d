//! Where repositories are discovered from.

mod github;
mod gitlab;
mod pagination;

pub use self::github::GitHubClient;
pub use self::gitlab::GitLabClient;
pub use self::pagination::FailedRequest;

use failure::Error;
use log::warn;

use crate::config::Config;
use crate::repo::Provider;
use crate::token;

/// Something which can enumerate the repositories a user can reach.
pub trait ProviderClient {
    /// The provider this client talks to.
    fn provider(&self) -> &Provider;

    /// The organizations `username` belongs to.
    fn organizations(&self, username: &str) -> Result<Vec<String>, Error>;

    /// The names of the repositories under a user or organization
    /// namespace.
    fn repositories(&self, namespace: &str) -> Result<Vec<String>, Error>;

    /// Repositories the user can access but neither owns nor reaches
    /// through one of their organizations, as `(namespace, name)` pairs.
    ///
    /// Providers without the concept report none.
    fn collaborations(&self, _username: &str) -> Result<Vec<(String, String)>, Error> {
        Ok(Vec::new())
    }
}

/// Construct a client for every provider the configuration asks for,
/// retrieving each provider's credential along the way.
pub fn from_config(cfg: &Config) -> Result<Vec<Box<dyn ProviderClient>>, Error> {
    let mut clients: Vec<Box<dyn ProviderClient>> = Vec::new();

    if cfg.github {
        clients.push(Box::new(GitHubClient::official(token::github_official()?)?));
    }
    if cfg.gitlab {
        clients.push(Box::new(GitLabClient::official(token::gitlab_official()?)?));
    }
    for host in &cfg.custom_hosts {
        clients.push(Box::new(GitLabClient::custom(
            host,
            token::custom_host(host)?,
        )?));
    }

    if clients.is_empty() {
        warn!("No providers configured");
    }

    Ok(clients)
}
