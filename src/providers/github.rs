//! The GitHub REST API client.

use failure::{Error, ResultExt};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use sec::Secret;
use serde_derive::Deserialize;

use crate::providers::pagination::Paginated;
use crate::providers::ProviderClient;
use crate::repo::Provider;

pub const API_ROOT: &str = "https://api.github.com";
const MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const AGENT: &str = concat!("git-backup/", env!("CARGO_PKG_VERSION"));

/// An interface to the repositories stored on GitHub.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    provider: Provider,
    api_root: String,
    client: Client,
    headers: HeaderMap,
}

impl GitHubClient {
    /// A client for github.com.
    pub fn official(token: Secret<String>) -> Result<GitHubClient, Error> {
        let provider = Provider::github(token);
        let headers = headers(&provider)?;

        Ok(GitHubClient {
            provider,
            api_root: API_ROOT.to_string(),
            client: Client::new(),
            headers,
        })
    }
}

fn headers(provider: &Provider) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(MEDIA_TYPE));
    headers.insert(USER_AGENT, HeaderValue::from_static(AGENT));

    let mut auth = HeaderValue::from_str(&format!("token {}", provider.token()))
        .context("The token isn't a valid header value")?;
    // Keeps the credential out of any header dump.
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    Ok(headers)
}

impl ProviderClient for GitHubClient {
    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn organizations(&self, username: &str) -> Result<Vec<String>, Error> {
        debug!("Fetching the organizations of {}", username);
        let endpoint = format!("{}/users/{}/orgs?per_page=100", self.api_root, username);

        let mut organizations = Vec::new();
        for org in Paginated::new(&self.client, endpoint, self.headers.clone()) {
            let org: Org = org?;
            organizations.push(org.login);
        }

        debug!("{} is in {} organizations", username, organizations.len());
        Ok(organizations)
    }

    fn repositories(&self, namespace: &str) -> Result<Vec<String>, Error> {
        debug!("Fetching the repositories under {}", namespace);
        let endpoint = format!("{}/users/{}/repos?per_page=100", self.api_root, namespace);

        let mut repositories = Vec::new();
        for repo in Paginated::new(&self.client, endpoint, self.headers.clone()) {
            let repo: RawRepo = repo?;
            // Only keep what the namespace itself owns.
            if repo.owner.login == namespace {
                repositories.push(repo.name);
            }
        }

        debug!("{} repos under {}", repositories.len(), namespace);
        Ok(repositories)
    }

    fn collaborations(&self, username: &str) -> Result<Vec<(String, String)>, Error> {
        debug!("Fetching the collaboration repositories of {}", username);
        let organizations = self.organizations(username)?;
        // Everything the token grants access to, owned or not.
        let endpoint = format!("{}/user/repos?per_page=100", self.api_root);

        let mut collaborations = Vec::new();
        for repo in Paginated::new(&self.client, endpoint, self.headers.clone()) {
            let repo: RawRepo = repo?;
            let owner = repo.owner.login;
            if owner != username && !organizations.contains(&owner) {
                collaborations.push((owner, repo.name));
            }
        }

        debug!(
            "{} collaboration repos for {}",
            collaborations.len(),
            username
        );
        Ok(collaborations)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawRepo {
    name: String,
    owner: Owner,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Owner {
    login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct Org {
    login: String,
}
