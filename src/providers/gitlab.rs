//! The GitLab REST API client, also used for custom (self-hosted) hosts.

use failure::{Error, ResultExt};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use sec::Secret;
use serde_derive::Deserialize;

use crate::providers::pagination::{FailedRequest, Paginated};
use crate::providers::ProviderClient;
use crate::repo::Provider;

/// A client for the GitLab v4 API.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    provider: Provider,
    api_root: String,
    client: Client,
    headers: HeaderMap,
}

impl GitLabClient {
    /// A client for gitlab.com.
    pub fn official(token: Secret<String>) -> Result<GitLabClient, Error> {
        GitLabClient::with_provider(Provider::gitlab(token))
    }

    /// A client for a custom GitLab host.
    pub fn custom(base_url: &str, token: Secret<String>) -> Result<GitLabClient, Error> {
        GitLabClient::with_provider(Provider::custom(base_url, token))
    }

    fn with_provider(provider: Provider) -> Result<GitLabClient, Error> {
        let headers = headers(&provider)?;
        let api_root = format!("{}/api/v4", provider.base_url);

        Ok(GitLabClient {
            provider,
            api_root,
            client: Client::new(),
            headers,
        })
    }

    fn project_names(&self, endpoint: String) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        for project in Paginated::new(&self.client, endpoint, self.headers.clone()) {
            let project: RawProject = project?;
            names.push(project.path);
        }
        Ok(names)
    }
}

fn headers(provider: &Provider) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();

    let mut token = HeaderValue::from_str(provider.token())
        .context("The token isn't a valid header value")?;
    // Keeps the credential out of any header dump.
    token.set_sensitive(true);
    headers.insert(HeaderName::from_static("private-token"), token);

    Ok(headers)
}

impl ProviderClient for GitLabClient {
    fn provider(&self) -> &Provider {
        &self.provider
    }

    fn organizations(&self, username: &str) -> Result<Vec<String>, Error> {
        debug!("Fetching the groups of {}", username);
        // GitLab scopes group listing to the token's user.
        let endpoint = format!("{}/groups?per_page=100", self.api_root);

        let mut groups = Vec::new();
        for group in Paginated::new(&self.client, endpoint, self.headers.clone()) {
            let group: RawGroup = group?;
            groups.push(group.path);
        }

        debug!("{} is in {} groups", username, groups.len());
        Ok(groups)
    }

    fn repositories(&self, namespace: &str) -> Result<Vec<String>, Error> {
        debug!("Fetching the projects under {}", namespace);
        let by_group = format!(
            "{}/groups/{}/projects?per_page=100",
            self.api_root, namespace
        );

        match self.project_names(by_group) {
            Ok(names) => Ok(names),
            Err(err) => {
                // User namespaces aren't groups; retry through the user
                // endpoint before giving up.
                let not_found = err
                    .downcast_ref::<FailedRequest>()
                    .map(|failed| failed.status == StatusCode::NOT_FOUND)
                    .unwrap_or(false);

                if not_found {
                    let by_user = format!(
                        "{}/users/{}/projects?per_page=100",
                        self.api_root, namespace
                    );
                    self.project_names(by_user)
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawGroup {
    path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    path: String,
}
