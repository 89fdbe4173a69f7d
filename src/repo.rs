//! The providers and repositories discovered during a backup run.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use sec::Secret;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_derive::Serialize;

pub const GITHUB_URL: &str = "https://github.com";
pub const GITLAB_URL: &str = "https://gitlab.com";

/// The kind of git host a repository lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProviderKind {
    GitHub,
    GitLab,
    Custom,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GITHUB",
            ProviderKind::GitLab => "GITLAB",
            ProviderKind::Custom => "CUSTOM",
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A git host repositories can be enumerated from.
///
/// Immutable once constructed. The credential can't leak through `Debug`
/// ([`Secret`] masks it) and is skipped when serializing.
#[derive(Debug, Clone)]
pub struct Provider {
    pub kind: ProviderKind,
    pub base_url: String,
    token: Secret<String>,
}

impl Provider {
    pub fn github(token: Secret<String>) -> Provider {
        Provider {
            kind: ProviderKind::GitHub,
            base_url: GITHUB_URL.to_string(),
            token,
        }
    }

    pub fn gitlab(token: Secret<String>) -> Provider {
        Provider {
            kind: ProviderKind::GitLab,
            base_url: GITLAB_URL.to_string(),
            token,
        }
    }

    /// A custom (self-hosted) provider.
    pub fn custom(base_url: &str, token: Secret<String>) -> Provider {
        Provider {
            kind: ProviderKind::Custom,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// The path segment identifying this provider in a backup path.
    ///
    /// Official hosts use the provider kind; custom hosts derive a label
    /// from their hostname so two custom hosts never share a segment.
    pub fn label(&self) -> Cow<'static, str> {
        match self.kind {
            ProviderKind::Custom => Cow::Owned(host_label(&self.base_url)),
            other => Cow::Borrowed(other.name()),
        }
    }

    /// Where a repository under `namespace` can be cloned from.
    pub fn clone_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}/{}.git", self.base_url, namespace, name)
    }

    pub(crate) fn token(&self) -> &str {
        self.token.reveal_str()
    }
}

impl PartialEq for Provider {
    /// Providers compare by identity (kind and host), not by credential.
    fn eq(&self, other: &Provider) -> bool {
        self.kind == other.kind && self.base_url == other.base_url
    }
}

impl Eq for Provider {}

impl Serialize for Provider {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The credential is deliberately left out.
        let mut state = serializer.serialize_struct("Provider", 2)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("url", &self.base_url)?;
        state.end()
    }
}

/// Turn a host URL into a filesystem-friendly label,
/// `https://git.example.com/` becoming `GIT_EXAMPLE_COM`.
pub(crate) fn host_label(url: &str) -> String {
    let after_scheme = url.splitn(2, "://").last().unwrap_or(url);
    let host = after_scheme
        .split(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(after_scheme);

    host.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// One repository discovered during a backup run.
///
/// Every field is set at discovery time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repository {
    /// The name of the backup run this repository was discovered in.
    pub backup: String,
    /// The username whose account led us here.
    pub owner: String,
    pub provider: Provider,
    /// The namespace the repository lives under. Equals `owner` when the
    /// user owns the repository directly.
    pub organization: String,
    pub name: String,
    /// Where the repository will be cloned from.
    pub url: String,
}

impl Repository {
    pub fn new(
        backup: &str,
        owner: &str,
        provider: Provider,
        organization: &str,
        name: &str,
    ) -> Repository {
        let url = provider.clone_url(organization, name);

        Repository {
            backup: backup.to_string(),
            owner: owner.to_string(),
            provider,
            organization: organization.to_string(),
            name: name.to_string(),
            url,
        }
    }

    /// `provider/organization/name`, for log messages.
    pub fn full_name(&self) -> String {
        format!("{}/{}/{}", self.provider.label(), self.organization, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_labels() {
        assert_eq!(host_label("https://git.example.com/"), "GIT_EXAMPLE_COM");
        assert_eq!(host_label("git.example.com:8443"), "GIT_EXAMPLE_COM");
        assert_eq!(host_label("https://code.my-corp.io/gitlab"), "CODE_MY_CORP_IO");
    }

    #[test]
    fn official_labels_use_the_kind() {
        let gh = Provider::github(Secret::new(String::from("tok")));
        let gl = Provider::gitlab(Secret::new(String::from("tok")));

        assert_eq!(gh.label(), "GITHUB");
        assert_eq!(gl.label(), "GITLAB");
    }

    #[test]
    fn clone_urls() {
        let gh = Provider::github(Secret::new(String::from("tok")));

        assert_eq!(
            gh.clone_url("acme", "tool"),
            "https://github.com/acme/tool.git"
        );
    }

    #[test]
    fn debug_never_reveals_the_token() {
        let provider = Provider::custom("https://git.example.com", Secret::new(String::from("hunter2")));

        let printed = format!("{:?}", provider);

        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn providers_compare_by_identity() {
        let a = Provider::github(Secret::new(String::from("one")));
        let b = Provider::github(Secret::new(String::from("two")));

        assert_eq!(a, b);
    }
}
