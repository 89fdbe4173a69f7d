//! Finding provider credentials.
//!
//! Tokens are looked up by name, trying a mounted secret, then a
//! repository-local `secrets/` directory, then the environment. The value
//! is wrapped in a [`Secret`] the moment it is read.

use std::env;
use std::fs;
use std::path::Path;

use failure::Error;
use failure_derive::Fail;
use log::debug;
use sec::Secret;

use crate::repo::host_label;

pub const GITHUB_TOKEN: &str = "GH_TOKEN";
pub const GITLAB_TOKEN: &str = "GL_TOKEN";

const SECRETS_MOUNT: &str = "/run/secrets";
const SECRETS_DIR: &str = "secrets";

pub fn github_official() -> Result<Secret<String>, Error> {
    lookup(GITHUB_TOKEN)
}

pub fn gitlab_official() -> Result<Secret<String>, Error> {
    lookup(GITLAB_TOKEN)
}

/// The token for a custom host lives under a name deduced from its
/// hostname: `https://git.example.com` looks for `Git_example_com_GITLAB`.
pub fn custom_host(url: &str) -> Result<Secret<String>, Error> {
    lookup(&deduced_name(url))
}

fn deduced_name(url: &str) -> String {
    let lower = host_label(url).to_ascii_lowercase();
    let mut chars = lower.chars();

    let capitalized = match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    };

    // Custom hosts are GitLab-flavoured.
    capitalized + "_GITLAB"
}

/// Try each source in priority order, returning the first non-empty value.
pub fn lookup(name: &str) -> Result<Secret<String>, Error> {
    if let Some(value) = from_file(&Path::new(SECRETS_MOUNT).join(name)) {
        return Ok(Secret::new(value));
    }
    if let Some(value) = from_file(&Path::new(SECRETS_DIR).join(name)) {
        return Ok(Secret::new(value));
    }
    if let Some(value) = from_env(name) {
        return Ok(Secret::new(value));
    }

    Err(TokenNotFound {
        name: name.to_string(),
    }
    .into())
}

fn from_file(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let trimmed = contents.trim();

    if trimmed.is_empty() {
        debug!("{} exists but is empty", path.display());
        None
    } else {
        debug!("Read a token from {}", path.display());
        Some(trimmed.to_string())
    }
}

fn from_env(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim();

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// No source yielded a credential for a provider.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(
    display = "no token named {} in /run/secrets, ./secrets or the environment",
    name
)]
pub struct TokenNotFound {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduced_names() {
        assert_eq!(deduced_name("https://git.example.com"), "Git_example_com_GITLAB");
        assert_eq!(deduced_name("example.com"), "Example_com_GITLAB");
    }

    #[test]
    fn tokens_come_from_the_environment_as_a_last_resort() {
        env::set_var("GIT_BACKUP_TEST_TOKEN", "  hunter2  ");

        let got = lookup("GIT_BACKUP_TEST_TOKEN").unwrap();

        assert_eq!(got.reveal_str(), "hunter2");
        env::remove_var("GIT_BACKUP_TEST_TOKEN");
    }

    #[test]
    fn missing_tokens_are_an_error() {
        let err = lookup("GIT_BACKUP_NO_SUCH_TOKEN").unwrap_err();

        assert!(err.downcast_ref::<TokenNotFound>().is_some());
    }
}
