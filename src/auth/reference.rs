// Repository identifier parsing

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

/// Registry used when a repository has no explicit registry component
pub const DEFAULT_REGISTRY: &str = "docker.io";

lazy_static! {
    static ref PATH_COMPONENT: Regex =
        Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("valid path component regex");
    static ref REGISTRY_HOST: Regex =
        Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9.-]*[a-zA-Z0-9])?(?::[0-9]+)?$")
            .expect("valid registry host regex");
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("repository must not be empty")]
    Empty,
    #[error("invalid registry host '{0}'")]
    InvalidRegistry(String),
    #[error("invalid repository path component '{component}' in '{repository}'")]
    InvalidComponent {
        repository: String,
        component: String,
    },
    #[error("repository '{0}' must not contain a tag or digest")]
    TagOrDigest(String),
}

/// A parsed repository identifier such as `eu.gcr.io/project/app`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    registry: String,
    path: String,
}

impl RepositoryRef {
    /// Parse a repository identifier.
    ///
    /// The first component is treated as the registry host when it contains
    /// a `.` or `:` or is `localhost`; otherwise the repository lives on
    /// [`DEFAULT_REGISTRY`].
    pub fn parse(repository: &str) -> Result<Self, ReferenceError> {
        if repository.is_empty() {
            return Err(ReferenceError::Empty);
        }

        if repository.contains('@') {
            return Err(ReferenceError::TagOrDigest(repository.to_string()));
        }

        let (registry, path) = match repository.split_once('/') {
            Some((first, rest)) if looks_like_registry(first) => (first, rest),
            _ => (DEFAULT_REGISTRY, repository),
        };

        if !REGISTRY_HOST.is_match(registry) {
            return Err(ReferenceError::InvalidRegistry(registry.to_string()));
        }

        for component in path.split('/') {
            if component.contains(':') {
                return Err(ReferenceError::TagOrDigest(repository.to_string()));
            }
            if !PATH_COMPONENT.is_match(component) {
                return Err(ReferenceError::InvalidComponent {
                    repository: repository.to_string(),
                    component: component.to_string(),
                });
            }
        }

        Ok(Self {
            registry: registry.to_string(),
            path: path.to_string(),
        })
    }

    /// Registry host, possibly with a port (e.g. `localhost:5000`)
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Repository path below the registry
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Registry host without the port
    pub fn registry_hostname(&self) -> &str {
        self.registry
            .split_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.registry)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.path)
    }
}

fn looks_like_registry(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_registry() {
        let repo = RepositoryRef::parse("eu.gcr.io/x/y").unwrap();
        assert_eq!(repo.registry(), "eu.gcr.io");
        assert_eq!(repo.path(), "x/y");
        assert_eq!(repo.to_string(), "eu.gcr.io/x/y");
    }

    #[test]
    fn test_parse_without_registry_uses_default() {
        let repo = RepositoryRef::parse("library/nginx").unwrap();
        assert_eq!(repo.registry(), DEFAULT_REGISTRY);
        assert_eq!(repo.path(), "library/nginx");

        let repo = RepositoryRef::parse("nginx").unwrap();
        assert_eq!(repo.registry(), DEFAULT_REGISTRY);
        assert_eq!(repo.path(), "nginx");
    }

    #[test]
    fn test_parse_localhost_with_port() {
        let repo = RepositoryRef::parse("localhost:5000/app").unwrap();
        assert_eq!(repo.registry(), "localhost:5000");
        assert_eq!(repo.registry_hostname(), "localhost");
        assert_eq!(repo.path(), "app");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(RepositoryRef::parse(""), Err(ReferenceError::Empty));
        assert!(matches!(
            RepositoryRef::parse("registry.example.com/My/App"),
            Err(ReferenceError::InvalidComponent { .. })
        ));
        assert!(matches!(
            RepositoryRef::parse("registry.example.com//app"),
            Err(ReferenceError::InvalidComponent { .. })
        ));
        assert!(matches!(
            RepositoryRef::parse("registry.example.com/app:v1"),
            Err(ReferenceError::TagOrDigest(_))
        ));
        assert!(matches!(
            RepositoryRef::parse("app@sha256:abcd"),
            Err(ReferenceError::TagOrDigest(_))
        ));
        assert!(matches!(
            RepositoryRef::parse("bad_host./app"),
            Err(ReferenceError::InvalidRegistry(_))
        ));
    }
}
