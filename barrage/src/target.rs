use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Serialize, Serializer};
use url::Url;

use crate::error::{Error, Result};

/// A single URL being probed.
///
/// A `Target` is always an absolute `http` or `https` URL with a host. Once
/// parsed it never changes; its string form is its identity, so equality and
/// ordering follow the string and not the parsed components. This is what
/// gives reports their deterministic row order.
#[derive(Clone, Debug)]
pub struct Target {
    url: Url,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let url = Url::parse(input).map_err(|e| Error::invalid_target(input, e))?;
        Self::try_from(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl TryFrom<Url> for Target {
    type Error = Error;

    fn try_from(url: Url) -> Result<Self> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::invalid_target(
                    url.as_str(),
                    format!("unsupported scheme '{other}'"),
                ));
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::invalid_target(url.as_str(), "missing host"));
        }
        Ok(Self { url })
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Target {}

impl PartialOrd for Target {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Target {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl std::hash::Hash for Target {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_http_urls() {
        let t = Target::parse("  https://example.com/path?q=1 ").unwrap();
        assert_eq!(t.as_str(), "https://example.com/path?q=1");
        assert_eq!(t.to_string(), t.as_str());
    }

    #[test]
    fn rejects_relative_and_foreign_schemes() {
        assert!(matches!(
            Target::parse("/just/a/path"),
            Err(Error::InvalidTarget { .. })
        ));
        assert!(matches!(
            Target::parse("ftp://example.com"),
            Err(Error::InvalidTarget { .. })
        ));
        assert!(Target::parse("").is_err());
    }

    #[test]
    fn orders_by_string_form() {
        let mut targets: Vec<Target> = ["http://b.example", "http://A.example", "http://a.example"]
            .into_iter()
            .map(|s| s.parse().unwrap())
            .collect();
        targets.sort();
        // Url normalises the host to lower case, so both "a" hosts are equal
        // strings and stay adjacent.
        let strs: Vec<&str> = targets.iter().map(Target::as_str).collect();
        assert_eq!(
            strs,
            ["http://a.example/", "http://a.example/", "http://b.example/"]
        );
    }

    #[test]
    fn serializes_as_string() {
        let t = Target::parse("http://localhost:8080/x").unwrap();
        assert_eq!(
            serde_json::to_string(&t).unwrap(),
            "\"http://localhost:8080/x\""
        );
    }
}
