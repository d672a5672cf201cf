use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("invalid image reference {0:?}")]
    InvalidReference(String),
}

/// A container image reference split into repository and tag.
///
/// Accepts the usual `registry[:port]/path/name[:tag]` grammar. Path
/// segments must be lower-case; the tag defaults to `latest` when omitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub repository: String,
    pub tag: String,
}

static PATH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:\.|_|__|-+)[a-z0-9]+)*$").unwrap()
});

static REGISTRY_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9.-]*[a-zA-Z0-9])?(?::[0-9]+)?$")
        .unwrap()
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").unwrap()
});

impl Reference {
    pub fn parse(input: &str) -> Result<Self, ImageError> {
        let invalid = || ImageError::InvalidReference(input.to_string());

        if input.is_empty() {
            return Err(invalid());
        }

        // The last colon starts a tag only when no path separator follows
        // it; otherwise it belongs to a registry port (localhost:5000/img).
        let (repository, tag) = match input.rfind(':') {
            Some(i) if !input[i + 1..].contains('/') => {
                (&input[..i], &input[i + 1..])
            }
            _ => (input, ""),
        };

        if repository.is_empty() {
            return Err(invalid());
        }

        let tag = if tag.is_empty() {
            trace!(image = %input, "image is not tagged, using latest");
            "latest"
        } else if TAG.is_match(tag) {
            tag
        } else {
            return Err(invalid());
        };

        let segments: Vec<&str> = repository.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }
        for (i, segment) in segments.iter().enumerate() {
            // The first of several segments may be a registry host, which
            // is the only place upper-case characters and ports are legal.
            let is_host = i == 0
                && segments.len() > 1
                && (segment.contains('.')
                    || segment.contains(':')
                    || *segment == "localhost");
            let pattern =
                if is_host { &*REGISTRY_HOST } else { &*PATH_SEGMENT };
            if !pattern.is_match(segment) {
                return Err(invalid());
            }
        }

        Ok(Reference {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}
