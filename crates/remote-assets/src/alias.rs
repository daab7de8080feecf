//! Turns the `<spec>` part of a virtual identifier into a URL.

use tracing::debug;
use url::Url;

use crate::config::AliasRule;
use crate::error::AliasError;

/// Resolves identifiers against an ordered list of alias rules.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    rules: Vec<AliasRule>,
}

impl AliasResolver {
    pub fn new(rules: Vec<AliasRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    /// An identifier that already parses as an absolute URL is returned as is.
    /// Otherwise the first matching rule decides: its replacement must parse,
    /// later rules are never consulted.
    pub fn resolve(&self, identifier: &str) -> Result<Url, AliasError> {
        let parse_error = match Url::parse(identifier) {
            Ok(url) => return Ok(url),
            Err(e) => e,
        };

        let Some(rule) = self.rules.iter().find(|rule| rule.pattern.is_match(identifier)) else {
            return Err(AliasError::NoMatch {
                identifier: identifier.to_owned(),
                source: parse_error,
            });
        };

        let candidate = rule
            .pattern
            .replace(identifier, rule.replacement.as_str())
            .into_owned();

        match Url::parse(&candidate) {
            Ok(url) => {
                debug!(identifier, pattern = rule.pattern.as_str(), url = %url, "Alias matched");
                Ok(url)
            }
            Err(source) => Err(AliasError::InvalidReplacement {
                identifier: identifier.to_owned(),
                pattern: rule.pattern.as_str().to_owned(),
                candidate,
                source,
            }),
        }
    }
}
