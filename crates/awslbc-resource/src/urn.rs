//! Unique resource names

use std::fmt;

use serde::{Deserialize, Serialize};

const PREFIX: &str = "urn:awslbc:";
const SEPARATOR: &str = "::";

/// Identifies one declaration within a stack:
/// `urn:awslbc:<stack>::<qualified-type>::<name>`.
///
/// The qualified type is the chain of parent type tokens joined with `$`,
/// ending with the resource's own token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Build a URN from its parts
    pub fn new(stack: &str, qualified_type: &str, name: &str) -> Self {
        Self(format!("{PREFIX}{stack}{SEPARATOR}{qualified_type}{SEPARATOR}{name}"))
    }

    /// The full URN string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logical name of the resource
    pub fn name(&self) -> &str {
        self.0.rsplit(SEPARATOR).next().unwrap_or_default()
    }

    /// Parent type chain plus the resource's own type token
    pub fn qualified_type(&self) -> &str {
        let mut parts = self.0.splitn(3, SEPARATOR);
        parts.next();
        parts.next().unwrap_or_default()
    }

    /// The resource's own type token
    pub fn type_token(&self) -> &str {
        let qualified = self.qualified_type();
        qualified.rsplit('$').next().unwrap_or(qualified)
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
