//! Rate key generation and handling.

use std::fmt;

/// The dimension a rate key counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// The authenticated caller identity
    Identity,
    /// The network origin of the request
    Origin,
}

impl Dimension {
    /// Namespace tag prepended to keys of this dimension.
    pub fn tag(&self) -> &'static str {
        match self {
            Dimension::Identity => "user",
            Dimension::Origin => "ip",
        }
    }
}

/// A key that uniquely identifies one countable dimension.
///
/// Keys are namespaced by their dimension, so an identity and an origin
/// with the same raw value never share a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    /// The dimension this key belongs to
    pub dimension: Dimension,
    /// Raw identity or origin value
    pub value: String,
}

impl RateKey {
    /// Create a new rate key for a dimension and raw value.
    pub fn new(dimension: Dimension, value: impl Into<String>) -> Self {
        Self {
            dimension,
            value: value.into(),
        }
    }

    /// Key for an authenticated identity.
    pub fn identity(value: impl Into<String>) -> Self {
        Self::new(Dimension::Identity, value)
    }

    /// Key for a network origin.
    pub fn origin(value: impl Into<String>) -> Self {
        Self::new(Dimension::Origin, value)
    }

    /// Convert the rate key to its namespaced string form.
    pub fn to_string_key(&self) -> String {
        format!("{}:{}", self.dimension.tag(), self.value)
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}
