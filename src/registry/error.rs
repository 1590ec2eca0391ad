//! Registry error types

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Topic filter contains `+` or `#`; such subscriptions bypass the registry
    WildcardTopic(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::WildcardTopic(topic) => {
                write!(f, "Wildcard topic not supported by registry: {}", topic)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
