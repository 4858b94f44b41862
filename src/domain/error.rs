use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown content domain `{name}`")]
    UnknownDomain { name: String },
    #[error("invalid lookup key `{key}`: {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

impl DomainError {
    pub fn unknown_domain(name: impl Into<String>) -> Self {
        Self::UnknownDomain { name: name.into() }
    }

    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }
}
