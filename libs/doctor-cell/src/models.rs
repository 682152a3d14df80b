use serde::{Deserialize, Serialize};

/// A clinician patients can be booked with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub specialty: String,
    /// `false` removes the provider from selection regardless of date or time.
    pub available: bool,
}

impl Provider {
    pub fn new(id: &str, name: &str, specialty: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            specialty: specialty.to_string(),
            available: true,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSearchQuery {
    pub specialty: Option<String>,
    pub available_only: Option<bool>,
}

impl ProviderSearchQuery {
    pub fn matches(&self, provider: &Provider) -> bool {
        if self.available_only.unwrap_or(false) && !provider.available {
            return false;
        }
        match &self.specialty {
            Some(specialty) => provider.specialty.eq_ignore_ascii_case(specialty.trim()),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
}
