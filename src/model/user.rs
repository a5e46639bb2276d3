use super::OwnerId;
use serde::Deserialize;

/// The authenticated user as returned by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: OwnerId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

/// Profile fields supplied by the identity provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl User {
    /// Full name, else email, else "User".
    pub fn display_name(&self) -> &str {
        self.user_metadata
            .full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("User")
    }

    /// First word of the full name for the greeting, else "there".
    pub fn first_name(&self) -> &str {
        self.user_metadata
            .full_name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .unwrap_or("there")
    }
}
