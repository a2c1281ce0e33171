//! Participants editing a sheet

use std::fmt;

/// A user participating in the spreadsheet
///
/// The email serves as the unique identifier; the name is for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct User {
    name: String,
    email: String,
}

impl User {
    /// Create a new user
    pub fn new<N: Into<String>, E: Into<String>>(name: N, email: E) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Create a user from an id alone (email derived as `<id>@example.com`)
    pub fn from_id<S: Into<String>>(id: S) -> Self {
        let id = id.into();
        let email = format!("{}@example.com", id);
        Self { name: id, email }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Email, the user's identity
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
