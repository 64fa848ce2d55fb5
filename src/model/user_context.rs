use serde::{Deserialize, Serialize};

/// What a user may do in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Visitor,
    Member,
    Editor,
    Moderator,
    Manager,
    Admin,
}

impl UserRole {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "visitor" => Some(UserRole::Visitor),
            "member" => Some(UserRole::Member),
            "editor" => Some(UserRole::Editor),
            "moderator" => Some(UserRole::Moderator),
            "manager" => Some(UserRole::Manager),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// User context extracted from request headers for access checks and the
/// pending-change audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_name: String,
    pub real_name: Option<String>,
    pub role: UserRole,
}

impl UserContext {
    /// Create a UserContext with full user information
    pub fn with_details(user_name: String, real_name: Option<String>, role: UserRole) -> Self {
        Self {
            user_name,
            real_name,
            role,
        }
    }

    /// Anonymous visitor, used when a request carries no user headers
    pub fn default_user() -> Self {
        Self {
            user_name: "guest".to_string(),
            real_name: None,
            role: UserRole::Visitor,
        }
    }

    pub fn can_edit(&self) -> bool {
        self.role >= UserRole::Editor
    }

    pub fn can_moderate(&self) -> bool {
        self.role >= UserRole::Moderator
    }

    pub fn is_manager(&self) -> bool {
        self.role >= UserRole::Manager
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::default_user()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        let moderator = UserContext::with_details("mod".to_string(), None, UserRole::Moderator);
        assert!(moderator.can_edit());
        assert!(moderator.can_moderate());
        assert!(!moderator.is_manager());

        let visitor = UserContext::default();
        assert!(!visitor.can_edit());
        assert!(!visitor.is_admin());
    }

    #[test]
    fn test_parse_role() {
        assert_eq!(UserRole::parse(" Editor "), Some(UserRole::Editor));
        assert_eq!(UserRole::parse("root"), None);
    }
}
