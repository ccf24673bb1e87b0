//! Workspace-login model: which roles each user may sign in with.

use super::name::{Keyed, Named, normalize};

/// A workspace login identified by email
#[derive(Debug, Clone)]
pub struct LoginUser {
    pub email: String,
    roles: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LoginModel {
    users: Named<LoginUser>,
}

impl Keyed for LoginUser {
    fn key(&self) -> &str {
        &self.email
    }
}

impl LoginModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_user(&mut self, email: &str) -> &mut LoginUser {
        self.users.declare_with(email, |email| LoginUser {
            email,
            roles: Vec::new(),
        })
    }

    pub fn lookup_user(&self, email: &str) -> Option<&LoginUser> {
        self.users.get(email)
    }

    pub fn users(&self) -> &Named<LoginUser> {
        &self.users
    }
}

impl LoginUser {
    /// Allow the user to sign in with `role`
    pub fn assign(&mut self, role: &str) {
        let role = normalize(role);
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn is_assigned(&self, role: &str) -> bool {
        let role = normalize(role);
        self.roles.iter().any(|r| *r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignments_deduplicated() {
        let mut model = LoginModel::new();
        let user = model.declare_user("Alice@Example.com");
        user.assign("analyst");
        user.assign("Analyst");
        user.assign("engineer");

        let user = model.lookup_user("alice@example.com").unwrap();
        assert_eq!(user.roles(), ["analyst", "engineer"]);
        assert!(user.is_assigned("ENGINEER"));
    }
}
