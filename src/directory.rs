use serde::{Deserialize, Serialize};

use crate::schedule::types::normalize_email;

/// A staff member as shown in pickers and rosters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub email: String,
    pub name: String,
}

/// Display names for staff. Not consulted by conflict logic.
#[derive(Debug, Clone, Default)]
pub struct StaffDirectory {
    members: Vec<StaffMember>,
}

impl StaffDirectory {
    pub fn new(members: Vec<StaffMember>) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|m| StaffMember {
                    email: normalize_email(&m.email),
                    name: m.name.trim().to_string(),
                })
                .collect(),
        }
    }

    /// The food truck crew the app ships with
    pub fn with_default_staff() -> Self {
        Self::new(
            (1..=4)
                .map(|n| StaffMember {
                    email: format!("staff{}@foodtruck.com", n),
                    name: format!("Staff{}", n),
                })
                .collect(),
        )
    }

    pub fn members(&self) -> &[StaffMember] {
        &self.members
    }

    pub fn lookup(&self, email: &str) -> Option<&StaffMember> {
        let email = normalize_email(email);
        self.members.iter().find(|m| m.email == email)
    }

    /// Display name, falling back to the email for unknown staff
    pub fn display_name(&self, email: &str) -> String {
        self.lookup(email)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| email.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let directory = StaffDirectory::with_default_staff();
        assert_eq!(directory.display_name("STAFF2@foodtruck.com"), "Staff2");
        assert_eq!(directory.display_name("temp@foodtruck.com"), "temp@foodtruck.com");
        assert_eq!(directory.members().len(), 4);
    }
}
