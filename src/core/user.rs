use serde::{Deserialize, Serialize};

use crate::util;

/// The logged-in marketplace user. This is a browser-local identity,
/// not a verified account.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

impl User {
    pub fn new(name: &str, email: &str) -> User {
        User {
            id: util::generate_id(),
            name: name.to_owned(),
            email: email.to_owned(),
            avatar: util::avatar_url(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_derives_avatar_from_name() {
        let user = User::new("Priya", "priya@example.com");
        assert_eq!(user.name, "Priya");
        assert_eq!(user.avatar, util::avatar_url("Priya"));
        assert_eq!(user.id.len(), 9);
    }
}
