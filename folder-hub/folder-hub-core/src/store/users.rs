use super::Tables;
use crate::error::{Entity, HubError, HubResult};
use crate::model::{Role, User, UserId};

impl Tables {
    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub fn require_user(&self, id: UserId) -> HubResult<&User> {
        self.users.get(&id).ok_or(HubError::NotFound(Entity::User))
    }

    pub fn user_mut(&mut self, id: UserId) -> HubResult<&mut User> {
        self.users.get_mut(&id).ok_or(HubError::NotFound(Entity::User))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn first_superadmin(&self) -> Option<&User> {
        self.users.values().find(|u| u.role == Role::Superadmin)
    }

    /// Insert a user; emails are unique regardless of case.
    pub fn insert_user(&mut self, user: User) -> HubResult<()> {
        if self.user_by_email(&user.email).is_some() {
            return Err(HubError::invalid("email already exists"));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    pub fn remove_user(&mut self, id: UserId) -> Option<User> {
        self.users.remove(&id)
    }
}
