//! Ownership checks for write operations.
//!
//! Reads are open to everyone and creating requires only authentication, which the
//! [`CurrentUser`] extractor already enforces. Changing an existing object additionally
//! requires owning it, or being an admin.

use crate::{
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::{Operation, Permission, Resource, UserId},
};

/// The `*All` operation that lets admins act on other users' objects
fn unrestricted(operation: Operation) -> Operation {
    match operation {
        Operation::CreateOwn => Operation::CreateOwn,
        Operation::UpdateAll | Operation::UpdateOwn => Operation::UpdateAll,
        Operation::DeleteAll | Operation::DeleteOwn => Operation::DeleteAll,
    }
}

/// Whether `user` may change an object owned by `owner_id`
pub fn has_permission(user: &CurrentUser, owner_id: UserId) -> bool {
    user.is_admin || user.id == owner_id
}

/// Fail with 403 unless `user` owns the object or is an admin.
pub fn require_owner_or_admin(user: &CurrentUser, resource: Resource, operation: Operation, owner_id: UserId) -> Result<()> {
    if has_permission(user, owner_id) {
        return Ok(());
    }

    Err(Error::InsufficientPermissions {
        required: Permission::Any(vec![
            Permission::Allow(resource, operation),
            Permission::Allow(resource, unrestricted(operation)),
        ]),
        action: operation,
        resource: format!("{resource} owned by another user"),
    })
}
