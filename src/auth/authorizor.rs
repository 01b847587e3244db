use crate::auth::{Role, User};
use crate::error::Error;

/// Capability check run before every engine operation: the caller's role must
/// appear in the allowed set.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<(), Error> {
    if allowed.contains(&user.role) {
        return Ok(());
    }

    Err(Error::Forbidden(
        "you do not have permission to perform this action",
    ))
}

#[test]
fn role_in_allowed_set_test() {
    use uuid::Uuid;

    let rider = User::new(Uuid::new_v4(), Role::Rider);

    assert!(require_role(&rider, &[Role::Rider]).is_ok());
    assert!(require_role(&rider, &[Role::Rider, Role::Admin]).is_ok());
}

#[test]
fn role_outside_allowed_set_test() {
    use uuid::Uuid;

    let driver = User::new(Uuid::new_v4(), Role::Driver);

    let result = require_role(&driver, &[Role::Rider]);
    assert!(matches!(result, Err(Error::Forbidden(_))));

    let result = require_role(&driver, &[]);
    assert!(matches!(result, Err(Error::Forbidden(_))));
}
