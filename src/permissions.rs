use crate::{Claims, Error};

/// Succeeds if `permission` is listed in the token's `permissions` claim.
pub fn check_permissions(permission: &str, claims: &Claims) -> Result<(), Error> {
    let permissions = claims.permissions().ok_or(Error::PermissionsClaimMissing)?;
    if !permissions.contains(&permission) {
        return Err(Error::Unauthorized);
    }
    Ok(())
}
