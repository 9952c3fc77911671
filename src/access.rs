use ulid::Ulid;

use crate::error::ApiError;
use crate::model::Principal;

/// Authorization classes. `*Own` operations target a resource the caller
/// owns (or are inherently self-scoped, like creating a booking); `*Any`
/// operations reach across principals and are admin-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    ReadOwn,
    ReadAny,
    WriteOwn,
    WriteAny,
}

impl OpClass {
    pub fn is_write(self) -> bool {
        matches!(self, OpClass::WriteOwn | OpClass::WriteAny)
    }

    pub fn is_own(self) -> bool {
        matches!(self, OpClass::ReadOwn | OpClass::WriteOwn)
    }
}

/// Who owns the target of an operation, resolved before the guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// No foreign resource is targeted — the operation acts on the
    /// caller's own scope (creates, listings of one's own data).
    SelfScoped,
    /// The target belongs to this principal.
    Of(Ulid),
}

/// Permit/deny. Admins are always permitted; customers only reach `*Own`
/// operations on resources they own. Denial is `Forbidden` — distinct from
/// `Unauthenticated`, which can only come out of identity resolution.
pub fn authorize(
    principal: &Principal,
    class: OpClass,
    ownership: Ownership,
) -> Result<(), ApiError> {
    if principal.is_admin() {
        return Ok(());
    }
    if !class.is_own() {
        return Err(ApiError::forbidden("operation requires the admin role"));
    }
    match ownership {
        Ownership::SelfScoped => Ok(()),
        Ownership::Of(owner) if owner == principal.id => Ok(()),
        Ownership::Of(_) => Err(ApiError::forbidden(
            "you are not allowed to access this resource",
        )),
    }
}
