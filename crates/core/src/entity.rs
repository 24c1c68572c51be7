//! Entity trait: identity + tenant scope across state changes.

use crate::id::TenantId;

/// Tenant-scoped entity.
///
/// Stores key every record by `(tenant_id, id)`.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Returns the owning tenant.
    fn tenant_id(&self) -> TenantId;
}
