//! Translation of access decisions into SQL predicates.

use dastyar_shared::access::{AccessDecision, OwnerFilter};
use rusqlite::ToSql;

/// Row visibility for one query. `DenyAll` has no scope: callers return
/// empty/not-found without touching the database.
pub(crate) enum Scope<'a> {
    All,
    Owner(&'a OwnerFilter),
}

impl<'a> Scope<'a> {
    pub(crate) fn of(decision: &'a AccessDecision) -> Option<Self> {
        match decision {
            AccessDecision::AllowAll => Some(Self::All),
            AccessDecision::DenyAll => None,
            AccessDecision::Filter(filter) => Some(Self::Owner(filter)),
        }
    }

    /// Predicate over the queried table's unqualified columns. Contains at
    /// most one `?` placeholder, bound by [`Scope::bind`].
    pub(crate) fn predicate(&self) -> &'static str {
        match self {
            Self::All => "1 = 1",
            Self::Owner(OwnerFilter::SelfRecord { .. }) => "subject_id = ?",
            Self::Owner(OwnerFilter::OwnedBy { .. }) => {
                "owner_id IN (SELECT id FROM app_users WHERE subject_id = ?)"
            }
            Self::Owner(OwnerFilter::ParentOwnedBy { .. }) => {
                "conversation_id IN (
                    SELECT c.id FROM conversations c
                    JOIN app_users u ON u.id = c.owner_id
                    WHERE u.subject_id = ?)"
            }
        }
    }

    /// Append the predicate's parameter (if any) after `params`.
    pub(crate) fn bind<'p>(&'p self, params: &mut Vec<&'p dyn ToSql>) {
        if let Self::Owner(filter) = self {
            let subject: &'p String = match filter {
                OwnerFilter::SelfRecord { subject }
                | OwnerFilter::OwnedBy { subject }
                | OwnerFilter::ParentOwnedBy { subject } => subject,
            };
            params.push(subject);
        }
    }
}
