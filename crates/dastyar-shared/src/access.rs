//! Ownership access policy.
//!
//! Every collection operation is decided here, before any data is touched.
//! A decision is either unconditional ([`AccessDecision::AllowAll`] /
//! [`AccessDecision::DenyAll`]) or a [`OwnerFilter`] the store turns into a
//! query predicate, so callers never see records they do not own.

use std::fmt;
use std::str::FromStr;

use crate::error::SharedError;
use crate::types::Principal;

/// Every collection the API exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    AppUsers,
    Conversations,
    Messages,
    Cities,
    Wallpapers,
    WallpaperCategories,
    CalendarEvents,
    SearchSuggestions,
    AiSuggestions,
    Timezones,
}

impl Collection {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::AppUsers => "app-users",
            Self::Conversations => "conversations",
            Self::Messages => "messages",
            Self::Cities => "cities",
            Self::Wallpapers => "wallpapers",
            Self::WallpaperCategories => "wallpaper-categories",
            Self::CalendarEvents => "calendar-events",
            Self::SearchSuggestions => "search-suggestions",
            Self::AiSuggestions => "ai-suggestions",
            Self::Timezones => "timezones",
        }
    }

    /// Public, administrator-curated content.
    pub fn is_reference(&self) -> bool {
        !matches!(
            self,
            Self::AppUsers | Self::Conversations | Self::Messages
        )
    }
}

impl FromStr for Collection {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "app-users" => Self::AppUsers,
            "conversations" => Self::Conversations,
            "messages" => Self::Messages,
            "cities" => Self::Cities,
            "wallpapers" => Self::Wallpapers,
            "wallpaper-categories" => Self::WallpaperCategories,
            "calendar-events" => Self::CalendarEvents,
            "search-suggestions" => Self::SearchSuggestions,
            "ai-suggestions" => Self::AiSuggestions,
            "timezones" => Self::Timezones,
            other => return Err(SharedError::UnknownCollection(other.to_string())),
        })
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Pre-authenticated administrative console session.
    Console,
    /// End user proven by a bearer token.
    User(Principal),
    /// No credential presented.
    Anonymous,
}

impl Actor {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::User(p) => Some(p),
            _ => None,
        }
    }
}

/// Constraint restricting visible records to those owned by one subject.
///
/// The subject is resolved to an application user inside the query, so a
/// subject with no application user yet simply matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerFilter {
    /// The application-user record whose own subject id matches.
    SelfRecord { subject: String },
    /// Records whose owner reference points at the subject's application user.
    OwnedBy { subject: String },
    /// Records whose parent conversation is owned by the subject.
    ParentOwnedBy { subject: String },
}

impl OwnerFilter {
    pub fn subject(&self) -> &str {
        match self {
            Self::SelfRecord { subject }
            | Self::OwnedBy { subject }
            | Self::ParentOwnedBy { subject } => subject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    AllowAll,
    DenyAll,
    Filter(OwnerFilter),
}

impl AccessDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::DenyAll)
    }
}

/// Decide what `actor` may do with `operation` on `collection`.
pub fn decide(collection: Collection, operation: Operation, actor: &Actor) -> AccessDecision {
    let principal = match actor {
        Actor::Console => return AccessDecision::AllowAll,
        Actor::Anonymous => {
            return if collection.is_reference() && operation == Operation::Read {
                AccessDecision::AllowAll
            } else {
                AccessDecision::DenyAll
            };
        }
        Actor::User(p) => p,
    };

    if collection.is_reference() {
        return match operation {
            Operation::Read => AccessDecision::AllowAll,
            _ => AccessDecision::DenyAll,
        };
    }

    let subject = principal.subject.clone();
    match (collection, operation) {
        (_, Operation::Create) => AccessDecision::AllowAll,
        (Collection::AppUsers, Operation::Delete) => AccessDecision::DenyAll,
        (Collection::AppUsers, _) => AccessDecision::Filter(OwnerFilter::SelfRecord { subject }),
        (Collection::Messages, _) => {
            AccessDecision::Filter(OwnerFilter::ParentOwnedBy { subject })
        }
        _ => AccessDecision::Filter(OwnerFilter::OwnedBy { subject }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OPS: [Operation; 4] = [
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    const REFERENCE: [Collection; 7] = [
        Collection::Cities,
        Collection::Wallpapers,
        Collection::WallpaperCategories,
        Collection::CalendarEvents,
        Collection::SearchSuggestions,
        Collection::AiSuggestions,
        Collection::Timezones,
    ];

    fn user(sub: &str) -> Actor {
        Actor::User(Principal::new(sub, None))
    }

    #[test]
    fn test_reference_data_is_public_read_console_write() {
        for c in REFERENCE {
            assert_eq!(decide(c, Operation::Read, &Actor::Anonymous), AccessDecision::AllowAll);
            assert_eq!(decide(c, Operation::Read, &user("u")), AccessDecision::AllowAll);
            for op in [Operation::Create, Operation::Update, Operation::Delete] {
                assert_eq!(decide(c, op, &user("u")), AccessDecision::DenyAll);
                assert_eq!(decide(c, op, &Actor::Anonymous), AccessDecision::DenyAll);
                assert_eq!(decide(c, op, &Actor::Console), AccessDecision::AllowAll);
            }
        }
    }

    #[test]
    fn test_app_users_rules() {
        let actor = user("sub-a");
        assert_eq!(
            decide(Collection::AppUsers, Operation::Read, &actor),
            AccessDecision::Filter(OwnerFilter::SelfRecord { subject: "sub-a".into() })
        );
        assert_eq!(
            decide(Collection::AppUsers, Operation::Update, &actor),
            AccessDecision::Filter(OwnerFilter::SelfRecord { subject: "sub-a".into() })
        );
        assert_eq!(
            decide(Collection::AppUsers, Operation::Create, &actor),
            AccessDecision::AllowAll
        );
        assert_eq!(
            decide(Collection::AppUsers, Operation::Delete, &actor),
            AccessDecision::DenyAll
        );
    }

    #[test]
    fn test_conversations_and_messages_filtered() {
        let actor = user("sub-b");
        for op in [Operation::Read, Operation::Update, Operation::Delete] {
            assert_eq!(
                decide(Collection::Conversations, op, &actor),
                AccessDecision::Filter(OwnerFilter::OwnedBy { subject: "sub-b".into() })
            );
            assert_eq!(
                decide(Collection::Messages, op, &actor),
                AccessDecision::Filter(OwnerFilter::ParentOwnedBy { subject: "sub-b".into() })
            );
        }
        assert_eq!(
            decide(Collection::Conversations, Operation::Create, &actor),
            AccessDecision::AllowAll
        );
    }

    #[test]
    fn test_anonymous_denied_user_owned_collections() {
        for c in [Collection::AppUsers, Collection::Conversations, Collection::Messages] {
            for op in ALL_OPS {
                assert!(decide(c, op, &Actor::Anonymous).is_denied());
            }
        }
    }

    #[test]
    fn test_console_bypasses_everything() {
        for c in [Collection::AppUsers, Collection::Conversations, Collection::Messages] {
            for op in ALL_OPS {
                assert_eq!(decide(c, op, &Actor::Console), AccessDecision::AllowAll);
            }
        }
    }

    #[test]
    fn test_collection_slug_round_trip() {
        for c in REFERENCE {
            assert_eq!(c.slug().parse::<Collection>().unwrap(), c);
        }
        assert!("media".parse::<Collection>().is_err());
    }
}
