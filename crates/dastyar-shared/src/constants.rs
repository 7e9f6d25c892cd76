/// Application name
pub const APP_NAME: &str = "Dastyar";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Header carrying the id of the conversation a chat reply belongs to
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

/// Header the extension uses to signal its UI language
pub const USER_LANGUAGE_HEADER: &str = "x-user-language";

/// Header carrying the administrative console credential
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Audience Supabase stamps on end-user access tokens
pub const DEFAULT_JWT_AUDIENCE: &str = "authenticated";

/// Characters of the first message kept as a new conversation's title
pub const CONVERSATION_TITLE_CHARS: usize = 50;

/// Title used when the first message is empty
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Maximum conversations returned by the history endpoint
pub const HISTORY_PAGE_SIZE: u32 = 100;

/// Maximum messages replayed for one conversation
pub const MAX_CONVERSATION_MESSAGES: u32 = 1000;

/// Default and maximum page sizes for reference collections
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Number of follow-up queries the suggestions endpoint returns
pub const SUGGESTION_COUNT: usize = 3;

/// Seconds a generated weather caption batch stays valid (2.5 hours)
pub const WEATHER_CAPTION_TTL_SECS: u64 = 9000;

/// Mean Earth radius used for great-circle distances, in km
pub const EARTH_RADIUS_KM: f64 = 6371.0;
