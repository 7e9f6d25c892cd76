//! Chat turns and conversation management.

use std::io;
use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use dastyar_shared::access::{decide, Actor, Collection, Operation};
use dastyar_shared::constants::{
    CONVERSATION_ID_HEADER, CONVERSATION_TITLE_CHARS, DEFAULT_CONVERSATION_TITLE, HISTORY_PAGE_SIZE,
    MAX_CONVERSATION_MESSAGES,
};
use dastyar_shared::types::MessageRole;
use dastyar_store::Message;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::AppState;
use crate::db::Db;
use crate::error::ApiError;
use crate::extract::{AuthUser, Caller};
use crate::llm::{ChatMessage, GenerationRequest, ModelTier, TextStream};

const CHAT_SYSTEM_PROMPT: &str = "You are Dastyar, a helpful assistant on a browser start page. \
Answer in the language the user writes in. Be concise and accurate, and use web search for recent facts.";

/// Chunks buffered between the generation task and the response body.
const RELAY_BUFFER: usize = 32;

// ---------------------------------------------------------------------------
// Chat turn
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

/// A validated chat request.
#[derive(Debug, PartialEq, Eq)]
struct ChatTurn {
    /// The latest user message, appended to the conversation.
    text: String,
    /// Title for a newly created conversation.
    title: String,
    conversation_id: Option<Uuid>,
}

impl ChatRequest {
    fn into_turn(self) -> Result<ChatTurn, ApiError> {
        let prompt = self.prompt.filter(|p| !p.trim().is_empty());

        let (text, first) = if self.messages.is_empty() {
            let prompt = prompt.ok_or_else(|| ApiError::BadRequest("messages or prompt is required".into()))?;
            (prompt.clone(), prompt)
        } else {
            let latest = self
                .messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
                .ok_or_else(|| ApiError::BadRequest("no user message".into()))?;
            (latest.content.clone(), self.messages[0].content.clone())
        };

        Ok(ChatTurn {
            text,
            title: conversation_title(&first),
            conversation_id: self.conversation_id,
        })
    }
}

fn conversation_title(first_message: &str) -> String {
    let title: String = first_message.trim().chars().take(CONVERSATION_TITLE_CHARS).collect();
    if title.is_empty() {
        DEFAULT_CONVERSATION_TITLE.to_string()
    } else {
        title
    }
}

/// `POST /api/chat`: record the user's message and stream the reply.
pub async fn chat_turn(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let turn = request.into_turn()?;

    let actor = Actor::User(principal.clone());
    let conversation_read = decide(Collection::Conversations, Operation::Read, &actor);
    let history_read = decide(Collection::Messages, Operation::Read, &actor);

    let (conversation, history) = state
        .db
        .call(move |db| {
            let user = db.resolve_app_user(&principal)?;
            let conversation = match turn.conversation_id {
                Some(id) => db.get_conversation(&conversation_read, id)?,
                None => db.create_conversation(&user, &turn.title)?,
            };
            db.append_message(conversation.id, MessageRole::User, &turn.text)?;
            let history = db.list_messages(&history_read, conversation.id, MAX_CONVERSATION_MESSAGES)?;
            Ok((conversation, history))
        })
        .await?;

    let request = GenerationRequest {
        tier: ModelTier::Chat,
        system: Some(CHAT_SYSTEM_PROMPT.to_string()),
        messages: history
            .into_iter()
            .map(|m| ChatMessage::new(m.role, m.content))
            .collect(),
        grounded_search: true,
        ..Default::default()
    };

    let mut deltas = state
        .model
        .stream(request)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    // Failures before the first byte still get a proper status code.
    let first = match deltas.next().await {
        Some(Ok(text)) => text,
        Some(Err(e)) => return Err(ApiError::Upstream(e.to_string())),
        None => String::new(),
    };
    let deltas: TextStream = stream::iter([Ok(first)]).chain(deltas).boxed();

    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(RELAY_BUFFER);
    let conversation_id = conversation.id;
    tokio::spawn(complete_turn(
        deltas,
        tx,
        state.db.clone(),
        conversation_id,
        state.config.chat_max_duration,
    ));

    let body = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });

    Response::builder()
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(CONVERSATION_ID_HEADER, conversation_id.to_string())
        .body(Body::from_stream(body))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Relay the reply to the client and store it once it is complete. Nothing
/// is stored when generation fails, times out or the client goes away.
async fn complete_turn(
    deltas: TextStream,
    tx: mpsc::Sender<Result<Bytes, io::Error>>,
    db: Db,
    conversation_id: Uuid,
    max_duration: Duration,
) {
    let reply = match tokio::time::timeout(max_duration, relay(deltas, &tx)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(RelayError::Disconnected)) => {
            debug!(%conversation_id, "Client went away, reply discarded");
            return;
        }
        Ok(Err(RelayError::Provider(e))) => {
            warn!(%conversation_id, "Generation failed mid-stream: {e}");
            let _ = tx.send(Err(io::Error::other("generation failed"))).await;
            return;
        }
        Err(_) => {
            warn!(%conversation_id, "Generation timed out");
            let _ = tx.send(Err(io::Error::other("generation timed out"))).await;
            return;
        }
    };

    if tx.is_closed() || reply.is_empty() {
        return;
    }
    let length = reply.len();
    match db
        .call(move |db| db.append_message(conversation_id, MessageRole::Assistant, &reply))
        .await
    {
        Ok(_) => info!(%conversation_id, length, "Assistant reply stored"),
        Err(e) => warn!(%conversation_id, "Failed to store assistant reply: {e}"),
    }
}

enum RelayError {
    Provider(crate::llm::LlmError),
    Disconnected,
}

/// Forward deltas to the client and return the full reply.
async fn relay(mut deltas: TextStream, tx: &mpsc::Sender<Result<Bytes, io::Error>>) -> Result<String, RelayError> {
    let mut reply = String::new();
    while let Some(delta) = deltas.next().await {
        let text = delta.map_err(RelayError::Provider)?;
        if text.is_empty() {
            continue;
        }
        reply.push_str(&text);
        tx.send(Ok(Bytes::from(text)))
            .await
            .map_err(|_| RelayError::Disconnected)?;
    }
    Ok(reply)
}

// ---------------------------------------------------------------------------
// Conversation management
// ---------------------------------------------------------------------------

/// Conversation routes need some credential; anonymous callers are 401.
fn signed_in(Caller(actor): Caller) -> Result<Actor, ApiError> {
    match actor {
        Actor::Anonymous => Err(ApiError::Unauthenticated),
        actor => Ok(actor),
    }
}

#[derive(Serialize)]
pub struct ConversationSummary {
    id: Uuid,
    title: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    id: Uuid,
    role: MessageRole,
    content: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ConversationDetail {
    id: Uuid,
    title: String,
    messages: Vec<MessageView>,
}

/// `GET /api/chat/history`
pub async fn history(State(state): State<AppState>, caller: Caller) -> Result<Json<Value>, ApiError> {
    let actor = signed_in(caller)?;
    let decision = decide(Collection::Conversations, Operation::Read, &actor);

    let conversations = state
        .db
        .call(move |db| db.list_conversations(&decision, HISTORY_PAGE_SIZE))
        .await?;

    let chats: Vec<ConversationSummary> = conversations
        .into_iter()
        .map(|c| ConversationSummary { id: c.id, title: c.title })
        .collect();
    Ok(Json(json!({ "chats": chats })))
}

/// `GET /api/chat/{id}`
pub async fn conversation_detail(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDetail>, ApiError> {
    let actor = signed_in(caller)?;
    let conversation_read = decide(Collection::Conversations, Operation::Read, &actor);
    let messages_read = decide(Collection::Messages, Operation::Read, &actor);

    let (conversation, messages) = state
        .db
        .call(move |db| {
            let conversation = db.get_conversation(&conversation_read, id)?;
            let messages = db.list_messages(&messages_read, id, MAX_CONVERSATION_MESSAGES)?;
            Ok((conversation, messages))
        })
        .await?;

    Ok(Json(ConversationDetail {
        id: conversation.id,
        title: conversation.title,
        messages: messages.into_iter().map(MessageView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    title: Option<String>,
}

/// `PATCH /api/chat/{id}`
pub async fn rename_conversation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    body: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let actor = signed_in(caller)?;
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("title is required".into()))?;

    let decision = decide(Collection::Conversations, Operation::Update, &actor);
    let conversation = state
        .db
        .call(move |db| db.rename_conversation(&decision, id, &title))
        .await?;

    Ok(Json(json!({ "id": conversation.id, "title": conversation.title })))
}

/// `DELETE /api/chat/{id}`: the conversation and all of its messages.
pub async fn delete_conversation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = signed_in(caller)?;
    let decision = decide(Collection::Conversations, Operation::Delete, &actor);
    state
        .db
        .call(move |db| db.delete_conversation(&decision, id))
        .await?;

    info!(%id, "Conversation deleted");
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/messages/{id}`
pub async fn delete_message(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let actor = signed_in(caller)?;
    let decision = decide(Collection::Messages, Operation::Delete, &actor);
    state
        .db
        .call(move |db| db.delete_message(&decision, id))
        .await?;

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use dastyar_shared::access::AccessDecision;
    use dastyar_shared::types::Principal;
    use dastyar_store::Database;

    fn message(role: MessageRole, content: &str) -> IncomingMessage {
        IncomingMessage {
            role,
            content: content.into(),
        }
    }

    #[test]
    fn test_turn_takes_latest_user_message() {
        let request = ChatRequest {
            messages: vec![
                message(MessageRole::User, "first question"),
                message(MessageRole::Assistant, "answer"),
                message(MessageRole::User, "follow-up"),
            ],
            prompt: None,
            conversation_id: None,
        };
        let turn = request.into_turn().unwrap();
        assert_eq!(turn.text, "follow-up");
        assert_eq!(turn.title, "first question");
    }

    #[test]
    fn test_turn_from_prompt() {
        let request = ChatRequest {
            messages: vec![],
            prompt: Some("سلام".into()),
            conversation_id: None,
        };
        assert_eq!(request.into_turn().unwrap().text, "سلام");
    }

    #[test]
    fn test_turn_rejects_empty_and_userless_requests() {
        let empty = ChatRequest {
            messages: vec![],
            prompt: Some("   ".into()),
            conversation_id: None,
        };
        assert!(matches!(empty.into_turn(), Err(ApiError::BadRequest(_))));

        let no_user = ChatRequest {
            messages: vec![message(MessageRole::Assistant, "hi")],
            prompt: None,
            conversation_id: None,
        };
        assert!(matches!(no_user.into_turn(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_conversation_title() {
        let long = "x".repeat(80);
        assert_eq!(conversation_title(&long).chars().count(), CONVERSATION_TITLE_CHARS);
        assert_eq!(conversation_title("  "), DEFAULT_CONVERSATION_TITLE);
        assert_eq!(conversation_title("چطوری؟"), "چطوری؟");
    }

    fn conversation_db() -> (Db, Uuid) {
        let database = Database::open_in_memory().unwrap();
        let user = database.resolve_app_user(&Principal::new("sub-1", None)).unwrap();
        let conversation = database.create_conversation(&user, "t").unwrap();
        (Db::new(database), conversation.id)
    }

    async fn stored_replies(db: &Db, id: Uuid) -> Vec<String> {
        db.call(move |db| db.list_messages(&AccessDecision::AllowAll, id, 100))
            .await
            .unwrap()
            .into_iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content)
            .collect()
    }

    fn deltas(items: Vec<Result<&'static str, LlmError>>) -> TextStream {
        stream::iter(items.into_iter().map(|r| r.map(String::from))).boxed()
    }

    #[tokio::test]
    async fn test_complete_turn_stores_full_reply() {
        let (db, id) = conversation_db();
        let (tx, mut rx) = mpsc::channel(RELAY_BUFFER);

        complete_turn(deltas(vec![Ok("Hel"), Ok(""), Ok("lo")]), tx, db.clone(), id, Duration::from_secs(5)).await;

        let mut body = Vec::new();
        while let Some(Ok(chunk)) = rx.recv().await {
            body.extend_from_slice(&chunk);
        }
        assert_eq!(body, b"Hello");
        assert_eq!(stored_replies(&db, id).await, vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_failed_generation_stores_nothing() {
        let (db, id) = conversation_db();
        let (tx, mut rx) = mpsc::channel(RELAY_BUFFER);

        let failing = deltas(vec![Ok("partial"), Err(LlmError::Transport("reset".into()))]);
        complete_turn(failing, tx, db.clone(), id, Duration::from_secs(5)).await;

        assert!(matches!(rx.recv().await, Some(Ok(_))));
        assert!(matches!(rx.recv().await, Some(Err(_))));
        assert!(stored_replies(&db, id).await.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_generation_stores_nothing() {
        let (db, id) = conversation_db();
        let (tx, _rx) = mpsc::channel(RELAY_BUFFER);

        let stalled: TextStream = stream::iter([Ok("partial".to_string())])
            .chain(stream::pending())
            .boxed();
        complete_turn(stalled, tx, db.clone(), id, Duration::from_millis(20)).await;

        assert!(stored_replies(&db, id).await.is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_client_stores_nothing() {
        let (db, id) = conversation_db();
        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        drop(rx);

        complete_turn(deltas(vec![Ok("never seen")]), tx, db.clone(), id, Duration::from_secs(5)).await;

        assert!(stored_replies(&db, id).await.is_empty());
    }
}
