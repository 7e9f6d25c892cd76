//! Reference collections: public reads, console writes.

mod common;

use axum::http::StatusCode;
use common::{as_console, as_user, create_test_app, header, TestApp};
use serde_json::{json, Value};

async fn create_city(app: &TestApp, en: &str, fa: Option<&str>) -> Value {
    let mut name = json!({ "en": en });
    if let Some(fa) = fa {
        name["fa"] = json!(fa);
    }
    let response = as_console(app.server.post("/api/cities"))
        .json(&json!({
            "name": name,
            "country": { "en": "Iran", "fa": "ایران" },
            "latitude": 35.69,
            "longitude": 51.39,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json()
}

#[tokio::test]
async fn test_console_creates_and_anyone_reads() {
    let app = create_test_app();
    let created = create_city(&app, "Tehran", Some("تهران")).await;
    assert_eq!(created["name"], "Tehran");
    let id = created["id"].as_i64().unwrap();

    let doc: Value = app.server.get(&format!("/api/cities/{id}")).await.json();
    assert_eq!(doc["name"], "Tehran");
    assert_eq!(doc["country"], "Iran");

    let page: Value = app.server.get("/api/cities").await.json();
    assert_eq!(page["totalDocs"], 1);
    assert_eq!(page["docs"][0]["id"], id);
}

#[tokio::test]
async fn test_locale_selection_and_fallback() {
    let app = create_test_app();
    let id = create_city(&app, "Mashhad", None).await["id"].as_i64().unwrap();
    create_city(&app, "Shiraz", Some("شیراز")).await;

    let by_header: Value = header(app.server.get("/api/cities"), "x-user-language", "fa")
        .await
        .json();
    assert_eq!(by_header["docs"][0]["name"], "Mashhad");
    assert_eq!(by_header["docs"][0]["country"], "ایران");
    assert_eq!(by_header["docs"][1]["name"], "شیراز");

    let by_accept: Value = header(app.server.get(&format!("/api/cities/{id}")), "accept-language", "fa-IR,en;q=0.8")
        .await
        .json();
    assert_eq!(by_accept["country"], "ایران");

    let by_query: Value = app
        .server
        .get(&format!("/api/cities/{id}"))
        .add_query_param("locale", "fa")
        .await
        .json();
    assert_eq!(by_query["country"], "ایران");
}

#[tokio::test]
async fn test_pagination() {
    let app = create_test_app();
    for name in ["Tabriz", "Isfahan", "Yazd"] {
        create_city(&app, name, None).await;
    }

    let page: Value = app
        .server
        .get("/api/cities")
        .add_query_param("limit", 2)
        .add_query_param("page", 2)
        .await
        .json();
    assert_eq!(page["totalDocs"], 3);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["page"], 2);
    assert_eq!(page["docs"].as_array().unwrap().len(), 1);
    assert_eq!(page["docs"][0]["name"], "Yazd");
}

#[tokio::test]
async fn test_writes_need_console() {
    let app = create_test_app();
    let body = json!({ "prompt": { "en": "Plan my week" } });

    let anonymous = app.server.post("/api/ai-suggestions").json(&body).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let user = as_user(app.server.post("/api/ai-suggestions"), "alice").json(&body).await;
    assert_eq!(user.status_code(), StatusCode::FORBIDDEN);

    let console = as_console(app.server.post("/api/ai-suggestions")).json(&body).await;
    assert_eq!(console.status_code(), StatusCode::OK);
    let id = console.json::<Value>()["id"].as_i64().unwrap();

    let user_delete = as_user(app.server.delete(&format!("/api/ai-suggestions/{id}")), "alice").await;
    assert_eq!(user_delete.status_code(), StatusCode::FORBIDDEN);

    let deleted: Value = as_console(app.server.delete(&format!("/api/ai-suggestions/{id}")))
        .await
        .json();
    assert_eq!(deleted["success"], true);
    assert_eq!(deleted["id"], id);

    let gone = app.server.get(&format!("/api/ai-suggestions/{id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_create_body_is_bad_request() {
    let app = create_test_app();
    let response = as_console(app.server.post("/api/cities"))
        .json(&json!({ "name": { "en": "Nowhere" } }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_and_private_collections_are_not_found() {
    let app = create_test_app();

    assert_eq!(app.server.get("/api/planets").await.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        as_console(app.server.get("/api/conversations")).await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        as_console(app.server.post("/api/app-users"))
            .json(&json!({}))
            .await
            .status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.server.get("/api/cities/42").await.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_grouped_wallpapers() {
    let app = create_test_app();
    let nature: Value = as_console(app.server.post("/api/wallpaper-categories"))
        .json(&json!({ "title": { "en": "Nature", "ar": "طبيعة" } }))
        .await
        .json();
    as_console(app.server.post("/api/wallpaper-categories"))
        .json(&json!({ "title": { "en": "Cities" } }))
        .await;
    for title in ["Forest", "Lake"] {
        as_console(app.server.post("/api/wallpapers"))
            .json(&json!({
                "title": { "en": title },
                "fileUrl": format!("https://cdn.example.com/{title}.jpg"),
                "category": nature["id"],
            }))
            .await;
    }

    let groups: Value = app
        .server
        .get("/api/wallpaper-categories/grouped")
        .add_query_param("locale", "ar")
        .await
        .json();
    let groups = groups.as_array().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0]["title"], "طبيعة");
    assert_eq!(groups[0]["wallpapers"].as_array().unwrap().len(), 2);
    assert_eq!(groups[0]["wallpapers"][1]["title"], "Lake");
    assert!(groups[1]["wallpapers"].as_array().unwrap().is_empty());
}
