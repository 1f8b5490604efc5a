//! Integration tests for the content client.

mod support;

use lotopital_core::api::{
    ApiError, CategoryDraft, ContactForm, ContentApi, PostDraft, PostList, PostQuery,
};
use reqwest::StatusCode;
use serde_json::json;
use support::{can_bind_localhost, coordinator, json_response, token_response, unauthorized};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

macro_rules! require_localhost {
    () => {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
    };
}

fn content(server: &MockServer) -> ContentApi {
    ContentApi::new(coordinator(server))
}

#[tokio::test]
async fn test_list_categories() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/category"))
        .respond_with(json_response(
            200,
            json!([
                {"_id": "c1", "name": "News", "description": "Company news"},
                {"_id": "c2", "name": "Guides"}
            ]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let categories = content(&server).list_categories().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].description.as_deref(), Some("Company news"));
    assert!(categories[1].description.is_none());
}

#[tokio::test]
async fn test_create_category_returns_server_message() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/category"))
        .and(body_json(json!({"name": "News"})))
        .respond_with(json_response(201, json!({"message": "Category created successfully"})))
        .expect(1)
        .mount(&server)
        .await;

    let draft = CategoryDraft {
        name: "News".to_string(),
        description: None,
    };
    let ack = content(&server).create_category(&draft).await.unwrap();
    assert_eq!(ack.message_or("fallback"), "Category created successfully");
}

#[tokio::test]
async fn test_save_category_failure_uses_fallback_message() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/category/c1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
        .expect(1)
        .mount(&server)
        .await;

    let draft = CategoryDraft {
        name: "News".to_string(),
        description: Some("All news".to_string()),
    };
    let err = content(&server)
        .update_category("c1", &draft)
        .await
        .unwrap_err();
    let api = err.downcast_ref::<ApiError>().expect("ApiError");
    assert_eq!(api.status, StatusCode::BAD_REQUEST);
    assert_eq!(api.message, "Failed to save category (HTTP 400 Bad Request)");
}

#[tokio::test]
async fn test_delete_with_empty_body_is_acknowledged() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/category/c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let ack = content(&server).delete_category("c1").await.unwrap();
    assert_eq!(ack.message_or("Category deleted successfully"), "Category deleted successfully");
}

#[tokio::test]
async fn test_unauthorized_write_after_failed_refresh() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/post/p1"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(json_response(403, json!({"message": "Invalid refresh token"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = content(&server).delete_post("p1").await.unwrap_err();
    let api = err.downcast_ref::<ApiError>().expect("ApiError");
    assert!(api.is_unauthorized());
    assert_eq!(api.message, "Not authorized, token expired");
}

#[tokio::test]
async fn test_write_recovers_from_expired_token() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/post"))
        .and(wiremock::matchers::header_regex("cookie", "accessToken=t2"))
        .respond_with(json_response(201, json!({"message": "Post created"})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/post"))
        .respond_with(unauthorized())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/refresh-token"))
        .respond_with(token_response("t2"))
        .expect(1)
        .mount(&server)
        .await;

    let draft = PostDraft {
        title: Some("Launch".to_string()),
        category: Some("c1".to_string()),
        tag: Some(vec!["news".to_string()]),
        ..PostDraft::default()
    };
    let ack = content(&server).create_post(&draft).await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("Post created"));
}

#[tokio::test]
async fn test_search_posts_sends_filters() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/posts/search-filter"))
        .and(query_param("q", "rust"))
        .and(query_param("category", "c1"))
        .and(query_param("page", "2"))
        .respond_with(json_response(
            200,
            json!({
                "posts": [{"_id": "p1", "title": "Rust at Lotopital", "tag": "rust, web"}],
                "currentPage": 2,
                "totalPages": 4,
                "totalPosts": 31
            }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let query = PostQuery {
        q: "rust".to_string(),
        category: "c1".to_string(),
        page: 2,
    };
    let page = content(&server).search_posts(&query).await.unwrap();
    assert_eq!(page.total_posts, Some(31));

    let mut list = PostList::new(page);
    assert_eq!(list.current_page(), 2);
    assert_eq!(list.get("p1").unwrap().tag, vec!["rust", "web"]);

    let update = PostDraft {
        title: Some("Rust everywhere".to_string()),
        ..PostDraft::default()
    };
    assert!(list.apply_update("p1", &update));
    assert_eq!(list.get("p1").unwrap().title, "Rust everywhere");
}

#[tokio::test]
async fn test_get_post_not_found() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/post/missing"))
        .respond_with(json_response(404, json!({"message": "Post not found"})))
        .mount(&server)
        .await;

    let err = content(&server).get_post("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Post not found");
}

#[tokio::test]
async fn test_list_messages() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/messages"))
        .respond_with(json_response(
            200,
            json!([{
                "_id": "m1",
                "name": "Grace",
                "email": "grace@example.com",
                "service": "SEO",
                "message": "Hello there",
                "createdAt": "2024-06-01T08:30:00Z"
            }]),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let messages = content(&server).list_messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].service.as_deref(), Some("SEO"));
    assert!(messages[0].phone.is_none());
    assert!(messages[0].created_at().is_some());
}

#[tokio::test]
async fn test_send_contact_form() {
    require_localhost!();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send-email"))
        .and(body_json(json!({
            "name": "Grace",
            "email": "grace@example.com",
            "phone": "",
            "company": "Hopper Ltd",
            "service": "",
            "message": "Hi"
        })))
        .respond_with(json_response(200, json!({"message": "Email sent"})))
        .expect(1)
        .mount(&server)
        .await;

    let form = ContactForm {
        name: "Grace".to_string(),
        email: "grace@example.com".to_string(),
        company: "Hopper Ltd".to_string(),
        message: "Hi".to_string(),
        ..ContactForm::default()
    };
    let ack = content(&server).send_contact(&form).await.unwrap();
    assert_eq!(ack.message_or("sent"), "Email sent");
}
