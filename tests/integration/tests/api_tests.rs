//! REST API integration tests
//!
//! Run against PostgreSQL and Redis from `DATABASE_URL` / `REDIS_URL`;
//! every test returns early when they are not configured.

use integration_tests::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

const CONVERSATIONS: &str = "/api/v1/messaging/conversations";

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoints() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");

        let body: Value = assert_json(server.get("/health").await.unwrap(), StatusCode::OK)
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");

        let ready: Value = assert_json(server.get("/health/ready").await.unwrap(), StatusCode::OK)
            .await
            .unwrap();
        assert_eq!(ready["status"], "ready");
        assert_eq!(ready["checks"]["database"], "healthy");
        assert_eq!(ready["checks"]["redis"], "healthy");
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_register_login_refresh_logout() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let req = RegisterRequest::named("amina");

        let response = server.post("/api/v1/auth/register", &req).await.unwrap();
        let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await.unwrap();
        assert_eq!(auth.token_type, "Bearer");
        assert!(auth.expires_in > 0);
        assert_eq!(auth.user["username"], req.username.as_str());
        assert!(auth.user.get("password_hash").is_none());

        let response = server
            .post("/api/v1/auth/login", &LoginRequest::from(&req))
            .await
            .unwrap();
        let login: AuthResponse = assert_json(response, StatusCode::OK).await.unwrap();

        let me: Value = assert_json(
            server
                .get_auth("/api/v1/messaging/users/@me", &login.access_token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(me["email"], req.email.as_str());

        let response = server
            .post(
                "/api/v1/auth/refresh",
                &json!({ "refresh_token": login.refresh_token }),
            )
            .await
            .unwrap();
        let refreshed: AuthResponse = assert_json(response, StatusCode::OK).await.unwrap();

        let response = server
            .post_auth(
                "/api/v1/auth/logout",
                &refreshed.access_token,
                &json!({ "refresh_token": refreshed.refresh_token }),
            )
            .await
            .unwrap();
        assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

        // The revoked refresh token is no longer accepted
        let response = server
            .post(
                "/api/v1/auth/refresh",
                &json!({ "refresh_token": refreshed.refresh_token }),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let req = RegisterRequest::unique();
        let response = server.post("/api/v1/auth/register", &req).await.unwrap();
        assert_status(response, StatusCode::CREATED).await.unwrap();

        let response = server.post("/api/v1/auth/register", &req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let mut weak = RegisterRequest::unique();
        weak.password = "short".to_string();
        let code = assert_error(
            server.post("/api/v1/auth/register", &weak).await.unwrap(),
            StatusCode::BAD_REQUEST,
        )
        .await
        .unwrap();
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let user = register_user(&server, "bilal").await.unwrap();

        let response = server
            .post(
                "/api/v1/auth/login",
                &LoginRequest {
                    email: user.email,
                    password: "WrongPass123!".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_messaging_requires_a_token() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let response = server.get(CONVERSATIONS).await.unwrap();
        let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
        assert_eq!(code, "MISSING_AUTHORIZATION");

        let response = server.get_auth(CONVERSATIONS, "not-a-jwt").await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

mod conversations {
    use super::*;

    #[tokio::test]
    async fn test_direct_conversation_is_found_or_created() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();

        let response = server
            .post_auth(CONVERSATIONS, &amina.token, &json!({ "participant_id": bilal.id }))
            .await
            .unwrap();
        let first: Value = assert_json(response, StatusCode::CREATED).await.unwrap();
        assert_eq!(first["created"], true);
        assert_eq!(first["is_group"], false);
        assert_eq!(first["participants"].as_array().unwrap().len(), 2);

        // Same pair from the other side resolves to the same conversation
        let response = server
            .post_auth(CONVERSATIONS, &bilal.token, &json!({ "participant_id": amina.id }))
            .await
            .unwrap();
        let second: Value = assert_json(response, StatusCode::OK).await.unwrap();
        assert_eq!(second["created"], false);
        assert_eq!(second["id"], first["id"]);

        let code = assert_error(
            server
                .post_auth(CONVERSATIONS, &amina.token, &json!({ "participant_id": amina.id }))
                .await
                .unwrap(),
            StatusCode::BAD_REQUEST,
        )
        .await
        .unwrap();
        assert_eq!(code, "CANNOT_MESSAGE_SELF");
    }

    #[tokio::test]
    async fn test_list_filter_and_search() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let chidi = register_user(&server, "chidi").await.unwrap();

        let direct = create_direct(&server, &amina, &bilal).await.unwrap();
        let group = create_group(&server, &amina, "Tafsir Circle", &[&bilal, &chidi])
            .await
            .unwrap();

        let all: Vec<Value> = assert_json(
            server.get_auth(CONVERSATIONS, &amina.token).await.unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 2);

        let groups: Vec<Value> = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}?filter=groups"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["id"], group["id"]);

        // A 1:1 is found by the other participant's username
        let found: Vec<Value> = assert_json(
            server
                .get_auth(
                    &format!("{CONVERSATIONS}?search={}", &bilal.username[..8]),
                    &amina.token,
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(found.iter().any(|c| c["id"] == direct["id"]));

        let found: Vec<Value> = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}?search=tafsir"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);

        // Unread follows incoming messages and is reset by mark-read
        let group_id = group["id"].as_str().unwrap();
        send_message(&server, &bilal, group_id, "salam everyone", None)
            .await
            .unwrap();
        let unread: Vec<Value> = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}?filter=unread"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0]["unread_count"], 1);

        let response = server
            .post_auth(&format!("{CONVERSATIONS}/{group_id}/read"), &amina.token, &json!({}))
            .await
            .unwrap();
        assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

        let unread: Vec<Value> = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}?filter=unread"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(unread.is_empty());
    }

    #[tokio::test]
    async fn test_group_membership_and_admin_handover() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let chidi = register_user(&server, "chidi").await.unwrap();
        let dawud = register_user(&server, "dawud").await.unwrap();

        let group = create_group(&server, &amina, "Study Group", &[&bilal, &chidi])
            .await
            .unwrap();
        let group_id = group["id"].as_str().unwrap();
        assert_eq!(group["admin_id"], amina.id.as_str());

        // Only the admin manages membership
        let code = assert_error(
            server
                .post_auth(
                    &format!("{CONVERSATIONS}/{group_id}/add-participant"),
                    &bilal.token,
                    &json!({ "user_id": dawud.id }),
                )
                .await
                .unwrap(),
            StatusCode::FORBIDDEN,
        )
        .await
        .unwrap();
        assert_eq!(code, "NOT_GROUP_ADMIN");

        let updated: Value = assert_json(
            server
                .post_auth(
                    &format!("{CONVERSATIONS}/{group_id}/add-participant"),
                    &amina.token,
                    &json!({ "user_id": dawud.id }),
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(updated["participants"].as_array().unwrap().len(), 4);

        let code = assert_error(
            server
                .post_auth(
                    &format!("{CONVERSATIONS}/{group_id}/add-participant"),
                    &amina.token,
                    &json!({ "user_id": dawud.id }),
                )
                .await
                .unwrap(),
            StatusCode::CONFLICT,
        )
        .await
        .unwrap();
        assert_eq!(code, "ALREADY_PARTICIPANT");

        let updated: Value = assert_json(
            server
                .post_auth(
                    &format!("{CONVERSATIONS}/{group_id}/remove-participant"),
                    &amina.token,
                    &json!({ "user_id": chidi.id }),
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(updated["participants"].as_array().unwrap().len(), 3);

        // The removed member can no longer read the group
        let code = assert_error(
            server
                .get_auth(&format!("{CONVERSATIONS}/{group_id}"), &chidi.token)
                .await
                .unwrap(),
            StatusCode::FORBIDDEN,
        )
        .await
        .unwrap();
        assert_eq!(code, "NOT_PARTICIPANT");

        // The admin leaving hands the role to the longest-standing member
        let response = server
            .post_auth(&format!("{CONVERSATIONS}/{group_id}/leave"), &amina.token, &json!({}))
            .await
            .unwrap();
        assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

        let after: Value = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}/{group_id}"), &bilal.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(after["admin_id"], bilal.id.as_str());

        let response = server
            .delete_auth(&format!("{CONVERSATIONS}/{group_id}"), &dawud.token)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = server
            .delete_auth(&format!("{CONVERSATIONS}/{group_id}"), &bilal.token)
            .await
            .unwrap();
        assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

        let response = server
            .get_auth(&format!("{CONVERSATIONS}/{group_id}"), &bilal.token)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_direct_conversation_cannot_be_left() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let direct = create_direct(&server, &amina, &bilal).await.unwrap();

        let code = assert_error(
            server
                .post_auth(
                    &format!("{CONVERSATIONS}/{}/leave", direct["id"].as_str().unwrap()),
                    &amina.token,
                    &json!({}),
                )
                .await
                .unwrap(),
            StatusCode::BAD_REQUEST,
        )
        .await
        .unwrap();
        assert_eq!(code, "CANNOT_LEAVE_DIRECT");
    }
}

mod messages {
    use super::*;

    #[tokio::test]
    async fn test_send_is_idempotent_per_nonce() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let direct = create_direct(&server, &amina, &bilal).await.unwrap();
        let id = direct["id"].as_str().unwrap();

        let first = send_message(&server, &amina, id, "assalamu alaykum", Some("n-1"))
            .await
            .unwrap();
        let again = send_message(&server, &amina, id, "assalamu alaykum", Some("n-1"))
            .await
            .unwrap();
        assert_eq!(first["id"], again["id"]);
        assert_eq!(first["nonce"], "n-1");

        let page: Value = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}/{id}/messages"), &bilal.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(page["messages"].as_array().unwrap().len(), 1);
        assert_eq!(page["messages"][0]["sender"]["username"], amina.username.as_str());

        let list: Vec<Value> = assert_json(
            server.get_auth(CONVERSATIONS, &bilal.token).await.unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(list[0]["last_message"]["preview"], "assalamu alaykum");
    }

    #[tokio::test]
    async fn test_history_pages_in_ascending_order() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let direct = create_direct(&server, &amina, &bilal).await.unwrap();
        let id = direct["id"].as_str().unwrap();

        for i in 0..5 {
            send_message(&server, &amina, id, &format!("message {i}"), None)
                .await
                .unwrap();
        }

        let page: Value = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}/{id}/messages?limit=3"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        let messages = page["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["content"], "message 2");
        assert_eq!(messages[2]["content"], "message 4");
        assert_eq!(page["has_more"], true);

        let oldest = messages[0]["id"].as_str().unwrap();
        let older: Value = assert_json(
            server
                .get_auth(
                    &format!("{CONVERSATIONS}/{id}/messages?before={oldest}&limit=3"),
                    &amina.token,
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        let contents: Vec<&str> = older["messages"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|m| m["content"].as_str())
            .collect();
        assert_eq!(contents, vec!["message 0", "message 1"]);
        assert_eq!(older["has_more"], false);
    }

    #[tokio::test]
    async fn test_edit_and_delete_are_sender_only() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let direct = create_direct(&server, &amina, &bilal).await.unwrap();
        let id = direct["id"].as_str().unwrap();
        let message = send_message(&server, &amina, id, "draft", None).await.unwrap();
        let path = format!("{CONVERSATIONS}/{id}/messages/{}", message["id"].as_str().unwrap());

        let code = assert_error(
            server
                .patch_auth(&path, &bilal.token, &json!({ "content": "hijacked" }))
                .await
                .unwrap(),
            StatusCode::FORBIDDEN,
        )
        .await
        .unwrap();
        assert_eq!(code, "NOT_MESSAGE_SENDER");

        let edited: Value = assert_json(
            server
                .patch_auth(&path, &amina.token, &json!({ "content": "final" }))
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(edited["content"], "final");
        assert_eq!(edited["edited"], true);
        assert!(edited["edited_at"].is_string());

        let response = server.delete_auth(&path, &amina.token).await.unwrap();
        assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

        let page: Value = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}/{id}/messages"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(page["messages"].as_array().unwrap().is_empty());

        let response = server.delete_auth(&path, &amina.token).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reactions_and_pins() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let outsider = register_user(&server, "eve").await.unwrap();
        let direct = create_direct(&server, &amina, &bilal).await.unwrap();
        let id = direct["id"].as_str().unwrap();
        let message = send_message(&server, &amina, id, "jumu'ah at 1pm", None)
            .await
            .unwrap();
        let message_path = format!("{CONVERSATIONS}/{id}/messages/{}", message["id"].as_str().unwrap());

        for _ in 0..2 {
            let reactions: Vec<Value> = assert_json(
                server
                    .put_auth(&format!("{message_path}/reactions/👍"), &bilal.token)
                    .await
                    .unwrap(),
                StatusCode::OK,
            )
            .await
            .unwrap();
            assert_eq!(reactions.len(), 1);
            assert_eq!(reactions[0]["emoji"], "👍");
            assert_eq!(reactions[0]["user_id"], bilal.id.as_str());
        }

        let response = server
            .put_auth(&format!("{message_path}/reactions/👍"), &outsider.token)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let reactions: Vec<Value> = assert_json(
            server
                .delete_auth(&format!("{message_path}/reactions/👍"), &bilal.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(reactions.is_empty());

        let pinned: Value = assert_json(
            server
                .put_auth(&format!("{message_path}/pin"), &bilal.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(pinned["pinned"], true);
        assert_eq!(pinned["pinned_by"], bilal.id.as_str());

        let pins: Vec<Value> = assert_json(
            server
                .get_auth(&format!("{CONVERSATIONS}/{id}/pins"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(pins.len(), 1);

        let unpinned: Value = assert_json(
            server
                .delete_auth(&format!("{message_path}/pin"), &amina.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(unpinned["pinned"], false);
    }

    #[tokio::test]
    async fn test_content_validation() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let direct = create_direct(&server, &amina, &bilal).await.unwrap();
        let path = format!("{CONVERSATIONS}/{}/messages", direct["id"].as_str().unwrap());

        let code = assert_error(
            server
                .post_auth(&path, &amina.token, &json!({ "content": "   " }))
                .await
                .unwrap(),
            StatusCode::BAD_REQUEST,
        )
        .await
        .unwrap();
        assert_eq!(code, "EMPTY_CONTENT");

        let too_long = "a".repeat(server.config.chat.max_message_length + 1);
        let code = assert_error(
            server
                .post_auth(&path, &amina.token, &json!({ "content": too_long }))
                .await
                .unwrap(),
            StatusCode::BAD_REQUEST,
        )
        .await
        .unwrap();
        assert_eq!(code, "MESSAGE_TOO_LONG");
    }
}

mod users_and_notifications {
    use super::*;

    #[tokio::test]
    async fn test_mention_creates_a_notification() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();
        let chidi = register_user(&server, "chidi").await.unwrap();
        let group = create_group(&server, &amina, "Halaqa", &[&bilal, &chidi])
            .await
            .unwrap();

        send_message(
            &server,
            &amina,
            group["id"].as_str().unwrap(),
            &format!("@{} can you lead today?", bilal.username),
            None,
        )
        .await
        .unwrap();

        let list: Value = assert_json(
            server
                .get_auth("/api/v1/messaging/notifications", &bilal.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        let mention = list["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .find(|n| n["kind"] == "mention")
            .cloned()
            .expect("mention notification");
        assert_eq!(mention["conversation_id"], group["id"]);
        assert_eq!(mention["is_read"], false);
        assert!(list["unread_count"].as_i64().unwrap() >= 1);

        // Chidi was not mentioned
        let other: Value = assert_json(
            server
                .get_auth("/api/v1/messaging/notifications", &chidi.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(!other["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["kind"] == "mention"));

        let read: Value = assert_json(
            server
                .patch_auth(
                    &format!("/api/v1/messaging/notifications/{}/read", mention["id"].as_str().unwrap()),
                    &bilal.token,
                    &json!({}),
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(read["is_read"], true);

        let all: Value = assert_json(
            server
                .patch_auth("/api/v1/messaging/notifications/read-all", &bilal.token, &json!({}))
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(all["updated"].is_number());

        let list: Value = assert_json(
            server
                .get_auth("/api/v1/messaging/notifications", &bilal.token)
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(list["unread_count"], 0);

        // Other users cannot touch it
        let response = server
            .delete_auth(
                &format!("/api/v1/messaging/notifications/{}", mention["id"].as_str().unwrap()),
                &chidi.token,
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_user_search_and_status() {
        if !check_test_env().await {
            return;
        }

        let server = TestServer::start().await.expect("Failed to start server");
        let amina = register_user(&server, "amina").await.unwrap();
        let bilal = register_user(&server, "bilal").await.unwrap();

        let found: Vec<Value> = assert_json(
            server
                .get_auth(
                    &format!("/api/v1/messaging/users?search={}", bilal.username),
                    &amina.token,
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], bilal.id.as_str());
        assert!(found[0]["status"].is_string());

        // Searching never returns the caller
        let found: Vec<Value> = assert_json(
            server
                .get_auth(
                    &format!("/api/v1/messaging/users?search={}", amina.username),
                    &amina.token,
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert!(found.is_empty());

        let status: Value = assert_json(
            server
                .patch_auth(
                    "/api/v1/messaging/users/@me/status",
                    &bilal.token,
                    &json!({ "status": "away", "custom_status": "in class" }),
                )
                .await
                .unwrap(),
            StatusCode::OK,
        )
        .await
        .unwrap();
        assert_eq!(status["status"], "away");
        assert_eq!(status["custom_status"], "in class");
    }
}
