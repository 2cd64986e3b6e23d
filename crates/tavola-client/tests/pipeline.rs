//! End-to-end behaviour of the request pipeline against a mock backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use httpmock::prelude::*;
use serde_json::json;
use tavola_api_models::{Customer, Page, PageRequest};
use tavola_client::{
    ApiClient, ClientConfig, ErrorCategory, ListController, LoginError, RequestInterceptor,
    UnauthorizedPolicy, login, toggle_customer_block,
};
use tavola_session::token::encode_unsigned;
use tavola_session::{CredentialStore, SessionManager, SessionState};

const FAR_FUTURE_EXP: i64 = 4_000_000_000;

#[derive(Debug, Default)]
struct CallCounter(AtomicUsize);

impl CallCounter {
    fn calls(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl RequestInterceptor for CallCounter {
    fn intercept(&self, _request: &mut reqwest::Request) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    client: ApiClient,
    session: Arc<SessionManager>,
    counter: Arc<CallCounter>,
}

fn harness(server: &MockServer, policy: UnauthorizedPolicy) -> Result<Harness> {
    let session = Arc::new(SessionManager::with_system_clock(
        CredentialStore::in_memory(),
    ));
    let counter = Arc::new(CallCounter::default());
    let config = ClientConfig::new(&server.base_url())?
        .with_api_key("test-key")
        .with_unauthorized(policy);
    let client = ApiClient::for_session(config, &session)
        .interceptor(counter.clone())
        .build()?;
    Ok(Harness {
        client,
        session,
        counter,
    })
}

fn token(subject: &str) -> String {
    encode_unsigned(&json!({"exp": FAR_FUTURE_EXP, "sub": subject}))
}

fn empty_page() -> serde_json::Value {
    json!({"data": [], "pagination": {"total": 0, "page": 1, "limit": 20, "hasNext": false, "hasPrev": false}})
}

#[tokio::test]
async fn every_request_carries_json_headers_api_key_and_bearer() -> Result<()> {
    let server = MockServer::start_async().await;
    let access = token("ops");
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/admin/stores")
            .query_param("page", "1")
            .query_param("limit", "20")
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .header("x-key", "test-key")
            .header("authorization", format!("Bearer {access}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(empty_page());
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    h.session.start_session(&access, None);
    let page = h.client.stores(PageRequest::first()).await?;
    assert!(page.data.is_empty());
    mock.assert();
    assert_eq!(h.counter.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn list_fetch_401_expires_session_under_default_policy() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/admin/customers");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(json!({"message": "jwt expired"}));
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    h.session.start_session(&token("ops"), Some("refresh"));
    let err = h
        .client
        .customers(PageRequest::first())
        .await
        .expect_err("401 surfaces");
    assert_eq!(err.category, ErrorCategory::Unauthorized);
    assert_eq!(h.session.state(), SessionState::Expired);
    assert_eq!(h.session.credentials().read(), None);
    Ok(())
}

#[tokio::test]
async fn passthrough_policy_leaves_session_logged_in() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/admin/campaigns");
        then.status(401);
    });

    let h = harness(&server, UnauthorizedPolicy::Passthrough)?;
    h.session.start_session(&token("ops"), None);
    let err = h
        .client
        .campaigns(PageRequest::first())
        .await
        .expect_err("401 surfaces");
    assert_eq!(err.category, ErrorCategory::Unauthorized);
    assert_eq!(h.session.state(), SessionState::LoggedIn);
    Ok(())
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() -> Result<()> {
    let server = MockServer::start_async().await;
    let stale = token("stale");
    let fresh = token("fresh");

    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/admin/stores")
            .header("authorization", format!("Bearer {stale}"));
        then.status(401);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/admin/stores")
            .header("authorization", format!("Bearer {fresh}"));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(empty_page());
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/auth/refresh-token")
            .json_body(json!({"refreshToken": "refresh-1"}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"token": fresh, "refreshToken": "refresh-2"}));
    });

    let h = harness(&server, UnauthorizedPolicy::RefreshOnce)?;
    h.session.start_session(&stale, Some("refresh-1"));
    let (first, second) = tokio::join!(
        h.client.stores(PageRequest::first()),
        h.client.stores(PageRequest::first())
    );
    first?;
    second?;

    refresh.assert();
    assert_eq!(h.session.credentials().read().as_deref(), Some(fresh.as_str()));
    assert_eq!(
        h.session.credentials().read_refresh().as_deref(),
        Some("refresh-2")
    );
    assert_eq!(h.session.state(), SessionState::LoggedIn);
    Ok(())
}

#[tokio::test]
async fn failed_refresh_degrades_to_logout() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/admin/menu-items");
        then.status(401);
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/auth/refresh-token");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({"error": "refresh token revoked"}));
    });

    let h = harness(&server, UnauthorizedPolicy::RefreshOnce)?;
    h.session.start_session(&token("ops"), Some("revoked"));
    let err = h
        .client
        .menu_items(PageRequest::first())
        .await
        .expect_err("401 surfaces");
    assert_eq!(err.category, ErrorCategory::Unauthorized);
    assert_eq!(h.session.state(), SessionState::Expired);
    Ok(())
}

#[tokio::test]
async fn retry_rejected_again_expires_session_without_second_refresh() -> Result<()> {
    let server = MockServer::start_async().await;
    let stale = token("stale");
    let fresh = token("fresh");

    server.mock(|when, then| {
        when.method(GET).path("/api/v1/admin/withdrawals");
        then.status(401);
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/api/v1/auth/refresh-token");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"token": fresh, "refreshToken": "refresh-2"}));
    });

    let h = harness(&server, UnauthorizedPolicy::RefreshOnce)?;
    h.session.start_session(&stale, Some("refresh-1"));
    let err = h
        .client
        .withdrawals(PageRequest::first())
        .await
        .expect_err("still rejected");
    assert_eq!(err.category, ErrorCategory::Unauthorized);
    assert_eq!(h.session.state(), SessionState::Expired);
    assert_eq!(h.session.credentials().read(), None);
    refresh.assert_hits(1);
    assert_eq!(h.counter.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn late_401_for_replaced_token_keeps_new_session() -> Result<()> {
    let server = MockServer::start_async().await;
    let old = token("old");
    let new = token("new");
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/admin/stores")
            .header("authorization", format!("Bearer {old}"));
        then.status(401).delay(Duration::from_millis(300));
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    h.session.start_session(&old, None);
    let (result, ()) = tokio::join!(h.client.stores(PageRequest::first()), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.session.start_session(&new, None);
    });

    assert_eq!(
        result.err().map(|err| err.category),
        Some(ErrorCategory::Unauthorized)
    );
    assert_eq!(h.session.state(), SessionState::LoggedIn);
    assert_eq!(h.session.credentials().read().as_deref(), Some(new.as_str()));
    Ok(())
}

#[tokio::test]
async fn http_404_is_not_found_on_every_endpoint() -> Result<()> {
    let server = MockServer::start_async().await;
    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;

    let categories = [
        h.client.customers(PageRequest::first()).await.err(),
        h.client.withdrawals(PageRequest::first()).await.err(),
        h.client.stores(PageRequest::first()).await.err(),
        h.client.block_customer("missing").await.err(),
    ];
    for error in categories {
        assert_eq!(error.map(|e| e.category), Some(ErrorCategory::NotFound));
    }
    Ok(())
}

#[tokio::test]
async fn invalid_email_is_rejected_before_any_call() -> Result<()> {
    let server = MockServer::start_async().await;
    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;

    let err = login(&h.client, &h.session, "not-an-email", "whatever")
        .await
        .expect_err("invalid email");
    assert_eq!(err, LoginError::InvalidEmail);
    assert!(err.to_string().contains("email"));
    assert_eq!(h.counter.calls(), 0);
    assert_eq!(h.session.state(), SessionState::LoggedOut);
    Ok(())
}

#[tokio::test]
async fn login_persists_tokens_and_logs_in() -> Result<()> {
    let server = MockServer::start_async().await;
    let access = token("admin-1");
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/auth/admin/login")
            .json_body(json!({"email": "ops@tavola.io", "password": "s3cret"}));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "token": access,
                "refreshToken": "refresh-1",
                "user": {"id": "admin-1", "email": "ops@tavola.io", "role": "admin"}
            }));
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    let response = login(&h.client, &h.session, "ops@tavola.io", "s3cret").await?;
    mock.assert();
    assert_eq!(response.user.map(|user| user.id).as_deref(), Some("admin-1"));
    assert_eq!(h.session.state(), SessionState::LoggedIn);
    assert_eq!(h.session.subject().as_deref(), Some("admin-1"));
    assert_eq!(
        h.session.credentials().read_refresh().as_deref(),
        Some("refresh-1")
    );
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_reported_as_invalid_credentials() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/auth/admin/login");
        then.status(401)
            .header("content-type", "application/json")
            .json_body(json!({"message": "Invalid credentials"}));
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    let err = login(&h.client, &h.session, "ops@tavola.io", "wrong")
        .await
        .expect_err("rejected");
    assert_eq!(
        err,
        LoginError::InvalidCredentials {
            detail: Some("Invalid credentials".to_string())
        }
    );
    assert_eq!(h.session.state(), SessionState::LoggedOut);
    Ok(())
}

#[tokio::test]
async fn block_toggle_rolls_back_when_backend_fails() -> Result<()> {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/v1/admin/customers/u1/block");
        then.status(503);
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    let list = ListController::<Customer>::new();
    list.set_rows(Page {
        data: vec![Customer {
            id: "u1".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: None,
            blocked: false,
            status: Some("active".into()),
        }],
        pagination: None,
    });

    let err = toggle_customer_block(&h.client, &list, "u1")
        .await
        .expect_err("backend down");
    mock.assert();
    assert_eq!(err.category(), ErrorCategory::ServerError);
    let restored = list.record("u1").expect("row kept");
    assert!(!restored.blocked);
    assert_eq!(restored.status.as_deref(), Some("active"));
    Ok(())
}

#[tokio::test]
async fn block_toggle_reconciles_with_server_fields() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/admin/customers/u1/block");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"blocked": true, "status": "suspended"}));
    });

    let h = harness(&server, UnauthorizedPolicy::SilentLogout)?;
    let list = ListController::<Customer>::new();
    list.set_rows(Page {
        data: vec![Customer {
            id: "u1".into(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: None,
            blocked: false,
            status: None,
        }],
        pagination: None,
    });

    let updated = toggle_customer_block(&h.client, &list, "u1").await?;
    assert!(updated.blocked);
    assert_eq!(updated.status.as_deref(), Some("suspended"));
    assert_eq!(list.record("u1"), Some(updated));
    assert!(list.pending("u1").is_none());
    Ok(())
}
