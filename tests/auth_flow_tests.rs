use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use minauth::{
    auth::messages,
    build_router,
    config::{AppConfig, SessionConfig},
    services::email_service::{EmailError, EmailService},
    test_utils::test_helpers,
    AppState,
};
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tower_sessions::cookie::{Cookie, SameSite};
use tower_sessions_sqlx_store::SqliteStore;

/// Keeps every token it is asked to deliver.
#[derive(Clone, Default)]
struct Mailbox {
    tokens: Arc<Mutex<Vec<(String, String)>>>,
}

impl Mailbox {
    fn last_token_for(&self, email: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
    }

    fn count(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl EmailService for Mailbox {
    async fn send_password_reset_email(
        &self,
        to_email: &str,
        _to_name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        self.tokens
            .lock()
            .unwrap()
            .push((to_email.to_string(), token.to_string()));
        Ok(())
    }
}

/// A router plus the one cookie a browser would carry between requests.
struct TestClient {
    router: Router,
    pool: SqlitePool,
    mailbox: Mailbox,
    cookie: Option<String>,
}

impl TestClient {
    async fn new() -> Self {
        let pool = test_helpers::create_test_db().await.unwrap();
        let session_store = SqliteStore::new(pool.clone())
            .with_table_name("sessions")
            .unwrap();
        session_store.migrate().await.unwrap();

        let session_layer = SessionConfig {
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
            expiry: time::Duration::days(1),
            name: "session".to_string(),
        }
        .create_layer(session_store);

        let mailbox = Mailbox::default();
        let state = AppState::new(pool.clone(), AppConfig::default(), Box::new(mailbox.clone()));

        Self {
            router: build_router(state, session_layer),
            pool,
            mailbox,
            cookie: None,
        }
    }

    /// Another browser against the same server.
    fn fresh_browser(&self) -> Self {
        Self {
            router: self.router.clone(),
            pool: self.pool.clone(),
            mailbox: self.mailbox.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, request: axum::http::request::Builder, body: Body) -> Response {
        let request = match &self.cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        };
        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(value.to_str().unwrap().to_string()).unwrap();
            if cookie.name() != "session" {
                continue;
            }
            let removed = cookie.value().is_empty()
                || cookie.max_age().is_some_and(|age| age.is_zero());
            self.cookie = if removed {
                None
            } else {
                Some(format!("{}={}", cookie.name(), cookie.value()))
            };
        }

        response
    }

    async fn get(&mut self, uri: &str) -> Response {
        self.send(Request::builder().method("GET").uri(uri), Body::empty())
            .await
    }

    async fn post(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded"),
            Body::from(body),
        )
        .await
    }

    /// Loads `page`, then submits its form with the token it rendered.
    async fn submit(&mut self, page: &str, action: &str, fields: &[(&str, &str)]) -> Response {
        let html = body_text(self.get(page).await).await;
        let token = csrf_token(&html);
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post(action, &fields).await
    }

    async fn follow(&mut self, response: Response) -> String {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string();
        body_text(self.get(&location).await).await
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("page renders a csrf token") + marker.len();
    let end = start + html[start..].find('"').unwrap();
    html[start..end].to_string()
}

async fn sign_up(client: &mut TestClient, name: &str, email: &str, password: &str) -> Response {
    client
        .submit(
            "/signup",
            "/signup",
            &[("name", name), ("email", email), ("password", password)],
        )
        .await
}

#[tokio::test]
async fn signup_signs_in_and_redirects_home() {
    let mut client = TestClient::new().await;

    let response = sign_up(&mut client, "Ann", "ann@x.com", "pw1").await;
    assert_eq!(response.headers()[header::LOCATION], "/");

    let home = client.follow(response).await;
    assert!(home.contains("Welcome, Ann"));
    assert!(home.contains("ann@x.com"));
    assert_eq!(test_helpers::count_users(&client.pool).await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_signup_flashes_once() {
    let mut client = TestClient::new().await;
    sign_up(&mut client, "Ann", "a@x.com", "pw1").await;

    let mut other = client.fresh_browser();
    let response = sign_up(&mut other, "Bob", "a@x.com", "pw2").await;
    assert_eq!(response.headers()[header::LOCATION], "/signup");

    let page = other.follow(response).await;
    assert!(page.contains(messages::EMAIL_TAKEN));
    assert_eq!(test_helpers::count_users(&client.pool).await.unwrap(), 1);

    // Flash messages are consumed by the first render.
    let again = body_text(other.get("/signup").await).await;
    assert!(!again.contains(messages::EMAIL_TAKEN));
}

#[tokio::test]
async fn login_renders_start_page_for_user() {
    let mut client = TestClient::new().await;
    test_helpers::insert_test_user(&client.pool, "Ann", "a@x.com", "pw1")
        .await
        .unwrap();

    let response = client
        .submit("/login", "/login", &[("email", "a@x.com"), ("password", "pw1")])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Welcome, Ann"));

    let home = body_text(client.get("/").await).await;
    assert!(home.contains("Welcome, Ann"));
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let mut client = TestClient::new().await;
    test_helpers::insert_test_user(&client.pool, "Ann", "a@x.com", "pw1")
        .await
        .unwrap();

    let wrong_password = client
        .submit("/login", "/login", &[("email", "a@x.com"), ("password", "nope")])
        .await;
    let wrong_password = client.follow(wrong_password).await;

    let unknown_email = client
        .submit("/login", "/login", &[("email", "ghost@x.com"), ("password", "pw1")])
        .await;
    let unknown_email = client.follow(unknown_email).await;

    assert!(wrong_password.contains(messages::BAD_CREDENTIALS));
    assert!(unknown_email.contains(messages::BAD_CREDENTIALS));

    let home = body_text(client.get("/").await).await;
    assert!(!home.contains("Welcome, Ann"));
}

#[tokio::test]
async fn session_id_changes_when_user_signs_in() {
    let mut client = TestClient::new().await;

    let html = body_text(client.get("/signup").await).await;
    let before_signup = client.cookie.clone().expect("anonymous session cookie");
    let token = csrf_token(&html);
    let response = client
        .post(
            "/signup",
            &[
                ("name", "Ann"),
                ("email", "a@x.com"),
                ("password", "pw1"),
                ("csrf_token", token.as_str()),
            ],
        )
        .await;
    assert_eq!(response.headers()[header::LOCATION], "/");
    let after_signup = client.cookie.clone().expect("signed-in session cookie");
    assert_ne!(before_signup, after_signup);

    let mut other = client.fresh_browser();
    let html = body_text(other.get("/login").await).await;
    let before_login = other.cookie.clone().expect("anonymous session cookie");
    let token = csrf_token(&html);
    let response = other
        .post(
            "/login",
            &[
                ("email", "a@x.com"),
                ("password", "pw1"),
                ("csrf_token", token.as_str()),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let after_login = other.cookie.clone().expect("signed-in session cookie");
    assert_ne!(before_login, after_login);
}

#[tokio::test]
async fn logout_clears_identity() {
    let mut client = TestClient::new().await;
    sign_up(&mut client, "Ann", "a@x.com", "pw1").await;

    let response = client.get("/logout").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/");

    let home = body_text(client.get("/").await).await;
    assert!(!home.contains("Welcome, Ann"));
    assert!(home.contains("Log in"));
}

#[tokio::test]
async fn logout_form_requires_csrf_token() {
    let mut client = TestClient::new().await;
    sign_up(&mut client, "Ann", "a@x.com", "pw1").await;

    let forged = client.post("/logout", &[("csrf_token", "forged")]).await;
    let page = client.follow(forged).await;
    assert!(page.contains(messages::INVALID_CSRF));
    assert!(page.contains("Welcome, Ann"));

    let response = client.submit("/", "/logout", &[]).await;
    let page = client.follow(response).await;
    assert!(!page.contains("Welcome, Ann"));
}

#[tokio::test]
async fn post_without_csrf_token_is_rejected() {
    let mut client = TestClient::new().await;
    client.get("/signup").await;

    let response = client
        .post(
            "/signup",
            &[("name", "Ann"), ("email", "a@x.com"), ("password", "pw1")],
        )
        .await;
    let page = client.follow(response).await;
    assert!(page.contains(messages::INVALID_CSRF));
    assert_eq!(test_helpers::count_users(&client.pool).await.unwrap(), 0);
}

#[tokio::test]
async fn forgot_password_unknown_email() {
    let mut client = TestClient::new().await;

    let response = client
        .submit(
            "/forgot-password",
            "/forgot-password",
            &[("email", "ghost@x.com")],
        )
        .await;
    let page = client.follow(response).await;

    assert!(page.contains(messages::NO_SUCH_EMAIL));
    assert_eq!(client.mailbox.count(), 0);
}

#[tokio::test]
async fn password_reset_round_trip() {
    let mut client = TestClient::new().await;
    test_helpers::insert_test_user(&client.pool, "Ann", "a@x.com", "old")
        .await
        .unwrap();

    let response = client
        .submit("/forgot-password", "/forgot-password", &[("email", "a@x.com")])
        .await;
    let page = client.follow(response).await;
    assert!(page.contains(messages::RESET_EMAIL_SENT));

    let token = client.mailbox.last_token_for("a@x.com").unwrap();
    let reset_page = format!("/reset-password?token={}", token);

    let form = body_text(client.get(&reset_page).await).await;
    assert!(form.contains(&format!(r#"name="token" value="{}""#, token)));
    assert!(!form.contains("invalid or has expired"));

    let response = client
        .submit(
            &reset_page,
            "/reset-password",
            &[
                ("token", token.as_str()),
                ("password", "new"),
                ("confirm_password", "new"),
            ],
        )
        .await;
    assert_eq!(response.headers()[header::LOCATION], "/login");
    let login = client.follow(response).await;
    assert!(login.contains(messages::RESET_SUCCEEDED));

    let old = client
        .submit("/login", "/login", &[("email", "a@x.com"), ("password", "old")])
        .await;
    assert_eq!(old.status(), StatusCode::SEE_OTHER);
    client.follow(old).await;

    let new = client
        .submit("/login", "/login", &[("email", "a@x.com"), ("password", "new")])
        .await;
    assert_eq!(new.status(), StatusCode::OK);

    // The token is single-use.
    let form = body_text(client.get(&reset_page).await).await;
    assert!(form.contains("invalid or has expired"));

    let replay = client
        .submit(
            &reset_page,
            "/reset-password",
            &[
                ("token", token.as_str()),
                ("password", "other"),
                ("confirm_password", "other"),
            ],
        )
        .await;
    let page = client.follow(replay).await;
    assert!(page.contains(messages::RESET_FAILED));
}

#[tokio::test]
async fn reset_with_mismatched_passwords_keeps_old_hash() {
    let mut client = TestClient::new().await;
    test_helpers::insert_test_user(&client.pool, "Ann", "a@x.com", "old")
        .await
        .unwrap();
    let before = test_helpers::stored_password_hash(&client.pool, "a@x.com")
        .await
        .unwrap();

    client
        .submit("/forgot-password", "/forgot-password", &[("email", "a@x.com")])
        .await;
    let token = client.mailbox.last_token_for("a@x.com").unwrap();
    let reset_page = format!("/reset-password?token={}", token);

    let response = client
        .submit(
            &reset_page,
            "/reset-password",
            &[
                ("token", token.as_str()),
                ("password", "x"),
                ("confirm_password", "y"),
            ],
        )
        .await;
    let page = client.follow(response).await;
    assert!(page.contains(messages::PASSWORDS_DIFFER));

    let after = test_helpers::stored_password_hash(&client.pool, "a@x.com")
        .await
        .unwrap();
    assert_eq!(before, after);

    // The token is still usable after a rejected attempt.
    let form = body_text(client.get(&reset_page).await).await;
    assert!(!form.contains("invalid or has expired"));
}

#[tokio::test]
async fn newer_reset_request_replaces_older_token() {
    let mut client = TestClient::new().await;
    test_helpers::insert_test_user(&client.pool, "Ann", "a@x.com", "old")
        .await
        .unwrap();

    client
        .submit("/forgot-password", "/forgot-password", &[("email", "a@x.com")])
        .await;
    let first = client.mailbox.last_token_for("a@x.com").unwrap();
    client
        .submit("/forgot-password", "/forgot-password", &[("email", "a@x.com")])
        .await;
    let second = client.mailbox.last_token_for("a@x.com").unwrap();
    assert_ne!(first, second);

    let stale = body_text(client.get(&format!("/reset-password?token={}", first)).await).await;
    assert!(stale.contains("invalid or has expired"));
    let current =
        body_text(client.get(&format!("/reset-password?token={}", second)).await).await;
    assert!(!current.contains("invalid or has expired"));
}

#[tokio::test]
async fn reset_page_without_token_is_invalid() {
    let mut client = TestClient::new().await;
    let page = body_text(client.get("/reset-password").await).await;
    assert!(page.contains("invalid or has expired"));
}

#[tokio::test]
async fn static_pages_are_served() {
    let mut client = TestClient::new().await;

    for path in ["/home", "/about", "/contact", "/static/style.css"] {
        let response = client.get(path).await;
        assert_eq!(response.status(), StatusCode::OK, "{} should be served", path);
    }

    let about = body_text(client.get("/about").await).await;
    assert!(about.contains("<h1>About</h1>"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let mut client = TestClient::new().await;
    let response = client.get("/").await;

    assert_eq!(response.headers()["X-Frame-Options"], "DENY");
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
}
