//! End-to-end tests of the wallet login flow over HTTP

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::ConnectInfo,
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::Duration;
    use k256::schnorr::SigningKey;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    use arena_auth::auth::{
        sign_personal_message, AuthError, AuthService, AuthSettings, KaspaAddress, Prefix,
        VerificationPolicy,
    };
    use arena_auth::clock::ManualClock;
    use arena_auth::middleware::RateLimiter;
    use arena_auth::models::VerifyRequest;
    use arena_auth::routes;
    use arena_auth::state::AppState;
    use arena_auth::store::{MemoryStore, NonceStore};

    struct TestApp {
        router: Router,
        service: Arc<AuthService>,
        store: MemoryStore,
        clock: ManualClock,
    }

    fn test_app(policy: VerificationPolicy) -> TestApp {
        let store = MemoryStore::new();
        let clock = ManualClock::default();
        let service = Arc::new(AuthService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            AuthSettings {
                jwt_secret: "integration-test-secret".to_string(),
                token_ttl_seconds: 7 * 24 * 60 * 60,
                nonce_ttl_seconds: 300,
                verification_policy: policy,
            },
            Arc::new(clock.clone()),
        ));
        let state = AppState::new(service.clone(), RateLimiter::new(1000));

        TestApp {
            router: routes::app(state, None),
            service,
            store,
            clock,
        }
    }

    struct Wallet {
        key: SigningKey,
        address: String,
    }

    impl Wallet {
        fn new() -> Self {
            let key = SigningKey::random(&mut rand::rngs::OsRng);
            let x_only: [u8; 32] = key.verifying_key().to_bytes().into();
            let address = KaspaAddress::from_schnorr_key(Prefix::Mainnet, x_only).to_string();
            Self { key, address }
        }

        fn public_key_hex(&self) -> String {
            hex::encode(self.key.verifying_key().to_bytes())
        }

        fn sign_hex(&self, nonce: &str) -> String {
            hex::encode(sign_personal_message(&self.key, nonce.as_bytes()).unwrap())
        }

        fn verify_body(&self, nonce: &str) -> Value {
            json!({
                "nonce": nonce,
                "signature": self.sign_hex(nonce),
                "publicKey": self.public_key_hex(),
                "address": self.address,
            })
        }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn fetch_nonce(app: &TestApp, address: Option<&str>) -> String {
        let uri = match address {
            Some(a) => format!("/auth/nonce?address={}", a),
            None => "/auth/nonce".to_string(),
        };
        let (status, body) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["nonce"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_then_replay_rejected() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();

        let nonce = fetch_nonce(&app, None).await;
        assert_eq!(nonce.len(), 64);

        let request = wallet.verify_body(&nonce);
        let (status, body) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["address"], wallet.address.as_str());
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

        let (status, body) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired nonce");
        assert_eq!(body["code"], "NONCE_USED");
    }

    #[tokio::test]
    async fn test_bound_nonce_flow() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();

        let nonce = fetch_nonce(&app, Some(&wallet.address)).await;
        let record = app.store.get_nonce(&nonce).await.unwrap().unwrap();
        assert_eq!(record.address.as_deref(), Some(wallet.address.as_str()));

        let (status, _) = send(&app, post_json("/auth/verify", &wallet.verify_body(&nonce))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_nonce_for_malformed_address_rejected() {
        let app = test_app(VerificationPolicy::Strict);
        let (status, body) = send(&app, get("/auth/nonce?address=kaspa:xyz")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_ADDRESS");
    }

    #[tokio::test]
    async fn test_expired_nonce_rejected() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();
        let nonce = fetch_nonce(&app, None).await;
        let request = wallet.verify_body(&nonce);

        app.clock.advance(Duration::seconds(301));

        let (status, body) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid or expired nonce");
        assert_eq!(body["code"], "NONCE_EXPIRED");
    }

    #[tokio::test]
    async fn test_forged_signature_rejected() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();
        let nonce = fetch_nonce(&app, None).await;

        let mut request = wallet.verify_body(&nonce);
        request["signature"] = json!("11".repeat(64));

        let (status, body) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Signature verification failed");
        assert_eq!(body["code"], "SIGNATURE_MISMATCH");
    }

    #[tokio::test]
    async fn test_missing_field_and_bad_json() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();

        let mut request = wallet.verify_body("abc123");
        request.as_object_mut().unwrap().remove("publicKey");
        let (status, body) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_FIELD");
        assert_eq!(body["error"], "Missing required field: publicKey");

        let malformed = Request::builder()
            .method("POST")
            .uri("/auth/verify")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn test_me_requires_valid_unexpired_token() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();
        let nonce = fetch_nonce(&app, None).await;
        let (_, body) = send(&app, post_json("/auth/verify", &wallet.verify_body(&nonce))).await;
        let token = body["token"].as_str().unwrap().to_string();

        let me = |token: &str| {
            Request::builder()
                .uri("/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap()
        };

        let (status, body) = send(&app, me(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], wallet.address.as_str());

        let (status, body) = send(&app, get("/auth/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_TOKEN");

        let (status, body) = send(&app, me("not-a-token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");

        app.clock.advance(Duration::days(7) - Duration::seconds(1));
        let (status, _) = send(&app, me(&token)).await;
        assert_eq!(status, StatusCode::OK);

        app.clock.advance(Duration::seconds(1));
        let (status, body) = send(&app, me(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn test_permissive_policy_accepts_unverified_signature() {
        let app = test_app(VerificationPolicy::PermissiveForTesting);
        let wallet = Wallet::new();
        let nonce = fetch_nonce(&app, None).await;

        let mut request = wallet.verify_body(&nonce);
        request["signature"] = json!("ab".repeat(64));

        let (status, body) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, _) = send(&app, post_json("/auth/verify", &request)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_and_security_headers() {
        let app = test_app(VerificationPolicy::Strict);
        let response = app.router.clone().oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );

        let (_, body) = send(&app, get("/health")).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["verification_policy"], "strict");
    }

    fn limited_router(limiter: RateLimiter) -> Router {
        let store = MemoryStore::new();
        let service = Arc::new(AuthService::new(
            Arc::new(store.clone()),
            Arc::new(store),
            AuthSettings {
                jwt_secret: "integration-test-secret".to_string(),
                token_ttl_seconds: 60,
                nonce_ttl_seconds: 60,
                verification_policy: VerificationPolicy::Strict,
            },
            Arc::new(ManualClock::default()),
        ));
        routes::app(AppState::new(service, limiter), None)
    }

    fn nonce_request(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/auth/nonce")
            .extension(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_burst() {
        let router = limited_router(RateLimiter::new(1));

        // burst of 2
        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(nonce_request("198.51.100.9:40000", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = router
            .clone()
            .oneshot(nonce_request("198.51.100.9:40001", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_isolates_peers() {
        let router = limited_router(RateLimiter::new(1));

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(nonce_request("198.51.100.9:40000", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .clone()
            .oneshot(nonce_request("198.51.100.10:40000", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_ignores_spoofed_forwarded_for() {
        let router = limited_router(RateLimiter::new(1));

        for spoofed in ["203.0.113.1", "203.0.113.2"] {
            let response = router
                .clone()
                .oneshot(nonce_request("198.51.100.9:40000", Some(spoofed)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        // a fresh header value does not buy a fresh bucket
        let response = router
            .clone()
            .oneshot(nonce_request("198.51.100.9:40000", Some("203.0.113.3")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_rate_limit_trusts_proxy_when_configured() {
        let router = limited_router(RateLimiter::new(1).with_proxy_headers(true));

        for client in ["203.0.113.1", "203.0.113.1", "203.0.113.2"] {
            let response = router
                .clone()
                .oneshot(nonce_request("10.0.0.1:443", Some(client)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .clone()
            .oneshot(nonce_request("10.0.0.1:443", Some("203.0.113.1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verification_succeeds_exactly_once() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();

        for _ in 0..20 {
            let challenge = app.service.issue_challenge(None).await.unwrap();
            let mut handles = Vec::new();
            for _ in 0..8 {
                let service = app.service.clone();
                let request = VerifyRequest {
                    nonce: Some(challenge.nonce.clone()),
                    signature: Some(wallet.sign_hex(&challenge.nonce)),
                    public_key: Some(wallet.public_key_hex()),
                    address: Some(wallet.address.clone()),
                };
                handles.push(tokio::spawn(async move { service.verify(&request).await }));
            }

            let mut successes = 0;
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(_) => successes += 1,
                    Err(AuthError::NonceAlreadyUsed) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
            assert_eq!(successes, 1);
        }
    }

    #[tokio::test]
    async fn test_sweep_scenario() {
        let app = test_app(VerificationPolicy::Strict);
        let wallet = Wallet::new();

        let first = fetch_nonce(&app, None).await;
        let second = fetch_nonce(&app, None).await;
        app.clock.advance(Duration::seconds(200));
        let consumed = fetch_nonce(&app, None).await;
        let kept = fetch_nonce(&app, None).await;

        let (status, _) =
            send(&app, post_json("/auth/verify", &wallet.verify_body(&consumed))).await;
        assert_eq!(status, StatusCode::OK);

        // first two are now past their expiry
        app.clock.advance(Duration::seconds(101));

        assert_eq!(app.service.sweep().await.unwrap(), 3);
        for gone in [&first, &second, &consumed] {
            assert!(app.store.get_nonce(gone).await.unwrap().is_none());
        }
        let survivor = app.store.get_nonce(&kept).await.unwrap().unwrap();
        assert!(!survivor.used);

        let (status, _) = send(&app, post_json("/auth/verify", &wallet.verify_body(&kept))).await;
        assert_eq!(status, StatusCode::OK);
    }
}
