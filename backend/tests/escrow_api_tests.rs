//! End-to-end tests of the escrow API over the router

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use base64::{engine::general_purpose::STANDARD, Engine};
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use homeward_ledger::{
        tokens, AccountBook, Address, MarketplaceLedger, PropertyRegistry, SettlementPolicy,
    };
    use homeward_server::{
        app,
        auth::{encode_stellar_public_key, AuthService},
        config::{Config, Environment},
        escrow::EscrowService,
        state::AppState,
        websocket::WsState,
    };

    struct Wallet {
        key: SigningKey,
        address: String,
    }

    impl Wallet {
        fn from_seed(seed: u8) -> Self {
            let key = SigningKey::from_bytes(&[seed; 32]);
            let address = encode_stellar_public_key(&key.verifying_key().to_bytes());
            Self { key, address }
        }
    }

    struct TestApp {
        router: Router,
        seller: Wallet,
        inspector: Wallet,
        lender: Wallet,
        buyer: Wallet,
        stranger: Wallet,
    }

    fn test_config(seller: &Wallet, inspector: &Wallet, lender: &Wallet) -> Config {
        Config {
            environment: Environment::Development,
            port: 0,
            rate_limit_rps: 1000,
            cors_allowed_origins: None,
            log_level: "debug".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_access_token_ttl_seconds: 900,
            auth_nonce_ttl_seconds: 300,
            custody_address: "HOMEWARD-ESCROW".to_string(),
            seller_address: seller.address.clone(),
            inspector_address: inspector.address.clone(),
            lender_address: lender.address.clone(),
            settlement: SettlementPolicy::default(),
            seed_demo: false,
            demo_buyer_address: None,
            demo_initial_balance: 100,
        }
    }

    /// One property minted to the seller, buyer and lender funded with 50 tokens
    fn setup() -> TestApp {
        let seller = Wallet::from_seed(1);
        let inspector = Wallet::from_seed(2);
        let lender = Wallet::from_seed(3);
        let buyer = Wallet::from_seed(4);
        let stranger = Wallet::from_seed(5);

        let config = test_config(&seller, &inspector, &lender);
        let mut ledger = MarketplaceLedger::new(
            config.escrow_config().unwrap(),
            PropertyRegistry::new(),
            AccountBook::new(),
        );
        ledger
            .registry_mut()
            .mint(&Address::new(seller.address.as_str()), "ipfs://home/1.json")
            .unwrap();
        for wallet in [&buyer, &lender] {
            ledger
                .treasury_mut()
                .credit(&Address::new(wallet.address.as_str()), tokens(50))
                .unwrap();
        }

        let ws_state = WsState::new();
        let escrow_service = Arc::new(EscrowService::new(ledger, ws_state.clone()));
        let auth_service = Arc::new(AuthService::new(
            config.jwt_secret.clone(),
            config.auth_nonce_ttl_seconds,
            config.jwt_access_token_ttl_seconds,
        ));
        let state = AppState::new(escrow_service, auth_service, ws_state, Arc::new(config));

        TestApp {
            router: app(state),
            seller,
            inspector,
            lender,
            buyer,
            stranger,
        }
    }

    async fn send(
        router: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn login(router: &Router, wallet: &Wallet) -> String {
        let (status, challenge) = send(
            router,
            Method::POST,
            "/auth/challenge",
            None,
            Some(json!({ "wallet_address": wallet.address })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let message = challenge["message"].as_str().unwrap();
        let signature = STANDARD.encode(wallet.key.sign(message.as_bytes()).to_bytes());

        let (status, tokens) = send(
            router,
            Method::POST,
            "/auth/verify",
            None,
            Some(json!({
                "wallet_address": wallet.address,
                "nonce": challenge["nonce"],
                "signature": signature,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        tokens["access_token"].as_str().unwrap().to_string()
    }

    async fn list_property(test: &TestApp, seller_token: &str) -> (StatusCode, Value) {
        let (status, _) = send(
            &test.router,
            Method::POST,
            "/api/properties/1/approve",
            Some(seller_token),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        send(
            &test.router,
            Method::POST,
            "/api/escrow/listings",
            Some(seller_token),
            Some(json!({
                "property_id": 1,
                "buyer": test.buyer.address,
                "purchase_price": tokens(10).to_string(),
                "escrow_amount": tokens(5).to_string(),
            })),
        )
        .await
    }

    #[tokio::test]
    async fn test_auth_round_trip() {
        let test = setup();
        let token = login(&test.router, &test.seller).await;

        let (status, me) = send(&test.router, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["wallet_address"], test.seller.address.as_str());
        assert_eq!(me["roles"], json!(["seller"]));

        let (status, _) = send(&test.router, Method::POST, "/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&test.router, Method::GET, "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "SESSION_REVOKED");
    }

    #[tokio::test]
    async fn test_signature_from_other_wallet_rejected() {
        let test = setup();
        let (_, challenge) = send(
            &test.router,
            Method::POST,
            "/auth/challenge",
            None,
            Some(json!({ "wallet_address": test.seller.address })),
        )
        .await;

        let message = challenge["message"].as_str().unwrap();
        let forged = STANDARD.encode(test.stranger.key.sign(message.as_bytes()).to_bytes());
        let (status, _) = send(
            &test.router,
            Method::POST,
            "/auth/verify",
            None,
            Some(json!({
                "wallet_address": test.seller.address,
                "nonce": challenge["nonce"],
                "signature": forged,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mutations_require_authentication() {
        let test = setup();
        let (status, body) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/approve",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "MISSING_TOKEN");
    }

    #[tokio::test]
    async fn test_role_gated_endpoints_reject_other_wallets() {
        let test = setup();
        let buyer_token = login(&test.router, &test.buyer).await;
        let stranger_token = login(&test.router, &test.stranger).await;
        let seller_token = login(&test.router, &test.seller).await;

        // Only the seller may list
        let (status, body) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings",
            Some(&buyer_token),
            Some(json!({
                "property_id": 1,
                "buyer": test.buyer.address,
                "purchase_price": tokens(10).to_string(),
                "escrow_amount": tokens(5).to_string(),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED_CALLER");

        let (status, _) = list_property(&test, &seller_token).await;
        assert_eq!(status, StatusCode::CREATED);

        // Only the designated buyer may deposit
        let (status, _) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/deposit",
            Some(&stranger_token),
            Some(json!({ "amount": tokens(5).to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Only the inspector records inspections
        let (status, _) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/inspection",
            Some(&seller_token),
            Some(json!({ "passed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, balance) = send(&test.router, Method::GET, "/api/escrow/balance", None, None).await;
        assert_eq!(balance["data"]["balance"], "0");
    }

    #[tokio::test]
    async fn test_full_sale_over_http() {
        let test = setup();
        let seller = login(&test.router, &test.seller).await;
        let buyer = login(&test.router, &test.buyer).await;
        let inspector = login(&test.router, &test.inspector).await;
        let lender = login(&test.router, &test.lender).await;

        let (status, listing) = list_property(&test, &seller).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(listing["data"]["status"], "listed");

        let (status, _) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/deposit",
            Some(&buyer),
            Some(json!({ "amount": tokens(5).to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/inspection",
            Some(&inspector),
            Some(json!({ "passed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Finalizing before anyone approved names every missing party
        let (status, body) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/finalize",
            Some(&seller),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "MISSING_APPROVALS");
        assert_eq!(body["error"]["details"], "seller,buyer,inspector");

        for token in [&seller, &buyer, &inspector] {
            let (status, _) = send(
                &test.router,
                Method::POST,
                "/api/escrow/listings/1/approve",
                Some(token),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let approval_uri = format!("/api/escrow/listings/1/approvals/{}", test.buyer.address);
        let (_, approval) = send(&test.router, Method::GET, &approval_uri, None, None).await;
        assert_eq!(approval["data"]["approved"], true);

        let (status, body) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/finalize",
            Some(&seller),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_ESCROW_BALANCE");

        let (status, funded) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/fund",
            Some(&lender),
            Some(json!({ "amount": tokens(5).to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(funded["data"]["escrow_balance"], tokens(10).to_string());

        let (_, balance) = send(&test.router, Method::GET, "/api/escrow/balance", None, None).await;
        assert_eq!(balance["data"]["balance"], tokens(10).to_string());

        let (status, closed) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/finalize",
            Some(&seller),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["data"]["status"], "finalized");

        let (_, balance) = send(&test.router, Method::GET, "/api/escrow/balance", None, None).await;
        assert_eq!(balance["data"]["balance"], "0");

        let (_, property) = send(&test.router, Method::GET, "/api/properties/1", None, None).await;
        assert_eq!(property["data"]["owner"], test.buyer.address.as_str());

        let seller_balance_uri = format!("/api/accounts/{}/balance", test.seller.address);
        let (_, seller_balance) =
            send(&test.router, Method::GET, &seller_balance_uri, None, None).await;
        assert_eq!(seller_balance["data"]["balance"], tokens(10).to_string());

        // Closed sales accept nothing further
        let (status, body) = send(
            &test.router,
            Method::POST,
            "/api/escrow/listings/1/approve",
            Some(&buyer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "NOT_LISTED");
    }

    #[tokio::test]
    async fn test_unknown_listing_is_not_found() {
        let test = setup();
        let (status, body) =
            send(&test.router, Method::GET, "/api/escrow/listings/42", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_faucet_credits_caller() {
        let test = setup();
        let token = login(&test.router, &test.stranger).await;

        let (status, body) = send(
            &test.router,
            Method::POST,
            "/api/dev/faucet",
            Some(&token),
            Some(json!({ "amount": tokens(3).to_string() })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["address"], test.stranger.address.as_str());
        assert_eq!(body["data"]["balance"], tokens(3).to_string());
    }

    #[tokio::test]
    async fn test_health_and_security_headers() {
        let test = setup();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = test.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    }
}
