//! Common test utilities for z-unlock integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;

use z_unlock_core::{Credits, PurchaseId, PurchaseRecord, PurchaseStatus, UserId};
use z_unlock_service::crypto::hmac_sha256_hex;
use z_unlock_service::{
    create_router, AppState, CheckoutError, CheckoutProvider, CheckoutRequest, CheckoutSession,
    ServiceConfig, StoreBackend,
};
use z_unlock_store::{MemoryStore, Store};

/// Admin key accepted by the harness.
pub const ADMIN_API_KEY: &str = "test-admin-key";

/// Stripe webhook secret configured in the harness.
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Checkout provider that records requests instead of calling Stripe.
#[derive(Default)]
pub struct FakeCheckout {
    requests: Mutex<Vec<CheckoutRequest>>,
    counter: AtomicUsize,
    failing: AtomicBool,
    paid_before_return: Mutex<Option<Arc<dyn Store>>>,
}

impl FakeCheckout {
    /// Make every following checkout fail.
    pub fn fail_next(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Complete each purchase in `store` before the session is returned,
    /// as a webhook that beats the checkout response would.
    pub fn pay_before_return(&self, store: Arc<dyn Store>) {
        *self.paid_before_return.lock().unwrap() = Some(store);
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckoutProvider for FakeCheckout {
    async fn initiate_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, CheckoutError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(CheckoutError::Provider("card network down".into()));
        }

        let paying_store = self.paid_before_return.lock().unwrap().clone();
        if let Some(store) = paying_store {
            store
                .transition_purchase(&request.purchase_id, PurchaseStatus::Completed)
                .unwrap();
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("cs_test_{n}");
        Ok(CheckoutSession {
            url: format!("https://checkout.test/{session_id}"),
            session_id,
        })
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the store for seeding and assertions.
    pub store: Arc<dyn Store>,
    /// The checkout provider behind `/v1/purchases/checkout`.
    pub checkout: Arc<FakeCheckout>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with a fresh in-memory store.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Harness with no checkout provider configured.
    pub fn without_checkout() -> Self {
        Self::build(false)
    }

    fn build(with_checkout: bool) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let checkout = Arc::new(FakeCheckout::default());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: String::new(),
            store_backend: StoreBackend::Memory,
            auth_base_url: "http://localhost".into(),
            auth_audience: "z-unlock".into(),
            admin_api_key: Some(ADMIN_API_KEY.into()),
            stripe_api_key: None,
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            frontend_url: "http://localhost:3000".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 64 * 1024,
            request_timeout_seconds: 30,
        };

        let provider = with_checkout.then(|| Arc::clone(&checkout) as Arc<dyn CheckoutProvider>);
        let state = AppState::with_checkout(Arc::clone(&store), config, provider);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            checkout,
            test_user_id: UserId::generate(),
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        Self::auth_header_for(&self.test_user_id)
    }

    /// Authorization header for an arbitrary user.
    pub fn auth_header_for(user_id: &UserId) -> String {
        format!("Bearer test-token:{user_id}")
    }

    /// Store a purchase record directly.
    pub fn seed(&self, record: PurchaseRecord) -> PurchaseRecord {
        self.store.put_purchase(&record).expect("Failed to seed purchase");
        record
    }

    /// Seed a completed `pack_5` record for the test user.
    pub fn seed_pack_5(&self, credits: u32) -> PurchaseRecord {
        self.seed(PurchaseRecord::pack_5_with(
            self.test_user_id,
            Credits::Finite(credits),
        ))
    }

    /// Current record as stored.
    pub fn purchase(&self, id: &PurchaseId) -> PurchaseRecord {
        self.store
            .get_purchase(id)
            .expect("Failed to read purchase")
            .expect("Purchase missing")
    }

    /// Current balance of a purchase.
    pub fn balance(&self, id: &PurchaseId) -> Option<Credits> {
        self.purchase(id).credits_remaining
    }

    /// `Stripe-Signature` header for a payload, signed now.
    pub fn sign_webhook(payload: &str) -> String {
        let ts = chrono::Utc::now().timestamp();
        let sig = hmac_sha256_hex(WEBHOOK_SECRET, &format!("{ts}.{payload}")).unwrap();
        format!("t={ts},v1={sig}")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
