use std::sync::Arc;
use std::time::Duration;

use giftbridge::adapters::DestinationSink;
use giftbridge::auth::{OAuthRefresher, TokenCache};
use giftbridge::crm::models::GiftAmount;
use giftbridge::crm::{CrmClient, Gift, GiftType};
use giftbridge::storage::MemoryCredentialStore;
use giftbridge::AppError;
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    credentials: Arc<MemoryCredentialStore>,
    client: CrmClient,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let credentials = Arc::new(MemoryCredentialStore::new("rt-1"));
    let refresher = Arc::new(
        OAuthRefresher::new(
            format!("{}/token", server.uri()),
            "client-id",
            "client-secret",
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let tokens = Arc::new(TokenCache::new(credentials.clone(), refresher));
    let client = CrmClient::new(server.uri(), "sub-key", tokens, Duration::from_secs(5)).unwrap();

    Harness {
        server,
        credentials,
        client,
    }
}

fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "expires_in": 3600,
        "refresh_token": refresh,
        "token_type": "bearer"
    })
}

#[tokio::test]
async fn test_requests_carry_bearer_and_subscription_key() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .and(body_string_contains("client_id=client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "rt-2")))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/gift/v1/gifts"))
        .and(header("authorization", "Bearer at-1"))
        .and(header("Bb-Api-Subscription-Key", "sub-key"))
        .and(body_partial_json(json!({
            "constituent_id": "c-1",
            "lookup_id": "d1",
            "type": "Donation"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-100"})))
        .expect(2)
        .mount(&h.server)
        .await;

    let gift = Gift {
        amount: GiftAmount { value: dec!(25) },
        constituent_id: "c-1".into(),
        date: "2024-03-01".into(),
        lookup_id: "d1".into(),
        gift_type: GiftType::Donation,
        ..Default::default()
    };

    assert_eq!(h.client.create_gift(&gift).await.unwrap(), "g-100");
    assert_eq!(h.client.create_gift(&gift).await.unwrap(), "g-100");
    assert_eq!(h.credentials.saved(), vec!["rt-2"]);
}

#[tokio::test]
async fn test_list_gifts_follows_next_link() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "rt-1")))
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gift/v1/gifts"))
        .and(query_param("constituent_id", "c-1"))
        .and(query_param("gift_type", "RecurringGift"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "g-1", "constituent_id": "c-1", "type": "RecurringGift", "lookup_id": "s1", "amount": {"value": 10.0}}],
            "next_link": format!("{}/gift/v1/gifts?page=2", h.server.uri())
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gift/v1/gifts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "g-2", "constituent_id": "c-1", "type": "RecurringGift", "lookup_id": "s2", "amount": {"value": 10.0}}]
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let gifts = h
        .client
        .list_gifts_by_constituent("c-1", Some(&GiftType::RecurringGift))
        .await
        .unwrap();

    let ids: Vec<_> = gifts.iter().map(|g| g.id.as_str()).collect();
    assert_eq!(ids, vec!["g-1", "g-2"]);
    assert!(h.credentials.saved().is_empty());
}

#[tokio::test]
async fn test_search_and_create_constituent() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "rt-1")))
        .mount(&h.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/constituent/v1/constituents/search"))
        .and(query_param("search_text", "sam@example.org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "value": [{"id": "c-9", "first": "Sam", "last": "Lee", "type": "Individual"}]
        })))
        .mount(&h.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/constituent/v1/constituents"))
        .and(body_partial_json(json!({"first": "Ann", "type": "Individual"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-10"})))
        .mount(&h.server)
        .await;

    let found = h.client.find_constituents_by_email("sam@example.org").await.unwrap();
    assert_eq!(found[0].id, "c-9");
    assert_eq!(found[0].first_name, "Sam");

    let created = h
        .client
        .create_constituent(&giftbridge::crm::Constituent {
            first_name: "Ann".into(),
            last_name: "Ng".into(),
            constituent_type: "Individual".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created, "c-10");
}

#[tokio::test]
async fn test_unauthorized_response_forces_refresh() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", "rt-1")))
        .expect(2)
        .mount(&h.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/gift/v1/gifts/g-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .up_to_n_times(1)
        .mount(&h.server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/gift/v1/gifts/g-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let err = h.client.update_gift("g-1", &Gift::default()).await.unwrap_err();
    assert!(matches!(err, AppError::UnexpectedStatus { status: 401, .. }));

    h.client.update_gift("g-1", &Gift::default()).await.unwrap();
}

#[tokio::test]
async fn test_refresh_failure_is_auth_error() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token expired"
        })))
        .mount(&h.server)
        .await;

    let err = h
        .client
        .find_constituents_by_email("sam@example.org")
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("invalid_grant: refresh token expired"));
}
