//! Contract tests for the relay and whitelist clients against wiremock.
//!
//! | Service | Method | Path | Test |
//! |---------|--------|------|------|
//! | relay | POST | `/v1/transfers` | `transfer_*` |
//! | relay | GET | `/v1/transfers/{tx_hash}` | `transfer_polls_*` |
//! | whitelist | GET | `/whitelist` | `whitelist_*` |

use std::time::Duration;

use circles_chain::{
    ChainError, ConfigError, HttpSettlementClient, HttpWhitelistSource, SettlementConfig,
    TransferIntent,
};
use circles_core::{TokenAmount, WalletAddress};
use circles_ledger::{SettlementClient, TransferError, WhitelistSource};
use ed25519_dalek::Verifier;
use sha2::{Digest, Sha256};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
const PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
const RECIPIENT: &str = "0x00000000000000000000000000000000000000aa";

fn client(server: &MockServer) -> HttpSettlementClient {
    let config = SettlementConfig::local(server.uri().parse().unwrap(), SEED);
    HttpSettlementClient::new(config).unwrap()
}

fn recipient() -> WalletAddress {
    WalletAddress::parse(RECIPIENT).unwrap()
}

fn amount(s: &str) -> TokenAmount {
    TokenAmount::parse(s).unwrap()
}

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

async fn mount_submit(server: &MockServer, body: serde_json::Value, status: u16) {
    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

// ── POST /v1/transfers ───────────────────────────────────────────────

#[tokio::test]
async fn transfer_confirmed_immediately_returns_hash() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        serde_json::json!({"tx_hash": "0xaa01", "status": "confirmed"}),
        200,
    )
    .await;

    let receipt = client(&server).transfer(&recipient(), amount("1.5")).await.unwrap();
    assert_eq!(receipt.transaction_ref, "0xaa01");
}

#[tokio::test]
async fn transfer_sends_signed_intent() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        serde_json::json!({"tx_hash": "0xaa02", "status": "confirmed"}),
        200,
    )
    .await;

    client(&server).transfer(&recipient(), amount("0.25")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = requests[0].body_json().unwrap();
    let intent = &body["intent"];
    assert_eq!(intent["from"], PUBLIC);
    assert_eq!(intent["to"], RECIPIENT);
    assert_eq!(intent["amount"], "0.25");
    assert!(intent["nonce"].is_u64());

    let parsed: TransferIntent = serde_json::from_value(intent.clone()).unwrap();
    let message = serde_json::to_vec(&parsed).unwrap();
    let sig_bytes: [u8; 64] = hex(body["signature"].as_str().unwrap()).try_into().unwrap();
    let key_bytes: [u8; 32] = hex(PUBLIC).try_into().unwrap();
    let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes).unwrap();
    let digest = Sha256::digest(&message);
    assert!(key
        .verify(&digest, &ed25519_dalek::Signature::from_bytes(&sig_bytes))
        .is_ok());
}

#[tokio::test]
async fn transfer_nonces_increase() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        serde_json::json!({"tx_hash": "0xaa03", "status": "confirmed"}),
        200,
    )
    .await;

    let c = client(&server);
    c.transfer(&recipient(), amount("1")).await.unwrap();
    c.transfer(&recipient(), amount("1")).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let nonce = |i: usize| {
        requests[i].body_json::<serde_json::Value>().unwrap()["intent"]["nonce"]
            .as_u64()
            .unwrap()
    };
    assert_eq!(nonce(1), nonce(0) + 1);
}

#[tokio::test]
async fn transfer_polls_pending_until_confirmed() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        serde_json::json!({"tx_hash": "0xbb01", "status": "pending"}),
        202,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/transfers/0xbb01"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"tx_hash": "0xbb01", "status": "pending"})),
        )
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/transfers/0xbb01"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"tx_hash": "0xbb01", "status": "confirmed"})),
        )
        .mount(&server)
        .await;

    let receipt = client(&server).transfer(&recipient(), amount("2")).await.unwrap();
    assert_eq!(receipt.transaction_ref, "0xbb01");
    let polls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn transfer_polls_give_up_after_limit() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        serde_json::json!({"tx_hash": "0xbb02", "status": "pending"}),
        202,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/v1/transfers/0xbb02"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"tx_hash": "0xbb02", "status": "pending"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).transfer(&recipient(), amount("2")).await.unwrap_err();
    assert!(matches!(err, TransferError::Failed(ref m) if m.contains("still pending")));
}

#[tokio::test]
async fn transfer_failed_on_chain_is_rejection_with_reason() {
    let server = MockServer::start().await;
    mount_submit(
        &server,
        serde_json::json!({"tx_hash": "0xcc01", "status": "failed", "reason": "out of gas"}),
        200,
    )
    .await;

    let err = client(&server).transfer(&recipient(), amount("1")).await.unwrap_err();
    assert!(matches!(err, TransferError::Rejected(ref m) if m.contains("out of gas")));
}

#[tokio::test]
async fn transfer_client_error_is_rejection() {
    let server = MockServer::start().await;
    mount_submit(&server, serde_json::json!({"error": "insufficient balance"}), 422).await;

    let err = client(&server).transfer(&recipient(), amount("1")).await.unwrap_err();
    assert!(matches!(err, TransferError::Rejected(ref m) if m.contains("422")));
}

#[tokio::test]
async fn transfer_server_error_is_failure_and_not_retried() {
    let server = MockServer::start().await;
    mount_submit(&server, serde_json::json!({"error": "boom"}), 500).await;

    let err = client(&server).transfer(&recipient(), amount("1")).await.unwrap_err();
    assert!(matches!(err, TransferError::Failed(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[test]
fn client_requires_valid_signing_key() {
    let url = "http://127.0.0.1:8545".parse().unwrap();
    let err = HttpSettlementClient::new(SettlementConfig::local(url, "not-hex")).unwrap_err();
    assert!(matches!(err, ChainError::Config(ConfigError::InvalidSigningKey(_))));
}

// ── GET /whitelist ───────────────────────────────────────────────────

fn whitelist(server: &MockServer) -> HttpWhitelistSource {
    let url = format!("{}/whitelist", server.uri()).parse().unwrap();
    HttpWhitelistSource::new(url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn whitelist_accepts_plain_array_and_skips_bad_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            RECIPIENT,
            "0x1234",
            42,
            "cosmos1qypqxpq9qcrsszg2pvxq6rs0zqg3yyc5lzv7xu"
        ])))
        .mount(&server)
        .await;

    let addresses = whitelist(&server).fetch().await.unwrap();
    assert_eq!(addresses.len(), 2);
    assert_eq!(addresses[0], recipient());
}

#[tokio::test]
async fn whitelist_accepts_wrapped_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"addresses": [RECIPIENT]})),
        )
        .mount(&server)
        .await;

    assert_eq!(whitelist(&server).fetch().await.unwrap(), vec![recipient()]);
}

#[tokio::test]
async fn whitelist_retries_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([RECIPIENT])))
        .mount(&server)
        .await;

    assert_eq!(whitelist(&server).fetch().await.unwrap().len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn whitelist_server_error_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whitelist"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .mount(&server)
        .await;

    let err = whitelist(&server).fetch().await.unwrap_err();
    assert!(err.0.contains("database down"));
}
