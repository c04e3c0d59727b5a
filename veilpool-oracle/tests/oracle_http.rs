//! Round trips against an in-process oracle: a real axum server behind a
//! real reqwest client, exercising the happy path and every failure
//! mapping.

use std::time::Duration;

use axum::extract::Json;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use veilpool_common::{Attestation, ProofBlob, PublicInputs};
use veilpool_oracle::{
    HttpProofService, MockProofSource, OracleError, ProofRequest, ProofSource,
    VerifierClientConfig, VerifierOracleClient,
};
use veilpool_test_fixtures::{fixtures, test_proof};

#[derive(Deserialize)]
struct VerifyBody {
    proof: String,
    public_inputs: String,
    verifying_key: String,
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A base URL nothing listens on.
async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn client(base_url: &str) -> VerifierOracleClient {
    VerifierOracleClient::new(
        VerifierClientConfig::builder()
            .base_url(base_url)
            .timeout_secs(2)
            .oracle_public_key(fixtures().oracle_public_key())
            .build(),
    )
    .unwrap()
}

/// The attestation as the oracle serializes it: byte fields hex-encoded.
fn attestation_json(attestation: &Attestation) -> Value {
    json!({
        "proof_hash": hex::encode(attestation.proof_hash),
        "public_inputs_hash": hex::encode(attestation.public_inputs_hash),
        "verifying_key_hash": hex::encode(attestation.verifying_key_hash),
        "is_valid": attestation.is_valid,
        "timestamp": attestation.timestamp,
        "signature": hex::encode(attestation.signature),
    })
}

/// Handler that verifies nothing but signs a correctly bound attestation
/// over whatever was submitted, like the real oracle would.
async fn verify_and_attest(Json(body): Json<VerifyBody>) -> Json<Value> {
    let proof = ProofBlob::from_bytes(&hex::decode(&body.proof).unwrap()).unwrap();
    let inputs = PublicInputs::new(hex::decode(&body.public_inputs).unwrap()).unwrap();
    let verifying_key = hex::decode(&body.verifying_key).unwrap();
    let attestation = fixtures().sign_attestation(&proof, &inputs, &verifying_key, true, 7);
    Json(json!({
        "is_valid": true,
        "attestation": attestation_json(&attestation),
    }))
}

#[tokio::test]
async fn health_check_reports_up_and_down() {
    let app = Router::new().route("/health", get(|| async { StatusCode::OK }));
    let base = spawn(app).await;
    assert!(client(&base).health_check().await);

    let dead = dead_endpoint().await;
    assert!(!client(&dead).health_check().await);

    // Bounded polling: an answering oracle is seen on the first probe, a
    // dead one exhausts its attempts.
    assert!(
        client(&base)
            .wait_until_healthy(3, Duration::from_millis(10))
            .await
    );
    assert!(
        !client(&dead)
            .wait_until_healthy(2, Duration::from_millis(10))
            .await
    );
}

#[tokio::test]
async fn verify_round_trip_returns_a_bound_attestation() {
    let app = Router::new().route("/verify", post(verify_and_attest));
    let base = spawn(app).await;

    let proof = test_proof("round-trip");
    let inputs = PublicInputs::new(vec![9u8; 128]).unwrap();
    let outcome = client(&base)
        .verify_proof(&proof, &inputs, fixtures().circuit_verifying_key())
        .await
        .unwrap();
    assert!(outcome.is_valid);
    assert_eq!(outcome.attestation.proof_hash, proof.digest());
    assert_eq!(outcome.attestation.public_inputs_hash, inputs.digest());
    assert_eq!(outcome.attestation.timestamp, 7);
}

#[tokio::test]
async fn negative_verdict_is_an_outcome_not_an_error() {
    async fn verify_invalid(Json(body): Json<VerifyBody>) -> Json<Value> {
        let proof = ProofBlob::from_bytes(&hex::decode(&body.proof).unwrap()).unwrap();
        let inputs = PublicInputs::new(hex::decode(&body.public_inputs).unwrap()).unwrap();
        let verifying_key = hex::decode(&body.verifying_key).unwrap();
        let attestation = fixtures().sign_attestation(&proof, &inputs, &verifying_key, false, 8);
        Json(json!({
            "is_valid": false,
            "attestation": attestation_json(&attestation),
        }))
    }

    let app = Router::new().route("/verify", post(verify_invalid));
    let base = spawn(app).await;

    let proof = test_proof("definitively-bad");
    let inputs = PublicInputs::new(vec![1u8; 32]).unwrap();
    let outcome = client(&base)
        .verify_proof(&proof, &inputs, fixtures().circuit_verifying_key())
        .await
        .unwrap();
    assert!(!outcome.is_valid);
    assert!(!outcome.attestation.is_valid);
}

#[tokio::test]
async fn refused_connection_maps_to_unavailable() {
    let dead = dead_endpoint().await;
    let err = client(&dead)
        .verify_proof(
            &test_proof("nobody-home"),
            &PublicInputs::new(vec![0u8; 32]).unwrap(),
            fixtures().circuit_verifying_key(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Unavailable(_)));
}

#[tokio::test]
async fn non_success_status_maps_to_http() {
    let app = Router::new().route(
        "/verify",
        post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let base = spawn(app).await;
    let err = client(&base)
        .verify_proof(
            &test_proof("overloaded"),
            &PublicInputs::new(vec![0u8; 32]).unwrap(),
            fixtures().circuit_verifying_key(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::Http { status: 503 }));
}

#[tokio::test]
async fn undecodable_attestation_maps_to_invalid_response() {
    // proof_hash is not valid hex; the rest of the object is shaped fine.
    let app = Router::new().route(
        "/verify",
        post(|| async {
            Json(json!({
                "is_valid": true,
                "attestation": {
                    "proof_hash": "zz",
                    "public_inputs_hash": hex::encode([0u8; 32]),
                    "verifying_key_hash": hex::encode([0u8; 32]),
                    "is_valid": true,
                    "timestamp": 0,
                    "signature": hex::encode([0u8; 64]),
                }
            }))
        }),
    );
    let base = spawn(app).await;
    let err = client(&base)
        .verify_proof(
            &test_proof("garbage"),
            &PublicInputs::new(vec![0u8; 32]).unwrap(),
            fixtures().circuit_verifying_key(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::InvalidResponse(_)));
}

#[tokio::test]
async fn attestation_over_other_material_is_rejected() {
    // Signs over a fixed foreign proof instead of the submitted one.
    async fn attest_something_else(Json(body): Json<VerifyBody>) -> Json<Value> {
        let inputs =
            PublicInputs::new(hex::decode(&body.public_inputs).unwrap()).unwrap();
        let verifying_key = hex::decode(&body.verifying_key).unwrap();
        let attestation = fixtures().sign_attestation(
            &test_proof("a-different-proof"),
            &inputs,
            &verifying_key,
            true,
            9,
        );
        Json(json!({
            "is_valid": true,
            "attestation": attestation_json(&attestation),
        }))
    }

    let app = Router::new().route("/verify", post(attest_something_else));
    let base = spawn(app).await;
    let err = client(&base)
        .verify_proof(
            &test_proof("the-submitted-proof"),
            &PublicInputs::new(vec![3u8; 32]).unwrap(),
            fixtures().circuit_verifying_key(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::BindingMismatch));
}

#[tokio::test]
async fn attestation_from_the_wrong_signer_is_rejected() {
    // Correctly bound, but signed by some other key.
    async fn attest_with_rogue_key(Json(body): Json<VerifyBody>) -> Json<Value> {
        let proof = ProofBlob::from_bytes(&hex::decode(&body.proof).unwrap()).unwrap();
        let inputs = PublicInputs::new(hex::decode(&body.public_inputs).unwrap()).unwrap();
        let verifying_key = hex::decode(&body.verifying_key).unwrap();
        let mut attestation =
            fixtures().sign_attestation(&proof, &inputs, &verifying_key, true, 10);
        let rogue = SigningKey::from_bytes(&[0x13; 32]);
        attestation.signature = rogue.sign(&attestation.signed_bytes()).to_bytes();
        Json(json!({
            "is_valid": true,
            "attestation": attestation_json(&attestation),
        }))
    }

    let app = Router::new().route("/verify", post(attest_with_rogue_key));
    let base = spawn(app).await;
    let err = client(&base)
        .verify_proof(
            &test_proof("rogue-signer"),
            &PublicInputs::new(vec![4u8; 32]).unwrap(),
            fixtures().circuit_verifying_key(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OracleError::BadSignature));
}

#[tokio::test]
async fn http_proof_service_round_trip_matches_the_mock() {
    #[derive(Deserialize)]
    struct GenerateBody {
        public_inputs: String,
    }

    async fn generate(
        axum::extract::Path(circuit): axum::extract::Path<String>,
        Json(body): Json<GenerateBody>,
    ) -> Json<Value> {
        assert_eq!(circuit, "transfer");
        let inputs = PublicInputs::new(hex::decode(&body.public_inputs).unwrap()).unwrap();
        let proof = veilpool_oracle::mock_proof(veilpool_common::OperationKind::Transfer, &inputs);
        Json(json!({ "proof": hex::encode(proof.as_bytes()) }))
    }

    let app = Router::new().route("/generate-proof/:circuit", post(generate));
    let base = spawn(app).await;

    let request = ProofRequest {
        kind: veilpool_common::OperationKind::Transfer,
        public_inputs: PublicInputs::new(vec![6u8; 128]).unwrap(),
        witness: json!({ "spend_key": "deadbeef" }),
    };
    let service = HttpProofService::new(&base, 2).unwrap();
    let from_http = service.generate(&request).await.unwrap();
    let from_mock = MockProofSource::new().generate(&request).await.unwrap();
    assert_eq!(from_http, from_mock);
    assert!(!service.health().await, "no /health route on this app");
}
