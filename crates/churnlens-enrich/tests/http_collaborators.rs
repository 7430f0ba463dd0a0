//! Integration tests for the HTTP classifier and keyword clients.
//!
//! Uses `wiremock` so no real network traffic is made. Back-off is set to
//! zero so retry tests run instantly.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use churnlens_enrich::{
    Classifier, CollaboratorClient, EnrichError, HttpClassifier, HttpKeywordExtractor,
    KeywordExtractor,
};

fn client(server: &MockServer, api_key: Option<&str>, max_retries: u32) -> CollaboratorClient {
    CollaboratorClient::new(&server.uri(), api_key.map(str::to_owned), 5, max_retries)
        .expect("failed to build test CollaboratorClient")
        .with_backoff_base_ms(0)
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

#[tokio::test]
async fn classifier_posts_texts_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .and(header("authorization", "Bearer secret-key"))
        .and(body_json(json!({"texts": ["deleting this app", "fine"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"labels": [2, 0]})))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = HttpClassifier::new(client(&server, Some("secret-key"), 0));
    let labels = classifier
        .classify(&texts(&["deleting this app", "fine"]))
        .await
        .unwrap();

    assert_eq!(labels, vec![2, 0]);
}

#[tokio::test]
async fn classifier_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"labels": [1]})))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = HttpClassifier::new(client(&server, None, 2));
    let labels = classifier.classify(&texts(&["too slow"])).await.unwrap();

    assert_eq!(labels, vec![1]);
}

#[tokio::test]
async fn classifier_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let classifier = HttpClassifier::new(client(&server, None, 1));
    let result = classifier.classify(&texts(&["x"])).await;

    assert!(matches!(
        result,
        Err(EnrichError::UnexpectedStatus { status: 500, .. })
    ));
}

#[tokio::test]
async fn classifier_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let classifier = HttpClassifier::new(client(&server, None, 3));
    let result = classifier.classify(&texts(&["x"])).await;

    assert!(matches!(
        result,
        Err(EnrichError::UnexpectedStatus { status: 401, .. })
    ));
}

#[tokio::test]
async fn malformed_body_is_deserialize_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keywords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"labels": [0]})))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = HttpKeywordExtractor::new(client(&server, None, 3));
    let result = extractor.extract(&texts(&["x"])).await;

    assert!(matches!(result, Err(EnrichError::Deserialize { .. })));
}

#[tokio::test]
async fn keyword_extractor_returns_lists_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keywords"))
        .and(body_json(json!({"texts": ["late rider", "refund denied"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keywords": [["delivery", "rider"], ["refund"]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = HttpKeywordExtractor::new(client(&server, None, 0));
    let lists = extractor
        .extract(&texts(&["late rider", "refund denied"]))
        .await
        .unwrap();

    assert_eq!(
        lists,
        vec![
            vec!["delivery".to_owned(), "rider".to_owned()],
            vec!["refund".to_owned()]
        ]
    );
}

#[tokio::test]
async fn base_url_trailing_slash_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/keywords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"keywords": [[]]})))
        .expect(1)
        .mount(&server)
        .await;

    let collaborator = CollaboratorClient::new(&format!("{}/", server.uri()), None, 5, 0).unwrap();
    let extractor = HttpKeywordExtractor::new(collaborator);

    assert_eq!(extractor.extract(&texts(&["x"])).await.unwrap(), vec![Vec::<String>::new()]);
}
