use cloudfiles_sync::{
    models::ClientConfig,
    storage::{Container, StorageClient, StorageService},
    Error,
};
use wiremock::matchers::{headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_config(cdn_endpoint: &str) -> ClientConfig {
    ClientConfig {
        provider: "rackspace".to_string(),
        username: Some("acct".to_string()),
        password: None,
        api_key: Some("secret".to_string()),
        endpoint: Some("http://localhost:1".to_string()),
        region: None,
        cdn_endpoint: Some(cdn_endpoint.to_string()),
        cdn_enabled: true,
    }
}

fn container(name: &str) -> Container {
    Container {
        name: name.to_string(),
        cdn_enabled: true,
    }
}

#[tokio::test]
async fn test_enable_cdn_puts_container_resource() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/containers/assets"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = StorageClient::new(&client_config(&server.uri()))
        .await
        .unwrap();
    let enabled = client
        .enable_cdn(&Container {
            name: "assets".to_string(),
            cdn_enabled: false,
        })
        .await
        .unwrap();

    assert!(enabled.cdn_enabled);
}

#[tokio::test]
async fn test_enable_cdn_failure_is_provision_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/containers/assets"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = StorageClient::new(&client_config(&server.uri()))
        .await
        .unwrap();
    let err = client
        .enable_cdn(&container("assets"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Provision(_)));
}

#[tokio::test]
async fn test_purge_deletes_object_with_notify_emails() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/containers/assets/objects/static/app.js"))
        .and(headers(
            "X-Purge-Email",
            vec!["a@example.com", "b@example.com"],
        ))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = StorageClient::new(&client_config(&server.uri()))
        .await
        .unwrap();
    client
        .purge_file_from_cdn(
            &container("assets"),
            "static/app.js",
            &["a@example.com".to_string(), "b@example.com".to_string()],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_purge_encodes_reserved_characters_in_key() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/containers/assets/objects/static/cache%20busted.js%3Fv=1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = StorageClient::new(&client_config(&server.uri()))
        .await
        .unwrap();
    client
        .purge_file_from_cdn(&container("assets"), "static/cache busted.js?v=1", &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_purge_omits_email_header_when_no_recipients() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/containers/assets/objects/app.js"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = StorageClient::new(&client_config(&server.uri()))
        .await
        .unwrap();
    client
        .purge_file_from_cdn(&container("assets"), "app.js", &[])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(!requests[0].headers.contains_key("X-Purge-Email"));
}

#[tokio::test]
async fn test_purge_backend_failure_is_purge_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/containers/assets/objects/app.js"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = StorageClient::new(&client_config(&server.uri()))
        .await
        .unwrap();
    let err = client
        .purge_file_from_cdn(&container("assets"), "app.js", &[])
        .await
        .unwrap_err();

    match err {
        Error::Purge { key, .. } => assert_eq!(key, "app.js"),
        other => panic!("expected purge error, got {other}"),
    }
}

#[tokio::test]
async fn test_purge_without_cdn_endpoint_is_purge_error() {
    let mut config = client_config("http://unused");
    config.cdn_endpoint = None;

    let client = StorageClient::new(&config).await.unwrap();
    let err = client
        .purge_file_from_cdn(&container("assets"), "app.js", &[])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Purge { .. }));
}
