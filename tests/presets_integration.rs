mod common;

use std::sync::Arc;

use authrelay::api::PresetApi;
use authrelay::client::{AuthClient, ClientError};
use authrelay::metrics::Metrics;
use authrelay::models::preset::{Preset, PresetItem};
use authrelay::store::{create_store, FileStore, TokenStore};
use mockito::Server;
use reqwest::StatusCode;

use common::{bearer, expired_body, mint_token, refreshed_body, signed_in_client, test_config, TOKEN_KEY};

#[tokio::test]
async fn lists_presets() {
    let mut server = Server::new_async().await;
    let token = mint_token("42", 600);
    server
        .mock("GET", "/api/preset")
        .match_header("authorization", bearer(&token).as_str())
        .with_status(200)
        .with_body(r#"[{"name":"hunting","presetId":1},{"name":"fishing","presetId":2}]"#)
        .create_async()
        .await;
    let (client, _store) = signed_in_client(&server.url(), &token).await;

    let presets = PresetApi::new(&client).list().await.unwrap();

    assert_eq!(
        presets,
        vec![
            Preset { name: "hunting".to_string(), preset_id: 1 },
            Preset { name: "fishing".to_string(), preset_id: 2 },
        ]
    );
}

#[tokio::test]
async fn fetches_preset_items() {
    let mut server = Server::new_async().await;
    let token = mint_token("42", 600);
    server
        .mock("GET", "/api/preset/7")
        .with_status(200)
        .with_body(r#"[{"itemId":2000000,"price":150},{"itemId":2000001,"price":90}]"#)
        .create_async()
        .await;
    let (client, _store) = signed_in_client(&server.url(), &token).await;

    let items = PresetApi::new(&client).items(7).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0], PresetItem { item_id: 2000000, price: 150 });
}

#[tokio::test]
async fn deletes_preset() {
    let mut server = Server::new_async().await;
    let token = mint_token("42", 600);
    let delete = server
        .mock("DELETE", "/api/preset/7")
        .match_header("authorization", bearer(&token).as_str())
        .with_status(204)
        .expect(1)
        .create_async()
        .await;
    let (client, _store) = signed_in_client(&server.url(), &token).await;

    PresetApi::new(&client).delete(7).await.unwrap();

    delete.assert_async().await;
}

#[tokio::test]
async fn missing_preset_is_reported_with_status() {
    let mut server = Server::new_async().await;
    let token = mint_token("42", 600);
    server
        .mock("GET", "/api/preset/404")
        .with_status(404)
        .with_body(r#"{"code":"PRESET_001"}"#)
        .create_async()
        .await;
    let (client, _store) = signed_in_client(&server.url(), &token).await;

    let err = PresetApi::new(&client).items(404).await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(err.failure().and_then(|f| f.code.as_deref()), Some("PRESET_001"));
}

#[tokio::test]
async fn malformed_listing_is_a_decode_error() {
    let mut server = Server::new_async().await;
    let token = mint_token("42", 600);
    server
        .mock("GET", "/api/preset")
        .with_status(200)
        .with_body(r#"{"unexpected":true}"#)
        .create_async()
        .await;
    let (client, _store) = signed_in_client(&server.url(), &token).await;

    let err = PresetApi::new(&client).list().await.unwrap_err();

    assert!(matches!(err, ClientError::Decode(_)));
}

#[tokio::test]
async fn listing_survives_token_expiry() {
    let mut server = Server::new_async().await;
    let old = mint_token("42", 600);
    let new = mint_token("42", 600);
    server
        .mock("GET", "/api/preset")
        .match_header("authorization", bearer(&old).as_str())
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    server
        .mock("GET", "/api/preset")
        .match_header("authorization", bearer(&new).as_str())
        .with_status(200)
        .with_body(r#"[{"name":"hunting","presetId":1}]"#)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .with_status(200)
        .with_body(refreshed_body(&new))
        .expect(1)
        .create_async()
        .await;
    let (client, _store) = signed_in_client(&server.url(), &old).await;

    let presets = PresetApi::new(&client).list().await.unwrap();

    assert_eq!(presets.len(), 1);
    refresh.assert_async().await;
    assert_eq!(client.auth().metrics().retries("succeeded"), 1.0);
}

#[tokio::test]
async fn renewed_token_is_picked_up_by_the_next_process() {
    let mut server = Server::new_async().await;
    let old = mint_token("42", 600);
    let new = mint_token("42", 600);
    server
        .mock("GET", "/api/preset")
        .match_header("authorization", bearer(&old).as_str())
        .with_status(401)
        .with_body(expired_body())
        .create_async()
        .await;
    let with_new = server
        .mock("GET", "/api/preset")
        .match_header("authorization", bearer(&new).as_str())
        .with_status(200)
        .with_body("[]")
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/refresh")
        .with_status(200)
        .with_body(refreshed_body(&new))
        .expect(1)
        .create_async()
        .await;

    let path = std::env::temp_dir()
        .join(format!("authrelay-test-{}", uuid::Uuid::new_v4()))
        .join("token.json");
    let store: Arc<dyn TokenStore> = Arc::new(FileStore::new(&path));
    store.set(TOKEN_KEY, &old).await.unwrap();

    let first = AuthClient::new(&test_config(&server.url()), store, Metrics::new()).unwrap();
    assert!(first.auth().initialize().await.unwrap());
    PresetApi::new(&first).list().await.unwrap();
    drop(first);

    let mut config = test_config(&server.url());
    config.store.backend = authrelay::config::StoreBackend::File(authrelay::config::FileStoreConfig {
        path: path.to_string_lossy().into_owned(),
    });
    let second = AuthClient::new(&config, create_store(&config.store), Metrics::new()).unwrap();
    assert!(second.auth().initialize().await.unwrap());
    assert_eq!(second.auth().access_token().await, Some(new));
    PresetApi::new(&second).list().await.unwrap();

    with_new.assert_async().await;
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
