mod common;

use common::{register, spawn_app, test_config, PNG_DATA_URL};
use pixelgram::{
    error::AppError,
    models::post::{CreatePostRequest, ImageField},
    services::{FileStorage, LocalFileStorage},
    utils::image::ImagePayload,
};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_http_image_is_downloaded_with_response_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"GIF89a-bytes".to_vec(), "image/gif"))
        .mount(&server)
        .await;

    let storage = LocalFileStorage::new(&test_config()).unwrap();
    let payload = ImagePayload::classify(&format!("{}/cat.gif", server.uri()));
    assert_eq!(payload.kind(), "http_url");

    let stored = storage.store(&payload, "posts/1").await.unwrap();
    assert!(stored.starts_with("/uploads/posts/1/"));
    assert!(stored.ends_with(".gif"));

    let on_disk = storage.root().join(stored.trim_start_matches("/uploads/"));
    assert_eq!(tokio::fs::read(on_disk).await.unwrap(), b"GIF89a-bytes");
}

#[tokio::test]
async fn test_failed_download_is_external_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = LocalFileStorage::new(&test_config()).unwrap();
    let payload = ImagePayload::classify(&format!("{}/missing.png", server.uri()));

    assert!(matches!(
        storage.store(&payload, "posts/1").await,
        Err(AppError::ExternalService(_))
    ));
}

#[tokio::test]
async fn test_post_keeps_images_that_could_be_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = spawn_app().await;
    let (alice, _) = register(&app.state, "alice").await;

    let post = app
        .state
        .post_service
        .create_post(
            alice,
            CreatePostRequest {
                caption: Some("mixed".to_string()),
                image_base64: Some(ImageField::One(PNG_DATA_URL.to_string())),
                image_url: Some(format!("{}/gone.png", server.uri())),
                ..CreatePostRequest::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(post.image_urls.len(), 1);
    assert!(post.image_urls[0].ends_with(".png"));
}

#[tokio::test]
async fn test_oversized_download_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89u8; 4096], "image/png"))
        .mount(&server)
        .await;

    let config = pixelgram::config::Config {
        max_upload_size: 1024,
        ..test_config()
    };
    let storage = LocalFileStorage::new(&config).unwrap();
    let payload = ImagePayload::classify(&format!("{}/huge.png", server.uri()));

    assert!(matches!(
        storage.store(&payload, "posts/1").await,
        Err(AppError::FileUpload(_))
    ));
    assert!(!storage.root().join("posts/1").exists());
}
