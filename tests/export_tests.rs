//! Export Integration Tests
//!
//! Imports a package, then pulls it back out through `GET /v1/models/export`.

mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use common::fixtures::file_import;
use common::TestApp;
use flate2::read::GzDecoder;
use model_registry_service::archive::{extract_oci_layers, unpack_bytes};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

async fn seeded_app() -> TestApp {
    let app = TestApp::new().await;
    let response = app.import(&file_import(true)).await;
    assert_eq!(response.status(), StatusCode::OK);
    app
}

/// Package directory of the imported argo model below an unpacked tree
fn argo_package(tree: &Path) -> PathBuf {
    tree.join("argo").join("v3.5.0").join("v1.0.0")
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_oci_export_round_trip() {
    let app = seeded_app().await;

    let response = app.get("/v1/models/export?name=argo&file_type=oci").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers[CONTENT_TYPE], "application/x-tar");
    assert_eq!(
        headers[CONTENT_DISPOSITION],
        "attachment; filename=\"argo.tar\""
    );

    let bytes = response.bytes().await.unwrap();
    let length: usize = headers[CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    assert_eq!(length, bytes.len());

    let out = TempDir::new().unwrap();
    let layout = out.path().join("layout");
    let tree = out.path().join("package");
    unpack_bytes(&bytes, &layout).unwrap();
    assert_eq!(extract_oci_layers(&layout, &tree).unwrap(), 1);

    let package = argo_package(&tree);

    let model: Value =
        serde_json::from_slice(&fs::read(package.join("model.json")).unwrap()).unwrap();
    assert_eq!(model["name"], "argo");
    assert!(model.get("components").is_none());
    assert_eq!(count_files(&package.join("components")), 2);
    assert_eq!(count_files(&package.join("relationships")), 1);

    assert_eq!(app.temp_entries(), 0);
}

#[tokio::test]
async fn test_file_type_defaults_to_oci() {
    let app = seeded_app().await;

    let response = app.get("/v1/models/export?name=argo").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/x-tar");
}

#[tokio::test]
async fn test_gzip_export_in_yaml() {
    let app = seeded_app().await;

    let response = app
        .get("/v1/models/export?name=argo&file_type=gzip&output_format=yaml&relationships=false")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/gzip");
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "attachment; filename=\"argo.tar.gz\""
    );

    let bytes = response.bytes().await.unwrap();
    let out = TempDir::new().unwrap();
    tar::Archive::new(GzDecoder::new(bytes.as_ref()))
        .unpack(out.path())
        .unwrap();

    let package = argo_package(out.path());
    assert!(package.join("model.yaml").is_file());
    assert!(!out.path().join("model.yaml").exists());
    assert_eq!(count_files(&package.join("components")), 2);
    assert_eq!(count_files(&package.join("relationships")), 0);
    assert_eq!(app.temp_entries(), 0);
}

#[tokio::test]
async fn test_unknown_id_is_plain_text_not_found() {
    let app = seeded_app().await;
    let id = uuid::Uuid::new_v4().to_string();

    let response = app.get(&format!("/v1/models/export?id={}", id)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers()[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let text = response.text().await.unwrap();
    assert_eq!(text, format!("model with id {} has not been found", id));
}

#[tokio::test]
async fn test_oci_export_in_yaml() {
    let app = seeded_app().await;

    let response = app.get("/v1/models/export?name=argo&output_format=yaml").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/x-tar");

    let bytes = response.bytes().await.unwrap();
    let out = TempDir::new().unwrap();
    let layout = out.path().join("layout");
    let tree = out.path().join("package");
    unpack_bytes(&bytes, &layout).unwrap();
    extract_oci_layers(&layout, &tree).unwrap();

    let package = argo_package(&tree);
    let model: Value =
        serde_yaml::from_slice(&fs::read(package.join("model.yaml")).unwrap()).unwrap();
    assert_eq!(model["name"], "argo");
    assert!(!package.join("model.json").exists());
    assert_eq!(count_files(&package.join("components")), 2);
}

#[tokio::test]
async fn test_other_file_types_fall_back_to_gzip() {
    let app = seeded_app().await;

    let response = app.get("/v1/models/export?name=argo&file_type=zip").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/gzip");

    let bytes = response.bytes().await.unwrap();
    let out = TempDir::new().unwrap();
    tar::Archive::new(GzDecoder::new(bytes.as_ref()))
        .unpack(out.path())
        .unwrap();
    assert!(argo_package(out.path()).join("model.json").is_file());
}

#[tokio::test]
async fn test_exported_archive_imports_back() {
    let app = seeded_app().await;
    let exported = app
        .get("/v1/models/export?name=argo&file_type=gzip")
        .await
        .bytes()
        .await
        .unwrap();

    let target = TestApp::new().await;
    let body = serde_json::json!({
        "uploadType": "file",
        "register": true,
        "importBody": {
            "modelFile": STANDARD.encode(&exported),
            "fileName": "argo.tar.gz"
        }
    });
    let response = target.import(&body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let listing: Value = target.get("/v1/models?search=argo").await.json().await.unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["models"][0]["model"]["version"], "v3.5.0");
}
