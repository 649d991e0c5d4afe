use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use show_admin::{
    storage::DiskUsage, web::create_app, AdminConfig, AppState, StaticInventory, WebConfig,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn app(media: &TempDir) -> Router {
    let root = media.path();
    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("block/mmcblk0p2")).unwrap();
    fs::write(root.join("block/mmcblk0p2/size"), "16777216\n").unwrap();
    fs::write(root.join("mounts"), "/dev/mmcblk0p2 / ext4 rw 0 0\n").unwrap();

    let config = AdminConfig {
        platform: "BeagleBone Black".to_string(),
        media_dir: root.to_path_buf(),
        block_dir: root.join("block"),
        dev_dir: root.join("dev"),
        fstab: root.join("fstab"),
        mounts: root.join("mounts"),
        dhcp_leases: root.join("dnsmasq.leases"),
        models_url: "http://127.0.0.1:9/models".to_string(),
        drm_dir: root.join("drm"),
        ..AdminConfig::default()
    };
    let inventory = Arc::new(StaticInventory::new(vec![
        json!({"pin": "GPIO1", "gpioChip": 1, "gpioLine": 1}),
        json!({"pin": "GPIO2", "gpioChip": 1, "gpioLine": 2}),
    ]));

    let state = AppState::with_inventory(config, inventory)
        .unwrap()
        .with_disk_usage(DiskUsage::default().with_root(2 * 1024 * 1024 * 1024));
    create_app(&WebConfig::default(), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let media = TempDir::new().unwrap();
    let (status, body) = send(&app(&media), Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_gpio_config_endpoint() {
    let media = TempDir::new().unwrap();
    let app = app(&media);
    fs::write(
        media.path().join("config/gpio.json"),
        r#"[{"pin": "GPIO1", "enabled": true, "desc": "Button"}]"#,
    )
    .unwrap();
    fs::write(
        media.path().join("config/co-other.json"),
        r#"{"channelOutputs": [{"type": "GPIO", "enabled": 1, "gpio": "GPIO1", "description": "Relay"}]}"#,
    )
    .unwrap();

    let (status, body) = send(&app, Method::GET, "/api/gpio/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["configError"], true);
    assert_eq!(body[0]["configConflict"], "{GPIO Input : Button}{Channel Output : Relay}");
    assert_eq!(body[1]["function"], "--Available--");
    assert_eq!(body[1]["inUse"], Value::Null);
}

#[tokio::test]
async fn test_raw_inventory_endpoint() {
    let media = TempDir::new().unwrap();
    let (status, body) = send(&app(&media), Method::GET, "/api/gpio", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert!(body[0].get("function").is_none());
}

#[tokio::test]
async fn test_options_endpoint() {
    let media = TempDir::new().unwrap();
    let app = app(&media);

    let (status, body) = send(&app, Method::GET, "/api/options/GPIOLIST", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["GPIO2"], "GPIO2 (GPIO 1/2)");

    let (status, body) = send(&app, Method::GET, "/api/options/Unknown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (_, body) = send(&app, Method::GET, "/api/options/VideoOutput", None).await;
    assert_eq!(body, json!({"Disabled": "Disabled"}));
}

#[tokio::test]
async fn test_proxy_lifecycle() {
    let media = TempDir::new().unwrap();
    let app = app(&media);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/proxies",
        Some(json!([
            {"host": "10.0.0.2", "description": "Yard"},
            {"host": "bad host"},
            {"host": "10.0.0.2", "description": "Dup"}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/proxies/10.0.0.3",
        Some(json!({"description": "Roof"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, "/api/proxies/10.0.0.3", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, "/api/proxies", None).await;
    assert_eq!(body[1]["host"], "10.0.0.3");
    assert_eq!(body[1]["description"], "Roof");

    let (status, _) = send(&app, Method::DELETE, "/api/proxies/10.0.0.2", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::DELETE, "/api/proxies/10.0.0.2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "ERROR");
}

#[tokio::test]
async fn test_storage_endpoint() {
    let media = TempDir::new().unwrap();
    let (status, body) = send(&app(&media), Method::GET, "/api/storage", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selected"], "mmcblk0p2");
    assert_eq!(body["devices"][0]["label"], "mmcblk0p2 - 8.0GB (2.0GB Free) (boot device)");
    assert_eq!(body["actions"]["flash_emmc"], true);
}

#[tokio::test]
async fn test_default_index() {
    let media = TempDir::new().unwrap();
    let response = app(&media)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
