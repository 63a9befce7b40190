use std::path::PathBuf;
use std::sync::Arc;

use actix_files::Files;
use actix_web::http::{StatusCode, header::CONTENT_TYPE};
use actix_web::{App, test, web};
use moisture_hub::db::Database;
use moisture_hub::server::{AppState, api_routes};
use moisture_hub::storage::PUBLIC_PREFIX;
use serde_json::{Value, json};
use uuid::Uuid;

struct Ctx {
    state: AppState,
    uploads: PathBuf,
}

fn ctx() -> Ctx {
    let dir = std::env::temp_dir().join(format!("moisture-hub-api-{}", Uuid::new_v4()));
    let uploads = dir.join("uploads");
    std::fs::create_dir_all(&uploads).expect("create uploads dir");
    let db = Arc::new(Database::new(dir.join("hub.db").to_string_lossy().to_string()));
    Ctx {
        state: AppState::new(db, uploads.clone()),
        uploads,
    }
}

macro_rules! app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($ctx.state.clone()))
                .configure(api_routes)
                .service(Files::new(PUBLIC_PREFIX, $ctx.uploads.clone())),
        )
        .await
    };
}

fn multipart(field: &str, filename: &str, content: &[u8]) -> (String, Vec<u8>) {
    let boundary = "----moisturehubtestboundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[actix_web::test]
async fn post_reading_returns_created_with_defaults() {
    let ctx = ctx();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/readings")
        .set_json(json!({"value": 431.5, "humidity": 62, "tilt": "bad"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["value"], 431.5);
    assert_eq!(body["deviceId"], "default-device");
    assert_eq!(body["source"], "arduino");
    assert_eq!(body["humidity"], 62.0);
    assert!(body.get("tilt").is_none());
    assert!(body["id"].as_i64().is_some());
    assert!(body["createdAt"].as_str().is_some_and(|s| s.ends_with('Z')));
}

#[actix_web::test]
async fn legacy_moisture_path_is_accepted() {
    let ctx = ctx();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/moisture")
        .set_json(json!({"value": 12, "deviceId": "field-1", "source": "sim800"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/moisture/latest?deviceId=field-1")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["source"], "sim800");
}

#[actix_web::test]
async fn invalid_value_is_rejected_and_nothing_stored() {
    let ctx = ctx();
    let app = app!(ctx);

    for payload in [json!({"value": "12"}), json!({}), json!({"deviceId": "x"})] {
        let req = test::TestRequest::post()
            .uri("/api/readings")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "value (number) is required");
    }

    let req = test::TestRequest::post()
        .uri("/api/readings")
        .insert_header((CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/readings").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn latest_returns_newest_or_empty_object() {
    let ctx = ctx();
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/readings/latest").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({}));

    for (value, device) in [(1, "x"), (2, "x"), (3, "x"), (4, "y")] {
        let req = test::TestRequest::post()
            .uri("/api/readings")
            .set_json(json!({"value": value, "deviceId": device}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/readings/latest?deviceId=x")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["value"], 3.0);

    let req = test::TestRequest::get()
        .uri("/api/readings/latest?deviceId=")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["value"], 4.0);
}

#[actix_web::test]
async fn history_limit_is_clamped() {
    let ctx = ctx();
    let app = app!(ctx);

    for value in 0..3 {
        let req = test::TestRequest::post()
            .uri("/api/readings")
            .set_json(json!({"value": value, "deviceId": "bed"}))
            .to_request();
        test::call_service(&app, req).await;
    }

    let cases = [
        ("/api/readings?limit=1000&deviceId=bed", 3),
        ("/api/readings?limit=0&deviceId=bed", 1),
        ("/api/readings?limit=2", 2),
        ("/api/readings?limit=abc", 3),
        ("/api/readings?deviceId=other", 0),
    ];
    for (uri, expected) in cases {
        let req = test::TestRequest::get().uri(uri).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().map(Vec::len), Some(expected), "{uri}");
    }

    let req = test::TestRequest::get().uri("/api/readings").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body[0]["value"], 2.0);
    assert_eq!(body[2]["value"], 0.0);
}

#[actix_web::test]
async fn geotagged_reading_provides_device_location() {
    let ctx = ctx();
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/device/X/location").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Location not found");

    let req = test::TestRequest::post()
        .uri("/api/readings")
        .set_json(json!({"value": 300, "deviceId": "X", "lat": 1, "lng": 2}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get().uri("/api/device/X/location").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["deviceId"], "X");
    assert_eq!(body["lat"], 1.0);
    assert_eq!(body["lng"], 2.0);
}

#[actix_web::test]
async fn location_update_without_name_keeps_name() {
    let ctx = ctx();
    let app = app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/device/X/location")
        .set_json(json!({"lat": 10.5, "lng": 20.25, "name": "north bed"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/device/X/location")
        .set_json(json!({"lat": 11, "lng": 21}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["name"], "north bed");
    assert_eq!(body["lat"], 11.0);

    let req = test::TestRequest::get().uri("/api/device/X/location").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["name"], "north bed");
    assert_eq!(body["lng"], 21.0);

    let req = test::TestRequest::post()
        .uri("/api/device/X/location")
        .set_json(json!({"lat": "11", "lng": 21}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "lat and lng (numbers) are required");
}

#[actix_web::test]
async fn device_model_lifecycle() {
    let ctx = ctx();
    let app = app!(ctx);

    let req = test::TestRequest::get().uri("/api/device/Y/model").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    for payload in [json!({}), json!({"modelUrl": ""}), json!({"modelUrl": 5})] {
        let req = test::TestRequest::post()
            .uri("/api/device/Y/model")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::post()
        .uri("/api/device/Y/model")
        .set_json(json!({"modelUrl": "/uploads/1_sensor.glb", "modelName": "sensor"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"deviceId": "Y", "modelUrl": "/uploads/1_sensor.glb", "modelName": "sensor"})
    );

    let req = test::TestRequest::get().uri("/api/device/Y/model").to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched, body);

    // the device record is answered even before it has coordinates
    let req = test::TestRequest::get().uri("/api/device/Y/location").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["deviceId"], "Y");
    assert_eq!(body["modelUrl"], "/uploads/1_sensor.glb");
    assert!(body.get("lat").is_none());
}

#[actix_web::test]
async fn uploads_accept_models_only() {
    let ctx = ctx();
    let app = app!(ctx);

    let (ct, body) = multipart("file", "notes.txt", b"hello");
    let req = test::TestRequest::post()
        .uri("/api/uploads")
        .insert_header((CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = test::read_body_json(resp).await;
    assert_eq!(err["error"], "Only .glb or .gltf files are allowed");

    let (ct, body) = multipart("attachment", "sensor.glb", b"glTF");
    let req = test::TestRequest::post()
        .uri("/api/uploads")
        .insert_header((CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let (ct, body) = multipart("file", "sensor.GLB", b"glTF-binary");
    let req = test::TestRequest::post()
        .uri("/api/uploads")
        .insert_header((CONTENT_TYPE, ct))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let stored: Value = test::read_body_json(resp).await;
    let name = stored["name"].as_str().expect("stored name").to_string();
    assert!(name.ends_with("_sensor.GLB"));
    assert_eq!(stored["url"], format!("/uploads/{name}"));
    assert_eq!(stored["displayName"], "sensor.GLB");

    let req = test::TestRequest::get().uri("/api/uploads").to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        listed,
        json!([{"name": name, "url": format!("/uploads/{name}"), "displayName": "sensor.GLB"}])
    );

    let req = test::TestRequest::get()
        .uri(&format!("/uploads/{name}"))
        .to_request();
    let bytes = test::call_and_read_body(&app, req).await;
    assert_eq!(&bytes[..], b"glTF-binary");
}
