use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use ridex::engine::Engine;
use ridex::server::app;
use ridex::store::{DynStore, MemStore};

fn setup() -> Router {
    app(Engine::new(Arc::new(MemStore::new()) as DynStore))
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    match body {
        Some(body) => builder
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn authed(
    method: &str,
    uri: &str,
    user_id: &str,
    role: &str,
    body: Option<Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user_id)
        .header("x-user-role", role);

    match body {
        Some(body) => builder
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, body)
}

async fn register(app: &Router, role: &str, name: &str) -> String {
    let mut payload = json!({
        "name": name,
        "email": format!("{}-{}@example.com", role, Uuid::new_v4()),
        "role": role,
    });
    if role == "driver" {
        payload["vehicle_details"] = json!("Toyota Axio");
        payload["license_number"] = json!(format!("DHK-{}", Uuid::new_v4()));
    }

    let (status, body) = send(app, request("POST", "/accounts", Some(payload))).await;
    assert_eq!(status, StatusCode::OK);

    body["id"].as_str().unwrap().to_string()
}

/// Registers a driver, approves them through the admin surface and takes
/// them online.
async fn register_active_driver(app: &Router, admin_id: &str) -> String {
    let driver_id = register(app, "driver", "Road Warrior").await;

    let (status, _) = send(
        app,
        authed(
            "PATCH",
            &format!("/admin/drivers/{driver_id}/approval"),
            admin_id,
            "admin",
            Some(json!({ "status": "approved" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        authed(
            "PATCH",
            "/drivers/availability",
            &driver_id,
            "driver",
            Some(json!({ "availability": "online" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"], "online");

    driver_id
}

#[tokio::test]
async fn identity_headers_are_required() {
    let app = setup();

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/rides",
            Some(json!({
                "pickup": { "latitude": 23.8103, "longitude": 90.4125 },
                "destination": { "latitude": 23.7808, "longitude": 90.2792 },
                "fare": 15.0,
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn duplicate_registration_is_a_bad_request() {
    let app = setup();

    let payload = json!({
        "name": "Anika",
        "email": "anika@example.com",
        "role": "rider",
    });

    let (status, _) = send(&app, request("POST", "/accounts", Some(payload.clone()))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, request("POST", "/accounts", Some(payload))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn trip_flow_over_http() {
    let app = setup();
    let admin_id = Uuid::new_v4().to_string();

    let rider_id = register(&app, "rider", "Anika").await;
    let driver_id = register_active_driver(&app, &admin_id).await;

    let (status, ride) = send(
        &app,
        authed(
            "POST",
            "/rides",
            &rider_id,
            "rider",
            Some(json!({
                "pickup": { "latitude": 23.8103, "longitude": 90.4125 },
                "destination": { "latitude": 23.7808, "longitude": 90.2792 },
                "fare": 15.0,
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ride["status"], "requested");
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let (status, pending) = send(
        &app,
        authed("GET", "/drivers/requests", &driver_id, "driver", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let (status, accepted) = send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/accept"),
            &driver_id,
            "driver",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["driver_id"], driver_id.as_str());

    for status_name in ["picked_up", "in_transit", "completed"] {
        let (status, advanced) = send(
            &app,
            authed(
                "PATCH",
                &format!("/rides/{ride_id}/status"),
                &driver_id,
                "driver",
                Some(json!({ "status": status_name })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(advanced["status"], status_name);
    }

    let (status, history) = send(
        &app,
        authed("GET", "/drivers/history", &driver_id, "driver", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["meta"]["total"], 1);
    assert_eq!(history["data"][0]["history"].as_array().unwrap().len(), 5);

    let (status, earnings) = send(
        &app,
        authed("GET", "/drivers/earnings", &driver_id, "driver", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(earnings["completed_rides"], 1);
}

#[tokio::test]
async fn losing_driver_sees_a_conflict() {
    let app = setup();
    let admin_id = Uuid::new_v4().to_string();

    let rider_id = register(&app, "rider", "Anika").await;
    let winner_id = register_active_driver(&app, &admin_id).await;
    let loser_id = register_active_driver(&app, &admin_id).await;

    let (_, ride) = send(
        &app,
        authed(
            "POST",
            "/rides",
            &rider_id,
            "rider",
            Some(json!({
                "pickup": { "latitude": 23.8103, "longitude": 90.4125 },
                "destination": { "latitude": 23.7808, "longitude": 90.2792 },
                "fare": 22.0,
            })),
        ),
    )
    .await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/accept"),
            &winner_id,
            "driver",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/accept"),
            &loser_id,
            "driver",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_status_values_are_rejected() {
    let app = setup();
    let admin_id = Uuid::new_v4().to_string();

    let rider_id = register(&app, "rider", "Anika").await;
    let driver_id = register_active_driver(&app, &admin_id).await;

    let (_, ride) = send(
        &app,
        authed(
            "POST",
            "/rides",
            &rider_id,
            "rider",
            Some(json!({
                "pickup": { "latitude": 23.8103, "longitude": 90.4125 },
                "destination": { "latitude": 23.7808, "longitude": 90.2792 },
                "fare": 9.5,
            })),
        ),
    )
    .await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/accept"),
            &driver_id,
            "driver",
            None,
        ),
    )
    .await;

    let (status, body) = send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/status"),
            &driver_id,
            "driver",
            Some(json!({ "status": "teleported" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("invalid ride status"));
}

#[tokio::test]
async fn cancel_requires_the_rider_role() {
    let app = setup();
    let admin_id = Uuid::new_v4().to_string();

    let rider_id = register(&app, "rider", "Anika").await;
    let driver_id = register_active_driver(&app, &admin_id).await;

    let (_, ride) = send(
        &app,
        authed(
            "POST",
            "/rides",
            &rider_id,
            "rider",
            Some(json!({
                "pickup": { "latitude": 23.8103, "longitude": 90.4125 },
                "destination": { "latitude": 23.7808, "longitude": 90.2792 },
                "fare": 12.0,
            })),
        ),
    )
    .await;
    let ride_id = ride["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/cancel"),
            &driver_id,
            "driver",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = send(
        &app,
        authed(
            "PATCH",
            &format!("/rides/{ride_id}/cancel"),
            &rider_id,
            "rider",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
}

#[tokio::test]
async fn admin_surface_over_http() {
    let app = setup();
    let admin_id = Uuid::new_v4().to_string();

    register(&app, "rider", "Anika").await;
    register_active_driver(&app, &admin_id).await;

    let (status, accounts) = send(
        &app,
        authed(
            "GET",
            "/admin/accounts?role=rider&searchTerm=anika",
            &admin_id,
            "admin",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accounts["meta"]["total"], 1);

    let (status, drivers) = send(&app, authed("GET", "/admin/drivers", &admin_id, "admin", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(drivers["meta"]["total"], 1);
    assert!(drivers["data"][0]["account"]["name"].is_string());

    let (status, analytics) = send(
        &app,
        authed("GET", "/admin/analytics", &admin_id, "admin", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["total_riders"], 1);
    assert_eq!(analytics["total_drivers"], 1);

    // the same surface is forbidden for a rider identity
    let rider_id = Uuid::new_v4().to_string();
    let (status, _) = send(
        &app,
        authed("GET", "/admin/analytics", &rider_id, "rider", None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
