// ── HTTP surface ──────────────────────────────────────────────────────────────

use reqwest::Method;
use serde_json::json;

use netbroker_core::Capabilities;

use crate::*;

/// Calls without the interface token are refused before reaching the broker.
#[tokio::test]
async fn test_missing_token_is_rejected() {
    let server = TestServer::start().await.unwrap();

    let resp = server.client.get(server.url("/status")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 8);

    let resp = server
        .client
        .get(server.url("/status"))
        .header(INTERFACE_HEADER, "someone.else.v1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

/// Supplier lifecycle over HTTP, with permission and unknown-id errors.
#[tokio::test]
async fn test_supplier_lifecycle() {
    let server = TestServer::start().await.unwrap();
    let register = json!({
        "net_type": "wifi",
        "identity": "wlan0",
        "capabilities": Capabilities::INTERNET.bits(),
    });

    let (status, body) = server
        .send(server.call(Method::POST, "/suppliers", APP_UID).json(&register))
        .await
        .unwrap();
    assert_eq!(status, 403);
    assert_eq!(body["code"], 5);

    let (status, body) = server
        .send(server.call(Method::POST, "/suppliers", SYSTEM_UID).json(&register))
        .await
        .unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["code"], 0);
    let id = body["value"].as_u64().unwrap();

    let info = json!({
        "is_available": true,
        "is_roaming": false,
        "signal_strength": 60,
        "frequency": 5180,
    });
    let (status, _) = server
        .send(
            server
                .call(Method::PUT, &format!("/suppliers/{id}/info"), SYSTEM_UID)
                .json(&info),
        )
        .await
        .unwrap();
    assert_eq!(status, 200);

    let (_, body) = server
        .send(server.call(Method::GET, "/networks", APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"]["available"], json!([id]));

    let (_, body) = server
        .send(server.call(Method::GET, "/networks/type/wifi", APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!([id]));

    let (_, body) = server
        .send(server.call(Method::GET, "/default", APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!(id));

    let (status, _) = server
        .send(server.call(Method::DELETE, &format!("/suppliers/{id}"), SYSTEM_UID))
        .await
        .unwrap();
    assert_eq!(status, 200);

    let (status, body) = server
        .send(server.call(Method::DELETE, &format!("/suppliers/{id}"), SYSTEM_UID))
        .await
        .unwrap();
    assert_eq!(status, 404);
    assert_eq!(body["code"], 1);

    let (_, body) = server
        .send(server.call(Method::GET, "/default/exists", APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!(false));
}

/// A request stream announces registration, then delivers notifications
/// as the broker binds it.
#[tokio::test]
async fn test_request_stream_delivers_notifications() {
    let server = TestServer::start().await.unwrap();
    let a = server
        .broker
        .register_supplier(
            SYSTEM_UID,
            netbroker_core::NetType::Ethernet,
            "eth0",
            Capabilities::INTERNET | Capabilities::NOT_METERED,
        )
        .await
        .unwrap();

    let resp = server
        .call(Method::POST, "/requests", APP_UID)
        .json(&json!({ "required_capabilities": Capabilities::INTERNET.bits() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let mut events = EventReader::new(resp);

    let (name, data) = events.next().await.unwrap();
    assert_eq!(name, "registered");
    let request = data["request"].as_u64().unwrap() as u32;

    server
        .broker
        .update_supplier_info(
            SYSTEM_UID,
            a,
            netbroker_core::SupplierInfo {
                is_available: true,
                signal_strength: 100,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (name, data) = events.next().await.unwrap();
    assert_eq!(name, "notification");
    assert_eq!(data["request_id"], json!(request));
    assert_eq!(data["event"]["type"], "available");
    assert_eq!(data["event"]["data"], json!(a));

    // Another app cannot remove the request.
    let path = format!("/requests/{request}");
    let (status, body) = server
        .send(server.call(Method::DELETE, &path, APP_UID + 1))
        .await
        .unwrap();
    assert_eq!(status, 403);
    assert_eq!(body["code"], 5);

    // Deactivating over HTTP is idempotent-by-error.
    let (status, _) = server
        .send(server.call(Method::DELETE, &path, APP_UID))
        .await
        .unwrap();
    assert_eq!(status, 200);
    let (status, body) = server
        .send(server.call(Method::DELETE, &path, APP_UID))
        .await
        .unwrap();
    assert_eq!(status, 404);
    assert_eq!(body["code"], 2);
}

/// Closing the stream is the listener dying: its request disappears.
#[tokio::test]
async fn test_closing_stream_removes_listener() {
    let server = TestServer::start().await.unwrap();

    let resp = server
        .call(Method::GET, "/callbacks/default", APP_UID)
        .send()
        .await
        .unwrap();
    let mut events = EventReader::new(resp);
    let (name, _) = events.next().await.unwrap();
    assert_eq!(name, "registered");
    assert_eq!(server.broker.status().await.unwrap().listeners, 1);

    drop(events);
    let broker = server.broker.clone();
    let cleaned = eventually(|| {
        let broker = broker.clone();
        async move {
            let status = broker.status().await.unwrap();
            status.listeners == 0 && status.requests == 0
        }
    })
    .await;
    assert!(cleaned, "closed stream left its listener registered");
}

/// An invalid specifier fails the stream before it opens.
#[tokio::test]
async fn test_invalid_specifier_is_refused() {
    let server = TestServer::start().await.unwrap();
    let (status, body) = server
        .send(
            server
                .call(Method::POST, "/callbacks", APP_UID)
                .json(&json!({
                    "required_capabilities": Capabilities::NOT_VPN.bits(),
                    "net_type": "vpn",
                })),
        )
        .await
        .unwrap();
    assert_eq!(status, 400);
    assert_eq!(body["code"], 4);
    assert_eq!(server.broker.status().await.unwrap().listeners, 0);
}

/// Policy routes: set, query, access check and background state.
#[tokio::test]
async fn test_policy_routes() {
    let server = TestServer::start().await.unwrap();

    let (status, _) = server
        .send(
            server
                .call(Method::PUT, &format!("/policy/uid/{APP_UID}"), SYSTEM_UID)
                .json(&json!({ "policy": 1 })),
        )
        .await
        .unwrap();
    assert_eq!(status, 200);

    let (_, body) = server
        .send(server.call(Method::GET, &format!("/policy/uid/{APP_UID}"), APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!(1));

    let (_, body) = server
        .send(server.call(Method::GET, "/policy/uids/1", APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!([APP_UID]));

    let (_, body) = server
        .send(server.call(
            Method::GET,
            &format!("/policy/uid/{APP_UID}/allowed?metered=true&background=true"),
            APP_UID,
        ))
        .await
        .unwrap();
    assert_eq!(body["value"], json!(true));

    let (_, body) = server
        .send(server.call(Method::GET, &format!("/policy/background/{APP_UID}"), APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!("allowlisted"));

    let (status, _) = server
        .send(
            server
                .call(Method::PUT, "/policy/background", SYSTEM_UID)
                .json(&json!({ "restricted": false })),
        )
        .await
        .unwrap();
    assert_eq!(status, 200);
    let (_, body) = server
        .send(server.call(Method::GET, "/policy/background", APP_UID))
        .await
        .unwrap();
    assert_eq!(body["value"], json!(false));

    let (status, body) = server
        .send(
            server
                .call(Method::PUT, &format!("/policy/uid/{APP_UID}/state"), APP_UID)
                .json(&json!({ "background": true })),
        )
        .await
        .unwrap();
    assert_eq!(status, 403);
    assert_eq!(body["code"], 5);
}
