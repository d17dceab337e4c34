//! End-to-end tests of the web API.
//!
//! The router is served on an ephemeral port with a recording goal publisher in place of zmq, and
//! driven with real HTTP and WebSocket clients.
//!
//! Run: `cargo test -p bridge_exec --test web_api`

use std::f64::consts::TAU;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite;

use bridge_lib::conn_mgr::ConnectionManager;
use bridge_lib::goal_dispatcher::{GoalDispatcher, GoalPublishError, GoalPublisher};
use bridge_lib::params::StreamParams;
use bridge_lib::route_catalog::{Route, RouteCatalog};
use bridge_lib::telem_store::TelemetryStore;
use bridge_lib::web::{self, AppState};
use comms_if::nav::{NavGoal, Pose, Quaternion, Waypoint};
use comms_if::telem::OccupancyGrid;

// ── Helpers ──────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingPublisher {
    goals: Mutex<Vec<NavGoal>>,
}

impl GoalPublisher for RecordingPublisher {
    fn publish(&self, goal: &NavGoal) -> Result<(), GoalPublishError> {
        self.goals.lock().unwrap().push(goal.clone());
        Ok(())
    }
}

struct TestServer {
    addr: SocketAddr,
    store: Arc<TelemetryStore>,
    publisher: Arc<RecordingPublisher>,
    conns: ConnectionManager,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn num_published(&self) -> usize {
        self.publisher.goals.lock().unwrap().len()
    }
}

/// Start a server with route `A` holding a single waypoint at (1, 2, 0).
async fn start_server(static_dir: Option<&Path>) -> TestServer {
    let catalog = Arc::new(RouteCatalog::from_routes(vec![Route {
        name: String::from("A"),
        waypoints: vec![Waypoint {
            x: 1.0,
            y: 2.0,
            z: 0.0,
            orientation: Quaternion::identity(),
        }],
    }]));
    let store = Arc::new(TelemetryStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let dispatcher = Arc::new(GoalDispatcher::new(
        catalog.clone(),
        publisher.clone(),
        "map",
    ));
    let conns = ConnectionManager::new(
        store.clone(),
        StreamParams {
            tick_period_ms: 50,
            ..Default::default()
        },
    );

    let state = Arc::new(AppState {
        catalog,
        store: store.clone(),
        dispatcher,
        conns: conns.clone(),
        start_time: Instant::now(),
    });
    let app = web::router(state, static_dir);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        store,
        publisher,
        conns,
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_ws(addr: SocketAddr) -> WsStream {
    let url = format!("ws://{}/ws", addr);
    let (stream, _response) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("WebSocket connect failed");
    stream
}

/// Read the next snapshot, failing after 5 seconds.
async fn next_snapshot(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for a snapshot")
            .expect("Stream ended")
            .expect("WebSocket error");

        if let tungstenite::Message::Text(t) = msg {
            return serde_json::from_str(&t).unwrap();
        }
    }
}

async fn wait_for_open(conns: &ConnectionManager, num: usize) {
    let start = Instant::now();
    while conns.num_open() != num {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "Expected {} open connections, found {}",
            num,
            conns.num_open()
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Routes ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_list_and_get_routes() {
    let server = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/routes")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["routes"], json!(["A"]));
    assert!(body["message"].is_string());

    let resp = client.get(server.url("/route/A")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["routeName"], "A");
    assert_eq!(body["coordinates"][0]["x"], 1.0);
    assert_eq!(body["coordinates"][0]["orientation"]["w"], 1.0);

    let resp = client.get(server.url("/route/Z")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_and_delete_route() {
    let server = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/route"))
        .json(&json!({"name": "B", "coordinates": [{"x": 3.0, "y": 4.0}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["routes"], json!(["A", "B"]));

    let resp = client
        .post(server.url("/route"))
        .json(&json!({"name": "C", "coordinates": "not an array"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(server.url("/route"))
        .json(&json!({"name": "", "coordinates": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client.delete(server.url("/route/A")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["routes"], json!(["B"]));

    let resp = client.delete(server.url("/route/A")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

// ── Goals ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_set_goal() {
    let server = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/set_goal"))
        .json(&json!({"route": "A", "index": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["goal"]["x"], 1.0);
    assert_eq!(body["goal"]["y"], 2.0);
    assert_eq!(server.num_published(), 1);

    let goal = server.publisher.goals.lock().unwrap()[0].clone();
    assert_eq!(goal.frame_id, "map");
    assert_eq!(goal.pose.position.x, 1.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_goal_rejected() {
    let server = start_server(None).await;
    let client = reqwest::Client::new();

    let bodies = [
        json!({"route": "A", "index": 5}),
        json!({"route": "A", "index": -1}),
        json!({"route": "Z", "index": 0}),
        json!({"route": "A"}),
        json!({"route": "A", "index": "zero"}),
    ];

    for body in bodies.iter() {
        let resp = client
            .post(server.url("/set_goal"))
            .json(body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "Body {} was not rejected", body);
        let err: Value = resp.json().await.unwrap();
        assert!(err["error"].is_string());
    }

    let resp = client
        .post(server.url("/set_goal"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    assert_eq!(server.num_published(), 0);
}

// ── Telemetry ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_map_and_pose() {
    let server = start_server(None).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/map")).send().await.unwrap();
    assert_eq!(resp.status(), 503);
    let resp = client.get(server.url("/pose")).send().await.unwrap();
    assert_eq!(resp.status(), 503);

    let map = OccupancyGrid {
        width: 2,
        height: 2,
        resolution: 0.05,
        origin: Pose::default(),
        data: vec![0, 100, -1, 50],
    };
    server.store.update_map(map.clone());
    server.store.update_pose(Pose::default());

    let resp = client.get(server.url("/map")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let got: OccupancyGrid = resp.json().await.unwrap();
    assert_eq!(got, map);

    let resp = client.get(server.url("/pose")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let got: Pose = resp.json().await.unwrap();
    assert_eq!(got, Pose::default());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ws_snapshots() {
    let server = start_server(None).await;
    let mut ws = connect_ws(server.addr).await;

    let snapshot = next_snapshot(&mut ws).await;
    assert!(snapshot["pose"].is_null());
    assert!(snapshot["point_cloud"].is_null());
    assert!(snapshot["map"].is_null());

    server.store.update_pose(Pose::default());

    // Client messages are accepted and don't disturb the stream
    ws.send(tungstenite::Message::Text(String::from("hello")))
        .await
        .unwrap();

    let mut saw_pose = false;
    for _ in 0..10 {
        let snapshot = next_snapshot(&mut ws).await;

        let x = snapshot["odom"]["x"].as_f64().unwrap();
        let y = snapshot["odom"]["y"].as_f64().unwrap();
        let theta = snapshot["odom"]["theta"].as_f64().unwrap();
        assert!((0.0..=10.0).contains(&x));
        assert!((0.0..=10.0).contains(&y));
        assert!((0.0..TAU).contains(&theta));

        saw_pose |= !snapshot["pose"].is_null();
    }
    assert!(saw_pose);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ws_close_is_isolated() {
    let server = start_server(None).await;
    let client = reqwest::Client::new();

    let mut ws_a = connect_ws(server.addr).await;
    let mut ws_b = connect_ws(server.addr).await;
    next_snapshot(&mut ws_a).await;
    next_snapshot(&mut ws_b).await;

    let status: Value = client
        .get(server.url("/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["clients"], 2);
    assert_eq!(status["routes"], 1);

    ws_a.close(None).await.unwrap();
    wait_for_open(&server.conns, 1).await;

    for _ in 0..3 {
        next_snapshot(&mut ws_b).await;
    }
}

// ── Static files ─────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_static_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>bridge</h1>").unwrap();

    let server = start_server(Some(dir.path())).await;
    let client = reqwest::Client::new();

    let resp = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "<h1>bridge</h1>");

    // API routes take precedence
    let resp = client.get(server.url("/routes")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}
