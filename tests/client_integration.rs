// Integration tests for the HTTP client and the headless cascade walk,
// against an in-process fake of the telemetry server.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, runtime::Handle};

use laptrace::{
    ApiClient, CascadingSelectorController, ChartRenderer, ErrorKind, FieldId, LaptraceError,
    OptionValue, Selection, TelemetrySample, ViewerConfig, build_cascade, headless,
};

type Params = HashMap<String, String>;

#[derive(Clone, Default)]
struct ServerState {
    requests: Arc<Mutex<Vec<(String, Params)>>>,
}

impl ServerState {
    fn record(&self, path: &str, params: &Params) {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), params.clone()));
    }

    fn last(&self, path: &str) -> Option<Params> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, params)| params.clone())
    }
}

fn server_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
}

async fn years(State(state): State<ServerState>, Query(params): Query<Params>) -> Json<Value> {
    state.record("/years", &params);
    Json(json!([2021, 2022]))
}

async fn gps(
    State(state): State<ServerState>,
    Query(params): Query<Params>,
) -> (StatusCode, Json<Value>) {
    state.record("/gps", &params);
    match params.get("year").map(String::as_str) {
        Some("2022") => (StatusCode::OK, Json(json!(["Monaco", "Spa"]))),
        Some(_) => (StatusCode::OK, Json(json!(["Imola"]))),
        None => server_error("year is required"),
    }
}

async fn sessions(State(state): State<ServerState>, Query(params): Query<Params>) -> Json<Value> {
    state.record("/sessions", &params);
    Json(json!(["FP1", "FP2", "FP3", "Q", "R"]))
}

async fn drivers(State(state): State<ServerState>, Query(params): Query<Params>) -> Json<Value> {
    state.record("/drivers", &params);
    Json(json!(["LEC", "NOR"]))
}

async fn laps(
    State(state): State<ServerState>,
    Query(params): Query<Params>,
) -> (StatusCode, Json<Value>) {
    state.record("/laps", &params);
    match params.get("driver").map(String::as_str) {
        Some("NOR") => server_error("no laps recorded"),
        _ => (StatusCode::OK, Json(json!([1.0, 2.0, 3.0]))),
    }
}

async fn telemetry(State(state): State<ServerState>, Query(params): Query<Params>) -> Json<Value> {
    state.record("/telemetry", &params);
    Json(json!([
        {"Distance": 0.0, "Speed": 95.0, "Throttle": 40, "Brake": false, "X": 10.0, "Y": 5.0, "nGear": 2},
        {"Distance": 12.5, "Speed": 180.0, "Throttle": null, "Brake": false, "X": 20.0, "Y": 7.0, "nGear": 4},
        {"Distance": 25.0, "Speed": 120.0, "Throttle": 0, "Brake": true, "X": null, "Y": 9.0, "nGear": 3}
    ]))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "<html>Internal Server Error</html>")
}

async fn spawn_telemetry_server() -> (String, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/years", get(years))
        .route("/gps", get(gps))
        .route("/sessions", get(sessions))
        .route("/drivers", get(drivers))
        .route("/laps", get(laps))
        .route("/telemetry", get(telemetry))
        .route("/broken", get(broken))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), state)
}

fn client(server_url: &str) -> ApiClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    ApiClient::with_http_client(server_url, http).unwrap()
}

#[derive(Default)]
struct RecordingRenderer {
    rendered: Vec<(Selection, Vec<TelemetrySample>)>,
}

impl ChartRenderer for RecordingRenderer {
    fn render(
        &mut self,
        selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError> {
        self.rendered.push((selection.clone(), samples));
        Ok(())
    }
}

fn controller(server_url: &str) -> CascadingSelectorController<RecordingRenderer> {
    let config = ViewerConfig {
        server_url: server_url.to_string(),
        ..Default::default()
    };
    let (graph, telemetry) = build_cascade(&config, Arc::new(client(server_url))).unwrap();
    CascadingSelectorController::new(
        graph,
        telemetry,
        RecordingRenderer::default(),
        Handle::current(),
    )
}

fn choices(pairs: &[(&str, &str)]) -> Vec<(FieldId, OptionValue)> {
    pairs
        .iter()
        .map(|(field, value)| (FieldId::from(*field), OptionValue::from(*value)))
        .collect()
}

#[tokio::test]
async fn test_option_lists_decode_numbers_and_strings() {
    let (url, _) = spawn_telemetry_server().await;
    let client = client(&url);

    let years = client.option_list("/years", &[]).await.unwrap();
    assert_eq!(years, vec![OptionValue::from("2021"), OptionValue::from("2022")]);

    let laps = client
        .option_list("/laps", &[("driver".to_string(), "LEC".to_string())])
        .await
        .unwrap();
    assert_eq!(
        laps.iter().map(OptionValue::as_str).collect::<Vec<_>>(),
        vec!["1", "2", "3"]
    );
}

#[tokio::test]
async fn test_error_body_is_reported_whatever_the_status() {
    let (url, _) = spawn_telemetry_server().await;
    let client = client(&url);

    let err = client
        .option_list("/laps", &[("driver".to_string(), "NOR".to_string())])
        .await
        .unwrap_err();
    assert!(matches!(err, LaptraceError::ServerReported { .. }));
    assert_eq!(err.to_string(), "no laps recorded");
    assert_eq!(err.kind(), ErrorKind::Fetch);
}

#[tokio::test]
async fn test_non_json_and_unreachable_servers_are_fetch_errors() {
    let (url, _) = spawn_telemetry_server().await;
    let err = client(&url).get_json("/broken", &[]).await.unwrap_err();
    assert!(matches!(err, LaptraceError::MalformedResponse { .. }));
    assert_eq!(err.kind(), ErrorKind::Fetch);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = client(&format!("http://{addr}"))
        .get_json("/years", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, LaptraceError::TransportError { .. }));
    assert_eq!(err.kind(), ErrorKind::Fetch);
}

#[tokio::test]
async fn test_list_shows_first_unset_field() {
    let (url, state) = spawn_telemetry_server().await;
    let mut controller = controller(&url);

    let listed = headless::list_options(&mut controller, &choices(&[("year", "2022")]))
        .await
        .unwrap();
    assert_eq!(
        listed,
        Some((
            "Grand Prix".to_string(),
            vec!["Monaco".to_string(), "Spa".to_string()]
        ))
    );
    assert_eq!(state.last("/gps").unwrap().get("year").unwrap(), "2022");

    let listed = headless::list_options(
        &mut controller,
        &choices(&[
            ("year", "2022"),
            ("gp", "Spa"),
            ("session", "Q"),
            ("driver", "LEC"),
        ]),
    )
    .await
    .unwrap();
    assert_eq!(
        listed,
        Some((
            "Lap".to_string(),
            vec!["Lap 1".to_string(), "Lap 2".to_string(), "Lap 3".to_string()]
        ))
    );
}

#[tokio::test]
async fn test_fetch_sends_cumulative_selection() {
    let (url, state) = spawn_telemetry_server().await;
    let mut controller = controller(&url);

    // out of order on purpose, the walk follows the cascade
    let walk = headless::order_choices(
        &controller,
        choices(&[
            ("lap", "2"),
            ("driver", "LEC"),
            ("year", "2022"),
            ("session", "Q"),
            ("gp", "Monaco"),
        ]),
    )
    .unwrap();
    headless::fetch(&mut controller, &walk).await.unwrap();

    let laps_query = state.last("/laps").unwrap();
    assert_eq!(laps_query.len(), 4);
    assert_eq!(laps_query["driver"], "LEC");

    let query = state.last("/telemetry").unwrap();
    assert_eq!(query["year"], "2022");
    assert_eq!(query["gp"], "Monaco");
    assert_eq!(query["session"], "Q");
    assert_eq!(query["driver"], "LEC");
    assert_eq!(query["lap"], "2");

    let (selection, samples) = &controller.renderer().rendered[0];
    assert_eq!(selection.len(), 5);
    assert_eq!(samples.len(), 3);
    assert!(samples[1].throttle.is_nan());
    assert_eq!(samples[2].brake, 1.);
    assert!(samples[2].x.is_nan());
    assert_eq!(samples[0].gear, Some(2.));
}

#[tokio::test]
async fn test_fetch_stops_at_the_field_that_failed() {
    let (url, state) = spawn_telemetry_server().await;
    let mut controller = controller(&url);

    let err = headless::fetch(
        &mut controller,
        &choices(&[
            ("year", "2022"),
            ("gp", "Monaco"),
            ("session", "R"),
            ("driver", "NOR"),
            ("lap", "1"),
        ]),
    )
    .await
    .unwrap_err();
    match err {
        LaptraceError::FieldLoadFailed { field, message } => {
            assert_eq!(field, "Lap");
            assert_eq!(message, "no laps recorded");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(state.last("/telemetry").is_none());
    assert!(controller.renderer().rendered.is_empty());
}

#[tokio::test]
async fn test_unknown_choice_is_rejected_before_any_request() {
    let (url, state) = spawn_telemetry_server().await;
    let controller = controller(&url);
    let err = headless::order_choices(&controller, choices(&[("team", "Ferrari")])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(state.requests.lock().unwrap().is_empty());
}
