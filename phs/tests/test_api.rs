use axum_test::TestServer;
use config::{Config, File};
use phs::api::exporter::metrics_router;
use phs::api::router::ApiRoutes;
use phs::app_state::{AppState, SharedAppState};
use phs::settings::config::Settings;
use phs::stop_flag::StopFlag;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn app_state(overrides: &[(&str, &str)]) -> SharedAppState {
    let mut builder = Config::builder().add_source(File::with_name("tests/test_settings"));
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value).unwrap();
    }
    let settings: Settings = builder.build().unwrap().try_deserialize().unwrap();
    AppState::from_settings(settings, StopFlag::new()).unwrap()
}

async fn cheap_upstream() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cheap"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Cheap"))
        .mount(&mock_server)
        .await;
    mock_server
}

async fn scrape(state: &SharedAppState) -> String {
    let server = TestServer::new(metrics_router(state.registry.clone())).unwrap();
    let response = server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);
    response.text()
}

#[tokio::test]
async fn test_cheap_is_counted() {
    let state = app_state(&[]);
    let server = TestServer::new(ApiRoutes::create(state.clone())).unwrap();

    for _ in 0..3 {
        let response = server.get("/cheap").await;
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.text(), "Cheap");
    }

    let text = scrape(&state).await;
    assert!(
        text.contains(r#"http_server_requests_total{code="200",handler="cheap",method="GET"} 3"#),
        "{text}"
    );
    assert!(text.contains(
        r#"http_server_response_size_sum{code="200",handler="cheap",method="GET"} 5"#
    ));
    assert!(text.contains("http_server_requests_inflight 0"));
    assert!(!text.contains("http_server_request_size"));
}

#[tokio::test]
async fn test_cheap_failures_are_labeled() {
    let state = app_state(&[("demo.failure_rate", "1.0")]);
    let server = TestServer::new(ApiRoutes::create(state.clone())).unwrap();

    let response = server.get("/cheap").expect_failure().await;
    assert_eq!(response.status_code(), 500);

    let text = scrape(&state).await;
    assert!(text.contains(r#"http_server_requests_total{code="500",handler="cheap",method="GET"} 1"#));
}

#[tokio::test]
async fn test_expensive_calls_cheap_through_monitored_client() {
    let upstream = cheap_upstream().await;
    let cheap_url = format!("{}/cheap", upstream.uri());
    let state = app_state(&[("demo.cheap_url", cheap_url.as_str())]);
    let server = TestServer::new(ApiRoutes::create(state.clone())).unwrap();

    let response = server.get("/expensive").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().ends_with("Seconds"));

    let text = scrape(&state).await;
    assert!(text.contains(
        r#"http_server_requests_total{code="200",handler="expensive",method="GET"} 1"#
    ));
    assert!(text.contains(
        r#"http_client_requests_total{action="expensive",code="200",endpoint="cheap:get",method="GET"} 1"#
    ));
    assert!(text.contains(
        r#"http_server_request_duration_percentile_count{code="200",handler="expensive",method="GET"} 1"#
    ));
}

#[tokio::test]
async fn test_expensive_fails_when_upstream_is_down() {
    // Port 1 refuses connections.
    let state = app_state(&[]);
    let server = TestServer::new(ApiRoutes::create(state.clone())).unwrap();

    let response = server.get("/expensive").expect_failure().await;
    assert_eq!(response.status_code(), 500);

    let text = scrape(&state).await;
    assert!(text.contains(
        r#"http_server_requests_total{code="500",handler="expensive",method="GET"} 1"#
    ));
    assert!(!text.contains("http_client_requests_total{"));
}

#[tokio::test]
async fn test_unknown_paths() {
    let state = app_state(&[]);
    let api = TestServer::new(ApiRoutes::create(state.clone())).unwrap();
    let response = api.get("/unknown").expect_failure().await;
    assert_eq!(response.status_code(), 404);

    let exporter = TestServer::new(metrics_router(state.registry.clone())).unwrap();
    let response = exporter.get("/other").expect_failure().await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_separate_states_do_not_conflict() {
    let first = app_state(&[]);
    let second = app_state(&[]);
    assert!(!scrape(&first).await.is_empty());
    assert!(!scrape(&second).await.is_empty());
}
