#[cfg(test)]
mod tests {
    use hyper::{body, Client};
    use serde_json::json;
    use std::{net::SocketAddr, sync::Arc};
    use tapedeck::{
        fixture_file_name, CaptureFile, FileStorage, FixtureStorage, HyperTransport,
        InterceptionProxy, MatchingConfiguration, RequestDescriptor, SessionController,
        SessionMode, SessionReport,
    };
    use tempfile::TempDir;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn controller(dir: &TempDir) -> Arc<SessionController> {
        Arc::new(SessionController::new(
            Arc::new(FileStorage::new(dir.path())),
            Arc::new(HyperTransport::new()),
        ))
    }

    fn fixture(dir: &TempDir, session_name: &str) -> CaptureFile {
        let storage = FileStorage::new(dir.path());
        let contents = storage.read(&fixture_file_name(session_name)).unwrap();

        serde_json::from_str(&contents).unwrap()
    }

    async fn live_calls(upstream: &MockServer) -> usize {
        upstream
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn get(url: &str) -> (u16, String) {
        let response = Client::new().get(url.parse().unwrap()).await.unwrap();
        let status = response.status().as_u16();
        let bytes = body::to_bytes(response.into_body()).await.unwrap();

        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn upstream_with_json(route: &str, body: serde_json::Value) -> MockServer {
        let upstream = MockServer::start().await;
        Mock::given(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&upstream)
            .await;

        upstream
    }

    #[tokio::test]
    async fn capture_then_replay_through_the_proxy() {
        let upstream = upstream_with_json("/posts/1", json!({"id": 1, "title": "hello"})).await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);
        let proxy = InterceptionProxy::start(
            SocketAddr::from(([127, 0, 0, 1], 0)),
            upstream.uri(),
            controller.clone(),
        )
        .unwrap();
        let url = format!("{}/posts/1", proxy.url());

        controller
            .start("t1", MatchingConfiguration::new())
            .await
            .unwrap();
        let (status, recorded) = get(&url).await;
        let report = controller.end().await.unwrap();

        assert_eq!(status, 200);
        assert_eq!(
            report,
            SessionReport {
                mode: SessionMode::Capturing,
                was_replayed: false
            }
        );
        let capture_file = fixture(&dir, "t1");
        assert_eq!(capture_file.meta.session_name, "t1");
        assert_eq!(capture_file.exchanges.len(), 1);
        assert_eq!(
            capture_file.exchanges[0].request.url,
            format!("{}/posts/1", upstream.uri())
        );

        controller
            .start("t1", MatchingConfiguration::new())
            .await
            .unwrap();
        let (status, replayed) = get(&url).await;
        let report = controller.end().await.unwrap();

        assert_eq!(status, 200);
        assert_eq!(
            report,
            SessionReport {
                mode: SessionMode::Playing,
                was_replayed: true
            }
        );
        assert_eq!(live_calls(&upstream).await, 1);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&replayed).unwrap(),
            serde_json::from_str::<serde_json::Value>(&recorded).unwrap()
        );
    }

    #[tokio::test]
    async fn excluded_query_params_do_not_break_replay() {
        let upstream = upstream_with_json("/x", json!({"value": 42})).await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);
        let mut configuration = MatchingConfiguration::new();
        configuration.set_exclude_query_params(vec!["ts"]);

        controller.start("b", configuration.clone()).await.unwrap();
        controller
            .dispatch(RequestDescriptor::new(
                "GET",
                format!("{}/x?ts=1", upstream.uri()),
            ))
            .await
            .unwrap();
        controller.end().await.unwrap();

        assert_eq!(
            fixture(&dir, "b").exchanges[0].request.url,
            format!("{}/x", upstream.uri())
        );

        controller.start("b", configuration).await.unwrap();
        let response = controller
            .dispatch(RequestDescriptor::new(
                "GET",
                format!("{}/x?ts=2", upstream.uri()),
            ))
            .await
            .unwrap();
        let report = controller.end().await.unwrap();

        assert!(report.was_replayed);
        assert_eq!(response.body, r#"{"value":42}"#);
        assert_eq!(live_calls(&upstream).await, 1);
    }

    #[tokio::test]
    async fn headers_are_not_stored_or_matched_by_default() {
        let upstream = upstream_with_json("/profile", json!({"name": "ada"})).await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);
        let url = format!("{}/profile", upstream.uri());

        controller
            .start("c", MatchingConfiguration::new())
            .await
            .unwrap();
        controller
            .dispatch(
                RequestDescriptor::new("GET", url.as_str())
                    .with_header("Authorization", "Bearer first-token")
                    .with_header("X-Request-Id", "a"),
            )
            .await
            .unwrap();
        controller.end().await.unwrap();

        let capture_file = fixture(&dir, "c");
        assert!(capture_file.exchanges[0].request.headers.is_empty());
        assert!(capture_file.exchanges[0].response.headers.is_empty());
        let raw = FileStorage::new(dir.path())
            .read(&fixture_file_name("c"))
            .unwrap();
        assert!(!raw.contains("first-token"));

        controller
            .start("c", MatchingConfiguration::new())
            .await
            .unwrap();
        controller
            .dispatch(
                RequestDescriptor::new("GET", url.as_str())
                    .with_header("Authorization", "Bearer another-token")
                    .with_header("X-Request-Id", "b"),
            )
            .await
            .unwrap();
        let report = controller.end().await.unwrap();

        assert!(report.was_replayed);
        assert_eq!(live_calls(&upstream).await, 1);
    }

    #[tokio::test]
    async fn replay_miss_records_the_new_exchange() {
        let upstream = MockServer::start().await;
        Mock::given(path("/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .mount(&upstream)
            .await;
        Mock::given(path("/y"))
            .respond_with(ResponseTemplate::new(200).set_body_string("y"))
            .mount(&upstream)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        controller
            .start("d", MatchingConfiguration::new())
            .await
            .unwrap();
        controller
            .dispatch(RequestDescriptor::new("GET", format!("{}/x", upstream.uri())))
            .await
            .unwrap();
        controller.end().await.unwrap();
        assert_eq!(fixture(&dir, "d").exchanges.len(), 1);

        let mode = controller
            .start("d", MatchingConfiguration::new())
            .await
            .unwrap();
        let response = controller
            .dispatch(RequestDescriptor::new("GET", format!("{}/y", upstream.uri())))
            .await
            .unwrap();

        assert_eq!(mode, SessionMode::Playing);
        assert_eq!(response.body, "y");
        assert_eq!(fixture(&dir, "d").exchanges.len(), 2);

        let report = controller.end().await.unwrap();

        assert!(!report.was_replayed);
        assert_eq!(live_calls(&upstream).await, 2);
        assert_eq!(fixture(&dir, "d").exchanges.len(), 2);
    }

    #[tokio::test]
    async fn excluded_bodies_collapse_to_one_exchange() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"status": "accepted"})))
            .mount(&upstream)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);
        let url = format!("{}/orders", upstream.uri());
        let mut configuration = MatchingConfiguration::new();
        configuration.set_exclude_body(true);

        controller.start("e", configuration.clone()).await.unwrap();
        for id in 1..=2 {
            controller
                .dispatch(
                    RequestDescriptor::new("POST", url.as_str())
                        .with_body(json!({ "id": id }).to_string()),
                )
                .await
                .unwrap();
        }
        controller.end().await.unwrap();

        let capture_file = fixture(&dir, "e");
        assert_eq!(capture_file.exchanges.len(), 1);
        assert_eq!(capture_file.exchanges[0].request.body, None);
        assert_eq!(live_calls(&upstream).await, 1);

        controller.start("e", configuration).await.unwrap();
        let first = controller
            .dispatch(RequestDescriptor::new("POST", url.as_str()).with_body(r#"{"id":1}"#))
            .await
            .unwrap();
        let second = controller
            .dispatch(RequestDescriptor::new("POST", url.as_str()).with_body(r#"{"id":2}"#))
            .await
            .unwrap();
        controller.end().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.status, 201);
        assert_eq!(live_calls(&upstream).await, 1);
    }

    #[tokio::test]
    async fn failed_responses_leave_no_fixture() {
        let upstream = MockServer::start().await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&upstream)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        controller
            .start("failed", MatchingConfiguration::new())
            .await
            .unwrap();
        let response = controller
            .dispatch(RequestDescriptor::new(
                "GET",
                format!("{}/broken", upstream.uri()),
            ))
            .await
            .unwrap();
        controller.end().await.unwrap();

        assert_eq!(response.status, 500);
        assert!(!FileStorage::new(dir.path()).exists(&fixture_file_name("failed")));
    }

    #[tokio::test]
    async fn failed_responses_replay_when_recorded() {
        let upstream = MockServer::start().await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&upstream)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);
        let url = format!("{}/broken", upstream.uri());
        let mut configuration = MatchingConfiguration::new();
        configuration.set_record_failed_responses(true);

        controller.start("failed", configuration.clone()).await.unwrap();
        controller
            .dispatch(RequestDescriptor::new("GET", url.as_str()))
            .await
            .unwrap();
        controller.end().await.unwrap();

        controller.start("failed", configuration).await.unwrap();
        let response = controller
            .dispatch(RequestDescriptor::new("GET", url.as_str()))
            .await
            .unwrap();
        let report = controller.end().await.unwrap();

        assert_eq!(response.status, 503);
        assert_eq!(response.body, "down");
        assert!(report.was_replayed);
        assert_eq!(live_calls(&upstream).await, 1);
    }

    #[tokio::test]
    async fn shared_interception_point_rejects_a_second_session() {
        let _guard = tapedeck::exclusive_access().await;

        let mode = tapedeck::start_session("empty shared session", None)
            .await
            .unwrap();
        let second = tapedeck::start_session("another session", None).await;
        let report = tapedeck::end_session().await.unwrap();

        assert_eq!(mode, SessionMode::Capturing);
        assert!(matches!(second, Err(tapedeck::Error::AlreadyActive)));
        assert_eq!(report.mode, SessionMode::Capturing);
        assert!(!tapedeck::interception_point().is_active().await);
        assert!(!FileStorage::new(tapedeck::Settings::from_env().fixtures_dir())
            .exists(&fixture_file_name("empty shared session")));
    }

    fn ignore_timestamps(configuration: &mut MatchingConfiguration) {
        configuration.set_exclude_query_params(vec!["ts"]);
    }

    #[tapedeck::session_test("greeting replay")]
    async fn greeting_is_replayed_from_the_committed_fixture() {
        let interception_point = tapedeck::interception_point();
        assert_eq!(interception_point.mode().await, Some(SessionMode::Playing));

        let response = interception_point
            .dispatch(RequestDescriptor::new(
                "GET",
                "http://tapedeck.invalid/greeting?lang=en",
            ))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"greeting":"hello"}"#);
    }

    #[tapedeck::session_test("greeting replay", ignore_timestamps)]
    async fn configuration_function_is_applied() {
        let response = tapedeck::interception_point()
            .dispatch(RequestDescriptor::new(
                "GET",
                "http://tapedeck.invalid/greeting?lang=en&ts=1714642200",
            ))
            .await
            .unwrap();

        assert_eq!(response.body, r#"{"greeting":"hello"}"#);
    }
}
