use std::convert::Infallible;
use std::sync::Arc;

use actix_web::web::{self, Bytes};
use actix_web::{HttpResponse, get};
use futures::StreamExt;
use pulse::PollResponse;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::{AppState, LISTING_KEY, POLL_KEY};

macros_utils::routes! {
    route status,
    route stream,
    route resources,
}

/// Current status of every enabled resource, cached for a short TTL
#[get("/api/monitoring")]
pub async fn status(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if let Some(cached) = state.poll_cache.get(POLL_KEY) {
        return Ok(HttpResponse::Ok().json(cached.as_ref()));
    }

    let _guard = state.poll_refresh.lock().await;
    if let Some(cached) = state.poll_cache.get(POLL_KEY) {
        return Ok(HttpResponse::Ok().json(cached.as_ref()));
    }

    let refresh = state.poll.refresh().await?;
    let response = Arc::new(PollResponse::new(&refresh.report, &refresh.summary));
    state.poll_cache.set(POLL_KEY, response.clone(), None);
    debug!(total = refresh.summary.total, "poll snapshot refreshed");

    Ok(HttpResponse::Ok().json(response.as_ref()))
}

/// Server-sent events, one compact frame per interval until the client goes away
#[get("/api/monitoring/stream")]
pub async fn stream(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let producer = state.stream_producer();
    let cancel = state.shutdown.child_token();
    info!("status stream opened");

    let frames = producer
        .into_frames(state.settings.monitor.stream_interval(), cancel)
        .map(|frame| Ok::<_, Infallible>(Bytes::from(frame.to_sse())));

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(frames))
}

/// Every configured resource, disabled ones included
#[get("/api/monitoring/resources")]
pub async fn resources(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if let Some(cached) = state.listing_cache.get(LISTING_KEY) {
        return Ok(HttpResponse::Ok().json(cached.as_ref()));
    }

    let resolver = state.resolver.clone();
    let listing = Arc::new(web::block(move || resolver.list_all()).await?);
    state.listing_cache.set(LISTING_KEY, listing.clone(), None);

    Ok(HttpResponse::Ok().json(listing.as_ref()))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::future::poll_fn;
    use std::path::Path;
    use std::time::{Duration, Instant};

    use actix_web::body::MessageBody;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use pulse::{PulseError, ResourceSet, ResourceSource, Settings};

    use super::*;

    fn settings(dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.stores.dir = Some(dir.to_path_buf());
        settings.monitor.stream_interval = 1;
        settings
    }

    fn state(dir: &Path) -> web::Data<AppState> {
        web::Data::new(AppState::new(settings(dir)).unwrap())
    }

    struct OfflineStores;

    #[async_trait::async_trait]
    impl ResourceSource for OfflineStores {
        async fn load(&self) -> Result<ResourceSet, PulseError> {
            Err(PulseError::Source("stores offline".into()))
        }
    }

    #[actix_web::test]
    async fn test_poll_empty_stores() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(state(dir.path())).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/monitoring").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        assert_eq!(json["websites"], serde_json::json!([]));
        assert_eq!(json["summary"]["total"], 0);
        assert_eq!(json["summary"]["health_percent"], 0.0);
    }

    #[actix_web::test]
    async fn test_poll_failure_is_json_500() {
        let dir = tempfile::tempdir().unwrap();
        let state = web::Data::new(AppState::with_source(settings(dir.path()), Arc::new(OfflineStores)).unwrap());
        let app = test::init_service(App::new().app_data(state).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/monitoring").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(json, serde_json::json!({"error": "resource source failed: stores offline"}));
    }

    #[actix_web::test]
    async fn test_poll_reports_unknown_for_unsupported_resources() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("monitoring.yaml"),
            "apps:\n  - name: fn\n    type: lambda\n  - name: api\n    type: http\n  - name: worker\n    type: process\n\
             servers:\n  - name: legacy\n    host: 10.0.0.9\n    check_type: telnet\n",
        )
        .unwrap();
        let app = test::init_service(App::new().app_data(state(dir.path())).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/monitoring").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        let messages: Vec<(&str, &str)> = json["apps"]
            .as_array()
            .unwrap()
            .iter()
            .chain(json["servers"].as_array().unwrap())
            .map(|entry| {
                assert_eq!(entry["status"], "unknown", "{entry}");
                (entry["name"].as_str().unwrap(), entry["message"].as_str().unwrap())
            })
            .collect();
        assert_eq!(
            messages,
            [
                ("fn", "Unsupported app type 'lambda'"),
                ("api", "No health endpoint"),
                ("worker", "No process pattern configured"),
                ("legacy", "Unsupported check type 'telnet'"),
            ]
        );
        assert_eq!(json["summary"]["unknown"], 4);
    }

    #[actix_web::test]
    async fn test_poll_commands_stay_within_their_timeouts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("monitoring.yaml"),
            "apps:\n\
             \x20 - name: detached\n    type: command\n    command: sh -c 'sleep 4 & exit 0'\n    timeout: 1\n\
             \x20 - name: stuck\n    type: command\n    command: sleep 10\n    timeout: 1\n",
        )
        .unwrap();
        let mut settings = settings(dir.path());
        settings.monitor.worker_threads = 1;
        let state = web::Data::new(AppState::new(settings).unwrap());
        let app = test::init_service(App::new().app_data(state).configure(routes)).await;

        let start = Instant::now();
        let request = test::TestRequest::get().uri("/api/monitoring").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        // one slot: the two commands run back to back, each bounded by its own timeout
        assert!(start.elapsed() < Duration::from_secs(4), "took {:?}", start.elapsed());

        assert_eq!(json["apps"][0]["status"], "online");
        assert_eq!(json["apps"][1]["status"], "offline");
        assert_eq!(json["apps"][1]["message"], "Command timeout after 1s");
    }

    #[actix_web::test]
    async fn test_poll_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(App::new().app_data(state(dir.path())).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/monitoring").to_request();
        let first: serde_json::Value = test::call_and_read_body_json(&app, request).await;

        fs::write(
            dir.path().join("monitoring.yaml"),
            "apps:\n  - name: fn\n    type: lambda\n    identifier: handler\n",
        )
        .unwrap();

        let request = test::TestRequest::get().uri("/api/monitoring").to_request();
        let second: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(first["summary"], second["summary"]);
        assert_eq!(second["apps"], serde_json::json!([]));
    }

    #[actix_web::test]
    async fn test_resources_include_disabled() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("websites.yaml"),
            "websites:\n  docs:\n    url: https://docs.example.com\n    enabled: false\n",
        )
        .unwrap();
        let app = test::init_service(App::new().app_data(state(dir.path())).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/monitoring/resources").to_request();
        let json: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(json["websites"][0]["name"], "docs");
        assert_eq!(json["websites"][0]["enabled"], false);
    }

    #[actix_web::test]
    async fn test_stream_pushes_frames_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("monitoring.yaml"),
            "apps:\n  - name: fn\n    type: lambda\n    identifier: handler\n",
        )
        .unwrap();
        let state = state(dir.path());
        let app = test::init_service(App::new().app_data(state.clone()).configure(routes)).await;

        let request = test::TestRequest::get().uri("/api/monitoring/stream").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.headers().get("content-type").unwrap(), "text/event-stream");

        let mut body = Box::pin(response.into_body());
        let chunk = poll_fn(|cx| body.as_mut().poll_next(cx)).await.unwrap().unwrap();
        let text = std::str::from_utf8(&chunk).unwrap();
        assert!(text.starts_with("data: "));
        assert!(text.ends_with("\n\n"));

        let frame: serde_json::Value = serde_json::from_str(text["data: ".len()..].trim()).unwrap();
        assert_eq!(frame["apps"][0], serde_json::json!({"name": "fn", "status": "unknown", "response_time": null}));
        assert_eq!(frame["summary"]["unknown"], 1);

        state.shutdown.cancel();
        assert!(poll_fn(|cx| body.as_mut().poll_next(cx)).await.is_none());
    }
}
