// tests/http_fetcher_test.rs

use std::thread;
use std::time::Duration;

use swarmsync::error::FetchError;
use swarmsync::trackers::{HttpFetcher, TrackerFetcher};
use tiny_http::{Response, Server, StatusCode};

/// Serve `requests` requests with `status` and `body`, after `delay`.
fn serve(status: u16, body: &'static str, delay: Duration, requests: usize) -> String {
    let server = Server::http("127.0.0.1:0").expect("bind local server");
    let addr = server
        .server_addr()
        .to_ip()
        .expect("tcp listener address");
    thread::spawn(move || {
        for _ in 0..requests {
            let Ok(request) = server.recv() else {
                return;
            };
            let accepts_text = request
                .headers()
                .iter()
                .any(|h| h.field.equiv("Accept") && h.value.as_str() == "text/plain");
            thread::sleep(delay);
            let response = if accepts_text {
                Response::from_string(body).with_status_code(StatusCode(status))
            } else {
                Response::from_string("missing accept header").with_status_code(StatusCode(406))
            };
            let _ = request.respond(response);
        }
    });
    format!("http://{}/trackers_best.txt", addr)
}

#[tokio::test]
async fn fetch_returns_the_body() {
    let body = "https://tracker.example:443/announce\n\nwss://tracker.example\n";
    let url = serve(200, body, Duration::ZERO, 1);
    let fetcher = HttpFetcher::new().unwrap();

    let text = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();
    assert_eq!(text, body);
}

#[tokio::test]
async fn non_success_status_is_a_network_error() {
    let url = serve(404, "not found", Duration::ZERO, 1);
    let fetcher = HttpFetcher::new().unwrap();

    let err = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap_err();
    match err {
        FetchError::Network { url: failed, reason } => {
            assert_eq!(failed, url);
            assert!(reason.contains("404"), "unexpected reason: {}", reason);
        }
        other => panic!("expected a network error, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let url = serve(200, "https://late.example/announce", Duration::from_secs(3), 1);
    let fetcher = HttpFetcher::new().unwrap();
    let timeout = Duration::from_millis(200);

    let err = fetcher.fetch(&url, timeout).await.unwrap_err();
    assert_eq!(err, FetchError::TimedOut { url, timeout });
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    // Bind then drop to get a port with nothing listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{}/trackers.txt", port);
    let fetcher = HttpFetcher::new().unwrap();

    let err = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, FetchError::Network { .. }));
}
