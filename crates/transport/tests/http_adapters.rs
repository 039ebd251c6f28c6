use beacon_core::model::Endpoint;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use transport::http::{HttpAnalyticsSource, HttpEventSink};
use transport::{AnalyticsSource, EventSink, SourceError, TransportError};

/// Serves exactly one canned response and hands back the raw request.
async fn one_shot_server(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}/api", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0_u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (base_url, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some((head, body)) = text.split_once("\r\n\r\n") else {
        return false;
    };
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    body.len() >= length
}

#[tokio::test]
async fn sink_posts_json_to_track_endpoint() {
    let (base_url, server) = one_shot_server("200 OK", "{}".into()).await;
    let sink = HttpEventSink::new(&base_url);

    sink.send(Endpoint::TRACK_PATH, &json!({ "pageUrl": "/seeds" }))
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/analytics/track HTTP/1.1"));
    assert!(request.contains("\"pageUrl\":\"/seeds\""));
}

#[tokio::test]
async fn sink_reports_non_success_status() {
    let (base_url, server) = one_shot_server("503 Service Unavailable", "{}".into()).await;
    let sink = HttpEventSink::new(&base_url);

    let err = sink
        .send(Endpoint::EVENT_PATH, &json!({ "eventName": "x" }))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::HttpStatus(status) if status.as_u16() == 503));
    server.await.unwrap();
}

#[tokio::test]
async fn sink_reports_connection_failure() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = HttpEventSink::new(&format!("http://{addr}"));
    let err = sink
        .send(Endpoint::TRACK_PATH, &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
}

#[tokio::test]
async fn source_reads_summary_envelope() {
    let body = json!({
        "success": true,
        "message": "Analytics summary retrieved successfully",
        "data": {
            "totalVisits": 120,
            "uniqueSessions": 40,
            "totalContacts": 6,
            "avgTimeOnPage": 42.5,
            "contactConversionRate": 5.0,
            "deviceDistribution": { "mobile": 70, "desktop": 50 },
            "dailyPageVisitTrends": { "2023-11-13": 60, "2023-11-14": 60 },
            "dailyContactTrends": { "2023-11-14": 6 },
            "performanceMetrics": { "visitGrowthRate": 12.5 }
        }
    })
    .to_string();
    let (base_url, server) = one_shot_server("200 OK", body).await;
    let source = HttpAnalyticsSource::new(&base_url);

    let summary = source.summary().await.unwrap();
    assert_eq!(summary.total_visits, 120);
    assert_eq!(summary.device_distribution.get("mobile"), Some(&70));
    assert!((summary.performance_metrics.visit_growth_rate - 12.5).abs() < f64::EPSILON);
    let series = summary.trend_series();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].contacts, 0);
    assert_eq!(series[1].contacts, 6);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/analytics/summary HTTP/1.1"));
}

#[tokio::test]
async fn source_sends_limit_query() {
    let body = json!({
        "success": true,
        "data": [ { "pageUrl": "/", "pageTitle": "Home", "visitCount": 9 } ]
    })
    .to_string();
    let (base_url, server) = one_shot_server("200 OK", body).await;
    let source = HttpAnalyticsSource::new(&base_url);

    let pages = source.most_visited_pages(5).await.unwrap();
    assert_eq!(pages[0].visit_count, 9);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/analytics/most-visited-pages?limit=5 HTTP/1.1"));
}

#[tokio::test]
async fn source_surfaces_server_errors() {
    let body = json!({ "success": false, "message": "Failed to retrieve daily trends" }).to_string();
    let (base_url, server) = one_shot_server("500 Internal Server Error", body).await;
    let source = HttpAnalyticsSource::new(&base_url);

    let err = source.daily_trends(7).await.unwrap_err();
    assert!(matches!(err, SourceError::HttpStatus(status) if status.as_u16() == 500));
    server.await.unwrap();
}
