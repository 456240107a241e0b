//! Pagination, caching, rate-limit and failure-mode tests for the ledger
//! sync engine, with Horizon mocked at the HTTP level.

mod common;

use common::*;
use std::io::Write;
use std::time::Duration;

use lumenpay_core::services::ledger_sync::{LedgerSyncEngine, SyncConfig, SyncError};
use lumenpay_core::stellar::HorizonClient;

const ACCOUNT: &str = "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ";

fn test_config() -> SyncConfig {
    SyncConfig {
        page_size: 2,
        page_delay: Duration::ZERO,
        max_pages: 10,
    }
}

fn engine(server_url: &str) -> LedgerSyncEngine {
    LedgerSyncEngine::new(horizon(server_url), test_config())
}

fn op_record(id: &str, token: &str, tx_hash: &str, created_at: Option<&str>) -> String {
    let created = created_at
        .map(|ts| format!(r#", "created_at": "{}""#, ts))
        .unwrap_or_default();
    format!(
        r#"{{"id": "{id}", "paging_token": "{token}", "type": "payment",
            "source_account": "GPAYER", "from": "GPAYER", "to": "{ACCOUNT}",
            "amount": "10.0000000", "asset_code": "PI",
            "transaction_hash": "{tx_hash}"{created}}}"#
    )
}

fn page_body(records: &[String]) -> String {
    format!(r#"{{"_embedded": {{"records": [{}]}}}}"#, records.join(","))
}

async fn mock_page(
    server: &mut mockito::ServerGuard,
    cursor: Option<&str>,
    body: String,
) -> mockito::Mock {
    let query = match cursor {
        Some(c) => format!("order=asc&limit=2&cursor={}", c),
        None => "order=asc&limit=2".to_string(),
    };
    server
        .mock("GET", format!("/accounts/{}/operations", ACCOUNT).as_str())
        .match_query(mockito::Matcher::Exact(query))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn test_three_pages_then_empty_yields_six_operations() {
    let mut server = mockito::Server::new_async().await;
    let _p1 = mock_page(
        &mut server,
        None,
        page_body(&[
            op_record("op1", "pt1", "h1", Some("2024-03-01T00:00:01Z")),
            op_record("op2", "pt2", "h1", Some("2024-03-01T00:00:02Z")),
        ]),
    )
    .await;
    let _p2 = mock_page(
        &mut server,
        Some("pt2"),
        page_body(&[
            op_record("op3", "pt3", "h2", Some("2024-03-01T00:00:03Z")),
            op_record("op4", "pt4", "h2", Some("2024-03-01T00:00:04Z")),
        ]),
    )
    .await;
    let _p3 = mock_page(
        &mut server,
        Some("pt4"),
        page_body(&[
            op_record("op5", "pt5", "h3", Some("2024-03-01T00:00:05Z")),
            op_record("op6", "pt6", "h3", Some("2024-03-01T00:00:06Z")),
        ]),
    )
    .await;
    let _empty = mock_page(&mut server, Some("pt6"), page_body(&[])).await;

    let report = engine(&server.url()).sync_operations(ACCOUNT, None).await;

    assert!(report.error.is_none());
    assert_eq!(report.pages_fetched, 4);
    assert_eq!(report.operations.len(), 6);
    let ids: Vec<&str> = report.operations.iter().map(|op| op.id.as_str()).collect();
    assert_eq!(ids, vec!["op1", "op2", "op3", "op4", "op5", "op6"]);
    // Ascending ledger order is preserved end to end.
    for window in report.operations.windows(2) {
        assert!(window[0].ledger_time <= window[1].ledger_time);
    }
    assert_eq!(report.last_cursor.as_deref(), Some("pt6"));
}

#[tokio::test]
async fn test_missing_timestamps_resolved_once_per_transaction() {
    let mut server = mockito::Server::new_async().await;
    // Both operations belong to the same transaction and lack timestamps.
    let _p1 = mock_page(
        &mut server,
        None,
        page_body(&[
            op_record("op1", "pt1", "h1", None),
            op_record("op2", "pt2", "h1", None),
        ]),
    )
    .await;
    let _empty = mock_page(&mut server, Some("pt2"), page_body(&[])).await;

    // The per-run cache must collapse both lookups into one request.
    let tx_mock = server
        .mock("GET", "/transactions/h1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"hash": "h1", "successful": true, "created_at": "2024-03-05T09:30:00Z"}"#)
        .expect(1)
        .create_async()
        .await;

    let report = engine(&server.url()).sync_operations(ACCOUNT, None).await;

    assert!(report.error.is_none());
    assert_eq!(report.operations.len(), 2);
    for op in &report.operations {
        assert_eq!(
            op.ledger_time.to_rfc3339(),
            "2024-03-05T09:30:00+00:00"
        );
    }
    tx_mock.assert_async().await;
}

#[tokio::test]
async fn test_page_failure_surfaces_partial_result() {
    let mut server = mockito::Server::new_async().await;
    let _p1 = mock_page(
        &mut server,
        None,
        page_body(&[
            op_record("op1", "pt1", "h1", Some("2024-03-01T00:00:01Z")),
            op_record("op2", "pt2", "h1", Some("2024-03-01T00:00:02Z")),
        ]),
    )
    .await;
    let _p2 = server
        .mock("GET", format!("/accounts/{}/operations", ACCOUNT).as_str())
        .match_query(mockito::Matcher::Exact(
            "order=asc&limit=2&cursor=pt2".to_string(),
        ))
        .with_status(500)
        .create_async()
        .await;

    let report = engine(&server.url()).sync_operations(ACCOUNT, None).await;

    // Work already done is kept; the failure rides alongside it.
    assert_eq!(report.operations.len(), 2);
    assert!(report.is_partial());
    let err = report.error.unwrap();
    assert_eq!(err.kind(), "upstream_unavailable");
    assert!(matches!(err, SyncError::Upstream { page: 2, .. }));
    assert_eq!(report.last_cursor.as_deref(), Some("pt2"));
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let mut server = mockito::Server::new_async().await;
    let _slow = server
        .mock("GET", format!("/accounts/{}/operations", ACCOUNT).as_str())
        .match_query(mockito::Matcher::Any)
        .with_chunked_body(|writer| {
            std::thread::sleep(Duration::from_millis(500));
            writer.write_all(b"{\"_embedded\": {\"records\": []}}")
        })
        .create_async()
        .await;

    let client = HorizonClient::new(server.url(), Duration::from_millis(100));
    let engine = LedgerSyncEngine::new(client, test_config());
    let report = engine.sync_operations(ACCOUNT, None).await;

    assert!(report.operations.is_empty());
    let err = report.error.expect("run must fail with a timeout");
    assert_eq!(err.kind(), "upstream_timeout");
    assert!(matches!(err, SyncError::Timeout { page: 1, .. }));
}

#[tokio::test]
async fn test_resume_cursor_is_passed_upstream() {
    let mut server = mockito::Server::new_async().await;
    let resumed = mock_page(
        &mut server,
        Some("pt9"),
        page_body(&[op_record("op10", "pt10", "h9", Some("2024-03-02T00:00:00Z"))]),
    )
    .await;
    let _empty = mock_page(&mut server, Some("pt10"), page_body(&[])).await;

    let report = engine(&server.url())
        .sync_operations(ACCOUNT, Some("pt9".to_string()))
        .await;

    resumed.assert_async().await;
    assert!(report.error.is_none());
    assert_eq!(report.operations.len(), 1);
    assert_eq!(report.last_cursor.as_deref(), Some("pt10"));
}

#[tokio::test]
async fn test_repeated_records_are_not_duplicated() {
    let mut server = mockito::Server::new_async().await;
    let _p1 = mock_page(
        &mut server,
        None,
        page_body(&[
            op_record("op1", "pt1", "h1", Some("2024-03-01T00:00:01Z")),
            op_record("op2", "pt2", "h1", Some("2024-03-01T00:00:02Z")),
        ]),
    )
    .await;
    // A misbehaving upstream repeats op2 on the next page.
    let _p2 = mock_page(
        &mut server,
        Some("pt2"),
        page_body(&[
            op_record("op2", "pt2", "h1", Some("2024-03-01T00:00:02Z")),
            op_record("op3", "pt3", "h2", Some("2024-03-01T00:00:03Z")),
        ]),
    )
    .await;
    let _empty = mock_page(&mut server, Some("pt3"), page_body(&[])).await;

    let report = engine(&server.url()).sync_operations(ACCOUNT, None).await;

    assert!(report.error.is_none());
    let ids: Vec<&str> = report.operations.iter().map(|op| op.id.as_str()).collect();
    assert_eq!(ids, vec!["op1", "op2", "op3"]);
}

#[tokio::test]
async fn test_timestamp_lookup_failure_aborts_with_partial_result() {
    let mut server = mockito::Server::new_async().await;
    let _p1 = mock_page(
        &mut server,
        None,
        page_body(&[
            op_record("op1", "pt1", "h1", Some("2024-03-01T00:00:01Z")),
            op_record("op2", "pt2", "h2", None),
        ]),
    )
    .await;
    let _tx = server
        .mock("GET", "/transactions/h2")
        .with_status(500)
        .create_async()
        .await;

    let report = engine(&server.url()).sync_operations(ACCOUNT, None).await;

    assert_eq!(report.operations.len(), 1);
    assert_eq!(report.operations[0].id, "op1");
    assert!(report.is_partial());
    assert_eq!(report.last_cursor.as_deref(), Some("pt1"));
}

#[tokio::test]
async fn test_max_pages_bounds_the_run() {
    let mut server = mockito::Server::new_async().await;
    // Every page, any cursor, returns the same "next" record: an unbounded
    // upstream would loop forever.
    let _loop_page = server
        .mock("GET", format!("/accounts/{}/operations", ACCOUNT).as_str())
        .match_query(mockito::Matcher::Regex("order=asc".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page_body(&[op_record(
            "op1",
            "pt1",
            "h1",
            Some("2024-03-01T00:00:01Z"),
        )]))
        .expect_at_least(3)
        .create_async()
        .await;

    let config = SyncConfig {
        page_size: 2,
        page_delay: Duration::ZERO,
        max_pages: 3,
    };
    let engine = LedgerSyncEngine::new(horizon(&server.url()), config);
    let report = engine.sync_operations(ACCOUNT, None).await;

    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.operations.len(), 1);
}
