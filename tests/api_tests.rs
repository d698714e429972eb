mod common;

use reqwest::StatusCode;
use serde_json::json;

use formsink::submission::record::FIELD_NAMES;

// ── Liveness ────────────────────────────────────────────────────

#[tokio::test]
async fn liveness_returns_confirmation() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "Survey backend is running");
}

// ── Submit ──────────────────────────────────────────────────────

#[tokio::test]
async fn submit_saves_to_journal_and_database() {
    let app = common::spawn_app().await;

    let (body, status) = app
        .submit(&json!({ "city_town": "Tampines", "daily_sales": "200" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["id"], json!(1));

    let journal = app.journal().await;
    let entries = journal.as_array().unwrap();
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert!(!entry["timestamp"].as_str().unwrap().is_empty());
    assert_eq!(entry["city_town"], json!("Tampines"));
    assert_eq!(entry["daily_sales"], json!("200"));
    assert_eq!(entry["payment_type"], json!(""));
    assert_eq!(entry["bottled_water_brands"], json!(""));
}

#[tokio::test]
async fn submit_assigns_sequential_ids() {
    let app = common::spawn_app().await;

    let (first, _) = app.submit(&json!({ "city_town": "Bedok" })).await;
    let (second, _) = app.submit(&json!({ "city_town": "Yishun" })).await;

    assert_eq!(first["id"], json!(1));
    assert_eq!(second["id"], json!(2));
}

#[tokio::test]
async fn submit_normalizes_every_known_field() {
    let app = common::spawn_app().await;

    let (_, status) = app.submit(&json!({ "city_town": "Hougang" })).await;
    assert_eq!(status, StatusCode::OK);

    let journal = app.journal().await;
    let entry = &journal.as_array().unwrap()[0];
    for name in FIELD_NAMES {
        assert!(
            entry[name].is_string(),
            "field {name} missing or not a string in journal entry"
        );
    }
}

#[tokio::test]
async fn submit_overrides_client_timestamp() {
    let app = common::spawn_app().await;

    let (_, status) = app
        .submit(&json!({ "timestamp": "1999-01-01T00:00:00.000Z", "city_town": "Bishan" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let journal = app.journal().await;
    let stamp = journal[0]["timestamp"].as_str().unwrap().to_string();
    assert_ne!(stamp, "1999-01-01T00:00:00.000Z");
    assert!(stamp.starts_with("20"));
}

#[tokio::test]
async fn submit_timestamps_are_monotone() {
    let app = common::spawn_app().await;

    app.submit(&json!({ "city_town": "first" })).await;
    app.submit(&json!({ "city_town": "second" })).await;

    let journal = app.journal().await;
    let first = journal[0]["timestamp"].as_str().unwrap();
    let second = journal[1]["timestamp"].as_str().unwrap();
    // RFC 3339 with fixed millisecond precision compares lexicographically
    assert!(first <= second);
}

#[tokio::test]
async fn submit_drops_unknown_fields() {
    let app = common::spawn_app().await;

    let (_, status) = app
        .submit(&json!({ "city_town": "Clementi", "favorite_color": "green" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let journal = app.journal().await;
    assert!(journal[0].get("favorite_color").is_none());
}

#[tokio::test]
async fn submit_accepts_form_urlencoded() {
    let app = common::spawn_app().await;

    let (body, status) = app
        .submit_form(&[("city_town", "Jurong"), ("daily_sales", "150")])
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let journal = app.journal().await;
    assert_eq!(journal[0]["city_town"], json!("Jurong"));
    assert_eq!(journal[0]["daily_sales"], json!("150"));
}

#[tokio::test]
async fn submit_rejects_malformed_body() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .post(app.url("/submit"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_recovers_from_corrupt_journal() {
    let app = common::spawn_app().await;

    tokio::fs::write(app.journal_path(), "not a json array")
        .await
        .unwrap();

    let (body, status) = app.submit(&json!({ "city_town": "Punggol" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let journal = app.journal().await;
    let entries = journal.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["city_town"], json!("Punggol"));
}

// ── Responses listing ───────────────────────────────────────────

#[tokio::test]
async fn responses_are_most_recent_first() {
    let app = common::spawn_app().await;

    app.submit(&json!({ "city_town": "first" })).await;
    app.submit(&json!({ "city_town": "second" })).await;
    app.submit(&json!({ "city_town": "third" })).await;

    let (body, status) = app.get_json("/responses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert_eq!(data[0]["id"], json!(3));
    assert_eq!(data[0]["city_town"], json!("third"));
    assert_eq!(data[2]["id"], json!(1));
    assert_eq!(data[2]["city_town"], json!("first"));
}

#[tokio::test]
async fn responses_empty_when_nothing_submitted() {
    let app = common::spawn_app().await;

    let (body, status) = app.get_json("/responses").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

// ── CSV export ──────────────────────────────────────────────────

#[tokio::test]
async fn export_csv_is_oldest_first_with_fixed_header() {
    let app = common::spawn_app().await;

    app.submit(&json!({ "city_town": "first" })).await;
    app.submit(&json!({ "city_town": "second" })).await;

    let resp = app.client.get(app.url("/export-csv")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    assert!(
        resp.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("attachment")
    );

    let text = resp.text().await.unwrap();
    let rows = parse_csv(&text);

    let mut header = vec!["id".to_string(), "timestamp".to_string()];
    header.extend(FIELD_NAMES.iter().map(|s| s.to_string()));
    assert_eq!(rows[0], header);

    assert_eq!(rows[1][0], "1");
    assert_eq!(rows[2][0], "2");

    let city_col = rows[0].iter().position(|h| h == "city_town").unwrap();
    assert_eq!(rows[1][city_col], "first");
    assert_eq!(rows[2][city_col], "second");
}

#[tokio::test]
async fn export_csv_round_trips_hostile_values() {
    let app = common::spawn_app().await;

    let hostile = "said \"hello, world\"\nand more";
    app.submit(&json!({ "location_name": hostile })).await;

    let resp = app.client.get(app.url("/export-csv")).send().await.unwrap();
    let text = resp.text().await.unwrap();
    let rows = parse_csv(&text);

    let col = rows[0].iter().position(|h| h == "location_name").unwrap();
    assert_eq!(rows[1][col], hostile);
}

// ── Raw database download ───────────────────────────────────────

#[tokio::test]
async fn download_db_serves_the_sqlite_file() {
    let app = common::spawn_app().await;

    app.submit(&json!({ "city_town": "Sengkang" })).await;

    let resp = app.client.get(app.url("/download-db")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/octet-stream"
    );

    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"SQLite format 3\0"));
}

// ── Helpers ─────────────────────────────────────────────────────

/// Minimal RFC 4180 reader: quoted fields, doubled quotes, LF rows.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' => in_quotes = true,
                ',' => row.push(std::mem::take(&mut field)),
                '\n' => {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                _ => field.push(c),
            }
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}
