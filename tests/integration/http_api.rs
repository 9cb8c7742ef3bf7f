//! HTTP surface, driven through the router without a socket.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use pdfcraft::config::Config;
use pdfcraft::server::{self, AppState};
use rstest::rstest;
use serde_json::Value;
use tower::ServiceExt;

use crate::common::{Form, app, memory_storage, page_widths, pdf_with_widths, png};

async fn post_form(app: axum::Router, uri: &str, form: Form) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, Form::content_type())
        .body(Body::from(form.finish()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn get(app: axum::Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn test_health() {
    let (storage, _) = memory_storage();
    let response = get(app(storage), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_status_lists_operations() {
    let (storage, _) = memory_storage();
    let response = get(app(storage), "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    let names: Vec<&str> = json["operations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"merge"));
    assert!(names.contains(&"pdf-to-jpg"));
    assert_eq!(names.len(), 12);
    assert_eq!(json["libraries"]["lopdf"], true);
    assert_eq!(json["operations"][0]["available"], true);
}

#[rstest]
#[case(true)]
#[case(false)]
#[tokio::test]
async fn test_status_reports_renderer(#[case] renderer: bool) {
    let (storage, _) = memory_storage();
    let state = AppState::new(storage, Config::default()).with_renderer(renderer);
    let json = body_json(get(server::router(state), "/api/status").await).await;

    assert_eq!(json["libraries"]["pdfium"], renderer);
    for op in json["operations"].as_array().unwrap() {
        let expected = op["engine"] != "pdfium" || renderer;
        assert_eq!(op["available"], expected, "{}", op["name"]);
    }
    let render = json["operations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|op| op["name"] == "pdf-to-jpg")
        .unwrap();
    assert_eq!(render["engine"], "pdfium");
}

#[tokio::test]
async fn test_merge_returns_attachment_and_download_id() {
    let (storage, _) = memory_storage();
    let app = app(storage);

    let form = Form::new()
        .file("files[]", "a.pdf", &pdf_with_widths(&[101]))
        .file("files[]", "b.pdf", &pdf_with_widths(&[201, 202]));
    let response = post_form(app.clone(), "/api/merge", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), "application/pdf");
    assert_eq!(
        header_str(&response, "content-disposition"),
        "attachment; filename=\"merged.pdf\""
    );
    let id = header_str(&response, "x-download-id").to_string();
    let bytes = body_bytes(response).await;
    assert_eq!(page_widths(&bytes), vec![101, 201, 202]);

    let again = get(app, &format!("/api/download/{id}")).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body_bytes(again).await, bytes);
}

#[tokio::test]
async fn test_download_expires() {
    let (storage, clock) = memory_storage();
    let app = app(storage);

    let form = Form::new().file("file", "a.pdf", &pdf_with_widths(&[101]));
    let response = post_form(app.clone(), "/api/rotate", form).await;
    let id = header_str(&response, "x-download-id").to_string();

    clock.advance(crate::common::WINDOW + std::time::Duration::from_secs(1));
    let response = get(app, &format!("/api/download/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "NotFound");
}

#[tokio::test]
async fn test_download_rejects_path_like_ids() {
    let (storage, _) = memory_storage();
    let response = get(app(storage), "/api/download/..%2F..%2Fetc%2Fpasswd").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compress_headers() {
    let (storage, _) = memory_storage();
    let input = pdf_with_widths(&[101, 102]);
    let form = Form::new().file("file", "a.pdf", &input);
    let response = post_form(app(storage), "/api/compress", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "x-original-size"),
        input.len().to_string()
    );
    let compressed: usize = header_str(&response, "x-compressed-size").parse().unwrap();
    let reduction: f64 = header_str(&response, "x-reduction-percent").parse().unwrap();
    assert_eq!(body_bytes(response).await.len(), compressed);
    assert!(reduction < 100.0);
}

#[tokio::test]
async fn test_parameters_from_text_fields() {
    let (storage, _) = memory_storage();
    let form = Form::new()
        .file("file", "a.pdf", &pdf_with_widths(&[101, 102, 103]))
        .text("pages", "3,1");
    let response = post_form(app(storage), "/api/extract", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(page_widths(&body_bytes(response).await), vec![103, 101]);
}

#[tokio::test]
async fn test_split_returns_zip() {
    let (storage, _) = memory_storage();
    let form = Form::new().file("file", "a.pdf", &pdf_with_widths(&[101, 102]));
    let response = post_form(app(storage), "/api/split", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), "application/zip");
    assert!(header_str(&response, "content-disposition").contains("split_pages.zip"));
}

#[tokio::test]
async fn test_error_status_codes() {
    let (storage, _) = memory_storage();
    let app = app(storage);
    let pdf = pdf_with_widths(&[101]);

    let cases = [
        ("/api/shred", Form::new().file("file", "a.pdf", &pdf), 400, "UnknownOperation"),
        ("/api/merge", Form::new().file("file", "a.pdf", &pdf), 400, "ValidationError"),
        ("/api/rotate", Form::new().file("file", "a.png", &png(4, 4)), 400, "ValidationError"),
        ("/api/remove-pages", Form::new().file("file", "a.pdf", &pdf), 400, "ValidationError"),
        (
            "/api/compress",
            Form::new().file("file", "a.pdf", b"%PDF-1.7 truncated"),
            422,
            "MalformedInput",
        ),
    ];

    for (uri, form, status, kind) in cases {
        let response = post_form(app.clone(), uri, form).await;
        assert_eq!(response.status().as_u16(), status, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["error"], kind, "{uri}");
        assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
    }
}

#[tokio::test]
async fn test_encrypted_input_reports_invalid_password() {
    let (storage, _) = memory_storage();
    let app = app(storage);

    let form = Form::new()
        .file("file", "a.pdf", &pdf_with_widths(&[101]))
        .text("password", "pw");
    let protected = body_bytes(post_form(app.clone(), "/api/protect", form).await).await;

    let form = Form::new().file("file", "p.pdf", &protected);
    let response = post_form(app, "/api/watermark", form).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "InvalidPassword");
}

#[tokio::test]
async fn test_info() {
    let (storage, _) = memory_storage();
    let form = Form::new().file("file", "a.pdf", &pdf_with_widths(&[300, 400]));
    let response = post_form(app(storage), "/api/info", form).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["pages"], 2);
    assert_eq!(json["encrypted"], false);
    assert_eq!(json["width"], 300.0);
}

#[tokio::test]
async fn test_info_without_file() {
    let (storage, _) = memory_storage();
    let response = post_form(app(storage), "/api/info", Form::new().text("x", "y")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
