//! Tests for the streaming server-style driver
//! Uses wiremock to echo uploaded bodies

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use formlift::upload::{HeaderField, TransportHandle};
use formlift::{
    FieldValue, FormFields, FormInput, Listener, MultipartForm, ServerUpload, UploadError,
    UploadOptions, UploadState, Uploader,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct Echo;

impl Respond for Echo {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let content_type = request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        ResponseTemplate::new(200)
            .set_body_bytes(request.body.clone())
            .insert_header("x-echo-content-type", content_type.as_str())
    }
}

async fn echo_server() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .respond_with(Echo)
        .mount(&mock_server)
        .await;
    mock_server
}

struct Recorder {
    states: Arc<Mutex<Vec<UploadState>>>,
    progress: Arc<Mutex<Vec<f64>>>,
    errors: Arc<AtomicUsize>,
}

fn record_events(upload: &impl Uploader) -> Recorder {
    let recorder = Recorder {
        states: Arc::new(Mutex::new(Vec::new())),
        progress: Arc::new(Mutex::new(Vec::new())),
        errors: Arc::new(AtomicUsize::new(0)),
    };
    let states = recorder.states.clone();
    upload.on(Listener::state(move |_, s| states.lock().unwrap().push(s)));
    let progress = recorder.progress.clone();
    upload.on(Listener::progress(move |_, p| progress.lock().unwrap().push(p)));
    let errors = recorder.errors.clone();
    upload.on(Listener::error(move |_| {
        errors.fetch_add(1, Ordering::SeqCst);
    }));
    recorder
}

fn file_form() -> FormFields {
    vec![("file", FieldValue::file(b"test".to_vec(), "test"))]
        .into_iter()
        .collect()
}

#[tokio::test]
async fn test_upload_file_field() {
    let mock_server = echo_server().await;
    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post", mock_server.uri()),
        file_form(),
    ))
    .unwrap();
    let recorder = record_events(&upload);

    let response = upload.upload().await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(upload.state(), UploadState::Successful);
    assert_eq!(upload.progress(), 1.0);
    assert_eq!(upload.uploaded_bytes(), upload.total_bytes());

    let body = response.text().unwrap();
    assert!(body.contains("Content-Disposition: form-data; name=\"file\"; filename=\"test\""));
    assert!(body.contains("\r\n\r\ntest\r\n"));
    assert_eq!(body.len() as u64, upload.total_bytes());

    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![UploadState::Started, UploadState::Successful]
    );
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
    assert!(matches!(response.handle, TransportHandle::Encoder(_)));
}

#[tokio::test]
async fn test_progress_accumulates_chunks() {
    let mock_server = echo_server().await;
    let form = MultipartForm::new().part("file", FieldValue::file(vec![7u8; 1000], "big.bin"));
    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post", mock_server.uri()),
        form,
    ))
    .unwrap()
    .chunk_size(100);
    let recorder = record_events(&upload);

    upload.upload().await.unwrap();

    let progress = recorder.progress.lock().unwrap().clone();
    // Length discovery, at least ten body chunks, final completion
    assert!(progress.len() >= 12);
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(1.0));
}

#[tokio::test]
async fn test_content_type_and_length_headers() {
    let mock_server = MockServer::start().await;
    let form = MultipartForm::with_boundary("fixed-boundary").part("a", "1");
    let expected_length = form.encode().to_bytes().len().to_string();
    Mock::given(method("POST"))
        .and(header("content-type", "multipart/form-data; boundary=fixed-boundary"))
        .and(header("content-length", expected_length.as_str()))
        .and(header("x-token", "abc"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let upload = ServerUpload::new(
        UploadOptions::new(mock_server.uri(), form).header("X-Token", "abc"),
    )
    .unwrap();

    let response = upload.upload().await.unwrap();
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_caller_content_type_wins() {
    let mock_server = echo_server().await;
    let upload = ServerUpload::new(
        UploadOptions::new(format!("{}/post", mock_server.uri()), FormInput::text("hello"))
            .header("Content-Type", "application/x-custom"),
    )
    .unwrap();

    let response = upload.upload().await.unwrap();

    assert_eq!(response.text(), Some("hello"));
    assert_eq!(
        response.header("x-echo-content-type"),
        Some(&HeaderField::Single("application/x-custom".to_string()))
    );
}

#[tokio::test]
async fn test_raw_text_body() {
    let mock_server = echo_server().await;
    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post", mock_server.uri()),
        FormInput::text("plain body"),
    ))
    .unwrap();

    let response = upload.upload().await.unwrap();

    assert_eq!(response.text(), Some("plain body"));
    assert_eq!(
        response.header("x-echo-content-type").map(|h| h.first()),
        Some("text/plain;charset=UTF-8")
    );
    assert_eq!(upload.total_bytes(), 10);
}

#[tokio::test]
async fn test_empty_body_still_succeeds() {
    let mock_server = echo_server().await;
    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post", mock_server.uri()),
        FormInput::default(),
    ))
    .unwrap();
    let recorder = record_events(&upload);

    let response = upload.upload().await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(upload.total_bytes(), 0);
    assert_eq!(upload.progress(), 0.0);
    assert_eq!(upload.state(), UploadState::Successful);
    // No chunks were streamed, so the upload never reported `started`
    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![UploadState::Successful]
    );
    assert!(recorder.progress.lock().unwrap().iter().all(|p| *p == 0.0));
}

#[tokio::test]
async fn test_supported_methods() {
    for verb in ["PUT", "POST", "PATCH", "DELETE"] {
        let mock_server = MockServer::start().await;
        let route = format!("/{}", verb.to_lowercase());
        Mock::given(method(verb))
            .and(path(route.as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let upload = ServerUpload::new(
            UploadOptions::new(format!("{}{}", mock_server.uri(), route), FormInput::text(""))
                .method(verb),
        )
        .unwrap();
        let response = upload.upload().await.unwrap();
        assert_eq!(response.status, 200, "{} should succeed", verb);
    }
}

#[tokio::test]
async fn test_lowercase_method_is_normalized() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let upload = ServerUpload::new(
        UploadOptions::new(mock_server.uri(), FormInput::text("x")).method("put"),
    )
    .unwrap();
    assert_eq!(upload.upload().await.unwrap().status, 204);
}

#[tokio::test]
async fn test_query_string_is_kept() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/post"))
        .and(wiremock::matchers::query_param("token", "t1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post?token=t1", mock_server.uri()),
        FormInput::text("x"),
    ))
    .unwrap();
    assert_eq!(upload.upload().await.unwrap().status, 200);
}

#[tokio::test]
async fn test_http_error_status_is_not_a_transport_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(413)
                .append_header("set-cookie", "a=1")
                .append_header("set-cookie", "b=2"),
        )
        .mount(&mock_server)
        .await;

    let upload = ServerUpload::new(UploadOptions::new(mock_server.uri(), file_form())).unwrap();
    let recorder = record_events(&upload);

    let response = upload.upload().await.unwrap();

    assert_eq!(response.status, 413);
    assert_eq!(upload.state(), UploadState::Successful);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 0);
    assert_eq!(
        response.header("set-cookie"),
        Some(&HeaderField::Multiple(vec!["a=1".to_string(), "b=2".to_string()]))
    );
}

#[tokio::test]
async fn test_connection_refused_fails() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let upload = ServerUpload::new(UploadOptions::new(
        format!("http://127.0.0.1:{}/post", port),
        file_form(),
    ))
    .unwrap();
    let recorder = record_events(&upload);

    let result = upload.upload().await;

    assert!(matches!(result, Err(UploadError::Transport(_))));
    assert_eq!(upload.state(), UploadState::Failed);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    let states = recorder.states.lock().unwrap().clone();
    assert_eq!(states.last(), Some(&UploadState::Failed));
    assert!(!states.contains(&UploadState::Successful));
}

#[tokio::test]
async fn test_invalid_url_leaves_state_untouched() {
    let upload =
        ServerUpload::new(UploadOptions::new("::not a url::", FormInput::text("x"))).unwrap();

    let result = upload.upload().await;

    assert!(matches!(result, Err(UploadError::Configuration(_))));
    assert_eq!(upload.state(), UploadState::New);
    assert_eq!(upload.total_bytes(), 0);
}

#[tokio::test]
async fn test_abort_is_a_noop() {
    let mock_server = echo_server().await;
    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post", mock_server.uri()),
        file_form(),
    ))
    .unwrap();

    upload.abort();
    assert_eq!(upload.state(), UploadState::New);

    upload.upload().await.unwrap();
    upload.abort();
    assert_eq!(upload.state(), UploadState::Successful);
}

#[tokio::test]
async fn test_response_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "files": { "file": "test" } })),
        )
        .mount(&mock_server)
        .await;

    let upload = ServerUpload::new(UploadOptions::new(mock_server.uri(), file_form())).unwrap();
    let response = upload.upload().await.unwrap();

    let json: serde_json::Value = response.json().unwrap();
    assert_eq!(json["files"]["file"], "test");
}

#[tokio::test]
async fn test_upload_file_from_disk() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let file_path = temp_dir.path().join("report.csv");
    std::fs::write(&file_path, "id,name\n1,alice\n").unwrap();

    let data = tokio::fs::read(&file_path).await.unwrap();
    let form = MultipartForm::new().part(
        "report",
        FieldValue::file(data, "report.csv").with_content_type("text/csv"),
    );

    let mock_server = echo_server().await;
    let upload = ServerUpload::new(UploadOptions::new(
        format!("{}/post", mock_server.uri()),
        form,
    ))
    .unwrap();

    let response = upload.upload().await.unwrap();
    let body = response.text().unwrap();
    assert!(body.contains("filename=\"report.csv\"\r\nContent-Type: text/csv\r\n\r\nid,name\n1,alice\n\r\n"));
    assert_eq!(upload.progress(), 1.0);
}
