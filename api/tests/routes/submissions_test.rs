#[cfg(test)]
mod tests {
    use crate::helpers::app::{MODULE_ID, make_test_app, make_test_app_with, test_config};
    use crate::helpers::requests::{body_json, empty_request, intake_request};
    use axum::http::StatusCode;
    use db::models::similarity_submission::ErrorCode;
    use serde_json::{Value, json};
    use services::client::ClientError;

    fn file_metadata() -> Value {
        json!({
            "course_module_id": MODULE_ID,
            "item_id": 77,
            "kind": "file",
            "submitter_id": 501,
            "state": "submitted"
        })
    }

    #[tokio::test]
    async fn file_intake_creates_queued_submission() {
        let app = make_test_app().await;

        let response = app
            .send(intake_request(&file_metadata(), Some(("essay.docx", b"some essay bytes".to_vec()))))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["outcome"], "created");
        assert_eq!(json["data"]["submission"]["status"], "QUEUED");
        assert_eq!(json["data"]["submission"]["filename"], "essay.docx");
        assert_eq!(json["data"]["submission"]["content_size"], 16);
    }

    #[tokio::test]
    async fn repeated_intake_is_unchanged() {
        let app = make_test_app().await;
        let request = || intake_request(&file_metadata(), Some(("essay.docx", b"same bytes".to_vec())));

        let first = body_json(app.send(request()).await).await;
        let response = app.send(request()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let second = body_json(response).await;
        assert_eq!(second["data"]["outcome"], "unchanged");
        assert_eq!(second["data"]["submission"]["id"], first["data"]["submission"]["id"]);
    }

    #[tokio::test]
    async fn content_intake_reads_text_from_metadata() {
        let app = make_test_app().await;
        let metadata = json!({
            "course_module_id": MODULE_ID,
            "kind": "content",
            "submitter_id": 501,
            "text": "an online text answer"
        });

        let response = app.send(intake_request(&metadata, None)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["submission"]["kind"], "content");
        assert_eq!(json["data"]["submission"]["status"], "QUEUED");
    }

    #[tokio::test]
    async fn empty_file_is_recorded_as_empty() {
        let app = make_test_app().await;
        let response = app
            .send(intake_request(&file_metadata(), Some(("blank.txt", b"".to_vec()))))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["submission"]["status"], "EMPTY_OR_NO_FILE");
    }

    #[tokio::test]
    async fn missing_metadata_is_bad_request() {
        let app = make_test_app().await;
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/submissions")
            .header(
                "content-type",
                format!(
                    "multipart/form-data; boundary={}",
                    crate::helpers::requests::BOUNDARY
                ),
            )
            .body(axum::body::Body::from(format!(
                "--{}--\r\n",
                crate::helpers::requests::BOUNDARY
            )))
            .unwrap();

        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Missing required field: metadata");
    }

    #[tokio::test]
    async fn invalid_metadata_is_bad_request() {
        let app = make_test_app().await;
        let response = app
            .send(intake_request(&json!({"kind": "file"}), None))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_module_is_not_found() {
        let app = make_test_app().await;
        let mut metadata = file_metadata();
        metadata["course_module_id"] = json!(404);

        let response = app
            .send(intake_request(&metadata, Some(("essay.docx", b"bytes".to_vec()))))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_view_and_resubmission() {
        let app = make_test_app().await;
        let created = body_json(
            app.send(intake_request(&file_metadata(), Some(("essay.docx", b"bytes".to_vec()))))
                .await,
        )
        .await;
        let id = created["data"]["submission"]["id"].as_i64().unwrap();

        let response = app
            .send(empty_request("GET", &format!("/api/submissions/{id}")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "QUEUED");
        assert_eq!(json["data"]["reason"], Value::Null);

        // Only failed submissions can be resubmitted.
        let response = app
            .send(empty_request("POST", &format!("/api/submissions/{id}/resubmit")))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        app.client
            .push_create(Err(ClientError::Permanent(ErrorCode::UnsupportedFiletype)));
        let response = app.send(empty_request("POST", "/api/dispatch/run")).await;
        assert_eq!(body_json(response).await["data"]["failed"], 1);

        let json = body_json(
            app.send(empty_request("GET", &format!("/api/submissions/{id}")))
                .await,
        )
        .await;
        assert_eq!(json["data"]["status"], "ERROR");
        assert_eq!(json["data"]["error_code"], "UNSUPPORTED_FILETYPE");
        assert!(json["data"]["reason"].is_string());

        let response = app
            .send(empty_request("POST", &format!("/api/submissions/{id}/resubmit")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "QUEUED");
        assert_eq!(json["data"]["attempts"], 0);
    }

    #[tokio::test]
    async fn unknown_submission_is_not_found() {
        let app = make_test_app().await;
        let response = app.send(empty_request("GET", "/api/submissions/999")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app
            .send(empty_request("POST", "/api/submissions/999/resubmit"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn multi_megabyte_file_is_queued() {
        let app = make_test_app().await;
        let bytes = vec![b'a'; 3 * 1024 * 1024];

        let response = app
            .send(intake_request(&file_metadata(), Some(("thesis.pdf", bytes))))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["submission"]["status"], "QUEUED");
        assert_eq!(json["data"]["submission"]["content_size"], 3 * 1024 * 1024);
    }

    #[tokio::test]
    async fn file_over_size_limit_is_recorded_too_large() {
        let mut config = test_config();
        config.max_file_size = 1024 * 1024;
        let app = make_test_app_with(config).await;
        let bytes = vec![b'a'; 1024 * 1024 + 512 * 1024];

        let response = app
            .send(intake_request(&file_metadata(), Some(("thesis.pdf", bytes))))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["submission"]["status"], "ERROR");
        assert_eq!(json["data"]["submission"]["error_code"], "TOO_LARGE");
        assert_eq!(json["data"]["submission"]["attempts"], 0);
    }

    #[tokio::test]
    async fn body_far_over_size_limit_is_payload_too_large() {
        let mut config = test_config();
        config.max_file_size = 1024 * 1024;
        let app = make_test_app_with(config).await;
        let bytes = vec![b'a'; 3 * 1024 * 1024];

        let response = app
            .send(intake_request(&file_metadata(), Some(("thesis.pdf", bytes))))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["success"], false);
    }
}
