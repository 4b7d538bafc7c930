#[cfg(test)]
mod tests {
    use crate::helpers::app::{MODULE_ID, TestApp, WEBHOOK_SECRET, make_test_app};
    use crate::helpers::requests::{body_json, empty_request, intake_request};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use services::webhook_service::sign;

    fn webhook(body: &Value, secret: &str, event: &str) -> Request<Body> {
        let bytes = serde_json::to_vec(body).unwrap();
        Request::builder()
            .method("POST")
            .uri("/api/webhooks")
            .header("content-type", "application/json")
            .header("X-Signature", sign(secret, &bytes))
            .header("X-Event-Type", event)
            .body(Body::from(bytes))
            .unwrap()
    }

    /// Intake plus three dispatch runs: CREATED, UPLOADED, REQUESTED.
    async fn requested_submission(app: &TestApp) -> i64 {
        let metadata = json!({
            "course_module_id": MODULE_ID,
            "kind": "content",
            "submitter_id": 501,
            "text": "an essay"
        });
        let created = body_json(app.send(intake_request(&metadata, None)).await).await;
        for _ in 0..3 {
            app.send(empty_request("POST", "/api/dispatch/run")).await;
        }
        created["data"]["submission"]["id"].as_i64().unwrap()
    }

    async fn status_of(app: &TestApp, id: i64) -> Value {
        body_json(
            app.send(empty_request("GET", &format!("/api/submissions/{id}")))
                .await,
        )
        .await["data"]
            .clone()
    }

    #[tokio::test]
    async fn signed_similarity_event_completes_submission() {
        let app = make_test_app().await;
        let id = requested_submission(&app).await;
        assert_eq!(status_of(&app, id).await["status"], "REQUESTED");

        let body = json!({"submission_id": "ext-1", "overall_match_percentage": 33});
        let response = app
            .send(webhook(&body, WEBHOOK_SECRET, "SIMILARITY_COMPLETE"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let echoed = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&echoed).unwrap(), body);

        let view = status_of(&app, id).await;
        assert_eq!(view["status"], "COMPLETE");
        assert_eq!(view["overall_score"], 33);

        // Redelivery is acknowledged and changes nothing.
        let response = app
            .send(webhook(&body, WEBHOOK_SECRET, "SIMILARITY_COMPLETE"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(status_of(&app, id).await, view);
    }

    #[tokio::test]
    async fn bad_signature_is_unauthorized() {
        let app = make_test_app().await;
        let id = requested_submission(&app).await;

        let body = json!({"submission_id": "ext-1", "overall_match_percentage": 90});
        let response = app
            .send(webhook(&body, "wrong-secret", "SIMILARITY_COMPLETE"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(&app, id).await["status"], "REQUESTED");

        let unsigned = Request::builder()
            .method("POST")
            .uri("/api/webhooks")
            .body(Body::from(body.to_string()))
            .unwrap();
        assert_eq!(app.send(unsigned).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_submission_is_not_found() {
        let app = make_test_app().await;
        let body = json!({"submission_id": "missing", "overall_match_percentage": 5});
        let response = app
            .send(webhook(&body, WEBHOOK_SECRET, "SIMILARITY_UPDATED"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn score_out_of_range_is_bad_request() {
        let app = make_test_app().await;
        requested_submission(&app).await;
        let body = json!({"submission_id": "ext-1", "overall_match_percentage": -3});
        let response = app
            .send(webhook(&body, WEBHOOK_SECRET, "SIMILARITY_COMPLETE"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_event_is_acknowledged() {
        let app = make_test_app().await;
        let body = json!({"submission_id": "ext-1"});
        let response = app.send(webhook(&body, WEBHOOK_SECRET, "PDF_STATUS")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
