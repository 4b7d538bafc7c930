#[cfg(test)]
mod tests {
    use crate::helpers::app::{MODULE_ID, make_test_app};
    use crate::helpers::requests::{body_json, empty_request, intake_request};
    use axum::http::StatusCode;
    use serde_json::json;
    use services::notifier::Template;

    #[tokio::test]
    async fn repeated_runs_drive_submission_to_complete() {
        let app = make_test_app().await;
        let metadata = json!({
            "course_module_id": MODULE_ID,
            "kind": "content",
            "submitter_id": 501,
            "text": "an essay about rivers"
        });
        let created = body_json(app.send(intake_request(&metadata, None)).await).await;
        let id = created["data"]["submission"]["id"].as_i64().unwrap();

        for _ in 0..4 {
            let response = app.send(empty_request("POST", "/api/dispatch/run")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["data"]["selected"], 1);
            assert_eq!(json["data"]["advanced"], 1);
        }

        let response = app.send(empty_request("POST", "/api/dispatch/run")).await;
        assert_eq!(body_json(response).await["data"]["selected"], 0);

        let view = body_json(
            app.send(empty_request("GET", &format!("/api/submissions/{id}")))
                .await,
        )
        .await;
        assert_eq!(view["data"]["status"], "COMPLETE");
        assert_eq!(view["data"]["overall_score"], 42);
        assert_eq!(app.notifier.count(Template::DigitalReceipt), 1);
    }
}
