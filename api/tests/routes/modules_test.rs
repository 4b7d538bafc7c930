#[cfg(test)]
mod tests {
    use crate::helpers::app::{MODULE_ID, make_test_app};
    use crate::helpers::requests::{body_json, intake_request, json_request};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn module_update_creates_and_reschedules() {
        let app = make_test_app().await;

        let response = app
            .send(json_request(
                "PUT",
                "/api/modules/55",
                &json!({
                    "module_kind": "forum",
                    "report_generation": "DUE_DATE",
                    "due_date": "2099-05-01T12:00:00Z"
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["module"]["id"], 55);
        assert_eq!(json["data"]["module"]["module_kind"], "forum");
        assert_eq!(json["data"]["module"]["enabled"], true);
        assert_eq!(json["data"]["rescheduled"], 0);

        let metadata = json!({
            "course_module_id": 55,
            "kind": "content",
            "submitter_id": 501,
            "text": "a forum post"
        });
        let created = body_json(app.send(intake_request(&metadata, None)).await).await;
        assert_eq!(
            created["data"]["submission"]["generation_time"],
            "2099-05-01T12:00:00Z"
        );

        let response = app
            .send(json_request(
                "PUT",
                "/api/modules/55",
                &json!({
                    "module_kind": "forum",
                    "report_generation": "DUE_DATE",
                    "due_date": "2099-04-01T12:00:00Z"
                }),
            ))
            .await;
        assert_eq!(body_json(response).await["data"]["rescheduled"], 1);
    }

    #[tokio::test]
    async fn disabling_checks_ignores_new_work() {
        let app = make_test_app().await;
        app.send(json_request(
            "PUT",
            &format!("/api/modules/{MODULE_ID}"),
            &json!({
                "module_kind": "assign",
                "enabled": false,
                "report_generation": "IMMEDIATE"
            }),
        ))
        .await;

        let metadata = json!({
            "course_module_id": MODULE_ID,
            "kind": "content",
            "submitter_id": 501,
            "text": "not checked"
        });
        let response = app.send(intake_request(&metadata, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["outcome"], "ignored");
        assert_eq!(json["data"]["submission"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn invalid_policy_is_rejected() {
        let app = make_test_app().await;
        let response = app
            .send(json_request(
                "PUT",
                "/api/modules/1",
                &json!({"module_kind": "assign", "report_generation": "WHENEVER"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
