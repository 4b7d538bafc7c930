#[cfg(test)]
mod tests {
    use crate::helpers::app::{MODULE_ID, make_test_app};
    use crate::helpers::requests::{body_json, intake_request, json_request};
    use axum::http::StatusCode;
    use db::models::service_setting::{self, LATEST_EULA_VERSION, REQUIRE_EULA};
    use serde_json::json;

    #[tokio::test]
    async fn acceptance_releases_gated_submissions() {
        let app = make_test_app().await;
        service_setting::Entity::set(app.state.db(), REQUIRE_EULA, "true")
            .await
            .unwrap();
        service_setting::Entity::set(app.state.db(), LATEST_EULA_VERSION, "v1.2")
            .await
            .unwrap();

        let metadata = json!({
            "course_module_id": MODULE_ID,
            "kind": "content",
            "submitter_id": 501,
            "text": "held back until consent"
        });
        let created = body_json(app.send(intake_request(&metadata, None)).await).await;
        assert_eq!(created["data"]["submission"]["status"], "EULA_NOT_ACCEPTED");
        let id = created["data"]["submission"]["id"].clone();

        // An older version does not release anything.
        let response = app
            .send(json_request(
                "POST",
                "/api/eula/accept",
                &json!({"user_id": 501, "version": "v1.1"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["released"], json!([]));

        let response = app
            .send(json_request(
                "POST",
                "/api/eula/accept",
                &json!({"user_id": 501, "version": "v1.10", "locale": "af"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["accepted_version"], "v1.10");
        assert_eq!(json["data"]["released"], json!([id]));
    }

    #[tokio::test]
    async fn empty_version_is_bad_request() {
        let app = make_test_app().await;
        let response = app
            .send(json_request(
                "POST",
                "/api/eula/accept",
                &json!({"user_id": 501, "version": "  "}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
