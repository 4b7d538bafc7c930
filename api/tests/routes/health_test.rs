#[cfg(test)]
mod tests {
    use crate::helpers::app::make_test_app;
    use crate::helpers::requests::{body_json, empty_request};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn health_check_returns_ok_json() {
        let app = make_test_app().await;

        let response = app.send(empty_request("GET", "/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "OK");
        assert_eq!(json["message"], "Health check passed");
    }
}
