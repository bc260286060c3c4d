//! Integration tests for the operational endpoints.

use auth_test_utils::TestAuthServer;
use reqwest::StatusCode;

/// The liveness probe answers 200 `OK` as long as the process serves HTTP.
#[tokio::test]
async fn test_health_endpoint_returns_ok() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = reqwest::get(format!("{}/health", server.url())).await?;

    // Assert
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Health check should return 200 OK"
    );
    assert_eq!(response.text().await?, "OK", "Health check body should be 'OK'");

    Ok(())
}

/// The Prometheus endpoint is public and unversioned.
#[tokio::test]
async fn test_metrics_endpoint_is_public() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

/// Unknown paths are 404, not routed to a handler.
#[tokio::test]
async fn test_unknown_path_returns_not_found() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/v1/auth/register", server.url())).await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}
