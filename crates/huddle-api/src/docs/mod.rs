//! OpenAPI document served through Swagger UI at `/docs`

use utoipa::OpenApi;

use crate::handlers::health;

#[derive(OpenApi)]
#[openapi(
    info(title = "Huddle API", description = "Conversations, messages and presence"),
    paths(health::health_check, health::readiness_check),
    tags((name = "health", description = "Liveness and readiness probes"))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_probes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/health/ready"));
    }
}
