//! OpenAPI documentation served at `/api/openapi.json`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use tubely_core::models;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tubely API",
        version = "0.1.0",
        description = "Video records with thumbnail and video uploads. Videos are bucketed by aspect ratio and remuxed for fast start before storage."
    ),
    paths(
        handlers::health::health_check,
        handlers::videos::create_video,
        handlers::videos::get_video,
        handlers::thumbnail_upload::upload_thumbnail,
        handlers::video_upload::upload_video,
    ),
    components(
        schemas(
            models::Video,
            models::CreateVideoRequest,
            handlers::health::HealthResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "videos", description = "Video records and asset uploads"),
        (name = "config", description = "Service health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_upload_routes() {
        let spec = get_openapi_spec();
        assert!(spec.paths.paths.contains_key("/api/thumbnail_upload/{video_id}"));
        assert!(spec.paths.paths.contains_key("/api/video_upload/{video_id}"));
        assert!(spec.paths.paths.contains_key("/api/videos"));
    }
}
