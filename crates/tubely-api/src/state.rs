//! Application state shared by every handler.

use std::sync::Arc;
use tubely_core::Config;
use tubely_db::VideoStore;
use tubely_media::UploadPipeline;
use tubely_storage::Storage;

use crate::auth::JwtValidator;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub videos: Arc<dyn VideoStore>,
    pub storage: Arc<dyn Storage>,
    pub pipeline: UploadPipeline,
    pub jwt: JwtValidator,
}

impl AppState {
    pub fn new(
        config: Config,
        videos: Arc<dyn VideoStore>,
        storage: Arc<dyn Storage>,
        pipeline: UploadPipeline,
    ) -> Self {
        let jwt = JwtValidator::new(&config.jwt_secret, config.jwt_issuer.clone());
        Self {
            config,
            videos,
            storage,
            pipeline,
            jwt,
        }
    }
}
