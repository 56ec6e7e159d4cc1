use tracing::debug;

use crate::client::{AuthClient, ClientError};
use crate::models::preset::{Preset, PresetItem};

/// Preset endpoints of the resource server. Every call goes through the
/// [`AuthClient`], so an expired token is renewed transparently.
pub struct PresetApi<'a> {
    client: &'a AuthClient,
}

impl<'a> PresetApi<'a> {
    pub fn new(client: &'a AuthClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> Result<Vec<Preset>, ClientError> {
        let presets: Vec<Preset> = self.client.get_json("/api/preset").await?;
        debug!("Fetched {} presets", presets.len());
        Ok(presets)
    }

    pub async fn items(&self, preset_id: i64) -> Result<Vec<PresetItem>, ClientError> {
        self.client
            .get_json(&format!("/api/preset/{}", preset_id))
            .await
    }

    pub async fn delete(&self, preset_id: i64) -> Result<(), ClientError> {
        self.client
            .delete(&format!("/api/preset/{}", preset_id))
            .await
    }
}
