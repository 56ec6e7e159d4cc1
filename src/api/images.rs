use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tracing::{debug, warn};

use crate::client::interceptor::{build, decode};
use crate::client::{AuthClient, ClientError};
use crate::models::image::{ExtractResponse, ExtractedStats};

const EXTRACT_TIMEOUT: Duration = Duration::from_secs(10);
const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Screenshot endpoints: stat extraction and image archiving.
///
/// Both calls send multipart bodies, which cannot be replayed. An expired
/// token still gets renewed for the calls that follow, but the call that hit
/// the expiry fails.
pub struct ImageApi<'a> {
    client: &'a AuthClient,
}

impl<'a> ImageApi<'a> {
    pub fn new(client: &'a AuthClient) -> Self {
        Self { client }
    }

    /// Extracts stats from the image, then archives the image whatever the
    /// outcome, tagged with whether extraction worked.
    pub async fn process(
        &self,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<ExtractedStats, ClientError> {
        let extracted = self.extract(file_name, image.clone()).await;
        if let Err(e) = &extracted {
            warn!("Stat extraction failed for '{}': {}", file_name, e);
        }
        self.archive(file_name, image, extracted.is_ok()).await;
        extracted
    }

    /// `POST extract` with the image as the `file` part.
    pub async fn extract(
        &self,
        file_name: &str,
        image: Vec<u8>,
    ) -> Result<ExtractedStats, ClientError> {
        let form = Form::new().part("file", image_part(file_name, image));
        let request = build(
            self.client
                .request(Method::POST, "extract")?
                .multipart(form)
                .timeout(EXTRACT_TIMEOUT),
        )?;
        let response: ExtractResponse = decode(self.client.send(request).await?).await?;
        let stats = response
            .extracted_data
            .and_then(|data| data.into_stats())
            .ok_or_else(|| ClientError::Decode("no valid extracted_data in response".to_string()))?;
        debug!(level = stats.level, "Extracted stats from '{}'", file_name);
        Ok(stats)
    }

    /// `POST timer/image`. Best effort: every failure is logged and dropped.
    pub async fn archive(&self, file_name: &str, image: Vec<u8>, inference_success: bool) {
        let form = Form::new()
            .part("image", image_part(file_name, image))
            .text("inferenceSuccess", inference_success.to_string());
        let request = self
            .client
            .request(Method::POST, "timer/image")
            .and_then(|builder| build(builder.multipart(form).timeout(ARCHIVE_TIMEOUT)));

        let result = match request {
            Ok(request) => self.client.send(request).await.map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!("Archived '{}'", file_name),
            Err(e) => debug!("Archiving '{}' failed; ignoring: {}", file_name, e),
        }
    }
}

fn image_part(file_name: &str, image: Vec<u8>) -> Part {
    Part::bytes(image).file_name(file_name.to_string())
}
