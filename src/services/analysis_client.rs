// src/services/analysis_client.rs
use crate::config::{AnalysisProtocol, ClassifierConfig, LabelMatch};
use crate::errors::ConsignError;
use crate::models::*;
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::sync::Arc;

const OBJECT_DETECTION_PATH: &str = "/api/ai/object_detection";
const CLASSIFY_PATH: &str = "/api/b2b/classify";

/// Sends a submission's images to the remote classifier and turns the
/// reply into a verdict.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, images: &[ImageRef]) -> Result<AnalysisResult, ConsignError>;

    fn protocol(&self) -> AnalysisProtocol;
}

pub fn build_analyzer(config: &ClassifierConfig) -> Result<Arc<dyn Analyzer>, ConsignError> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder
        .build()
        .map_err(|e| ConsignError::Transport(format!("Failed to create HTTP client: {}", e)))?;

    let analyzer: Arc<dyn Analyzer> = match config.protocol {
        AnalysisProtocol::PerImage => Arc::new(PerImageAnalyzer {
            client,
            endpoint: format!("{}{}", config.base_url, OBJECT_DETECTION_PATH),
            fake_category: config.fake_category.clone(),
            label_match: config.label_match,
        }),
        AnalysisProtocol::Batch => Arc::new(BatchAnalyzer {
            client,
            endpoint: format!("{}{}", config.base_url, CLASSIFY_PATH),
            fake_label: config.fake_label.clone(),
            label_match: config.label_match,
        }),
    };

    Ok(analyzer)
}

/// Multipart part for one image: original filename when known, otherwise
/// `image_<index>.jpg`.
fn image_part(index: usize, image: &ImageRef) -> Result<Part, ConsignError> {
    let filename = image
        .filename
        .clone()
        .unwrap_or_else(|| format!("image_{}.jpg", index));

    Part::bytes(image.data.to_vec())
        .file_name(filename)
        .mime_str(&image.content_type)
        .map_err(|e| ConsignError::Transport(format!("Invalid content type: {}", e)))
}

async fn post_form(client: &Client, endpoint: &str, form: Form) -> Result<Value, ConsignError> {
    let response = client
        .post(endpoint)
        .header(ACCEPT, "application/json")
        .multipart(form)
        .send()
        .await
        .map_err(|e| ConsignError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ConsignError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ConsignError::Transport(format!("Failed to read response: {}", e)))?;

    serde_json::from_slice(&body)
        .map_err(|e| ConsignError::MalformedResponse(format!("response is not JSON: {}", e)))
}

/// One request per image, in selection order, stopping at the first fake.
pub struct PerImageAnalyzer {
    client: Client,
    endpoint: String,
    fake_category: String,
    label_match: LabelMatch,
}

impl PerImageAnalyzer {
    async fn detect(&self, index: usize, image: &ImageRef) -> Result<(String, Vec<f64>), ConsignError> {
        let form = Form::new().part("image_file", image_part(index, image)?);
        let payload = post_form(&self.client, &self.endpoint, form).await?;
        parse_detection(&payload)
    }
}

#[async_trait]
impl Analyzer for PerImageAnalyzer {
    async fn analyze(&self, images: &[ImageRef]) -> Result<AnalysisResult, ConsignError> {
        let mut details = Vec::with_capacity(images.len());

        for (index, image) in images.iter().enumerate() {
            match self.detect(index, image).await {
                Ok((category, bbox)) => {
                    debug!("Image {} ({}) classified as '{}'", index, image.id, category);
                    let is_fake = self.label_match.matches(&category, &self.fake_category);

                    details.push(ImageDetection {
                        image_id: image.id,
                        filename: image.filename.clone(),
                        category,
                        bbox,
                    });

                    if is_fake {
                        info!(
                            "Image {} flagged as fake, skipping {} remaining",
                            index,
                            images.len() - index - 1
                        );
                        return Ok(AnalysisResult {
                            is_fake: true,
                            details: AnalysisDetails::PerImage(details),
                        });
                    }
                }
                Err(e @ ConsignError::MalformedResponse(_)) => return Err(e),
                Err(e) => {
                    error!("AI analysis failed for image {} ({}): {}", index, image.id, e);
                }
            }
        }

        if !images.is_empty() && details.is_empty() {
            return Err(ConsignError::AnalysisUnavailable);
        }

        Ok(AnalysisResult {
            is_fake: false,
            details: AnalysisDetails::PerImage(details),
        })
    }

    fn protocol(&self) -> AnalysisProtocol {
        AnalysisProtocol::PerImage
    }
}

/// Reads `{ detected_object: { <category>: { bbox: [...] }, ... } }`, taking
/// the first category in document order.
fn parse_detection(payload: &Value) -> Result<(String, Vec<f64>), ConsignError> {
    let detected = payload
        .get("detected_object")
        .and_then(Value::as_object)
        .ok_or_else(|| ConsignError::MalformedResponse("missing 'detected_object'".to_string()))?;

    let (category, entry) = detected
        .iter()
        .next()
        .ok_or_else(|| ConsignError::MalformedResponse("'detected_object' is empty".to_string()))?;

    let bbox = match entry.get("bbox") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(coords)) => coords
            .iter()
            .map(|c| {
                c.as_f64().ok_or_else(|| {
                    ConsignError::MalformedResponse(format!("non-numeric bbox value {}", c))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(ConsignError::MalformedResponse(format!(
                "bbox is not an array: {}",
                other
            )));
        }
    };

    Ok((category.clone(), bbox))
}

/// All images in one request; a single label decides the verdict.
pub struct BatchAnalyzer {
    client: Client,
    endpoint: String,
    fake_label: String,
    label_match: LabelMatch,
}

#[async_trait]
impl Analyzer for BatchAnalyzer {
    async fn analyze(&self, images: &[ImageRef]) -> Result<AnalysisResult, ConsignError> {
        let mut form = Form::new();
        for (index, image) in images.iter().enumerate() {
            form = form.part("image_files", image_part(index, image)?);
        }

        let payload = post_form(&self.client, &self.endpoint, form).await?;

        let label = payload
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| ConsignError::MalformedResponse("missing 'result' label".to_string()))?;

        let is_fake = self.label_match.matches(label, &self.fake_label);
        info!("Batch of {} images classified as '{}'", images.len(), label);

        Ok(AnalysisResult {
            is_fake,
            details: AnalysisDetails::Payload(payload),
        })
    }

    fn protocol(&self) -> AnalysisProtocol {
        AnalysisProtocol::Batch
    }
}
