use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;

use claim_agent_model::ErrorKind as ProviderErrorKind;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fs::{Existing, write_atomic};
use crate::media_client::ImageClient;
use crate::retry::{ProviderFailure, RetryPolicy, with_retry};
use crate::tool::{Error as ToolError, Tool, ToolKind, ToolResult};

const MIN_DESCRIPTION_CHARS: usize = 20;
const MIN_DESCRIPTION_WORDS: usize = 4;

/// File format of a generated sketch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum SketchFormat {
    /// Portable Network Graphics.
    #[default]
    Png,
    /// JPEG.
    Jpeg,
    /// WebP.
    Webp,
}

impl SketchFormat {
    /// Returns the file extension of the format.
    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            SketchFormat::Png => "png",
            SketchFormat::Jpeg => "jpeg",
            SketchFormat::Webp => "webp",
        }
    }
}

/// A sketch written to the image folder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sketch {
    /// Where the image was written.
    pub path: PathBuf,
    /// Digest of the trimmed description the image was drawn from.
    pub description_hash: u64,
}

/// Arguments of `generateSketch`.
#[derive(Deserialize, JsonSchema)]
pub struct GenerateSketchParameters {
    #[schemars(
        description = "What the sketch shows: the road layout, the vehicles, their positions and the point of impact."
    )]
    description: String,
    #[schemars(description = "File format of the image, `png` when omitted.")]
    #[serde(default)]
    format: Option<SketchFormat>,
}

/// Draws accident sketches with an image provider.
pub struct SketchGenerator {
    image_dir: PathBuf,
    client: ImageClient,
    retry: RetryPolicy,
    parameter_schema: Value,
}

impl SketchGenerator {
    /// Creates a generator writing into `image_dir`.
    pub fn new<P: Into<PathBuf>>(
        image_dir: P,
        client: ImageClient,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            image_dir: image_dir.into(),
            client,
            retry,
            parameter_schema: schema_for!(GenerateSketchParameters).to_value(),
        }
    }

    /// Generates a sketch of `description` and writes it under a fresh
    /// name. A prior sketch is never overwritten.
    pub async fn generate_sketch(
        &self,
        description: &str,
        format: SketchFormat,
    ) -> ToolResult<Sketch> {
        let description = description.trim();
        validate_description(description)?;

        let image = with_retry(&self.retry, "image generation", || {
            let fut = self.client.generate_image(description);
            async move {
                let image = fut.await?;
                if image.is_empty() {
                    return Err(ProviderFailure::new(
                        ProviderErrorKind::InvalidResponse,
                        "empty image payload",
                    ));
                }
                Ok(image)
            }
        })
        .await
        .map_err(|failure| match failure.kind() {
            ProviderErrorKind::Moderated => ToolError::validation().with_reason(
                format!("the description was rejected, rephrase it: {failure}"),
            ),
            _ => ToolError::provider()
                .with_reason(format!("image generation failed: {failure}")),
        })?;

        let file_name =
            format!("{}-sketch.{}", uuid::Uuid::new_v4(), format.extension());
        let path =
            write_atomic(&self.image_dir, &file_name, image, Existing::Keep)
                .await?;
        info!("saved sketch to {}", path.display());

        Ok(Sketch {
            path,
            description_hash: description_hash(description),
        })
    }
}

fn validate_description(description: &str) -> ToolResult<()> {
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(ToolError::validation().with_reason(format!(
            "`description` must be at least {MIN_DESCRIPTION_CHARS} characters"
        )));
    }
    if description.split_whitespace().count() < MIN_DESCRIPTION_WORDS {
        return Err(ToolError::validation().with_reason(format!(
            "`description` must be at least {MIN_DESCRIPTION_WORDS} words"
        )));
    }
    Ok(())
}

fn description_hash(description: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    description.hash(&mut hasher);
    hasher.finish()
}

impl Tool for SketchGenerator {
    type Input = GenerateSketchParameters;
    type Output = Sketch;

    fn kind(&self) -> ToolKind {
        ToolKind::GenerateSketch
    }

    fn description(&self) -> &str {
        r#"
Generates a top-down sketch of the accident from a textual description and saves it as an image.
Returns the path of the image, reference it from the report."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: GenerateSketchParameters,
    ) -> impl Future<Output = ToolResult<Sketch>> + Send {
        async move {
            self.generate_sketch(
                &input.description,
                input.format.unwrap_or_default(),
            )
            .await
        }
    }
}
