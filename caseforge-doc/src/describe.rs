//! Substitution of image placeholders with recognized descriptions.

use async_trait::async_trait;

use caseforge_llm::ChatClient;

use crate::docx::{placeholder_index, ParsedDocument};

/// Seam to the vision-capable model; recognition never fails the document
/// flow, it degrades to a bracketed marker in the output text.
#[async_trait]
pub trait ImageDescriber: Send + Sync {
    async fn describe(&self, image: &[u8], mime: &str, label: &str) -> String;
}

#[async_trait]
impl ImageDescriber for ChatClient {
    async fn describe(&self, image: &[u8], mime: &str, label: &str) -> String {
        self.describe_image(image, mime, label).await
    }
}

/// Replace each placeholder block with the model's description of the image
/// it stands for; all other blocks pass through untouched. A placeholder
/// with no matching image (malformed input) is left as-is.
pub async fn substitute(parsed: &ParsedDocument, describer: &dyn ImageDescriber) -> String {
    let mut blocks = Vec::with_capacity(parsed.blocks.len());

    for block in &parsed.blocks {
        match placeholder_index(block).and_then(|index| parsed.images.get(index)) {
            Some(image) => {
                let description = describer
                    .describe(&image.bytes, &image.mime, &image.name)
                    .await;
                blocks.push(description);
            }
            None => blocks.push(block.clone()),
        }
    }

    blocks.join("\n")
}
