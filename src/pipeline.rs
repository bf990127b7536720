/// Detection pipeline: prepare the image, ask the model, decode the reply and
/// draw whatever boxes came back.
use image::DynamicImage;

use crate::bbox::colour::ColourSource;
use crate::bbox::decoder::decode_detailed;
use crate::bbox::font::FontProvider;
use crate::bbox::image_prep::{encode_png, resize_to_fit};
use crate::bbox::renderer::{AnnotatedImage, BoxRenderer};
use crate::bbox::types::LabelledBoxes;
use crate::errors::BoxLensResult;
use crate::llm::provider::VisionModel;
use crate::llm::types::{CallConfig, EncodedImage, VisionRequest};

pub struct DetectionOutcome {
    /// The model's reply, verbatim.
    pub response_text: String,
    pub boxes: LabelledBoxes,
    /// `None` when the reply held no boxes.
    pub annotated: Option<AnnotatedImage>,
}

/// Run one detection cycle:
///
/// 1. Downscale the image to fit `max_size`.
/// 2. Send it as PNG with `prompt` to `model`.
/// 3. Decode the reply.
/// 4. If any boxes were found, render them onto the resized image.
pub async fn run<P: FontProvider>(
    model: &dyn VisionModel,
    call: &CallConfig,
    image: DynamicImage,
    prompt: &str,
    renderer: &BoxRenderer<P>,
    colours: &mut dyn ColourSource,
    max_size: u32,
) -> BoxLensResult<DetectionOutcome> {
    let resized = resize_to_fit(image, max_size);
    let request = VisionRequest {
        prompt: prompt.to_string(),
        image: EncodedImage::png(encode_png(&resized)?),
    };

    tracing::info!(
        provider = model.name(),
        model = %call.model,
        width = resized.width(),
        height = resized.height(),
        "requesting bounding boxes"
    );
    let response_text = model.generate(&request, call).await?;

    let decoded = decode_detailed(&response_text);
    if decoded.boxes.is_empty() {
        tracing::warn!("no bounding boxes found in model response");
        return Ok(DetectionOutcome {
            response_text,
            boxes: decoded.boxes,
            annotated: None,
        });
    }

    tracing::info!(count = decoded.boxes.len(), source = ?decoded.source, "bounding boxes decoded");
    let annotated = renderer.render(&resized, &decoded.boxes, colours);
    Ok(DetectionOutcome {
        response_text,
        boxes: decoded.boxes,
        annotated: Some(annotated),
    })
}
