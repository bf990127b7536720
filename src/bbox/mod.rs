//! Bounding boxes: decoding them out of model replies and drawing them onto images.

pub mod colour;
pub mod decoder;
pub mod font;
pub mod image_prep;
pub mod renderer;
pub mod types;

pub use colour::{BoxColour, ColourSource, FixedColours, RandomColours};
pub use decoder::{decode, decode_detailed, DecodeSource, Decoded};
pub use font::{BuiltinFontProvider, FileFontProvider, FontProvider, LabelFont};
pub use renderer::{layout_box, AnnotatedImage, BoxLayout, BoxRenderer, RenderStyle, RenderedBox};
pub use types::{LabelledBoxes, NormalizedBox, PixelRect};
