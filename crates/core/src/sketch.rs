//! Sketch record shapes as returned by the `/sketch` endpoints.

use serde::{Deserialize, Serialize};

use crate::status::SketchStatus;
use crate::types::{SketchId, Timestamp};

/// Rendering style applied to a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SketchStyle {
    Pencil,
    Watercolor,
    Oil,
    Acrylic,
    Pastel,
    Charcoal,
    Ink,
    Other,
}

/// Output colour mode of a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SketchType {
    BlackAndWhite,
    Color,
}

/// Processing method selecting the conversion pipeline variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SketchMethod {
    Basic,
    Advanced,
    Artistic,
}

/// One sketch conversion record owned by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sketch {
    pub id: SketchId,
    /// URL of the uploaded source image.
    pub original_image_url: String,
    /// URL of the generated sketch, once processing completed.
    pub sketch_image_url: String,
    pub status: SketchStatus,
    #[serde(rename = "type")]
    pub sketch_type: SketchType,
    pub style: SketchStyle,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_sketch_record() {
        let json = r#"{
            "id": 7,
            "original_image_url": "https://cdn.example/in.png",
            "sketch_image_url": "https://cdn.example/out.png",
            "status": "processing",
            "type": "black_and_white",
            "style": "pencil",
            "created_at": "2026-08-01T10:00:00Z",
            "updated_at": "2026-08-01T10:00:05Z"
        }"#;

        let sketch: Sketch = serde_json::from_str(json).unwrap();
        assert_eq!(sketch.id, 7);
        assert_eq!(sketch.status, SketchStatus::Processing);
        assert_eq!(sketch.sketch_type, SketchType::BlackAndWhite);
        assert_eq!(sketch.style, SketchStyle::Pencil);
    }

    #[test]
    fn style_wire_form_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&SketchType::BlackAndWhite).unwrap(),
            "\"black_and_white\""
        );
    }
}
