use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const PNG_MIME_TYPE: &str = "image/png";
const PNG_SIGNATURE: &[u8] = b"\x89PNG";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    pub mime_type: &'static str,
    pub payload: String, // Base64 encoded
}

impl ImageResult {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(PipelineError::Image("Backend returned an empty image".into()));
        }
        if !bytes.starts_with(PNG_SIGNATURE) {
            return Err(PipelineError::Image("Backend returned a non-PNG image".into()));
        }
        Ok(Self {
            mime_type: PNG_MIME_TYPE,
            payload: STANDARD.encode(bytes),
        })
    }

    /// Inline form embeddable straight into an `<img src>`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }
}

/// Decodes a base64 image payload returned by an upstream backend.
pub fn decode_image_payload(data: &str) -> Result<Vec<u8>> {
    let bytes = STANDARD
        .decode(data.trim().as_bytes())
        .map_err(|e| PipelineError::Image(format!("Invalid base64 image payload: {}", e)))?;
    if bytes.is_empty() {
        return Err(PipelineError::Image("Backend returned an empty image".into()));
    }
    Ok(bytes)
}

#[derive(Deserialize)]
pub struct TitanImageResponse {
    pub images: Vec<String>,
}

#[derive(Deserialize)]
pub struct OpenAiImageResponse {
    #[serde(default)]
    pub data: Vec<OpenAiImageDatum>,
}

#[derive(Deserialize)]
pub struct OpenAiImageDatum {
    pub b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_shape() {
        let image = ImageResult::from_bytes(&[137, 80, 78, 71]).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.to_data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_empty_bytes_rejected() {
        assert!(matches!(
            ImageResult::from_bytes(&[]),
            Err(PipelineError::Image(_))
        ));
    }

    #[test]
    fn test_non_png_bytes_rejected() {
        let jpeg = decode_image_payload("/9j/4A==").unwrap();
        assert_eq!(
            ImageResult::from_bytes(&jpeg).unwrap_err(),
            PipelineError::Image("Backend returned a non-PNG image".into())
        );
    }

    #[test]
    fn test_invalid_payload_rejected() {
        assert!(matches!(
            decode_image_payload("not base64!!"),
            Err(PipelineError::Image(_))
        ));
        assert!(decode_image_payload("").is_err());
        assert_eq!(decode_image_payload("iVBORw==").unwrap(), vec![137, 80, 78, 71]);
    }
}
