use base64::{engine::general_purpose, Engine as _};
use url::Url;

/// 图片格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    /// 从MIME类型获取图片格式，未知类型按JPEG处理
    pub fn from_mime_type(mime_type: &str) -> Self {
        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "image/png" => Self::Png,
            "image/gif" => Self::Gif,
            "image/webp" => Self::Webp,
            _ => Self::Jpeg,
        }
    }

    pub fn to_extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }
}

/// A raw image string as submitted by clients, classified once at the
/// request boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// `data:image/png;base64,....`
    DataUrl { mime_type: String, data: String },
    /// Remote image to download.
    HttpUrl(Url),
    /// Bare base64 with no data-URL prefix.
    RawBase64(String),
    /// Browser-local `blob:` reference; only the client can resolve it.
    BlobRef(String),
    Invalid(String),
}

impl ImagePayload {
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Self::Invalid("empty image payload".to_string());
        }

        if let Some(rest) = trimmed.strip_prefix("data:") {
            let Some((meta, data)) = rest.split_once(',') else {
                return Self::Invalid("data URL without payload".to_string());
            };
            if !meta.to_ascii_lowercase().contains("base64") {
                return Self::Invalid("data URL is not base64 encoded".to_string());
            }
            let mime_type = meta.split(';').next().unwrap_or_default().to_string();
            if !mime_type.starts_with("image/") {
                return Self::Invalid(format!("unsupported data URL type '{}'", mime_type));
            }
            return Self::DataUrl {
                mime_type,
                data: strip_whitespace(data),
            };
        }

        if trimmed.starts_with("blob:") {
            return Self::BlobRef(trimmed.to_string());
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return match Url::parse(trimmed) {
                Ok(url) => Self::HttpUrl(url),
                Err(e) => Self::Invalid(format!("invalid image URL: {}", e)),
            };
        }

        let cleaned = strip_whitespace(trimmed);
        match general_purpose::STANDARD.decode(&cleaned) {
            Ok(bytes) if !bytes.is_empty() => Self::RawBase64(cleaned),
            _ => Self::Invalid("payload is neither a URL nor base64 image data".to_string()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::DataUrl { .. } => "data_url",
            Self::HttpUrl(_) => "http_url",
            Self::RawBase64(_) => "raw_base64",
            Self::BlobRef(_) => "blob_ref",
            Self::Invalid(_) => "invalid",
        }
    }
}

/// 解码Base64图片数据
pub fn decode_base64(data: &str) -> Result<Vec<u8>, String> {
    general_purpose::STANDARD
        .decode(data)
        .map_err(|e| format!("Base64 decode failed: {}", e))
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_data_url() {
        let payload = ImagePayload::classify("data:image/png;base64,aGVsbG8=");
        assert_eq!(
            payload,
            ImagePayload::DataUrl {
                mime_type: "image/png".to_string(),
                data: "aGVsbG8=".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_urls() {
        assert!(matches!(
            ImagePayload::classify("https://cdn.example.com/cat.jpg"),
            ImagePayload::HttpUrl(_)
        ));
        assert!(matches!(
            ImagePayload::classify("blob:http://localhost:3000/5f1c"),
            ImagePayload::BlobRef(_)
        ));
    }

    #[test]
    fn test_classify_raw_base64_and_garbage() {
        assert_eq!(
            ImagePayload::classify(" aGVs\nbG8= "),
            ImagePayload::RawBase64("aGVsbG8=".to_string())
        );
        assert!(matches!(ImagePayload::classify("not base64!!"), ImagePayload::Invalid(_)));
        assert!(matches!(ImagePayload::classify("   "), ImagePayload::Invalid(_)));
        assert!(matches!(ImagePayload::classify("data:image/png;base64"), ImagePayload::Invalid(_)));
        assert!(matches!(ImagePayload::classify("data:text/plain;base64,aGk="), ImagePayload::Invalid(_)));
    }

    #[test]
    fn test_extension_from_mime() {
        assert_eq!(ImageFormat::from_mime_type("image/png").to_extension(), "png");
        assert_eq!(ImageFormat::from_mime_type("image/GIF").to_extension(), "gif");
        assert_eq!(ImageFormat::from_mime_type("image/webp; q=1").to_extension(), "webp");
        assert_eq!(ImageFormat::from_mime_type("image/jpeg").to_extension(), "jpg");
        assert_eq!(ImageFormat::from_mime_type("application/octet-stream").to_extension(), "jpg");
    }
}
