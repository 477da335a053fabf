//! Image uploads to the CMS asset store.

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::cms::{CmsClient, CmsError};
use crate::config::MediaConfig;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("only image uploads are accepted (got {0})")]
    UnsupportedType(String),

    #[error("file is larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("file is empty")]
    Empty,

    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),
}

/// An uploaded image, addressed on the public media domain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub id: String,
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

pub struct MediaService<'a> {
    cms: &'a CmsClient,
    config: &'a MediaConfig,
}

impl<'a> MediaService<'a> {
    #[must_use]
    pub const fn new(cms: &'a CmsClient, config: &'a MediaConfig) -> Self {
        Self { cms, config }
    }

    /// Check type and size before anything leaves the process.
    ///
    /// # Errors
    ///
    /// Returns `MediaError` describing the first rule the file breaks.
    pub fn check(&self, content_type: &str, size: usize) -> Result<(), MediaError> {
        if !content_type.starts_with("image/") || content_type.contains("svg") {
            return Err(MediaError::UnsupportedType(content_type.to_string()));
        }
        if size == 0 {
            return Err(MediaError::Empty);
        }
        if size > self.config.max_upload_bytes {
            return Err(MediaError::TooLarge {
                limit: self.config.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Upload an image and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns `MediaError` if the file is rejected locally or by the CMS.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> Result<UploadedImage, MediaError> {
        self.check(content_type, bytes.len())?;
        let size = bytes.len();
        let asset = self.cms.upload_image(bytes, content_type, filename).await?;

        Ok(UploadedImage {
            id: asset.id,
            url: public_url(&asset.url, self.config.public_domain.as_deref()),
            content_type: asset.mime_type.unwrap_or_else(|| content_type.to_string()),
            size,
        })
    }
}

/// Serve an asset URL from the public media domain, keeping its path.
#[must_use]
pub fn public_url(asset_url: &str, public_domain: Option<&str>) -> String {
    let Some(domain) = public_domain else {
        return asset_url.to_string();
    };
    let Ok(mut url) = url::Url::parse(asset_url) else {
        return asset_url.to_string();
    };
    if url.set_host(Some(domain)).is_err() {
        return asset_url.to_string();
    }
    let _ = url.set_scheme("https");
    let _ = url.set_port(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_rewrites_host() {
        assert_eq!(
            public_url(
                "https://cdn.sanity.io/images/abc123/production/f00-800x600.jpg",
                Some("media.threadline.test")
            ),
            "https://media.threadline.test/images/abc123/production/f00-800x600.jpg"
        );
    }

    #[test]
    fn test_public_url_without_domain_or_bad_url() {
        assert_eq!(public_url("https://cdn.test/a.jpg", None), "https://cdn.test/a.jpg");
        assert_eq!(public_url("not a url", Some("media.test")), "not a url");
    }

    #[test]
    fn test_check_rules() {
        let cms = CmsClient::new(&crate::config::CmsConfig {
            project_id: "p".to_string(),
            dataset: "d".to_string(),
            api_version: "v1".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
            read_token: None,
            write_token: secrecy::SecretString::from("t"),
        });
        let config = MediaConfig {
            public_domain: None,
            max_upload_bytes: 10,
        };
        let service = MediaService::new(&cms, &config);

        assert!(service.check("image/png", 10).is_ok());
        assert!(matches!(service.check("image/png", 11), Err(MediaError::TooLarge { limit: 10 })));
        assert!(matches!(service.check("image/png", 0), Err(MediaError::Empty)));
        assert!(matches!(service.check("text/html", 5), Err(MediaError::UnsupportedType(_))));
        assert!(matches!(service.check("image/svg+xml", 5), Err(MediaError::UnsupportedType(_))));
    }
}
