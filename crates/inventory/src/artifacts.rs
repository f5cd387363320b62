use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use qrcode::{render::svg, QrCode};
use sha2::{Digest, Sha256};

use crate::error::ArtifactError;

const LABEL_FOLDER: &str = "labels";
const IMAGE_FOLDER: &str = "items";
const LABEL_MIN_SIZE: u32 = 256;

/// Hosting boundary for generated labels and uploaded item images.
#[async_trait]
pub trait ArtifactPipeline: Send + Sync {
    /// Encodes `payload` as a scannable label and returns its public URL.
    async fn generate_label(&self, payload: &str) -> Result<String, ArtifactError>;

    /// Stores an uploaded image and returns its public URL.
    async fn store_image(&self, bytes: Bytes) -> Result<String, ArtifactError>;
}

/// Writes artifacts below a local directory that is served under `public_base`.
///
/// Files are content addressed, so storing the same bytes twice yields the
/// same URL.
pub struct LocalArtifacts {
    root: PathBuf,
    public_base: String,
}

impl LocalArtifacts {
    pub fn new(root: impl Into<PathBuf>, public_base: &str) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    async fn write(&self, folder: &str, name: &str, bytes: &[u8]) -> Result<String, ArtifactError> {
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(name), bytes).await?;
        Ok(format!("{}/{}/{}", self.public_base, folder, name))
    }
}

pub fn render_label_svg(payload: &str) -> Result<String, ArtifactError> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| ArtifactError::Encode(e.to_string()))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(LABEL_MIN_SIZE, LABEL_MIN_SIZE)
        .build())
}

/// File extension for common image formats, by magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "bin",
    }
}

fn content_name(bytes: &[u8], extension: &str) -> String {
    format!("{}.{}", hex::encode(Sha256::digest(bytes)), extension)
}

#[async_trait]
impl ArtifactPipeline for LocalArtifacts {
    async fn generate_label(&self, payload: &str) -> Result<String, ArtifactError> {
        let svg = render_label_svg(payload)?;
        let name = content_name(svg.as_bytes(), "svg");
        self.write(LABEL_FOLDER, &name, svg.as_bytes()).await
    }

    async fn store_image(&self, bytes: Bytes) -> Result<String, ArtifactError> {
        if bytes.is_empty() {
            return Err(ArtifactError::Rejected("empty image".to_string()));
        }
        let name = content_name(&bytes, sniff_extension(&bytes));
        self.write(IMAGE_FOLDER, &name, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_renders_svg() {
        let svg = render_label_svg("1700000000000-0a1b2c3d").unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn extension_sniffing() {
        assert_eq!(sniff_extension(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]), "png");
        assert_eq!(sniff_extension(&[0xFF, 0xD8, 0xFF, 0xE0]), "jpg");
        assert_eq!(sniff_extension(b"GIF89a"), "gif");
        assert_eq!(sniff_extension(b"RIFF\0\0\0\0WEBPVP8 "), "webp");
        assert_eq!(sniff_extension(b"hello"), "bin");
    }

    #[tokio::test]
    async fn local_artifacts_write_content_addressed_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = LocalArtifacts::new(dir.path(), "http://localhost:8080/artifacts/");

        let image = Bytes::from_static(&[0x89, b'P', b'N', b'G', 1, 2, 3]);
        let url = artifacts.store_image(image.clone()).await.unwrap();
        assert!(url.starts_with("http://localhost:8080/artifacts/items/"));
        assert!(url.ends_with(".png"));
        assert_eq!(artifacts.store_image(image).await.unwrap(), url);

        let file = url.rsplit('/').next().unwrap();
        assert!(dir.path().join("items").join(file).exists());

        let label = artifacts.generate_label("box-1").await.unwrap();
        assert!(label.starts_with("http://localhost:8080/artifacts/labels/"));
        assert!(label.ends_with(".svg"));
    }

    #[tokio::test]
    async fn empty_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = LocalArtifacts::new(dir.path(), "http://h/a");
        assert!(matches!(
            artifacts.store_image(Bytes::new()).await,
            Err(ArtifactError::Rejected(_))
        ));
    }
}
