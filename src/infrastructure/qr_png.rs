use crate::domain::order::ArtifactPath;
use crate::domain::ports::PayloadRenderer;
use crate::error::RenderError;
use crate::qris::Payload;
use async_trait::async_trait;
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes payloads as PNG QR codes into a directory served under a public prefix.
///
/// Files are named `<name_hint>.png` and replaced atomically (temporary file
/// plus rename), so a retry with the same hint overwrites the earlier image.
#[derive(Debug, Clone)]
pub struct PngQrRenderer {
    output_dir: PathBuf,
    public_prefix: String,
    min_size: u32,
}

impl PngQrRenderer {
    pub const DEFAULT_SIZE: u32 = 512;

    pub fn new(output_dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            public_prefix: public_prefix.into(),
            min_size: Self::DEFAULT_SIZE,
        }
    }

    /// Minimum width and height of the rendered image, in pixels.
    pub fn with_size(mut self, pixels: u32) -> Self {
        self.min_size = pixels;
        self
    }

    fn public_path(&self, file_name: &str) -> ArtifactPath {
        ArtifactPath(format!(
            "{}/{}",
            self.public_prefix.trim_end_matches('/'),
            file_name
        ))
    }
}

#[async_trait]
impl PayloadRenderer for PngQrRenderer {
    async fn render(
        &self,
        payload: &Payload,
        name_hint: &str,
    ) -> Result<ArtifactPath, RenderError> {
        validate_name(name_hint)?;
        let file_name = format!("{name_hint}.png");
        let dir = self.output_dir.clone();
        let target = dir.join(&file_name);
        let data = payload.as_str().to_owned();
        let size = self.min_size;

        tokio::task::spawn_blocking(move || write_png(&dir, &target, &data, size))
            .await??;

        debug!(file = %file_name, "rendered payload image");
        Ok(self.public_path(&file_name))
    }

    async fn discard(&self, artifact: &ArtifactPath) -> Result<(), RenderError> {
        let file_name = artifact.file_name();
        let stem = file_name
            .strip_suffix(".png")
            .ok_or_else(|| RenderError::InvalidName(file_name.to_owned()))?;
        validate_name(stem)?;

        match tokio::fs::remove_file(self.output_dir.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn write_png(
    dir: &Path,
    target: &Path,
    data: &str,
    size: u32,
) -> Result<(), RenderError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(size, size)
        .build();

    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    image.write_to(&mut file, ImageFormat::Png)?;
    file.persist(target).map_err(|err| RenderError::Io(err.error))?;
    Ok(())
}

/// Name hints become file names, so only `[A-Za-z0-9_-]` is accepted.
fn validate_name(name: &str) -> Result<(), RenderError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RenderError::InvalidName(name.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::qris::build_dynamic_payload;
    use tempfile::tempdir;

    fn payload() -> Payload {
        build_dynamic_payload("000201010211", Amount::new(150000))
    }

    #[tokio::test]
    async fn test_render_writes_png_under_public_prefix() {
        let dir = tempdir().unwrap();
        let renderer = PngQrRenderer::new(dir.path().join("qrs"), "/qrs/");

        let artifact = renderer.render(&payload(), "order-1").await.unwrap();

        assert_eq!(artifact.as_str(), "/qrs/order-1.png");
        let image = image::open(dir.path().join("qrs/order-1.png")).unwrap();
        assert!(image.width() >= PngQrRenderer::DEFAULT_SIZE);
        assert_eq!(image.width(), image.height());
    }

    #[tokio::test]
    async fn test_render_honours_configured_size() {
        let dir = tempdir().unwrap();
        let renderer = PngQrRenderer::new(dir.path(), "/qrs").with_size(1024);

        renderer.render(&payload(), "order-9").await.unwrap();

        let image = image::open(dir.path().join("order-9.png")).unwrap();
        assert!(image.width() >= 1024);
    }

    #[tokio::test]
    async fn test_render_is_idempotent_per_name() {
        let dir = tempdir().unwrap();
        let renderer = PngQrRenderer::new(dir.path(), "/qrs");

        renderer.render(&payload(), "order-2").await.unwrap();
        let first = std::fs::read(dir.path().join("order-2.png")).unwrap();
        renderer.render(&payload(), "order-2").await.unwrap();
        let second = std::fs::read(dir.path().join("order-2.png")).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_render_rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let renderer = PngQrRenderer::new(dir.path(), "/qrs");

        for name in ["", "../escape", "a/b", "order 1"] {
            assert!(matches!(
                renderer.render(&payload(), name).await,
                Err(RenderError::InvalidName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_discard_removes_file_and_tolerates_missing() {
        let dir = tempdir().unwrap();
        let renderer = PngQrRenderer::new(dir.path(), "/qrs");
        let artifact = renderer.render(&payload(), "order-3").await.unwrap();

        renderer.discard(&artifact).await.unwrap();
        assert!(!dir.path().join("order-3.png").exists());
        renderer.discard(&artifact).await.unwrap();
    }
}
