//! Image sources for standalone image analysis.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use image::{DynamicImage, RgbImage};
use reqwest::Client;
use tracing::{debug, error};

use framesight_models::NormalizedImage;

use crate::error::{MediaError, MediaResult};
use crate::normalize::ImageNormalizer;

/// Maximum number of images in one analysis request.
pub const MAX_IMAGES: usize = 20;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Whether a path looks like a video container by extension.
pub fn is_video_file(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Where an image comes from. Resolved to pixels once, by [`ImageSource::load`].
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Remote image fetched over HTTP(S)
    Url(String),
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image bytes in memory
    Bytes(Vec<u8>),
    /// Decoded RGB pixels
    Pixels(RgbImage),
}

impl ImageSource {
    /// Interpret a command-line argument as a URL or a file path.
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            ImageSource::Url(arg.to_string())
        } else {
            ImageSource::Path(PathBuf::from(arg))
        }
    }

    /// Short description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            ImageSource::Pixels(image) => format!("<{}x{} pixels>", image.width(), image.height()),
        }
    }

    /// Resolve the source into a decoded image.
    pub async fn load(self, client: &Client) -> MediaResult<DynamicImage> {
        match self {
            ImageSource::Url(url) => {
                let bytes = fetch(client, &url).await?;
                Ok(image::load_from_memory(&bytes)?)
            }
            ImageSource::Path(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    MediaError::image_processing(format!("failed to open image {}: {}", path.display(), e))
                })?;
                Ok(image::load_from_memory(&bytes)?)
            }
            ImageSource::Bytes(bytes) => Ok(image::load_from_memory(&bytes)?),
            ImageSource::Pixels(image) => Ok(DynamicImage::ImageRgb8(image)),
        }
    }
}

async fn fetch(client: &Client, url: &str) -> MediaResult<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| MediaError::image_fetch(url, e.to_string()))?;

    if !response.status().is_success() {
        error!(url, status = %response.status(), "Error fetching image");
        return Err(MediaError::image_fetch(url, format!("server returned {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MediaError::image_fetch(url, e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Load and normalize up to [`MAX_IMAGES`] sources concurrently, preserving order.
pub async fn normalize_sources(
    sources: Vec<ImageSource>,
    normalizer: &ImageNormalizer,
    client: &Client,
) -> MediaResult<Vec<NormalizedImage>> {
    if sources.len() > MAX_IMAGES {
        return Err(MediaError::TooManyImages {
            max: MAX_IMAGES,
            provided: sources.len(),
        });
    }

    let normalizer = *normalizer;
    try_join_all(sources.into_iter().map(|source| async move {
        let description = source.describe();
        debug!(source = %description, "Loading image");
        let image = source.load(client).await?;
        normalizer.normalize(image).map_err(|e| {
            error!(source = %description, error = %e, "Error processing image source");
            e
        })
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut buffer, image::ImageOutputFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_parse_source() {
        assert!(matches!(ImageSource::parse("https://x.test/a.png"), ImageSource::Url(_)));
        assert!(matches!(ImageSource::parse("./a.png"), ImageSource::Path(_)));
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file("clip.MP4"));
        assert!(is_video_file("/tmp/movie.mkv"));
        assert!(!is_video_file("photo.png"));
        assert!(!is_video_file("noextension"));
    }

    #[tokio::test]
    async fn test_normalize_sources_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("wide.png");
        std::fs::write(&file, png_bytes(40, 10)).unwrap();

        let sources = vec![
            ImageSource::Pixels(RgbImage::new(8, 8)),
            ImageSource::Path(file),
            ImageSource::Bytes(png_bytes(3, 5)),
        ];

        let images = normalize_sources(sources, &ImageNormalizer::default(), &Client::new())
            .await
            .unwrap();

        let sizes: Vec<(u32, u32)> = images.iter().map(|i| (i.width, i.height)).collect();
        assert_eq!(sizes, vec![(8, 8), (40, 10), (3, 5)]);
    }

    #[tokio::test]
    async fn test_too_many_images() {
        let sources = (0..MAX_IMAGES + 1)
            .map(|_| ImageSource::Pixels(RgbImage::new(1, 1)))
            .collect();

        let err = normalize_sources(sources, &ImageNormalizer::default(), &Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::TooManyImages { max: 20, provided: 21 }));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = tokio_test::assert_err!(
            ImageSource::Path(PathBuf::from("/no/such/image.png"))
                .load(&Client::new())
                .await
        );
        assert!(err.is_image_processing());
    }

    #[tokio::test]
    async fn test_fetch_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/frame.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(6, 4)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = Client::new();
        let image = ImageSource::parse(&format!("{}/frame.png", server.uri()))
            .load(&client)
            .await
            .unwrap();
        assert_eq!((image.width(), image.height()), (6, 4));

        let err = ImageSource::parse(&format!("{}/missing.png", server.uri()))
            .load(&client)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ImageFetch { .. }));
    }
}
