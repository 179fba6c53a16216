//! Local disk storage for uploaded images and their thumbnails.

use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat};
use uuid::Uuid;

use crate::error::ServiceError;

/// Longest edge of a generated thumbnail, in pixels.
pub const THUMBNAIL_SIZE: u32 = 300;

/// Formats an upload may have.
pub const ACCEPTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

pub const UNSUPPORTED_IMAGE: &str = "The image must be a file of type: png, jpeg, gif, webp.";

const IMAGE_DIR: &str = "images";
const THUMBNAIL_DIR: &str = "images/thumbnails";

/// An upload whose content decoded as one of the accepted formats.
pub struct ImageUpload {
    format: ImageFormat,
    bytes: Vec<u8>,
    image: DynamicImage,
}

impl ImageUpload {
    /// `None` when the bytes are not a readable image of an accepted format.
    /// The file name plays no part.
    pub async fn decode(bytes: Vec<u8>) -> Result<Option<Self>, ServiceError> {
        Ok(tokio::task::spawn_blocking(move || Self::decode_blocking(bytes)).await?)
    }

    fn decode_blocking(bytes: Vec<u8>) -> Option<Self> {
        let format = image::guess_format(&bytes)
            .ok()
            .filter(|format| ACCEPTED_FORMATS.contains(format))?;
        let image = image::load_from_memory_with_format(&bytes, format).ok()?;

        Some(ImageUpload {
            format,
            bytes,
            image,
        })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Relative paths of one stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    /// `None` when the thumbnail could not be written.
    pub thumbnail_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes the upload under a fresh name and tries to add a thumbnail.
    pub async fn store_image(&self, upload: ImageUpload) -> io::Result<StoredFile> {
        let name = format!("{}.{}", Uuid::new_v4(), upload.extension());
        let path = format!("{}/{}", IMAGE_DIR, name);
        let thumbnail_path = format!("{}/{}", THUMBNAIL_DIR, name);

        tokio::fs::create_dir_all(self.root.join(IMAGE_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(THUMBNAIL_DIR)).await?;
        tokio::fs::write(self.absolute(&path), &upload.bytes).await?;

        let target = self.absolute(&thumbnail_path);
        let ImageUpload { format, image, .. } = upload;
        let thumbnail = tokio::task::spawn_blocking(move || write_thumbnail(&image, format, &target))
            .await
            .map_err(|err| io::Error::new(ErrorKind::Other, err))?;

        let thumbnail_path = match thumbnail {
            Ok(()) => Some(thumbnail_path),
            Err(err) => {
                log::warn!("no thumbnail for {}: {}", path, err);
                None
            }
        };

        Ok(StoredFile {
            path,
            thumbnail_path,
        })
    }

    /// Removes a stored file and its thumbnail; files already gone are fine.
    pub async fn delete(&self, path: &str, thumbnail_path: Option<&str>) -> io::Result<()> {
        for relative in std::iter::once(path).chain(thumbnail_path) {
            match tokio::fs::remove_file(self.absolute(relative)).await {
                Err(err) if err.kind() != ErrorKind::NotFound => return Err(err),
                _ => {}
            }
        }
        Ok(())
    }
}

fn write_thumbnail(
    image: &DynamicImage,
    format: ImageFormat,
    target: &Path,
) -> Result<(), image::ImageError> {
    let thumbnail = image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
    match format {
        // The JPEG encoder takes no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(thumbnail.to_rgb8()).save_with_format(target, format),
        _ => thumbnail.save_with_format(target, format),
    }
}
