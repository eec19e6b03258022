//! Grid collages used as announcement pictures.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, imageops::FilterType};
use thiserror::Error;
use uuid::Uuid;

use crate::uploads;

pub const MAX_IMAGES: usize = 4;
pub const CELL_SIZE: u32 = 800;
pub const PADDING: u32 = 10;

#[derive(Debug, Error)]
pub enum CollageError {
    #[error("no images to compose")]
    Empty,

    #[error("invalid image path {0}")]
    Path(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("collage task failed: {0}")]
    Task(String),
}

/// Columns and rows for `count` images: one row up to two images, 2x2 above.
pub fn grid_layout(count: usize) -> (u32, u32) {
    let count = count.min(MAX_IMAGES) as u32;
    if count <= 2 { (count, 1) } else { (2, 2) }
}

pub fn canvas_size(cols: u32, rows: u32) -> (u32, u32) {
    (
        cols * CELL_SIZE + (cols + 1) * PADDING,
        rows * CELL_SIZE + (rows + 1) * PADDING,
    )
}

/// Fit each image into its cell, keeping aspect ratio, centred on white.
pub fn compose(images: &[DynamicImage]) -> Result<RgbImage, CollageError> {
    let images = &images[..images.len().min(MAX_IMAGES)];
    if images.is_empty() {
        return Err(CollageError::Empty);
    }
    let (cols, rows) = grid_layout(images.len());
    let (width, height) = canvas_size(cols, rows);
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (index, source) in images.iter().enumerate() {
        let col = index as u32 % cols;
        let row = index as u32 / cols;
        let fitted = source
            .resize(CELL_SIZE, CELL_SIZE, FilterType::Lanczos3)
            .to_rgb8();
        let x = PADDING + col * (CELL_SIZE + PADDING) + (CELL_SIZE - fitted.width()) / 2;
        let y = PADDING + row * (CELL_SIZE + PADDING) + (CELL_SIZE - fitted.height()) / 2;
        image::imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));
    }

    Ok(canvas)
}

/// Compose the readable images among `sources`. Files that cannot be opened
/// are skipped; only a batch with nothing readable fails.
pub fn build_collage(sources: &[PathBuf], dest: &Path) -> Result<usize, CollageError> {
    let images: Vec<DynamicImage> = sources
        .iter()
        .filter_map(|source| match image::open(source) {
            Ok(img) => Some(img),
            Err(err) => {
                tracing::warn!(image = %source.display(), error = %err, "skipping unreadable collage image");
                None
            }
        })
        .take(MAX_IMAGES)
        .collect();
    let canvas = compose(&images)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    DynamicImage::ImageRgb8(canvas).save_with_format(dest, ImageFormat::Jpeg)?;
    Ok(images.len())
}

/// Compose stored images into as many collages as needed, four per collage.
/// Missing files are left out. Returns the web paths of the generated files.
pub async fn create_collages(
    upload_root: &Path,
    image_paths: &[String],
) -> Result<Vec<String>, CollageError> {
    let mut existing = Vec::with_capacity(image_paths.len());
    for web_path in image_paths {
        let source = uploads::resolve(upload_root, web_path)
            .ok_or_else(|| CollageError::Path(web_path.clone()))?;
        if tokio::fs::try_exists(&source).await.unwrap_or(false) {
            existing.push(source);
        } else {
            tracing::warn!(image = %web_path, "collage image not found, skipping");
        }
    }

    let mut collages = Vec::new();
    for chunk in existing.chunks(MAX_IMAGES) {
        let sources = chunk.to_vec();
        let file_name = format!("collage_{}.jpg", Uuid::new_v4());
        let web_path = uploads::web_path(&file_name);
        let dest = uploads::uploads_dir(upload_root).join(&file_name);

        let built = tokio::task::spawn_blocking(move || build_collage(&sources, &dest))
            .await
            .map_err(|e| CollageError::Task(e.to_string()))?;
        match built {
            Ok(images) => {
                tracing::debug!(collage = %web_path, images, "collage created");
                collages.push(web_path);
            }
            Err(CollageError::Empty) => {
                tracing::warn!(images = chunk.len(), "no readable images in batch, collage skipped");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(collages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn layout_follows_image_count() {
        assert_eq!(grid_layout(1), (1, 1));
        assert_eq!(grid_layout(2), (2, 1));
        assert_eq!(grid_layout(3), (2, 2));
        assert_eq!(grid_layout(4), (2, 2));
        assert_eq!(grid_layout(9), (2, 2));
    }

    #[test]
    fn canvas_includes_padding() {
        assert_eq!(canvas_size(1, 1), (820, 820));
        assert_eq!(canvas_size(2, 2), (1630, 1630));
    }

    #[test]
    fn images_are_fitted_and_centred() {
        let wide = solid(400, 200, [255, 0, 0]);
        let canvas = compose(&[wide]).unwrap();
        assert_eq!(canvas.dimensions(), (820, 820));

        // Scaled to 800x400 and centred vertically: rows 210..610 are red.
        let centre = canvas.get_pixel(410, 410);
        assert!(centre[0] > 240 && centre[1] < 15 && centre[2] < 15);
        assert_eq!(canvas.get_pixel(410, 100), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(5, 410), &Rgb([255, 255, 255]));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(compose(&[]), Err(CollageError::Empty)));
    }

    #[tokio::test]
    async fn collages_are_batched_by_four() {
        let dir = tempfile::tempdir().unwrap();
        let uploads_dir = uploads::uploads_dir(dir.path());
        std::fs::create_dir_all(&uploads_dir).unwrap();

        let mut stored = Vec::new();
        for i in 0..5u8 {
            let name = format!("p{i}.png");
            solid(60, 90, [i * 40, 10, 10])
                .save_with_format(uploads_dir.join(&name), ImageFormat::Png)
                .unwrap();
            stored.push(uploads::web_path(&name));
        }

        let collages = create_collages(dir.path(), &stored).await.unwrap();
        assert_eq!(collages.len(), 2);
        for collage in &collages {
            assert!(collage.starts_with("/uploads/collage_"));
            let file = uploads::resolve(dir.path(), collage).unwrap();
            let (w, h) = image::image_dimensions(file).unwrap();
            assert!(w > 0 && h > 0);
        }

        let last = uploads::resolve(dir.path(), &collages[1]).unwrap();
        assert_eq!(image::image_dimensions(last).unwrap(), (820, 820));
    }

    #[tokio::test]
    async fn missing_and_unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let uploads_dir = uploads::uploads_dir(dir.path());
        std::fs::create_dir_all(&uploads_dir).unwrap();
        solid(40, 40, [0, 200, 0])
            .save_with_format(uploads_dir.join("ok.png"), ImageFormat::Png)
            .unwrap();
        std::fs::write(uploads_dir.join("broken.jpg"), b"not an image").unwrap();

        let stored = vec![
            "/uploads/ok.png".to_string(),
            "/uploads/gone.jpg".to_string(),
            "/uploads/broken.jpg".to_string(),
        ];
        let collages = create_collages(dir.path(), &stored).await.unwrap();
        assert_eq!(collages.len(), 1);
        let file = uploads::resolve(dir.path(), &collages[0]).unwrap();
        assert_eq!(image::image_dimensions(file).unwrap(), (820, 820));
    }

    #[tokio::test]
    async fn nothing_readable_yields_no_collages() {
        let dir = tempfile::tempdir().unwrap();
        let stored = vec!["/uploads/gone.jpg".to_string()];
        assert!(create_collages(dir.path(), &stored).await.unwrap().is_empty());
    }
}
