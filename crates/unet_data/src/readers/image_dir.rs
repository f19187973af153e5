use crate::dataset::DataSource;
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions treated as images (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff"];

/// Streams image file paths from a directory, recursively, in sorted order.
/// Paths are yielded lazily; nothing is decoded here.
///
/// # Example
/// ```ignore
/// let source = ImageDirSource::new("./data/train/image", &["png"]);
/// for path in source.stream()? {
///     println!("{}", path?.display());
/// }
/// ```
pub struct ImageDirSource {
    dir_path: PathBuf,
    extensions: Vec<String>,
}

impl ImageDirSource {
    /// Creates a new image directory source.
    ///
    /// # Arguments
    /// - `dir_path`: Directory to scan.
    /// - `extensions`: File extensions to include (e.g., `["jpg", "png"]`). Case-insensitive.
    pub fn new(dir_path: impl Into<PathBuf>, extensions: &[&str]) -> Self {
        Self {
            dir_path: dir_path.into(),
            extensions: extensions.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Source accepting every extension in [`IMAGE_EXTENSIONS`].
    pub fn with_image_extensions(dir_path: impl Into<PathBuf>) -> Self {
        Self::new(dir_path, &IMAGE_EXTENSIONS)
    }

    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    fn has_image_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_lowercase()))
    }
}

/// Returns an iterator over image file paths, sorted by path.
impl DataSource<PathBuf> for ImageDirSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<PathBuf>> + Send>> {
        // Early validation: ensure the directory exists and is indeed a directory.
        let dir_metadata = fs::metadata(&self.dir_path)
            .with_context(|| format!("Failed to access directory: {}", self.dir_path.display()))?;
        if !dir_metadata.is_dir() {
            bail!("Path is not a directory: {}", self.dir_path.display());
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.dir_path).sort_by_file_name() {
            let entry = entry.map_err(|e| anyhow!("Failed to read directory entry: {}", e))?;
            if entry.file_type().is_file() && self.has_image_extension(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();
        Ok(Box::new(paths.into_iter().map(Ok)))
    }
}

/// Pairs `<dataset>/<folder>/image/*` with `<dataset>/<folder>/mask/*`.
///
/// Both directories are listed in sorted order and matched by position, so
/// images and masks must sort identically (normally: same file names).
/// Differing stems are logged but not rejected, as masks often carry a
/// different extension or suffix.
pub struct PairedDirSource {
    images: ImageDirSource,
    masks: ImageDirSource,
}

impl PairedDirSource {
    pub fn new(dataset_dir: impl AsRef<Path>, folder: &str) -> Self {
        let root = dataset_dir.as_ref().join(folder);
        Self {
            images: ImageDirSource::with_image_extensions(root.join("image")),
            masks: ImageDirSource::with_image_extensions(root.join("mask")),
        }
    }

    pub fn image_dir(&self) -> &Path {
        self.images.dir_path()
    }

    pub fn mask_dir(&self) -> &Path {
        self.masks.dir_path()
    }

    /// Lists and pairs both directories.
    pub fn pairs(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        let images: Vec<PathBuf> = self.images.stream()?.collect::<Result<_>>()?;
        let masks: Vec<PathBuf> = self.masks.stream()?.collect::<Result<_>>()?;

        ensure!(
            !images.is_empty(),
            "No images found in {}",
            self.images.dir_path().display()
        );
        ensure!(
            images.len() == masks.len(),
            "Found {} images in {} but {} masks in {}",
            images.len(),
            self.images.dir_path().display(),
            masks.len(),
            self.masks.dir_path().display()
        );

        for (image, mask) in images.iter().zip(&masks) {
            if image.file_stem() != mask.file_stem() {
                tracing::warn!(
                    image = %image.display(),
                    mask = %mask.display(),
                    "image and mask file names differ; pairing by sorted position"
                );
            }
        }
        Ok(images.into_iter().zip(masks).collect())
    }
}

impl DataSource<(PathBuf, PathBuf)> for PairedDirSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<(PathBuf, PathBuf)>> + Send>> {
        Ok(Box::new(self.pairs()?.into_iter().map(Ok)))
    }
}
