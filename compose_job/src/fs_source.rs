//! Filesystem-backed `ImageSource`: resolves the relative `href`s
//! `shapes.svg` references against the published recording directory.

use compose_engine::IngestError;
use std::path::PathBuf;

pub struct FileImageSource {
    root: PathBuf,
}

impl FileImageSource {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl compose_engine::ImageSource for FileImageSource {
    fn load(&self, href: &str) -> Result<Vec<u8>, IngestError> {
        let path = self.root.join(href);
        std::fs::read(&path).map_err(|source| IngestError::Io { path: path.display().to_string(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compose_engine::ImageSource;

    #[test]
    fn missing_file_is_an_io_error() {
        let source = FileImageSource::new(PathBuf::from("/nonexistent-root-xyz"));
        assert!(source.load("poll1.png").is_err());
    }
}
