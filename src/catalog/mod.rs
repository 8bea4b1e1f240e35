//! Catalogue of core images a bucket may use

use serde::Serialize;

use crate::bucket::ImageDescriptor;
use crate::error::{ResenError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoreImage {
    pub version: String,
    pub repo: String,
    pub org: String,
    pub image_id: String,
    pub repodigest: String,
}

impl CoreImage {
    /// Digest-pinned reference the engine can pull
    pub fn pull_reference(&self) -> String {
        format!("{}/{}@{}", self.org, self.repo, self.repodigest)
    }

    pub fn descriptor(&self) -> ImageDescriptor {
        ImageDescriptor {
            version: self.version.clone(),
            image_id: self.image_id.clone(),
            pull_reference: Some(self.pull_reference()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageCatalog {
    images: Vec<CoreImage>,
}

impl Default for ImageCatalog {
    fn default() -> Self {
        Self::new(vec![CoreImage {
            version: "2019.1.0rc2".to_string(),
            repo: "resen-core".to_string(),
            org: "earthcubeingeo".to_string(),
            image_id: "sha256:8b4750aa5186bdcf69a50fa10b0fd24a7c2293ef6135a9fdc594e0362443c99c"
                .to_string(),
            repodigest: "sha256:2fe3436297c23a0d5393c8dae8661c40fc73140e602bd196af3be87a5e215bc2"
                .to_string(),
        }])
    }
}

impl ImageCatalog {
    pub fn new(images: Vec<CoreImage>) -> Self {
        Self { images }
    }

    pub fn images(&self) -> &[CoreImage] {
        &self.images
    }

    /// Look up a catalogued version.
    pub fn resolve(&self, version: &str) -> Result<&CoreImage> {
        self.images.iter().find(|i| i.version == version).ok_or_else(|| {
            let valid: Vec<&str> = self.images.iter().map(|i| i.version.as_str()).collect();
            ResenError::Validation(format!(
                "Invalid core version '{}'. Valid versions: {}",
                version,
                valid.join(", ")
            ))
        })
    }
}
