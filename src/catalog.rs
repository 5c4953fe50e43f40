//! Assets the selector draws from and the catalog seam that supplies them.

use crate::error::ShortsResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub content: String,
    pub author: String,
}

impl Quote {
    pub fn new(content: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            author: author.into(),
        }
    }
}

/// One encoded rendition of a stock clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipVariant {
    pub width: u32,
    pub height: u32,
    pub link: String,
    pub quality: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipCandidate {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub variants: Vec<ClipVariant>,
}

impl ClipCandidate {
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }

    /// Variant with the most vertical resolution, wider wins a tie.
    pub fn best_variant(&self) -> Option<&ClipVariant> {
        self.variants
            .iter()
            .filter(|v| !v.link.is_empty())
            .max_by_key(|v| (v.height, v.width))
    }
}

/// A source of candidates, queried once per selection attempt.
#[async_trait]
pub trait Catalog: Send {
    type Item: Send;

    /// Fetches the batch for attempt `attempt` (1-based).
    async fn fetch(&mut self, attempt: u32) -> ShortsResult<Vec<Self::Item>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(width: u32, height: u32, link: &str) -> ClipVariant {
        ClipVariant {
            width,
            height,
            link: link.to_string(),
            quality: None,
            file_type: Some("video/mp4".to_string()),
        }
    }

    #[test]
    fn best_variant_prefers_tallest() {
        let clip = ClipCandidate {
            id: 7,
            width: 1080,
            height: 1920,
            variants: vec![
                variant(720, 1280, "sd"),
                variant(2160, 3840, "uhd"),
                variant(1080, 1920, "hd"),
            ],
        };
        assert_eq!(clip.best_variant().map(|v| v.link.as_str()), Some("uhd"));
        assert!(clip.is_portrait());
    }

    #[test]
    fn best_variant_breaks_ties_on_width_and_skips_empty_links() {
        let clip = ClipCandidate {
            id: 8,
            width: 1920,
            height: 1080,
            variants: vec![
                variant(1280, 1080, "narrow"),
                variant(1920, 1080, "wide"),
                variant(4096, 4096, ""),
            ],
        };
        assert_eq!(clip.best_variant().map(|v| v.link.as_str()), Some("wide"));
        assert!(!clip.is_portrait());
    }

    #[test]
    fn no_variants_means_nothing_to_download() {
        let clip = ClipCandidate {
            id: 9,
            width: 100,
            height: 200,
            variants: vec![],
        };
        assert!(clip.best_variant().is_none());
    }
}
