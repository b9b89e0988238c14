/// Template matching for locating on-screen elements in screenshots
///
/// Templates are PNG crops stored as `<dir>/<id>.png`. Matching uses the
/// zero-mean normalized correlation coefficient on grayscale pixels and
/// reports the center of the best-scoring window when it clears the
/// confidence threshold.
pub mod library;
pub mod matcher;
pub mod types;

pub use library::TemplateLibrary;
pub use matcher::{TemplateLocator, TemplateMatcher};
pub use types::{Match, Region, TemplateId};

use std::path::PathBuf;
use thiserror::Error;

/// Default correlation a match must reach to count as "visible".
pub const DEFAULT_THRESHOLD: f32 = 0.8;

pub type VisionResult<T> = Result<T, VisionError>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Template '{id}' not found at {path:?}")]
    TemplateMissing { id: TemplateId, path: PathBuf },

    #[error("Failed to load template {path:?}: {source}")]
    TemplateLoad {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to save image {path:?}: {source}")]
    ImageSave {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to create template directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Template '{id}' ({template_w}x{template_h}) does not fit the {screen_w}x{screen_h} screen")]
    TemplateTooLarge {
        id: TemplateId,
        template_w: u32,
        template_h: u32,
        screen_w: u32,
        screen_h: u32,
    },

    #[error("Template '{id}' is empty")]
    EmptyTemplate { id: TemplateId },

    #[error("Region {region} lies outside the {width}x{height} screenshot")]
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },

    #[error("Failed to decode screenshot: {0}")]
    Decode(image::ImageError),
}
