/// On-disk template images with an in-memory cache
use super::types::{Region, TemplateId};
use super::{VisionError, VisionResult};
use image::{DynamicImage, GrayImage};
use log::debug;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub struct TemplateLibrary {
    dir: PathBuf,
    cache: RwLock<HashMap<TemplateId, Arc<GrayImage>>>,
}

impl TemplateLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        TemplateLibrary {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &TemplateId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    /// Load a template as grayscale, from cache when already seen.
    pub fn get(&self, id: &TemplateId) -> VisionResult<Arc<GrayImage>> {
        if let Ok(cache) = self.cache.read()
            && let Some(img) = cache.get(id)
        {
            return Ok(Arc::clone(img));
        }

        let path = self.path_for(id);
        if !path.is_file() {
            return Err(VisionError::TemplateMissing {
                id: id.clone(),
                path,
            });
        }
        let img = image::open(&path)
            .map_err(|source| VisionError::TemplateLoad {
                path: path.clone(),
                source,
            })?
            .into_luma8();
        if img.width() == 0 || img.height() == 0 {
            return Err(VisionError::EmptyTemplate { id: id.clone() });
        }
        debug!("loaded template {id} ({}x{}) from {path:?}", img.width(), img.height());

        let img = Arc::new(img);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id.clone(), Arc::clone(&img));
        }
        Ok(img)
    }

    /// Ids whose image file does not exist, in the order given, without duplicates.
    pub fn missing<'a>(&self, ids: impl IntoIterator<Item = &'a TemplateId>) -> Vec<TemplateId> {
        let mut missing: Vec<TemplateId> = Vec::new();
        for id in ids {
            if !self.path_for(id).is_file() && !missing.contains(id) {
                missing.push(id.clone());
            }
        }
        missing
    }

    /// Crop `region` out of a screenshot and store it as template `id`.
    /// Replaces any cached copy so the next lookup sees the new pixels.
    pub fn save_region(
        &self,
        id: &TemplateId,
        screen: &DynamicImage,
        region: Region,
    ) -> VisionResult<PathBuf> {
        if !region.fits_within(screen.width(), screen.height()) {
            return Err(VisionError::RegionOutOfBounds {
                region,
                width: screen.width(),
                height: screen.height(),
            });
        }
        std::fs::create_dir_all(&self.dir).map_err(|source| VisionError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        let crop = screen.crop_imm(region.x, region.y, region.width, region.height);
        let path = self.path_for(id);
        crop.save(&path).map_err(|source| VisionError::ImageSave {
            path: path.clone(),
            source,
        })?;
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(id);
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn loads_and_caches_template() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::from_pixel(4, 3, Luma([90]))
            .save(dir.path().join("7.png"))
            .unwrap();
        let lib = TemplateLibrary::new(dir.path());

        let first = lib.get(&TemplateId::Number(7)).unwrap();
        assert_eq!(first.dimensions(), (4, 3));

        // Cached copy survives the file going away.
        std::fs::remove_file(dir.path().join("7.png")).unwrap();
        let second = lib.get(&TemplateId::Number(7)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn missing_template_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        GrayImage::new(2, 2).save(dir.path().join("1.png")).unwrap();
        let lib = TemplateLibrary::new(dir.path());

        let ids = [
            TemplateId::Number(1),
            TemplateId::Number(2),
            TemplateId::Name("ok".into()),
            TemplateId::Number(2),
        ];
        assert_eq!(
            lib.missing(ids.iter()),
            vec![TemplateId::Number(2), TemplateId::Name("ok".into())]
        );
        assert!(matches!(
            lib.get(&TemplateId::Number(2)),
            Err(VisionError::TemplateMissing { .. })
        ));
    }

    #[test]
    fn save_region_crops_and_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let lib = TemplateLibrary::new(dir.path().join("images"));
        let id = TemplateId::Name("button".into());

        let mut screen = RgbImage::from_pixel(20, 10, Rgb([0, 0, 0]));
        screen.put_pixel(5, 4, Rgb([255, 255, 255]));
        let screen = DynamicImage::ImageRgb8(screen);

        let region = Region::from_corners(5, 4, 9, 7).unwrap();
        let path = lib.save_region(&id, &screen, region).unwrap();
        assert!(path.ends_with("images/button.png"));

        let saved = lib.get(&id).unwrap();
        assert_eq!(saved.dimensions(), (4, 3));
        assert_eq!(saved.get_pixel(0, 0)[0], 255);

        let blank = DynamicImage::ImageRgb8(RgbImage::new(20, 10));
        lib.save_region(&id, &blank, region).unwrap();
        assert_eq!(lib.get(&id).unwrap().get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn save_region_rejects_out_of_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let lib = TemplateLibrary::new(dir.path());
        let screen = DynamicImage::ImageRgb8(RgbImage::new(10, 10));
        let region = Region::from_corners(5, 5, 15, 8).unwrap();
        assert!(matches!(
            lib.save_region(&TemplateId::Number(3), &screen, region),
            Err(VisionError::RegionOutOfBounds { .. })
        ));
    }
}
