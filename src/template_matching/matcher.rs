/// Template locator scoring windows with the zero-mean normalized
/// correlation coefficient (OpenCV's `TM_CCOEFF_NORMED`)
use super::library::TemplateLibrary;
use super::types::{Match, TemplateId};
use super::{VisionError, VisionResult};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use log::debug;

/// Per-pixel variance below which a window or template counts as flat and
/// scores 0. Also bounds the f32 rounding of the raw correlation.
const FLAT_VARIANCE: f64 = 1.0;

/// Finds a template on a screenshot.
///
/// `Ok(None)` means the template is not visible at `threshold`; errors are
/// reserved for problems with the template itself.
pub trait TemplateLocator {
    fn locate(
        &self,
        screen: &GrayImage,
        template: &TemplateId,
        threshold: f32,
    ) -> VisionResult<Option<Match>>;
}

pub struct TemplateMatcher {
    library: TemplateLibrary,
}

impl TemplateMatcher {
    pub fn new(library: TemplateLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &TemplateLibrary {
        &self.library
    }

    /// Best-scoring window for `template`, regardless of threshold.
    pub fn best_match(
        &self,
        screen: &GrayImage,
        id: &TemplateId,
        template: &GrayImage,
    ) -> VisionResult<Match> {
        let (tw, th) = template.dimensions();
        let (sw, sh) = screen.dimensions();
        if tw > sw || th > sh {
            return Err(VisionError::TemplateTooLarge {
                id: id.clone(),
                template_w: tw,
                template_h: th,
                screen_w: sw,
                screen_h: sh,
            });
        }

        let result = ccoeff_normed(screen, template);

        let mut max_score = f32::MIN;
        let mut best = (0u32, 0u32);
        for (x, y, pixel) in result.enumerate_pixels() {
            let score = if pixel[0].is_finite() { pixel[0] } else { 0.0 };
            if score > max_score {
                max_score = score;
                best = (x, y);
            }
        }

        Ok(Match {
            x: best.0 + tw / 2,
            y: best.1 + th / 2,
            correlation: max_score,
        })
    }
}

/// Score map of `template` over `screen`, one value in `[-1, 1]` per
/// top-left offset. The template must fit inside the screen.
///
/// Raw cross-correlation comes from imageproc; window sums and sums of
/// squares come from integral images for the mean correction.
fn ccoeff_normed(screen: &GrayImage, template: &GrayImage) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let (tw, th) = template.dimensions();
    let out_w = screen.width() - tw + 1;
    let out_h = screen.height() - th + 1;
    let n = f64::from(tw * th);

    let (t_sum, t_sq_sum) = template.pixels().fold((0f64, 0f64), |(sum, sq), p| {
        let v = f64::from(p[0]);
        (sum + v, sq + v * v)
    });
    let t_mean = t_sum / n;
    let t_spread = t_sq_sum - t_sum * t_mean;
    if t_spread / n < FLAT_VARIANCE {
        return ImageBuffer::new(out_w, out_h);
    }

    let ccorr = match_template(screen, template, MatchTemplateMethod::CrossCorrelation);
    let sums: Image<Luma<u64>> = integral_image(screen);
    let squares: Image<Luma<u64>> = integral_squared_image(screen);

    ImageBuffer::from_fn(out_w, out_h, |x, y| {
        let w_sum = window_sum(&sums, x, y, tw, th) as f64;
        let w_spread = window_sum(&squares, x, y, tw, th) as f64 - w_sum * w_sum / n;
        if w_spread / n < FLAT_VARIANCE {
            return Luma([0.0]);
        }
        let numerator = f64::from(ccorr.get_pixel(x, y)[0]) - t_mean * w_sum;
        let score = numerator / (w_spread * t_spread).sqrt();
        Luma([score.clamp(-1.0, 1.0) as f32])
    })
}

// Integral images carry a leading zero row and column.
fn window_sum(integral: &Image<Luma<u64>>, x: u32, y: u32, w: u32, h: u32) -> u64 {
    let at = |px: u32, py: u32| integral.get_pixel(px, py)[0];
    at(x + w, y + h) + at(x, y) - at(x + w, y) - at(x, y + h)
}

impl TemplateLocator for TemplateMatcher {
    fn locate(
        &self,
        screen: &GrayImage,
        template: &TemplateId,
        threshold: f32,
    ) -> VisionResult<Option<Match>> {
        let template_img = self.library.get(template)?;
        let found = self.best_match(screen, template, &template_img)?;
        debug!(
            "template {template}: best {:.3} at ({},{}), threshold {threshold:.2}",
            found.correlation, found.x, found.y
        );
        Ok((found.correlation >= threshold).then_some(found))
    }
}
