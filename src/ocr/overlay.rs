/*!
 * Region-aware redrawing of translated picture text.
 *
 * `OcrOverlay::detect` turns pictures into line units; `OcrOverlay::redraw`
 * erases each source line and paints its translation in place. Pixel work
 * runs on the blocking pool, one task per picture.
 */

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::{debug, warn};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::layout::{fit_text, FittedText, TextMeasure};
use super::regions::RegionFilter;
use super::{BoundingBox, OcrEngine, TextLine};
use crate::app_config::OcrConfig;
use crate::document::{MediaItem, TranslatableUnit, UnitPosition};
use crate::errors::OcrError;

/// Fonts tried when no font is configured
const SYSTEM_FONT_CANDIDATES: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Boxes larger than this are patched instead of inpainted
const MAX_INPAINT_AREA: u64 = 250_000;

/// Overlay tuning taken from the OCR configuration
#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub filter: RegionFilter,
    pub languages: Vec<String>,
    pub max_font_size: f32,
    pub min_font_size: f32,
    pub inpaint: bool,
}

impl OverlaySettings {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            filter: RegionFilter {
                min_confidence: config.min_confidence,
                iou_threshold: config.iou_threshold,
                line_merge_tolerance: config.line_merge_tolerance,
            },
            languages: config.languages.clone(),
            max_font_size: config.max_font_size,
            min_font_size: config.min_font_size,
            inpaint: config.inpaint,
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self::from_config(&OcrConfig::default())
    }
}

/// Detected lines of one picture
#[derive(Debug, Clone)]
struct PlannedPicture {
    name: String,
    bytes: Vec<u8>,
    lines: Vec<TextLine>,
}

/// Pictures with detected lines, waiting for translations
#[derive(Debug, Clone, Default)]
pub struct OverlayPlan {
    pictures: Vec<PlannedPicture>,
    units: Vec<TranslatableUnit>,
}

impl OverlayPlan {
    /// One unit per detected line, picture by picture
    pub fn units(&self) -> &[TranslatableUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Detects, translates and redraws text inside pictures
#[derive(Debug, Clone)]
pub struct OcrOverlay {
    engine: Arc<dyn OcrEngine>,
    font: FontArc,
    settings: OverlaySettings,
}

impl OcrOverlay {
    pub fn new(engine: Arc<dyn OcrEngine>, font: FontArc, settings: OverlaySettings) -> Self {
        Self { engine, font, settings }
    }

    /// Build from configuration, loading the configured or a system font
    pub fn from_config(engine: Arc<dyn OcrEngine>, config: &OcrConfig) -> Result<Self, OcrError> {
        let font = Self::load_font(config.font_path.as_deref())?;
        Ok(Self::new(engine, font, OverlaySettings::from_config(config)))
    }

    /// Load a TrueType/OpenType font, falling back to well-known system fonts
    pub fn load_font(path: Option<&Path>) -> Result<FontArc, OcrError> {
        let candidates: Vec<PathBuf> = match path {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        };

        for candidate in &candidates {
            let Ok(bytes) = std::fs::read(candidate) else { continue };
            match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    debug!("Overlay font: {:?}", candidate);
                    return Ok(font);
                }
                Err(e) => warn!("Unusable font {:?}: {}", candidate, e),
            }
        }

        Err(OcrError::Font(match path {
            Some(path) => format!("cannot load font {:?}", path),
            None => "no font configured and no system font found".to_string(),
        }))
    }

    /// Languages override for one job
    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        if !languages.is_empty() {
            self.settings.languages = languages;
        }
        self
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    /// Detect text lines in every picture
    ///
    /// With `required`, any detection failure is returned. Otherwise a picture
    /// that cannot be read is left untouched and logged.
    pub async fn detect(&self, media: Vec<MediaItem>, required: bool) -> Result<OverlayPlan, OcrError> {
        let mut plan = OverlayPlan::default();

        for item in media {
            let regions = match self.engine.detect(&item.bytes, &self.settings.languages).await {
                Ok(regions) => regions,
                Err(e) if required => return Err(e),
                Err(e) => {
                    warn!("Skipping picture {}: {}", item.name, e);
                    continue;
                }
            };

            let lines = self.settings.filter.apply(regions);
            if lines.is_empty() {
                continue;
            }
            debug!("{}: {} text lines ({})", item.name, lines.len(), self.engine.name());

            for (region, line) in lines.iter().enumerate() {
                plan.units.push(TranslatableUnit::new(
                    line.text.clone(),
                    UnitPosition::ImageLine { media: item.name.clone(), region },
                ));
            }
            plan.pictures.push(PlannedPicture { name: item.name, bytes: item.bytes, lines });
        }

        Ok(plan)
    }

    /// Redraw every planned picture with its translated lines
    ///
    /// `translations` lines up with `plan.units()`. Returns encoded pictures
    /// keyed by media name.
    pub async fn redraw(
        &self,
        plan: OverlayPlan,
        translations: &[String],
    ) -> Result<HashMap<String, Vec<u8>>, OcrError> {
        if translations.len() != plan.units.len() {
            return Err(OcrError::Image(format!(
                "{} translations for {} picture lines",
                translations.len(),
                plan.units.len()
            )));
        }

        let mut remaining = translations;
        let mut redrawn = HashMap::new();
        for picture in plan.pictures {
            let (own, rest) = remaining.split_at(picture.lines.len());
            remaining = rest;

            let font = self.font.clone();
            let settings = self.settings.clone();
            let own = own.to_vec();
            let name = picture.name.clone();
            let bytes = tokio::task::spawn_blocking(move || {
                render_picture(&picture.bytes, &picture.lines, &own, &font, &settings)
            })
            .await
            .map_err(|e| OcrError::Image(format!("redraw task failed: {}", e)))??;

            redrawn.insert(name, bytes);
        }

        Ok(redrawn)
    }
}

/// Erase every line and draw its translation, re-encoding in the source format
pub fn render_picture(
    bytes: &[u8],
    lines: &[TextLine],
    translations: &[String],
    font: &FontArc,
    settings: &OverlaySettings,
) -> Result<Vec<u8>, OcrError> {
    let format = image::guess_format(bytes)?;
    let mut img = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = img.dimensions();

    for (line, translated) in lines.iter().zip(translations) {
        let bbox = line.bbox.clamp_to(width, height);
        if bbox.area() == 0 {
            continue;
        }

        let background = sample_background(&img, &bbox);
        let inpainted = settings.inpaint && bbox.area() <= MAX_INPAINT_AREA && inpaint(&mut img, &bbox);
        if !inpainted {
            fill_patch(&mut img, &bbox, background);
        }

        let fitted = fit_text(
            translated,
            font,
            bbox.width as f32,
            bbox.height as f32,
            settings.max_font_size,
            settings.min_font_size,
        );
        if !fitted.fits {
            debug!("Translated line overflows its box at {}px: {:?}", fitted.size, translated);
        }
        draw_text(&mut img, font, &fitted, &bbox, contrasting_color(background));
    }

    encode(img, format)
}

fn encode(img: RgbaImage, format: ImageFormat) -> Result<Vec<u8>, OcrError> {
    let mut out = Vec::new();
    let dynamic = DynamicImage::ImageRgba8(img);
    match format {
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(dynamic.to_rgb8()).write_to(&mut Cursor::new(&mut out), format)?,
        _ => dynamic.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?,
    }
    Ok(out)
}

/// Average color of the one-pixel ring just outside the box
///
/// White when the box covers the whole picture.
pub fn sample_background(img: &RgbaImage, bbox: &BoundingBox) -> Rgba<u8> {
    let (width, height) = img.dimensions();
    let left = bbox.x.checked_sub(1);
    let top = bbox.y.checked_sub(1);
    let right = (bbox.right() < width).then_some(bbox.right());
    let bottom = (bbox.bottom() < height).then_some(bbox.bottom());

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    let mut add = |x: u32, y: u32| {
        let p = img.get_pixel(x, y);
        for c in 0..3 {
            sum[c] += p[c] as u64;
        }
        count += 1;
    };

    let x_range = bbox.x.saturating_sub(1)..bbox.right().saturating_add(1).min(width);
    for x in x_range {
        if let Some(y) = top {
            add(x, y);
        }
        if let Some(y) = bottom {
            add(x, y);
        }
    }
    for y in bbox.y..bbox.bottom() {
        if let Some(x) = left {
            add(x, y);
        }
        if let Some(x) = right {
            add(x, y);
        }
    }

    if count == 0 {
        return Rgba([255, 255, 255, 255]);
    }
    Rgba([(sum[0] / count) as u8, (sum[1] / count) as u8, (sum[2] / count) as u8, 255])
}

/// Paint the box with one color
pub fn fill_patch(img: &mut RgbaImage, bbox: &BoundingBox, color: Rgba<u8>) {
    for y in bbox.y..bbox.bottom() {
        for x in bbox.x..bbox.right() {
            img.put_pixel(x, y, color);
        }
    }
}

/// Fill the box from its surroundings, layer by layer from the edge inwards
///
/// Each pass sets every unknown pixel touching a known one to the mean of its
/// known 8-neighbors. Returns false, leaving the picture unchanged, when the
/// box has no pixels around it to grow from.
pub fn inpaint(img: &mut RgbaImage, bbox: &BoundingBox) -> bool {
    let (width, height) = img.dimensions();
    let (bw, bh) = (bbox.width as usize, bbox.height as usize);
    let mut known = vec![false; bw * bh];
    let mut remaining = bw * bh;

    while remaining > 0 {
        let mut updates = Vec::new();
        for by in 0..bh {
            for bx in 0..bw {
                if known[by * bw + bx] {
                    continue;
                }
                let (x, y) = (bbox.x + bx as u32, bbox.y + by as u32);
                let mut sum = [0u32; 4];
                let mut count = 0u32;

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                            continue;
                        }
                        let (nx, ny) = (nx as u32, ny as u32);
                        let inside = nx >= bbox.x && nx < bbox.right() && ny >= bbox.y && ny < bbox.bottom();
                        if inside && !known[(ny - bbox.y) as usize * bw + (nx - bbox.x) as usize] {
                            continue;
                        }
                        let p = img.get_pixel(nx, ny);
                        for c in 0..4 {
                            sum[c] += p[c] as u32;
                        }
                        count += 1;
                    }
                }

                if count > 0 {
                    let mean = Rgba([
                        (sum[0] / count) as u8,
                        (sum[1] / count) as u8,
                        (sum[2] / count) as u8,
                        (sum[3] / count) as u8,
                    ]);
                    updates.push((bx, by, mean));
                }
            }
        }

        // A rectangle grows from its edge every pass once it has started
        if updates.is_empty() {
            return false;
        }
        for (bx, by, color) in updates {
            img.put_pixel(bbox.x + bx as u32, bbox.y + by as u32, color);
            known[by * bw + bx] = true;
            remaining -= 1;
        }
    }

    true
}

/// Black or white, whichever reads better on `background`
pub fn contrasting_color(background: Rgba<u8>) -> Rgba<u8> {
    let luma = 0.299 * background[0] as f32 + 0.587 * background[1] as f32 + 0.114 * background[2] as f32;
    if luma < 128.0 {
        Rgba([255, 255, 255, 255])
    } else {
        Rgba([0, 0, 0, 255])
    }
}

/// Draw fitted lines centered in the box, clipped to it
fn draw_text(img: &mut RgbaImage, font: &FontArc, fitted: &FittedText, bbox: &BoundingBox, color: Rgba<u8>) {
    let scale = PxScale::from(fitted.size);
    let scaled = font.as_scaled(scale);
    let line_height = font.line_height(fitted.size);
    let block_height = line_height * fitted.lines.len() as f32;
    let mut baseline = bbox.y as f32 + ((bbox.height as f32 - block_height) / 2.0).max(0.0) + scaled.ascent();

    for line in &fitted.lines {
        let line_width = font.width(line, fitted.size);
        let mut caret = bbox.x as f32 + ((bbox.width as f32 - line_width) / 2.0).max(0.0);
        let mut previous: Option<GlyphId> = None;

        for c in line.chars() {
            let id = scaled.glyph_id(c);
            if let Some(previous) = previous {
                caret += scaled.kern(previous, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = font.outline_glyph(glyph) else { continue };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + gx as i64;
                let y = bounds.min.y as i64 + gy as i64;
                if x < bbox.x as i64 || y < bbox.y as i64 || x >= bbox.right() as i64 || y >= bbox.bottom() as i64 {
                    return;
                }
                let pixel = img.get_pixel_mut(x as u32, y as u32);
                let alpha = coverage.clamp(0.0, 1.0);
                for c in 0..3 {
                    pixel[c] = (pixel[c] as f32 * (1.0 - alpha) + color[c] as f32 * alpha).round() as u8;
                }
            });
        }
        baseline += line_height;
    }
}
