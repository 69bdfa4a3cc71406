//! Region solidifier: repaint marker regions with a flat fill color.

use crate::{
    color::{Classifier, Rgb},
    config::SolidifyConfig,
    error::{Error, Result},
    file,
    labeling::{Bounds, Connectivity, Labeling, Mask, RegionId},
};
use image::{DynamicImage, GenericImage, RgbaImage};
use log_dep::{info, warn};
use rayon::{
    iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator},
    slice::ParallelSliceMut,
};
use serde::Serialize;
use std::{io::Write, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "min_pixels", rename_all = "snake_case")]
pub enum Selection {
    /// The single region with the most pixels.
    Largest,
    /// Every region with at least this many pixels.
    AtLeast(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolidifyOptions {
    pub classifier: Classifier,
    pub connectivity: Connectivity,
    pub selection: Selection,
    pub fill: Rgb,
    /// When set, every pixel outside the repainted regions becomes this color.
    pub background: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSummary {
    pub id: RegionId,
    pub size: u64,
    pub seed: (u32, u32),
    pub bounds: Bounds,
    /// Source color at the seed pixel.
    pub color: Rgb,
    /// Share of the whole image, 0-100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolidifyReport {
    pub width: u32,
    pub height: u32,
    pub classifier: Classifier,
    pub selection: Selection,
    pub fill: Rgb,
    pub marked_pixels: u64,
    pub region_count: usize,
    pub repainted: Vec<RegionSummary>,
    pub repainted_pixels: u64,
    pub coverage_percent: f64,
}

pub struct Solidified {
    pub image: RgbaImage,
    /// Pixels that received the fill or background color.
    pub painted: Mask,
    pub report: SolidifyReport,
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Labels the marker regions of `image` and repaints the selected ones into a copy.
/// With no background set, pixels outside the selection are passed through untouched.
pub fn solidify(image: &RgbaImage, options: &SolidifyOptions) -> Solidified {
    let labeling = Labeling::from_image(image, &options.classifier, options.connectivity);

    let mut selected = vec![false; labeling.regions().len()];
    match options.selection {
        Selection::Largest => {
            if let Some(region) = labeling.largest() {
                selected[region.id as usize] = true;
            }
        }
        Selection::AtLeast(min_pixels) => {
            for region in labeling.at_least(min_pixels) {
                selected[region.id as usize] = true;
            }
        }
    }

    let mut output = image.clone();
    let fill = options.fill.to_rgba().0;
    let background = options.background.map(|color| color.to_rgba().0);
    let buf: &mut [u8] = output.as_mut();
    let painted: Vec<bool> = buf
        .par_chunks_exact_mut(4)
        .zip(labeling.labels().par_iter())
        .map(|(px, label)| match label {
            Some(id) if selected[*id as usize] => {
                px.copy_from_slice(&fill);
                true
            }
            _ => match &background {
                Some(background) => {
                    px.copy_from_slice(background);
                    true
                }
                None => false,
            },
        })
        .collect();

    let total = image.width() as u64 * image.height() as u64;
    let repainted: Vec<RegionSummary> = labeling
        .regions()
        .iter()
        .filter(|region| selected[region.id as usize])
        .map(|region| RegionSummary {
            id: region.id,
            size: region.size,
            seed: region.seed,
            bounds: region.bounds,
            color: Rgb::from_slice(&image.get_pixel(region.seed.0, region.seed.1).0),
            percent: percent(region.size, total),
        })
        .collect();
    let repainted_pixels = repainted.iter().map(|region| region.size).sum();

    Solidified {
        image: output,
        painted: Mask::from_bits(image.width(), image.height(), painted),
        report: SolidifyReport {
            width: image.width(),
            height: image.height(),
            classifier: options.classifier,
            selection: options.selection,
            fill: options.fill,
            marked_pixels: labeling.marked_pixels(),
            region_count: labeling.regions().len(),
            repainted,
            repainted_pixels,
            coverage_percent: percent(repainted_pixels, total),
        },
    }
}

/// Loads `config.input`, solidifies it and saves the result (and optional report).
pub fn run(config: &SolidifyConfig) -> Result<SolidifyReport> {
    let loaded = file::load_image(&config.input)?;
    let (width, height) = loaded.image.dimensions();
    info!("Processing {}", config.input.display());
    info!("Image size: {width}x{height}");
    info!("Selection: {:?}, fill {}", config.options.selection, config.options.fill);

    let Solidified {
        image,
        painted,
        report,
    } = solidify(&loaded.image, &config.options);
    log_report(&report);

    if painted.count() == 0 && file::output_format(&config.output)? == loaded.format {
        file::copy_atomic(&config.input, &config.output)?;
    } else {
        let mut target = paint_target(loaded.source, &config.options);
        for (x, y, px) in image.enumerate_pixels() {
            if painted.get(x, y) {
                target.put_pixel(x, y, *px);
            }
        }
        file::save_image(target, &config.output)?;
    }
    info!("Saved {}", config.output.display());

    if let Some(path) = &config.report {
        write_report(&report, path)?;
        info!("Wrote region report to {}", path.display());
    }
    Ok(report)
}

/// The image repainted pixels are written into: the source in its own pixel
/// type, widened from grey to color when a paint color is not itself a grey.
fn paint_target(source: DynamicImage, options: &SolidifyOptions) -> DynamicImage {
    let grey_paint = std::iter::once(options.fill)
        .chain(options.background)
        .all(|color| color.r == color.g && color.g == color.b);
    if grey_paint {
        return source;
    }
    match source {
        DynamicImage::ImageLuma8(_) => DynamicImage::ImageRgb8(source.to_rgb8()),
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageRgba8(source.to_rgba8()),
        DynamicImage::ImageLuma16(_) => DynamicImage::ImageRgb16(source.to_rgb16()),
        DynamicImage::ImageLumaA16(_) => DynamicImage::ImageRgba16(source.to_rgba16()),
        source => source,
    }
}

fn log_report(report: &SolidifyReport) {
    info!(
        "Found {} marked pixels in {} regions",
        report.marked_pixels, report.region_count
    );
    if report.repainted.is_empty() {
        match report.selection {
            Selection::Largest => warn!("No marker regions found, output is unchanged."),
            Selection::AtLeast(min_pixels) => {
                warn!("No marker regions with at least {min_pixels} pixels found.")
            }
        }
        return;
    }
    for (i, region) in report.repainted.iter().enumerate() {
        info!(
            "  Region {}: {} pixels ({:.1}%) at {:?}, color {}",
            i + 1,
            region.size,
            region.percent,
            region.seed,
            region.color
        );
    }
    info!(
        "Repainted {} pixels ({:.1}% of image) with {}",
        report.repainted_pixels, report.coverage_percent, report.fill
    );
}

fn write_report(report: &SolidifyReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    file::write_atomic(path, |writer| {
        writer
            .write_all(json.as_bytes())
            .map_err(|source| Error::OutputWrite {
                path: path.to_owned(),
                source,
            })
    })
}
