//! Animation assembler: turns an ordered set of still frames into a looping GIF.

use crate::{
    color::Rgb,
    config::AnimationConfig,
    error::{Dimensions, Error, Result},
    file,
};
use image::{
    codecs::gif::{GifEncoder, Repeat},
    imageops::{self, FilterType},
    Delay, Frame, ImageResult, RgbaImage,
};
use log_dep::{info, warn};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// NeuQuant sampling factor handed to the GIF encoder, 1 (best) to 30 (fastest).
const QUANTIZER_SPEED: i32 = 10;

/// Where the frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    /// Every file in `dir` with one of `extensions` (lowercase, no dot), in lexical order.
    Directory {
        dir: PathBuf,
        extensions: Vec<String>,
    },
    /// Explicit frame files, in the given order.
    Files(Vec<PathBuf>),
}

impl FrameSource {
    /// A comma anywhere in `input` makes it a file list, otherwise it names a directory.
    pub fn parse(input: &str, extensions: Vec<String>) -> FrameSource {
        if input.contains(',') {
            FrameSource::Files(
                input
                    .split(',')
                    .map(str::trim)
                    .filter(|path| !path.is_empty())
                    .map(PathBuf::from)
                    .collect(),
            )
        } else {
            FrameSource::Directory {
                dir: PathBuf::from(input),
                extensions,
            }
        }
    }

    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        match self {
            FrameSource::Directory { dir, extensions } => list_images(dir, extensions),
            FrameSource::Files(paths) => {
                if paths.is_empty() {
                    return Err(Error::NoFrames(PathBuf::new()));
                }
                if let Some(missing) = paths.iter().find(|path| !path.is_file()) {
                    return Err(Error::InputNotFound(missing.clone()));
                }
                Ok(paths.clone())
            }
        }
    }
}

fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InputNotFound(dir.to_owned()));
    }
    let read_error = |source: io::Error| Error::InputRead {
        path: dir.to_owned(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|wanted| ext.eq_ignore_ascii_case(wanted)));
        if matches && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    paths.dedup();

    if paths.is_empty() {
        return Err(Error::NoFrames(dir.to_owned()));
    }
    Ok(paths)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resize {
    /// Shrink to fit inside the box, keeping the aspect ratio. Never enlarges.
    Fit { width: u32, height: u32 },
    /// Scale to exactly this size.
    Exact { width: u32, height: u32 },
}

impl Resize {
    pub fn target(self, (width, height): (u32, u32)) -> (u32, u32) {
        match self {
            Resize::Exact { width, height } => (width, height),
            Resize::Fit {
                width: max_width,
                height: max_height,
            } => {
                if width <= max_width && height <= max_height {
                    return (width, height);
                }
                let scale = f64::min(
                    max_width as f64 / width as f64,
                    max_height as f64 / height as f64,
                );
                let fit =
                    |side: u32, limit: u32| ((side as f64 * scale).round() as u32).clamp(1, limit);
                (fit(width, max_width), fit(height, max_height))
            }
        }
    }

    pub fn apply(self, image: RgbaImage) -> RgbaImage {
        let (width, height) = self.target(image.dimensions());
        if (width, height) == image.dimensions() {
            return image;
        }
        imageops::resize(&image, width, height, FilterType::Lanczos3)
    }
}

/// Composites `image` over an opaque `matte`, so every output pixel is fully opaque.
pub fn flatten(image: &mut RgbaImage, matte: Rgb) {
    let matte = matte.into_array();
    for px in image.pixels_mut() {
        let alpha = px.0[3] as u32;
        if alpha == 255 {
            continue;
        }
        for (channel, &background) in px.0[..3].iter_mut().zip(&matte) {
            let blended = *channel as u32 * alpha + background as u32 * (255 - alpha);
            *channel = ((blended + 127) / 255) as u8;
        }
        px.0[3] = 255;
    }
}

/// One prepared frame and the file it came from.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub path: PathBuf,
    pub image: RgbaImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationSummary {
    pub frames: usize,
    pub width: u32,
    pub height: u32,
    pub total_ms: u64,
}

/// A validated frame sequence: at least one frame, all the same size.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Vec<SourceFrame>,
    duration_ms: u32,
    loop_count: u16,
}

impl Animation {
    pub fn new(frames: Vec<SourceFrame>, duration_ms: u32, loop_count: u16) -> Result<Animation> {
        let first = match frames.first() {
            Some(first) => first,
            None => return Err(Error::NoFrames(PathBuf::new())),
        };
        let expected = first.image.dimensions();
        if let Some((index, frame)) = frames
            .iter()
            .enumerate()
            .find(|(_, frame)| frame.image.dimensions() != expected)
        {
            let found = frame.image.dimensions();
            return Err(Error::FrameSizeMismatch {
                index,
                path: frame.path.clone(),
                expected: Dimensions(expected.0, expected.1),
                found: Dimensions(found.0, found.1),
            });
        }
        Ok(Animation {
            frames,
            duration_ms,
            loop_count,
        })
    }

    pub fn frames(&self) -> &[SourceFrame] {
        &self.frames
    }

    pub fn repeat(&self) -> Repeat {
        match self.loop_count {
            0 => Repeat::Infinite,
            count => Repeat::Finite(count),
        }
    }

    pub fn summary(&self) -> AnimationSummary {
        let (width, height) = self.frames[0].image.dimensions();
        AnimationSummary {
            frames: self.frames.len(),
            width,
            height,
            total_ms: self.frames.len() as u64 * self.duration_ms as u64,
        }
    }

    pub fn encode<W: Write>(&self, writer: W) -> ImageResult<()> {
        let mut encoder = GifEncoder::new_with_speed(writer, QUANTIZER_SPEED);
        encoder.set_repeat(self.repeat())?;
        let delay = Delay::from_numer_denom_ms(self.duration_ms, 1);
        for frame in &self.frames {
            encoder.encode_frame(Frame::from_parts(frame.image.clone(), 0, 0, delay))?;
        }
        // The trailer is written when the encoder goes away.
        drop(encoder);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        file::write_atomic(path, |writer| {
            self.encode(&mut *writer)
                .map_err(|source| file::encode_error(path, source))
        })
    }
}

/// Loads each path as a frame, flattened onto `matte` and resized if asked.
pub fn load_frames(
    paths: &[PathBuf],
    resize: Option<Resize>,
    matte: Rgb,
) -> Result<Vec<SourceFrame>> {
    let mut frames = Vec::with_capacity(paths.len());
    for path in paths {
        let mut image = file::load_image(path)?.image;
        flatten(&mut image, matte);
        if let Some(resize) = resize {
            image = resize.apply(image);
        }
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        info!("  Loaded: {name} ({}x{})", image.width(), image.height());
        frames.push(SourceFrame {
            path: path.clone(),
            image,
        });
    }
    Ok(frames)
}

pub fn run(config: &AnimationConfig) -> Result<AnimationSummary> {
    let paths = config.source.paths()?;
    info!("Found {} images", paths.len());
    if let Some(resize) = config.resize {
        info!("Resizing frames: {resize:?}");
    }

    let frames = load_frames(&paths, config.resize, config.matte)?;
    let animation = Animation::new(frames, config.duration_ms, config.loop_count)?;

    let is_gif = config
        .output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
    if !is_gif {
        warn!(
            "{} does not end in .gif, writing GIF data anyway",
            config.output.display()
        );
    }

    info!("Creating GIF with {} frames...", animation.frames().len());
    info!("  Duration per frame: {}ms", config.duration_ms);
    match config.loop_count {
        0 => info!("  Loops: infinite"),
        count => info!("  Loops: {count}"),
    }
    animation.save(&config.output)?;

    let summary = animation.summary();
    let size_mb = fs::metadata(&config.output)
        .map(|meta| meta.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or_default();
    info!("GIF created successfully: {}", config.output.display());
    info!("  File size: {size_mb:.2} MB");
    info!("  Dimensions: {}x{}", summary.width, summary.height);
    info!("  Total duration: {:.1} seconds", summary.total_ms as f64 / 1000.0);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn frame(name: &str, width: u32, height: u32) -> SourceFrame {
        SourceFrame {
            path: PathBuf::from(name),
            image: RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255])),
        }
    }

    #[test]
    fn fit_keeps_aspect_and_never_enlarges() {
        let fit = Resize::Fit {
            width: 32,
            height: 32,
        };
        assert_eq!(fit.target((64, 32)), (32, 16));
        assert_eq!(fit.target((10, 40)), (8, 32));
        assert_eq!(fit.target((16, 16)), (16, 16));
        assert_eq!(fit.target((1000, 1)), (32, 1));
    }

    #[test]
    fn exact_resize_changes_dimensions() {
        let image = RgbaImage::new(5, 7);
        let resized = Resize::Exact {
            width: 10,
            height: 3,
        }
        .apply(image);
        assert_eq!(resized.dimensions(), (10, 3));
    }

    #[test]
    fn flatten_blends_onto_matte() {
        let mut image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        flatten(&mut image, Rgb::WHITE);
        assert_eq!(*image.get_pixel(0, 0), Rgba([255, 255, 255, 255]));

        let mut half = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 0, 128]));
        flatten(&mut half, Rgb::BLACK);
        assert_eq!(*half.get_pixel(0, 0), Rgba([128, 0, 0, 255]));

        let mut opaque = RgbaImage::from_pixel(1, 1, Rgba([1, 2, 3, 255]));
        flatten(&mut opaque, Rgb::WHITE);
        assert_eq!(*opaque.get_pixel(0, 0), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let err = Animation::new(
            vec![frame("a.png", 4, 4), frame("b.png", 4, 4), frame("c.png", 5, 4)],
            100,
            0,
        )
        .unwrap_err();
        match err {
            Error::FrameSizeMismatch {
                index,
                path,
                expected,
                found,
            } => {
                assert_eq!(index, 2);
                assert_eq!(path, PathBuf::from("c.png"));
                assert_eq!(expected, Dimensions(4, 4));
                assert_eq!(found, Dimensions(5, 4));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_animation_is_an_input_error() {
        let err = Animation::new(Vec::new(), 100, 0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
    }

    #[test]
    fn zero_loops_means_forever() {
        let forever = Animation::new(vec![frame("a.png", 2, 2)], 100, 0).unwrap();
        assert!(matches!(forever.repeat(), Repeat::Infinite));
        let thrice = Animation::new(vec![frame("a.png", 2, 2)], 100, 3).unwrap();
        assert!(matches!(thrice.repeat(), Repeat::Finite(3)));
    }

    #[test]
    fn summary_totals_duration() {
        let animation = Animation::new(
            vec![frame("a.png", 8, 6), frame("b.png", 8, 6), frame("c.png", 8, 6)],
            250,
            0,
        )
        .unwrap();
        assert_eq!(
            animation.summary(),
            AnimationSummary {
                frames: 3,
                width: 8,
                height: 6,
                total_ms: 750
            }
        );
    }

    #[test]
    fn directory_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.PNG", "c.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("e.png")).unwrap();

        let source = FrameSource::Directory {
            dir: dir.path().to_owned(),
            extensions: vec!["png".to_owned()],
        };
        let names: Vec<_> = source
            .paths()
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.png"]);
    }

    #[test]
    fn missing_sources_are_input_errors() {
        let dir = tempfile::tempdir().unwrap();
        let empty = FrameSource::Directory {
            dir: dir.path().to_owned(),
            extensions: vec!["png".to_owned()],
        };
        assert!(matches!(empty.paths(), Err(Error::NoFrames(_))));

        let gone = FrameSource::Directory {
            dir: dir.path().join("gone"),
            extensions: vec!["png".to_owned()],
        };
        assert!(matches!(gone.paths(), Err(Error::InputNotFound(_))));

        let files = FrameSource::Files(vec![dir.path().join("x.png")]);
        assert!(matches!(files.paths(), Err(Error::InputNotFound(_))));
    }
}
