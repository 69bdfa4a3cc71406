use crate::error::{Error, Result};
use image::{ColorType, DynamicImage, ImageError, ImageFormat, ImageReader, RgbaImage};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// A decoded image: the source as stored, plus an RGBA working copy.
pub struct LoadedImage {
    /// 8-bit RGBA copy that classification and repainting run on.
    pub image: RgbaImage,
    /// The decoded pixels in their stored type and depth.
    pub source: DynamicImage,
    pub color: ColorType,
    pub format: ImageFormat,
}

pub fn load_image(path: &Path) -> Result<LoadedImage> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_owned()));
    }
    let read_error = |source: io::Error| Error::InputRead {
        path: path.to_owned(),
        source,
    };

    let reader = ImageReader::open(path)
        .map_err(read_error)?
        .with_guessed_format()
        .map_err(read_error)?;
    let Some(format) = reader.format() else {
        return Err(Error::UnsupportedInput(path.to_owned()));
    };
    let source = reader.decode().map_err(|source| match source {
        ImageError::Unsupported(_) => Error::UnsupportedInput(path.to_owned()),
        ImageError::IoError(source) => read_error(source),
        source => Error::Decode {
            path: path.to_owned(),
            source,
        },
    })?;

    Ok(LoadedImage {
        image: source.to_rgba8(),
        color: source.color(),
        format,
        source,
    })
}

/// The encoder picked by the extension of `path`.
pub fn output_format(path: &Path) -> Result<ImageFormat> {
    ImageFormat::from_path(path).map_err(|_| Error::UnsupportedOutput(path.to_owned()))
}

fn is_wide(color: ColorType) -> bool {
    color.bytes_per_pixel() / color.channel_count() > 1
}

/// Narrows `image` only as far as the encoder for `format` requires. PNG keeps
/// every 8 and 16 bit layout, TIFF every one but grey+alpha, JPEG drops alpha,
/// and the remaining formats are 8-bit RGB(A).
fn fit_to_format(image: DynamicImage, format: ImageFormat) -> DynamicImage {
    use ColorType::*;

    let color = image.color();
    match (format, color) {
        (ImageFormat::Png, L8 | La8 | Rgb8 | Rgba8 | L16 | La16 | Rgb16 | Rgba16) => image,
        (ImageFormat::Tiff, L8 | Rgb8 | Rgba8 | L16 | Rgb16 | Rgba16) => image,
        (ImageFormat::Png | ImageFormat::Tiff, _) if is_wide(color) => {
            if color.has_alpha() {
                DynamicImage::ImageRgba16(image.to_rgba16())
            } else {
                DynamicImage::ImageRgb16(image.to_rgb16())
            }
        }
        (ImageFormat::Jpeg, L8 | La8 | L16 | La16) => DynamicImage::ImageLuma8(image.to_luma8()),
        (ImageFormat::Jpeg, _) => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ if color.has_alpha() => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Saves `image` in the format named by the extension of `path`, keeping its
/// pixel type wherever that format can hold it.
pub fn save_image(image: DynamicImage, path: &Path) -> Result<()> {
    let format = output_format(path)?;
    let image = fit_to_format(image, format);

    write_atomic(path, |writer| {
        image
            .write_to(writer, format)
            .map_err(|source| encode_error(path, source))
    })
}

/// Copies `from` to `to` byte for byte, with the same all-or-nothing guarantee as [`write_atomic`].
pub fn copy_atomic(from: &Path, to: &Path) -> Result<()> {
    let mut source = File::open(from).map_err(|source| Error::InputRead {
        path: from.to_owned(),
        source,
    })?;
    write_atomic(to, |writer| {
        io::copy(&mut source, writer)
            .map(drop)
            .map_err(|source| Error::OutputWrite {
                path: to.to_owned(),
                source,
            })
    })
}

pub(crate) fn encode_error(path: &Path, source: ImageError) -> Error {
    match source {
        ImageError::IoError(source) => Error::OutputWrite {
            path: path.to_owned(),
            source,
        },
        source => Error::Encode {
            path: path.to_owned(),
            source,
        },
    }
}

/// Writes through a temporary file in the destination directory and renames it
/// into place, so `path` is either fully written or untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let output_error = |source: io::Error| Error::OutputWrite {
        path: path.to_owned(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(output_error)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".sprite-tools-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(output_error)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer)?;
        writer.flush().map_err(output_error)?;
    }
    temp.persist(path).map_err(|err| output_error(err.error))?;
    Ok(())
}

/// `dir/name.ext` becomes `dir/name_<suffix>.ext`. Inputs without an extension,
/// or with one no encoder is registered for, get `.png`.
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".to_owned(), |stem| stem.to_string_lossy().into_owned());
    let extension = input
        .extension()
        .filter(|ext| ImageFormat::from_extension(ext).is_some())
        .map_or_else(|| "png".to_owned(), |ext| ext.to_string_lossy().into_owned());
    input.with_file_name(format!("{stem}_{suffix}.{extension}"))
}
