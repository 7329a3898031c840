use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use image::{
    Delay, Frame, RgbaImage,
    codecs::gif::{GifEncoder, Repeat},
    imageops::FilterType,
};

use crate::{
    error::{MotionvizError, MotionvizResult},
    render::FrameRgba,
};

#[derive(Clone, Debug)]
pub struct GifConfig {
    pub out_path: PathBuf,
    /// When set, a square `thumb_size` downscale of every frame is written
    /// here as a second animation.
    pub thumb_path: Option<PathBuf>,
    pub thumb_size: u32,
    pub frame_delay_ms: u32,
}

impl GifConfig {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            thumb_path: None,
            thumb_size: 256,
            frame_delay_ms: 100,
        }
    }

    pub fn with_thumb(mut self, thumb_path: impl Into<PathBuf>) -> Self {
        self.thumb_path = Some(thumb_path.into());
        self
    }

    pub fn validate(&self) -> MotionvizResult<()> {
        if self.frame_delay_ms == 0 {
            return Err(MotionvizError::validation(
                "gif frame_delay_ms must be non-zero",
            ));
        }
        if self.thumb_path.is_some() && self.thumb_size == 0 {
            return Err(MotionvizError::validation(
                "gif thumb_size must be non-zero when a thumbnail is requested",
            ));
        }
        Ok(())
    }
}

pub fn ensure_parent_dir(path: &Path) -> MotionvizResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Encode the frame sequence as an infinitely-looping GIF (plus the optional
/// thumbnail variant).
pub fn encode_gif(frames: &[FrameRgba], cfg: &GifConfig) -> MotionvizResult<()> {
    cfg.validate()?;

    let Some(first) = frames.first() else {
        return Err(MotionvizError::validation("cannot encode an empty gif"));
    };

    let images: Vec<RgbaImage> = frames
        .iter()
        .map(|frame| {
            if frame.width != first.width || frame.height != first.height {
                return Err(MotionvizError::validation(format!(
                    "frame size mismatch: got {}x{}, expected {}x{}",
                    frame.width, frame.height, first.width, first.height
                )));
            }
            RgbaImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
                MotionvizError::validation("frame data length does not match width*height*4")
            })
        })
        .collect::<MotionvizResult<_>>()?;

    write_gif(&cfg.out_path, images.iter().cloned(), cfg.frame_delay_ms)?;

    if let Some(thumb_path) = &cfg.thumb_path {
        let thumbs = images
            .iter()
            .map(|img| image::imageops::resize(img, cfg.thumb_size, cfg.thumb_size, FilterType::Triangle));
        write_gif(thumb_path, thumbs, cfg.frame_delay_ms)?;
    }

    Ok(())
}

fn write_gif(
    path: &Path,
    images: impl Iterator<Item = RgbaImage>,
    frame_delay_ms: u32,
) -> MotionvizResult<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| MotionvizError::render(format!("create '{}': {e}", path.display())))?;

    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| MotionvizError::render(format!("set gif repeat: {e}")))?;

    let delay = Delay::from_numer_denom_ms(frame_delay_ms, 1);
    for image in images {
        let frame = Frame::from_parts(image, 0, 0, delay);
        encoder
            .encode_frame(frame)
            .map_err(|e| MotionvizError::render(format!("encode gif frame: {e}")))?;
    }

    Ok(())
}
