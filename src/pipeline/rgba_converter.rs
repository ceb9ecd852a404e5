//! Camera pixel layouts to tightly packed RGBA frames.

use anyhow::{Result, anyhow};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Nv12,
    Yuyv,
    Mjpeg,
    Rgb,
    Bgr,
    Gray,
}

impl PixelLayout {
    /// Minimum raw byte count for a `width`x`height` buffer. MJPEG is
    /// variable length, so only non-empty is required.
    pub fn min_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelLayout::Nv12 => pixels + pixels / 2,
            PixelLayout::Yuyv => pixels * 2,
            PixelLayout::Mjpeg => 1,
            PixelLayout::Rgb | PixelLayout::Bgr => pixels * 3,
            PixelLayout::Gray => pixels,
        }
    }
}

/// Decode one raw camera buffer. `width`/`height` are the driver-reported
/// resolution; for MJPEG the decoded header wins.
pub fn to_frame(layout: PixelLayout, data: &[u8], width: u32, height: u32) -> Result<Frame> {
    let needed = layout.min_len(width, height);
    if data.len() < needed {
        return Err(anyhow!(
            "{layout:?} buffer too small: got {}, expected {needed}",
            data.len()
        ));
    }

    let (rgba, width, height) = match layout {
        PixelLayout::Nv12 => (nv12(data, width, height)?, width, height),
        PixelLayout::Yuyv => (yuyv(data, width, height)?, width, height),
        PixelLayout::Mjpeg => mjpeg(data)?,
        PixelLayout::Rgb => (packed_rgb(data, width, height, false), width, height),
        PixelLayout::Bgr => (packed_rgb(data, width, height, true), width, height),
        PixelLayout::Gray => (gray(data, width, height), width, height),
    };

    Ok(Frame::new(rgba, width, height)?)
}

fn nv12(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_len = width as usize * height as usize;
    let image = YuvBiPlanarImage {
        y_plane: &data[..y_len],
        y_stride: width,
        uv_plane: &data[y_len..y_len + y_len / 2],
        uv_stride: width,
        width,
        height,
    };

    let mut rgba = vec![0u8; y_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn yuyv(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };

    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV422 to RGBA failed: {err:?}"))?;
    Ok(rgba)
}

fn mjpeg(data: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGBA);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let rgba = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;
    let info = decoder
        .info()
        .ok_or_else(|| anyhow!("MJPEG decoder reported no image info"))?;

    let width = u32::try_from(info.width).map_err(|_| anyhow!("MJPEG width out of range"))?;
    let height = u32::try_from(info.height).map_err(|_| anyhow!("MJPEG height out of range"))?;
    Ok((rgba, width, height))
}

fn packed_rgb(data: &[u8], width: u32, height: u32, swap_rb: bool) -> Vec<u8> {
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_chunks_exact(3))
        .for_each(|(dst, src)| {
            let (r, b) = if swap_rb { (src[2], src[0]) } else { (src[0], src[2]) };
            dst.copy_from_slice(&[r, src[1], b, 255]);
        });
    rgba
}

fn gray(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    rgba.par_chunks_exact_mut(4)
        .zip(data.par_iter().copied())
        .for_each(|(dst, v)| dst.copy_from_slice(&[v, v, v, 255]));
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_swaps_channels() {
        let frame = to_frame(PixelLayout::Bgr, &[10, 20, 30, 1, 2, 3], 2, 1).unwrap();
        assert_eq!(frame.rgba, vec![30, 20, 10, 255, 3, 2, 1, 255]);
    }

    #[test]
    fn gray_expands_to_opaque_rgba() {
        let frame = to_frame(PixelLayout::Gray, &[7; 4], 2, 2).unwrap();
        assert_eq!(frame.rgba.len(), 16);
        assert!(frame.rgba.chunks_exact(4).all(|px| px == [7, 7, 7, 255]));
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(to_frame(PixelLayout::Rgb, &[0; 5], 2, 1).is_err());
        assert!(to_frame(PixelLayout::Nv12, &[0; 5], 2, 2).is_err());
        assert!(to_frame(PixelLayout::Mjpeg, &[], 2, 2).is_err());
    }

    #[test]
    fn yuyv_keeps_resolution() {
        // Mid-grey, neutral chroma.
        let data = [128u8; 4 * 2 * 2];
        let frame = to_frame(PixelLayout::Yuyv, &data, 4, 2).unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.rgba.len(), 4 * 2 * 4);
    }
}
