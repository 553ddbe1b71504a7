/// Denoiser collaborator
///
/// Invoked once for the final frame, after the sample cap is reached, with
/// the averaged colour and its normal and albedo guides.

use crate::error::{Error, Result};

/// Averaged RGBA32F images of one frame, row-major and tightly packed
#[derive(Debug, Clone, Copy)]
pub struct DenoiserInput<'a> {
    pub width: u32,
    pub height: u32,
    pub color: &'a [f32],
    pub normals: &'a [f32],
    pub albedo: &'a [f32],
}

impl<'a> DenoiserInput<'a> {
    /// Number of floats every image must hold
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn validate(&self) -> Result<()> {
        let expected = self.expected_len();
        for (name, image) in [("colour", self.color), ("normals", self.normals), ("albedo", self.albedo)] {
            if image.len() != expected {
                return Err(Error::InvalidResource(format!(
                    "Denoiser {} input holds {} floats, expected {}",
                    name,
                    image.len(),
                    expected
                )));
            }
        }
        Ok(())
    }
}

/// Blocking image denoiser
pub trait Denoiser: Send {
    fn name(&self) -> &str;

    /// Denoise `input.color`
    ///
    /// # Returns
    ///
    /// RGBA32F pixels of the same size as the input colour.
    fn denoise(&mut self, input: &DenoiserInput<'_>) -> Result<Vec<f32>>;
}

/// Returns the noisy colour unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughDenoiser;

impl Denoiser for PassthroughDenoiser {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn denoise(&mut self, input: &DenoiserInput<'_>) -> Result<Vec<f32>> {
        input.validate()?;
        Ok(input.color.to_vec())
    }
}

/// Convert RGBA32F pixels to 8-bit, scaling by 255 and clamping
///
/// With `swap_red_blue` the output is BGRA.
pub fn to_rgba8(pixels: &[f32], swap_red_blue: bool) -> Vec<u8> {
    let mut out: Vec<u8> = pixels.iter().map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8).collect();
    if swap_red_blue {
        for pixel in out.chunks_exact_mut(4) {
            pixel.swap(0, 2);
        }
    }
    out
}

#[cfg(test)]
#[path = "denoiser_tests.rs"]
mod tests;
