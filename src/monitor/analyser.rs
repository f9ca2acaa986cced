use crate::config::MonitorConfig;
use crate::error::VoiceError;
use crate::media::AudioFrame;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;
use tracing::warn;

/// Spectrum analyser over the most recent `fft_size` mono samples
///
/// Produces one byte per frequency bin the way a browser analyser node does:
/// Blackman window, magnitude spectrum, temporal smoothing, then a linear map
/// of `[min_decibels, max_decibels]` onto `0..=255`.
pub struct FrequencyAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
}

impl FrequencyAnalyser {
    pub fn new(config: &MonitorConfig) -> Result<Self, VoiceError> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(VoiceError::MonitoringUnavailable(format!(
                "fft_size must be a power of two between 32 and 32768, got {}",
                fft_size
            )));
        }
        if !(0.0..=1.0).contains(&config.smoothing) {
            return Err(VoiceError::MonitoringUnavailable(format!(
                "smoothing must be within [0, 1], got {}",
                config.smoothing
            )));
        }
        if config.min_decibels >= config.max_decibels {
            return Err(VoiceError::MonitoringUnavailable(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                config.min_decibels, config.max_decibels
            )));
        }

        let n = fft_size as f32;
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();

        Ok(Self {
            fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window,
            fft,
            input,
            spectrum,
            scratch,
            samples: std::iter::repeat(0.0).take(fft_size).collect(),
            smoothed: vec![0.0; fft_size / 2],
        })
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append normalized mono samples, keeping only the latest `fft_size`
    pub fn push_samples(&mut self, samples: impl IntoIterator<Item = f32>) {
        for sample in samples {
            self.samples.push_back(sample);
        }
        let excess = self.samples.len().saturating_sub(self.fft_size);
        self.samples.drain(..excess);
    }

    pub fn push_frame(&mut self, frame: &AudioFrame) {
        self.push_samples(frame.mono_f32());
    }

    /// Replace the analysed window with silence
    pub fn clear_samples(&mut self) {
        self.samples.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Current spectrum, one byte per bin (advances the smoothing state)
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let n = self.fft_size as f32;
        for ((slot, sample), w) in self.input.iter_mut().zip(&self.samples).zip(&self.window) {
            *slot = sample * w;
        }

        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
        {
            warn!("Spectrum computation failed: {}", e);
            return vec![0; self.bin_count()];
        }

        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() / n;
            let next = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }

        let range = self.max_decibels - self.min_decibels;
        self.smoothed
            .iter()
            .map(|&magnitude| {
                if magnitude <= 0.0 {
                    return 0;
                }
                let db = 20.0 * magnitude.log10();
                let scaled = (255.0 / range) * (db - self.min_decibels);
                scaled.floor().clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Mean byte magnitude across all bins
    pub fn mean_level(&mut self) -> f32 {
        let data = self.byte_frequency_data();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|&b| b as f32).sum::<f32>() / data.len() as f32
    }
}

/// Instantaneous speaking decision; no hysteresis
pub fn is_speaking(mean_level: f32, threshold: u8) -> bool {
    mean_level > threshold as f32
}
