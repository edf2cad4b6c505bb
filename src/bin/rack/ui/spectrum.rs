//! Spectrum analyzer widget
//!
//! FFT of the scope buffer, read at log-spaced frequencies and plotted on a
//! log10 frequency axis. Levels are dBFS relative to the nominal ±5 V peak.

use std::sync::Arc;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use saavy_rack::AUDIO_PEAK_VOLTS;

const SPECTRUM_BINS: usize = 64;
const FLOOR_DB: f64 = -100.0;
const MIN_HZ: f32 = 20.0;

pub struct SpectrumAnalyzer {
    /// Hann window, pre-scaled so a full-scale sine reads near 0 dB.
    window: Vec<f32>,
    /// FFT bin for each displayed point.
    bin_indices: Vec<usize>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    /// (log10 Hz, dB) per displayed point.
    spectrum: Vec<(f64, f64)>,
}

impl SpectrumAnalyzer {
    pub fn new(buffer_len: usize, sample_rate: f32) -> Self {
        let buffer_len = buffer_len.max(4);
        let fft = FftPlanner::new().plan_fft_forward(buffer_len);

        // A Hann-windowed sine of amplitude A peaks at A·N/4.
        let scale = 4.0 / (buffer_len as f32 * AUDIO_PEAK_VOLTS);
        let denom = (buffer_len - 1) as f32;
        let window = (0..buffer_len)
            .map(|i| {
                let hann = 0.5 * (1.0 - (std::f32::consts::TAU * i as f32 / denom).cos());
                hann * scale
            })
            .collect();

        let max_hz = (sample_rate / 2.0).min(20_000.0).max(MIN_HZ * 2.0);
        let ratio = (max_hz / MIN_HZ) as f64;
        let half = buffer_len / 2;
        let mut bin_indices = Vec::with_capacity(SPECTRUM_BINS);
        let mut spectrum = Vec::with_capacity(SPECTRUM_BINS);
        for i in 0..SPECTRUM_BINS {
            let t = i as f64 / (SPECTRUM_BINS - 1) as f64;
            let hz = MIN_HZ as f64 * ratio.powf(t);
            let index = (hz * buffer_len as f64 / sample_rate as f64).round() as usize;
            bin_indices.push(index.clamp(1, half - 1));
            spectrum.push((hz.log10(), FLOOR_DB));
        }

        Self {
            window,
            bin_indices,
            fft,
            scratch: vec![Complex::new(0.0, 0.0); buffer_len],
            spectrum,
        }
    }

    /// Recompute from `buffer`; ignored unless it matches the FFT size.
    pub fn update(&mut self, buffer: &[f32]) {
        if buffer.len() != self.window.len() {
            return;
        }

        for ((slot, &sample), &w) in self.scratch.iter_mut().zip(buffer).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        for ((_, db), &index) in self.spectrum.iter_mut().zip(&self.bin_indices) {
            let power = self.scratch[index].norm_sqr().max(1e-12);
            *db = (10.0 * (power as f64).log10()).max(FLOOR_DB);
        }
    }

    pub fn data(&self) -> &[(f64, f64)] {
        &self.spectrum
    }
}

pub fn render_spectrum(frame: &mut Frame, area: Rect, spectrum: &[(f64, f64)]) {
    let block = Block::default().title(" Spectrum ").borders(Borders::ALL);

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(spectrum);

    let (lo, hi) = match (spectrum.first(), spectrum.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
        _ => (1.0, 4.5),
    };

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([lo, hi])
                .labels(vec!["20", "200", "2k", "20k"])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([FLOOR_DB, 6.0])
                .labels(vec!["-100", "-60", "-20", "0"])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
