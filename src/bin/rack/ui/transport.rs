//! Transport bar - tempo position, envelope stage, delay mode and levels

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_rack::{
    dsp::{envelope::EnvelopeStage, util::gain_to_db},
    AUDIO_PEAK_VOLTS,
};

/// Slowly changing state shown in the bar, fed from notifications.
pub struct TransportView {
    pub sample_rate: f32,
    pub beat: u64,
    pub stage: EnvelopeStage,
    pub stable: bool,
    pub dropped: u64,
    /// Last rejected command, if any.
    pub status: Option<String>,
}

impl TransportView {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            beat: 0,
            stage: EnvelopeStage::Idle,
            stable: true,
            dropped: 0,
            status: None,
        }
    }
}

/// Levels in volts.
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

pub fn render_transport(frame: &mut Frame, area: Rect, view: &TransportView, stats: &AudioStats) {
    let block = Block::default().title(" saavy rack ").borders(Borders::ALL);

    // 4/4 assumed for display only.
    let bar = view.beat / 4 + 1;
    let beat = view.beat % 4 + 1;

    let mut spans = vec![
        Span::styled(
            format!(" Bar {bar} | Beat {beat}  "),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(
            format!("env {:?}  ", view.stage),
            Style::default().fg(match view.stage {
                EnvelopeStage::Idle => Color::DarkGray,
                _ => Color::Green,
            }),
        ),
        Span::styled(
            format!("delay {}  ", if view.stable { "stable" } else { "tape" }),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("{:.1}kHz  ", view.sample_rate / 1000.0),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!(
                "Peak: {:.2}V ({:+.1}dB)  RMS: {:.2}V",
                stats.peak,
                gain_to_db(stats.peak / AUDIO_PEAK_VOLTS),
                stats.rms
            ),
            Style::default().fg(if stats.peak > AUDIO_PEAK_VOLTS {
                Color::Red
            } else {
                Color::Magenta
            }),
        ),
    ];
    if view.dropped > 0 {
        spans.push(Span::styled(
            format!("  dropped {}", view.dropped),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(status) = &view.status {
        spans.push(Span::styled(
            format!("  {status}"),
            Style::default().fg(Color::Red),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}
