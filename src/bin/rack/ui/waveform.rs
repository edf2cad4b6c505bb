//! Oscilloscope of the left output, in volts

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
    Frame,
};

use saavy_rack::AUDIO_PEAK_VOLTS;

/// Headroom above nominal peak so limiter overshoot stays on screen.
const SCOPE_RANGE: f64 = AUDIO_PEAK_VOLTS as f64 * 1.25;

pub fn render_waveform(frame: &mut Frame, area: Rect, audio_buffer: &[f32]) {
    let block = Block::default().title(" Scope ").borders(Borders::ALL);

    let len = audio_buffer.len().max(1) as f64;
    let data: Vec<(f64, f64)> = audio_buffer
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64 / len, (v as f64).clamp(-SCOPE_RANGE, SCOPE_RANGE)))
        .collect();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&data);

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .bounds([0.0, 1.0])
                .style(Style::default().fg(Color::DarkGray)),
        )
        .y_axis(
            Axis::default()
                .bounds([-SCOPE_RANGE, SCOPE_RANGE])
                .labels(vec!["-5V", "0", "+5V"])
                .style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(chart, area);
}
