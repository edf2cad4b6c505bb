//! Euclidean step row
//!
//! One cell per step: filled where the pattern has a pulse, highlighted at the
//! step that last fired, magenta where that hit carried an accent.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_rack::sequencing::{euclid::MAX_STEPS, Pattern};

pub struct StepView {
    pattern: Pattern,
    current: Option<usize>,
    accents: [bool; MAX_STEPS],
    fired: u64,
}

impl Default for StepView {
    fn default() -> Self {
        Self {
            pattern: Pattern::new(16, 4, 0),
            current: None,
            accents: [false; MAX_STEPS],
            fired: 0,
        }
    }
}

impl StepView {
    pub fn set_pattern(&mut self, len: usize, pulses: usize, rotation: usize) {
        if self.pattern.update(len, pulses, rotation) {
            self.current = self.current.filter(|&i| i < self.pattern.len());
        }
    }

    pub fn advance(&mut self, index: usize, fired: bool, accent: bool) {
        self.current = Some(index);
        if let Some(slot) = self.accents.get_mut(index) {
            *slot = fired && accent;
        }
        if fired {
            self.fired += 1;
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.accents = [false; MAX_STEPS];
    }
}

pub fn render_steps(frame: &mut Frame, area: Rect, view: &StepView) {
    let title = format!(
        " Euclid E({},{}) r{}  hits {} ",
        view.pattern.pulses(),
        view.pattern.len(),
        view.pattern.rotation(),
        view.fired
    );
    let block = Block::default().title(title).borders(Borders::ALL);

    let cells: Vec<Span> = view
        .pattern
        .as_slice()
        .iter()
        .enumerate()
        .map(|(i, &pulse)| {
            let symbol = if pulse { " ■ " } else { " · " };
            let mut style = Style::default().fg(if pulse { Color::Cyan } else { Color::DarkGray });
            if view.accents[i] {
                style = style.fg(Color::Magenta);
            }
            if view.current == Some(i) {
                style = style.bg(Color::White).add_modifier(Modifier::BOLD);
            }
            Span::styled(symbol, style)
        })
        .collect();

    let index: Vec<Span> = (0..view.pattern.len())
        .map(|i| {
            let style = if view.current == Some(i) {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!("{:^3}", (i + 1) % 100), style)
        })
        .collect();

    let paragraph = Paragraph::new(vec![Line::from(cells), Line::from(index)]).block(block);
    frame.render_widget(paragraph, area);
}
