//! TUI for the rack binary
//!
//! Shows the Euclidean steps as they fire, an oscilloscope and a spectrum of
//! the left output, and maps a few keys onto patch parameters.

mod spectrum;
mod steps;
mod transport;
mod waveform;

use std::time::Duration;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use rtrb::Consumer;

use saavy_rack::{
    dsp::envelope::EnvelopeStage,
    io::{ControlMessage, Notification, UnitEvent},
    Patch, PatchError,
};

use super::app::DemoPatch;
use spectrum::{render_spectrum, SpectrumAnalyzer};
use steps::{render_steps, StepView};
use transport::{render_transport, AudioStats, TransportView};
use waveform::render_waveform;

/// Audio visualization buffer size (also the FFT size)
pub const VIS_BUFFER_SIZE: usize = 1024;

pub struct UiApp {
    patch: Patch,
    demo: DemoPatch,
    audio_rx: Consumer<f32>,
    audio_buffer: Vec<f32>,
    spectrum: SpectrumAnalyzer,
    steps: StepView,
    transport: TransportView,
    notifications: Vec<Notification>,
    should_quit: bool,
}

impl UiApp {
    pub fn new(patch: Patch, demo: DemoPatch, audio_rx: Consumer<f32>, sample_rate: f32) -> Self {
        let mut app = Self {
            patch,
            demo,
            audio_rx,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            spectrum: SpectrumAnalyzer::new(VIS_BUFFER_SIZE, sample_rate),
            steps: StepView::default(),
            transport: TransportView::new(sample_rate),
            notifications: Vec::with_capacity(256),
            should_quit: false,
        };
        app.refresh_pattern();
        app
    }

    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.poll_notifications();
            self.patch.collect_garbage();

            terminal.draw(|frame| self.render(frame))?;

            // ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        if let Err(err) = self.handle_key(key.code) {
                            log::warn!("key {:?}: {err}", key.code);
                            self.transport.status = Some(err.to_string());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Keep the last VIS_BUFFER_SIZE samples of the tap.
    fn poll_audio(&mut self) {
        let available = self.audio_rx.slots();
        if available == 0 {
            return;
        }
        self.audio_buffer
            .extend(std::iter::from_fn(|| self.audio_rx.pop().ok()).take(available));
        if self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
        self.spectrum.update(&self.audio_buffer);
    }

    fn poll_notifications(&mut self) {
        self.notifications.clear();
        self.patch.poll_notifications(&mut self.notifications);
        for n in &self.notifications {
            match n.event {
                UnitEvent::Step {
                    index,
                    fired,
                    accent,
                } if n.unit == self.demo.euclid => self.steps.advance(index, fired, accent),
                UnitEvent::Beat { count } if n.unit == self.demo.clock => {
                    self.transport.beat = count;
                }
                UnitEvent::Stage(stage) if n.unit == self.demo.envelope => {
                    self.transport.stage = stage;
                }
                _ => {}
            }
        }
        self.transport.dropped = self.patch.dropped_notifications();
    }

    fn handle_key(&mut self, key: KeyCode) -> Result<(), PatchError> {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                for unit in [self.demo.clock, self.demo.euclid, self.demo.envelope] {
                    self.patch.send(unit, ControlMessage::Reset)?;
                }
                self.steps.clear();
                self.transport.beat = 0;
                self.transport.stage = EnvelopeStage::Idle;
            }
            KeyCode::Char('+') | KeyCode::Char('=') => self.nudge_pulses(1.0)?,
            KeyCode::Char('-') | KeyCode::Char('_') => self.nudge_pulses(-1.0)?,
            KeyCode::Char('s') | KeyCode::Char('S') => {
                let params = self.patch.params(self.demo.delay)?;
                let stable = params.index_of("stable").is_some_and(|i| params.get_bool(i));
                self.patch
                    .set_param(self.demo.delay, "stable", if stable { 0.0 } else { 1.0 })?;
            }
            _ => {}
        }
        Ok(())
    }

    fn nudge_pulses(&mut self, by: f32) -> Result<(), PatchError> {
        let params = self.patch.params(self.demo.euclid)?;
        let current = params.index_of("pulses").map_or(0.0, |i| params.get(i));
        self.patch
            .set_param(self.demo.euclid, "pulses", current + by)?;
        self.refresh_pattern();
        Ok(())
    }

    /// Rebuild the displayed pattern from the sequencer's parameters.
    fn refresh_pattern(&mut self) {
        let Ok(params) = self.patch.params(self.demo.euclid) else {
            return;
        };
        let read = |name: &str| params.index_of(name).map_or(0, |i| params.get_index(i));
        self.steps
            .set_pattern(read("length"), read("pulses"), read("rotation"));

        if let Ok(delay) = self.patch.params(self.demo.delay) {
            self.transport.stable = delay.index_of("stable").is_some_and(|i| delay.get_bool(i));
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        self.refresh_pattern();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Length(5), // Steps
                Constraint::Min(8),    // Scope + spectrum
                Constraint::Length(1), // Help bar
            ])
            .split(frame.area());

        let stats = AudioStats::from_buffer(&self.audio_buffer);
        render_transport(frame, chunks[0], &self.transport, &stats);
        render_steps(frame, chunks[1], &self.steps);

        let scopes = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);
        render_waveform(frame, scopes[0], &self.audio_buffer);
        render_spectrum(frame, scopes[1], self.spectrum.data());

        let help = Paragraph::new(" [Q] Quit  [R] Reset  [+/-] Pulses  [S] Stable delay")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
