//! User interface subsystem - 128×64 monochrome OLED.
//!
//! The presenter turns the current connection state and the latest
//! snapshot into one of three screens and draws it. It has no say over
//! connectivity: it only reads state and is told about [`Transition`]s.
//!
//! ## Components
//!
//! - **Layout** (`layout`): pure `View` → `Frame` composition and all text formatting
//! - **Render** (`render`): draws a `Frame` onto any `BinaryColor` draw target
//! - **Display** (`display`, embedded only): SSD1306 via I²C

pub mod layout;
pub mod render;

#[cfg(feature = "embedded")]
pub mod display;

use crate::config::CONFIRMATION_SCREEN_MS;
use crate::connectivity::{ConnectionState, Transition};
use crate::sensor::SensorSnapshot;
use crate::timer;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::DrawTarget;

/// Screens the UI can be in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// Association in progress - network name, dots, countdown.
    Connecting,
    /// Short "WiFi connected" confirmation after association.
    Confirmation,
    /// Sensor readings, uptime and link glyphs.
    Dashboard,
}

/// Everything one redraw depends on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View<'a> {
    pub state: ConnectionState,
    pub snapshot: SensorSnapshot,
    pub uptime_secs: u64,
    pub network: &'a str,
    /// Seconds left before the association attempt is abandoned.
    pub remaining_secs: u32,
    pub ip: Option<[u8; 4]>,
    pub rssi: Option<i8>,
    pub mqtt_connected: bool,
}

/// Which screen a view maps to.
pub fn select_screen(state: ConnectionState, confirming: bool) -> Screen {
    match state {
        ConnectionState::Connecting => Screen::Connecting,
        ConnectionState::Connected if confirming => Screen::Confirmation,
        _ => Screen::Dashboard,
    }
}

/// Redraw bookkeeping: animation frame, the confirmation window and the
/// frame last put on the panel.
#[derive(Default)]
pub struct Presenter {
    redraws: u32,
    confirmed_at: Option<u32>,
    last_frame: layout::Frame,
}

impl Presenter {
    pub const fn new() -> Self {
        Self {
            redraws: 0,
            confirmed_at: None,
            last_frame: layout::Frame::new(),
        }
    }

    /// React to a connectivity transition.
    pub fn on_transition(&mut self, transition: Transition, now: u32) {
        match transition {
            Transition::Associated => self.confirmed_at = Some(now),
            Transition::LinkLost | Transition::Retrying => self.confirmed_at = None,
            Transition::TimedOut => {}
        }
    }

    /// The confirmation screen is still due at `now`.
    pub fn is_confirming(&self, now: u32) -> bool {
        self.confirmed_at
            .is_some_and(|at| !timer::elapsed(at, CONFIRMATION_SCREEN_MS, now))
    }

    pub fn redraws(&self) -> u32 {
        self.redraws
    }

    /// What the last successful [`render`](Self::render) drew.
    pub fn last_frame(&self) -> &layout::Frame {
        &self.last_frame
    }

    /// Compose and draw one frame. Called every display interval, whether
    /// or not anything changed.
    pub fn render<D>(&mut self, target: &mut D, view: &View<'_>, now: u32) -> Result<Screen, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        if !self.is_confirming(now) {
            self.confirmed_at = None;
        }
        let screen = select_screen(view.state, self.confirmed_at.is_some());
        let frame = layout::compose(screen, view, self.redraws);
        render::draw(target, &frame)?;
        self.last_frame = frame;
        self.redraws = self.redraws.wrapping_add(1);
        Ok(screen)
    }
}
