//! Screen composition and text formatting.
//!
//! Everything here is pure: a [`View`] goes in, a [`Frame`] (a short list
//! of positioned texts and icons) comes out. Coordinates are top-left
//! corners on the 128×64 panel.
//!
//! ```text
//!  Dashboard                      Connecting
//! ┌────────────────────────────┐ ┌────────────────────────────┐
//! │Up 1m 5s              M ▂▄▆ │ │Connecting...               │
//! │▯ 23.4C     ≋ AQ            │ │WiFi: lab                   │
//! │            512             │ │                            │
//! │◊ 45.2%                     │ │7s  timeout                 │
//! └────────────────────────────┘ └────────────────────────────┘
//! ```

use core::fmt::Write;

use embedded_graphics::prelude::Point;
use heapless::{String, Vec};

use super::{Screen, View};
use crate::connectivity::ConnectionState;

/// Longest text item we lay out.
pub const TEXT_CAPACITY: usize = 24;

/// Most items on one screen.
pub const FRAME_CAPACITY: usize = 12;

pub type Text = String<TEXT_CAPACITY>;

/// The two font sizes the panel uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextSize {
    /// 6×10 px.
    Small,
    /// 10×20 px.
    Large,
}

/// Small glyphs drawn next to readings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Icon {
    Thermometer,
    Droplet,
    Air,
    /// WiFi signal, 1-3 bars.
    Signal(u8),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    Text { text: Text, at: Point, size: TextSize },
    Icon { icon: Icon, at: Point },
}

pub type Frame = Vec<Item, FRAME_CAPACITY>;

/// Build the frame for `screen`. `frame_no` drives the ellipsis animation.
pub fn compose(screen: Screen, view: &View<'_>, frame_no: u32) -> Frame {
    let mut frame = Frame::new();
    match screen {
        Screen::Connecting => connecting(&mut frame, view, frame_no),
        Screen::Confirmation => confirmation(&mut frame, view),
        Screen::Dashboard => dashboard(&mut frame, view),
    }
    frame
}

fn connecting(frame: &mut Frame, view: &View<'_>, frame_no: u32) {
    let mut title = Text::new();
    let _ = write!(title, "Connecting{}", ellipsis(frame_no));
    text(frame, title, 0, 0, TextSize::Small);

    let mut network = Text::new();
    let _ = write!(network, "WiFi: {}", truncate(view.network, TEXT_CAPACITY - 6));
    text(frame, network, 0, 14, TextSize::Small);

    text(frame, countdown(view.remaining_secs), 0, 34, TextSize::Large);
    text(frame, label("timeout"), 40, 44, TextSize::Small);
}

fn confirmation(frame: &mut Frame, view: &View<'_>) {
    text(frame, label("WiFi connected"), 0, 0, TextSize::Small);
    text(frame, label(view.network), 0, 14, TextSize::Small);
    if let Some(ip) = view.ip {
        text(frame, format_ip(ip), 0, 28, TextSize::Small);
    }
}

fn dashboard(frame: &mut Frame, view: &View<'_>) {
    let mut uptime = Text::new();
    let _ = write!(uptime, "Up {}", format_uptime(view.uptime_secs));
    text(frame, uptime, 0, 0, TextSize::Small);

    if view.state == ConnectionState::Connected {
        if view.mqtt_connected {
            text(frame, label("M"), 104, 0, TextSize::Small);
        }
        icon(frame, Icon::Signal(signal_bars(view.rssi)), 114, 0);
    }

    icon(frame, Icon::Thermometer, 0, 14);
    text(frame, format_temperature(view.snapshot.temperature()), 12, 12, TextSize::Large);

    icon(frame, Icon::Droplet, 0, 40);
    text(frame, format_humidity(view.snapshot.humidity()), 12, 38, TextSize::Large);

    icon(frame, Icon::Air, 80, 14);
    text(frame, label("AQ"), 94, 14, TextSize::Small);
    text(frame, format_air_quality(view.snapshot.air_quality), 84, 38, TextSize::Large);
}

fn label(s: &str) -> Text {
    let mut t = Text::new();
    let _ = t.push_str(truncate(s, TEXT_CAPACITY));
    t
}

fn text(frame: &mut Frame, text: Text, x: i32, y: i32, size: TextSize) {
    let _ = frame.push(Item::Text {
        text,
        at: Point::new(x, y),
        size,
    });
}

fn icon(frame: &mut Frame, icon: Icon, x: i32, y: i32) {
    let _ = frame.push(Item::Icon {
        icon,
        at: Point::new(x, y),
    });
}

/// "23.4C", or "ERROR" for a failed reading.
pub fn format_temperature(celsius: Option<f32>) -> Text {
    reading(celsius, "C")
}

/// "45.2%", or "ERROR" for a failed reading.
pub fn format_humidity(percent: Option<f32>) -> Text {
    reading(percent, "%")
}

fn reading(value: Option<f32>, unit: &str) -> Text {
    let mut s = Text::new();
    match value {
        Some(v) => {
            let _ = write!(s, "{:.1}{}", v, unit);
        }
        None => {
            let _ = s.push_str("ERROR");
        }
    }
    s
}

pub fn format_air_quality(value: u16) -> Text {
    let mut s = Text::new();
    let _ = write!(s, "{}", value);
    s
}

/// Seconds below a minute, minutes+seconds below an hour, hours+minutes above.
pub fn format_uptime(secs: u64) -> Text {
    let mut s = Text::new();
    let _ = if secs < 60 {
        write!(s, "{}s", secs)
    } else if secs < 3_600 {
        write!(s, "{}m {}s", secs / 60, secs % 60)
    } else {
        write!(s, "{}h {}m", secs / 3_600, (secs % 3_600) / 60)
    };
    s
}

/// "", ".", "..", "..." - one step per redraw.
pub fn ellipsis(frame_no: u32) -> &'static str {
    const DOTS: [&str; 4] = ["", ".", "..", "..."];
    DOTS[(frame_no % 4) as usize]
}

pub fn countdown(remaining_secs: u32) -> Text {
    let mut s = Text::new();
    let _ = write!(s, "{}s", remaining_secs);
    s
}

pub fn format_ip(ip: [u8; 4]) -> Text {
    let mut s = Text::new();
    let _ = write!(s, "{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
    s
}

/// Bars for the WiFi glyph.
pub fn signal_bars(rssi: Option<i8>) -> u8 {
    match rssi {
        Some(dbm) if dbm >= -60 => 3,
        Some(dbm) if dbm >= -75 => 2,
        _ => 1,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::INVALID_READING;
    use crate::sensor::SensorSnapshot;

    fn view(state: ConnectionState) -> View<'static> {
        View {
            state,
            snapshot: SensorSnapshot {
                temperature: 23.4,
                humidity: 45.2,
                air_quality: 512,
            },
            uptime_secs: 65,
            network: "lab",
            remaining_secs: 7,
            ip: Some([10, 0, 0, 7]),
            rssi: Some(-50),
            mqtt_connected: true,
        }
    }

    fn texts(frame: &Frame) -> Vec<&str, FRAME_CAPACITY> {
        frame
            .iter()
            .filter_map(|item| match item {
                Item::Text { text, .. } => Some(text.as_str()),
                Item::Icon { .. } => None,
            })
            .collect()
    }

    #[test]
    fn uptime_format_adapts_to_magnitude() {
        assert_eq!(format_uptime(0).as_str(), "0s");
        assert_eq!(format_uptime(59).as_str(), "59s");
        assert_eq!(format_uptime(60).as_str(), "1m 0s");
        assert_eq!(format_uptime(3_599).as_str(), "59m 59s");
        assert_eq!(format_uptime(3_600).as_str(), "1h 0m");
        assert_eq!(format_uptime(90_061).as_str(), "25h 1m");
    }

    #[test]
    fn ellipsis_cycles_through_four_states() {
        let seq: [&str; 5] = [ellipsis(0), ellipsis(1), ellipsis(2), ellipsis(3), ellipsis(4)];
        assert_eq!(seq, ["", ".", "..", "...", ""]);
    }

    #[test]
    fn readings_show_error_on_sentinel() {
        let snap = SensorSnapshot {
            temperature: INVALID_READING,
            humidity: 45.2,
            air_quality: 0,
        };
        assert_eq!(format_temperature(snap.temperature()).as_str(), "ERROR");
        assert_eq!(format_humidity(snap.humidity()).as_str(), "45.2%");
    }

    #[test]
    fn dashboard_lists_readings_and_glyphs() {
        let frame = compose(Screen::Dashboard, &view(ConnectionState::Connected), 0);
        let t = texts(&frame);
        assert!(t.contains(&"23.4C"));
        assert!(t.contains(&"45.2%"));
        assert!(t.contains(&"512"));
        assert!(t.contains(&"Up 1m 5s"));
        assert!(t.contains(&"M"));
        assert!(frame
            .iter()
            .any(|i| matches!(i, Item::Icon { icon: Icon::Signal(3), .. })));
    }

    #[test]
    fn dashboard_hides_wifi_glyph_when_offline() {
        let frame = compose(Screen::Dashboard, &view(ConnectionState::Disconnected), 0);
        assert!(!frame
            .iter()
            .any(|i| matches!(i, Item::Icon { icon: Icon::Signal(_), .. })));
        assert!(!texts(&frame).contains(&"M"));
    }

    #[test]
    fn connecting_screen_shows_network_dots_and_countdown() {
        let frame = compose(Screen::Connecting, &view(ConnectionState::Connecting), 2);
        let t = texts(&frame);
        assert!(t.contains(&"Connecting.."));
        assert!(t.contains(&"WiFi: lab"));
        assert!(t.contains(&"7s"));
    }

    #[test]
    fn confirmation_screen_shows_address() {
        let frame = compose(Screen::Confirmation, &view(ConnectionState::Connected), 0);
        let t = texts(&frame);
        assert!(t.contains(&"WiFi connected"));
        assert!(t.contains(&"10.0.0.7"));
    }

    #[test]
    fn signal_bars_follow_rssi() {
        assert_eq!(signal_bars(Some(-40)), 3);
        assert_eq!(signal_bars(Some(-70)), 2);
        assert_eq!(signal_bars(Some(-90)), 1);
        assert_eq!(signal_bars(None), 1);
    }

    #[test]
    fn long_network_names_are_truncated() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
