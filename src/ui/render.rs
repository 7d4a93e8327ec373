//! Draws a composed [`Frame`] with embedded-graphics.
//!
//! Works on any `DrawTarget<Color = BinaryColor>`: the SSD1306 buffer on
//! the device, a plain framebuffer in tests.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Circle, Line, PrimitiveStyle, Rectangle, Triangle};
use embedded_graphics::text::{Baseline, Text};

use super::layout::{Frame, Icon, Item, TextSize};

fn text_style(size: TextSize) -> MonoTextStyle<'static, BinaryColor> {
    let font = match size {
        TextSize::Small => &FONT_6X10,
        TextSize::Large => &FONT_10X20,
    };
    MonoTextStyleBuilder::new()
        .font(font)
        .text_color(BinaryColor::On)
        .build()
}

/// Clear the target and draw every item of `frame`.
pub fn draw<D>(target: &mut D, frame: &Frame) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(BinaryColor::Off)?;
    for item in frame {
        match item {
            Item::Text { text, at, size } => {
                Text::with_baseline(text.as_str(), *at, text_style(*size), Baseline::Top)
                    .draw(target)?;
            }
            Item::Icon { icon, at } => draw_icon(target, *icon, *at)?,
        }
    }
    Ok(())
}

fn draw_icon<D>(target: &mut D, icon: Icon, at: Point) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    let fill = PrimitiveStyle::with_fill(BinaryColor::On);

    match icon {
        Icon::Thermometer => {
            // Stem + bulb, 8×16.
            Rectangle::new(at + Point::new(2, 0), Size::new(4, 11))
                .into_styled(stroke)
                .draw(target)?;
            Circle::new(at + Point::new(0, 9), 8)
                .into_styled(fill)
                .draw(target)?;
        }
        Icon::Droplet => {
            // Tip + round bottom, 8×14.
            Triangle::new(
                at + Point::new(4, 0),
                at + Point::new(0, 8),
                at + Point::new(8, 8),
            )
            .into_styled(fill)
            .draw(target)?;
            Circle::new(at + Point::new(0, 5), 9)
                .into_styled(fill)
                .draw(target)?;
        }
        Icon::Air => {
            // Three staggered strokes, 12×9.
            for (row, indent) in [(0, 0), (4, 3), (8, 1)] {
                Line::new(at + Point::new(indent, row), at + Point::new(11, row))
                    .into_styled(stroke)
                    .draw(target)?;
            }
        }
        Icon::Signal(bars) => {
            // Up to three bars of rising height, 11×9.
            for bar in 0..bars.min(3) as i32 {
                let height = 3 * (bar as u32 + 1);
                let top = at.y + 9 - height as i32;
                Rectangle::new(Point::new(at.x + bar * 4, top), Size::new(3, height))
                    .into_styled(fill)
                    .draw(target)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::layout::{compose, Text as Label};
    use crate::ui::{Screen, View};
    use crate::connectivity::ConnectionState;
    use crate::sensor::SensorSnapshot;
    use core::convert::Infallible;

    /// 128×64 one-bit canvas.
    struct Canvas {
        pixels: [[bool; 128]; 64],
    }

    impl Canvas {
        fn new() -> Self {
            Self {
                pixels: [[false; 128]; 64],
            }
        }

        fn lit(&self) -> usize {
            self.pixels.iter().flatten().filter(|p| **p).count()
        }

        fn lit_in(&self, area: Rectangle) -> usize {
            area.points()
                .filter(|p| self.pixels[p.y as usize][p.x as usize])
                .count()
        }
    }

    impl OriginDimensions for Canvas {
        fn size(&self) -> Size {
            Size::new(128, 64)
        }
    }

    impl DrawTarget for Canvas {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(p, color) in pixels {
                if (0..128).contains(&p.x) && (0..64).contains(&p.y) {
                    self.pixels[p.y as usize][p.x as usize] = color.is_on();
                }
            }
            Ok(())
        }
    }

    fn dashboard_view(state: ConnectionState) -> View<'static> {
        View {
            state,
            snapshot: SensorSnapshot {
                temperature: 21.0,
                humidity: 40.0,
                air_quality: 99,
            },
            uptime_secs: 5,
            network: "lab",
            remaining_secs: 10,
            ip: None,
            rssi: Some(-50),
            mqtt_connected: false,
        }
    }

    #[test]
    fn draws_dashboard_pixels() {
        let mut canvas = Canvas::new();
        let frame = compose(Screen::Dashboard, &dashboard_view(ConnectionState::Connected), 0);
        draw(&mut canvas, &frame).unwrap();
        assert!(canvas.lit() > 100);
        // Signal glyph lands in the top-right corner.
        assert!(canvas.lit_in(Rectangle::new(Point::new(114, 0), Size::new(12, 10))) > 0);
    }

    #[test]
    fn no_signal_glyph_when_offline() {
        let mut canvas = Canvas::new();
        let frame = compose(Screen::Dashboard, &dashboard_view(ConnectionState::Disconnected), 0);
        draw(&mut canvas, &frame).unwrap();
        assert_eq!(
            canvas.lit_in(Rectangle::new(Point::new(114, 0), Size::new(12, 10))),
            0
        );
    }

    #[test]
    fn redraw_clears_previous_frame() {
        let mut canvas = Canvas::new();
        let frame = compose(Screen::Dashboard, &dashboard_view(ConnectionState::Connected), 0);
        draw(&mut canvas, &frame).unwrap();
        draw(&mut canvas, &Frame::new()).unwrap();
        assert_eq!(canvas.lit(), 0);
    }

    #[test]
    fn large_text_is_taller_than_small() {
        let mut small = Canvas::new();
        let mut large = Canvas::new();
        let mut frame = Frame::new();
        let _ = frame.push(Item::Text {
            text: Label::try_from("8").unwrap(),
            at: Point::zero(),
            size: TextSize::Small,
        });
        draw(&mut small, &frame).unwrap();
        if let Some(Item::Text { size, .. }) = frame.first_mut() {
            *size = TextSize::Large;
        }
        draw(&mut large, &frame).unwrap();
        let below_small = Rectangle::new(Point::new(0, 10), Size::new(10, 10));
        assert_eq!(small.lit_in(below_small), 0);
        assert!(large.lit_in(below_small) > 0);
    }
}
