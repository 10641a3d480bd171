use dashcore::protocol::DetectedEntityRecord;
use iced::{
    mouse,
    widget::canvas::{self, Frame, Geometry, Path, Stroke},
    Color, Point, Rectangle, Renderer, Size, Theme,
};

use crate::dashboard::Message;

/// Horizontal progress bar, `fraction` in `0..=1`.
#[derive(Clone)]
pub struct ProgressGauge {
    pub fraction: f32,
}

impl canvas::Program<Message> for ProgressGauge {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.08, 0.08, 0.1),
        );
        let filled = bounds.width * self.fraction.clamp(0.0, 1.0);
        if filled > 0.0 {
            frame.fill_rectangle(
                Point::ORIGIN,
                Size::new(filled, bounds.height),
                Color::from_rgb(0.2, 0.68, 0.42),
            );
        }
        vec![frame.into_geometry()]
    }
}

/// Packets analysed per tick, oldest on the left.
#[derive(Clone)]
pub struct Sparkline {
    pub data: Vec<f32>,
}

impl canvas::Program<Message> for Sparkline {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.05, 0.05, 0.05),
        );

        if self.data.len() > 1 {
            let min = self.data.iter().cloned().fold(f32::INFINITY, f32::min);
            let max = self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let range = (max - min).max(1.0);
            let step = bounds.width / (self.data.len() as f32 - 1.0);
            let path = Path::new(|builder| {
                for (i, value) in self.data.iter().enumerate() {
                    let x = i as f32 * step;
                    let y = bounds.height - (value - min) / range * bounds.height;
                    if i == 0 {
                        builder.move_to(Point::new(x, y));
                    } else {
                        builder.line_to(Point::new(x, y));
                    }
                }
            });
            frame.stroke(
                &path,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb(0.18, 0.72, 0.89)),
            );
        }

        vec![frame.into_geometry()]
    }
}

/// Detected entities plotted by coordinates, scaled to fit.
#[derive(Clone)]
pub struct LocationPlot {
    points: Vec<(f64, f64, f64)>,
}

impl LocationPlot {
    pub fn new(records: &[DetectedEntityRecord]) -> Self {
        Self {
            points: records
                .iter()
                .map(|record| {
                    (
                        record.coordinates.lon,
                        record.coordinates.lat,
                        record.approximate_distance_km,
                    )
                })
                .collect(),
        }
    }
}

impl canvas::Program<Message> for LocationPlot {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.02, 0.02, 0.04),
        );

        let margin = 12.0;
        let grid = Path::new(|builder| {
            for step in 1..4 {
                let x = bounds.width * step as f32 / 4.0;
                let y = bounds.height * step as f32 / 4.0;
                builder.move_to(Point::new(x, 0.0));
                builder.line_to(Point::new(x, bounds.height));
                builder.move_to(Point::new(0.0, y));
                builder.line_to(Point::new(bounds.width, y));
            }
        });
        frame.stroke(
            &grid,
            Stroke::default()
                .with_color(Color::from_rgb(0.2, 0.2, 0.26))
                .with_width(1.0),
        );

        if let Some((lon_min, lon_max, lat_min, lat_max)) = extent(&self.points) {
            let lon_span = (lon_max - lon_min).max(1e-6);
            let lat_span = (lat_max - lat_min).max(1e-6);
            let usable_w = (bounds.width - 2.0 * margin).max(1.0);
            let usable_h = (bounds.height - 2.0 * margin).max(1.0);
            for (lon, lat, distance) in &self.points {
                let x = margin + ((lon - lon_min) / lon_span) as f32 * usable_w;
                let y = margin + (1.0 - ((lat - lat_min) / lat_span) as f32) * usable_h;
                let radius = 3.0 + (*distance as f32).min(5.0) * 0.6;
                let marker = Path::new(|builder| builder.circle(Point::new(x, y), radius));
                frame.fill(&marker, Color::from_rgb(0.95, 0.55, 0.2));
            }
        }

        vec![frame.into_geometry()]
    }
}

fn extent(points: &[(f64, f64, f64)]) -> Option<(f64, f64, f64, f64)> {
    let (first, rest) = points.split_first()?;
    Some(rest.iter().fold(
        (first.0, first.0, first.1, first.1),
        |(lon_min, lon_max, lat_min, lat_max), (lon, lat, _)| {
            (
                lon_min.min(*lon),
                lon_max.max(*lon),
                lat_min.min(*lat),
                lat_max.max(*lat),
            )
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_covers_every_point() {
        let points = [(1.0, 5.0, 0.0), (-2.0, 7.5, 0.0), (0.5, 6.0, 0.0)];
        assert_eq!(extent(&points), Some((-2.0, 1.0, 5.0, 7.5)));
        assert_eq!(extent(&[]), None);
    }
}
