//! Nearest-text lookup around a point on a page.
//!
//! The lookup is purely geometric: span centers are compared against the
//! query point with the Euclidean metric. When nothing falls inside the
//! radius, the globally nearest spans are returned instead so that a page
//! with any text at all never yields an empty answer.

use serde::{Deserialize, Serialize};

use crate::span::TextSpan;

/// Number of spans returned when nothing lies within the radius.
pub const DEFAULT_FALLBACK_COUNT: usize = 3;

/// A span paired with its distance from the query point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbySpan<'a> {
    pub span: &'a TextSpan,
    pub distance: f32,
}

/// How the search radius is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Radius {
    /// Absolute distance in points.
    Absolute(f32),
    /// Fraction of `max(page_width, page_height)`.
    PageFraction(f32),
}

impl Radius {
    /// Resolve to a distance in points for a page of the given size.
    pub fn to_points(self, page_width: f32, page_height: f32) -> f32 {
        match self {
            Radius::Absolute(d) => d,
            Radius::PageFraction(f) => page_width.max(page_height) * f,
        }
    }
}

/// Convert normalized `(nx, ny)` coordinates into page points.
pub fn denormalize(nx: f32, ny: f32, page_width: f32, page_height: f32) -> (f32, f32) {
    (nx * page_width, ny * page_height)
}

/// Spans near `(x, y)`, nearest first.
///
/// Spans within `max_dist` are returned in ascending distance; ties keep
/// extraction order. If none qualify, the `fallback_count` nearest spans are
/// returned regardless of distance.
pub fn resolve_spans(
    spans: &[TextSpan],
    x: f32,
    y: f32,
    max_dist: f32,
    fallback_count: usize,
) -> Vec<NearbySpan<'_>> {
    let mut ranked: Vec<NearbySpan<'_>> = spans
        .iter()
        .map(|span| NearbySpan {
            span,
            distance: span.distance_to(x, y),
        })
        .collect();

    // sort_by is stable, which keeps extraction order on equal distances.
    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    let within = ranked
        .iter()
        .take_while(|n| n.distance <= max_dist)
        .count();

    if within > 0 {
        ranked.truncate(within);
    } else {
        ranked.truncate(fallback_count);
    }
    ranked
}

/// Texts near `(x, y)` using the default fallback of three spans.
pub fn resolve(spans: &[TextSpan], x: f32, y: f32, max_dist: f32) -> Vec<String> {
    resolve_spans(spans, x, y, max_dist, DEFAULT_FALLBACK_COUNT)
        .into_iter()
        .map(|n| n.span.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(text: &str, cx: f32, cy: f32) -> TextSpan {
        TextSpan::new(cx - 2.0, cy - 1.0, cx + 2.0, cy + 1.0, text).unwrap()
    }

    // -- resolve ---------------------------------------------------------------

    #[test]
    fn test_resolve_single_span_within_radius() {
        let spans = vec![span_at("12.5", 100.0, 100.0)];
        assert_eq!(resolve(&spans, 101.0, 101.0, 5.0), vec!["12.5"]);
    }

    #[test]
    fn test_resolve_fallback_returns_three_nearest() {
        let spans = vec![
            span_at("A", 60.0, 0.0),
            span_at("B", 40.0, 0.0),
            span_at("C", 30.0, 0.0),
            span_at("D", 10.0, 0.0),
        ];
        assert_eq!(resolve(&spans, 0.0, 0.0, 5.0), vec!["D", "C", "B"]);
    }

    #[test]
    fn test_resolve_fallback_with_fewer_than_three_spans() {
        let spans = vec![span_at("far", 500.0, 500.0), span_at("farther", 900.0, 900.0)];
        assert_eq!(resolve(&spans, 0.0, 0.0, 5.0), vec!["far", "farther"]);
    }

    #[test]
    fn test_resolve_empty_span_set() {
        assert!(resolve(&[], 10.0, 10.0, 50.0).is_empty());
    }

    #[test]
    fn test_resolve_orders_by_distance() {
        let spans = vec![
            span_at("third", 30.0, 0.0),
            span_at("first", 1.0, 0.0),
            span_at("second", 10.0, 0.0),
        ];
        assert_eq!(
            resolve(&spans, 0.0, 0.0, 50.0),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_resolve_ties_keep_extraction_order() {
        let spans = vec![
            span_at("left", -5.0, 0.0),
            span_at("right", 5.0, 0.0),
            span_at("up", 0.0, -5.0),
        ];
        assert_eq!(resolve(&spans, 0.0, 0.0, 10.0), vec!["left", "right", "up"]);
    }

    #[test]
    fn test_resolve_excludes_spans_outside_radius_when_some_inside() {
        let spans = vec![span_at("near", 2.0, 0.0), span_at("far", 80.0, 0.0)];
        assert_eq!(resolve(&spans, 0.0, 0.0, 50.0), vec!["near"]);
    }

    #[test]
    fn test_resolve_boundary_distance_is_inclusive() {
        let spans = vec![span_at("edge", 3.0, 4.0)];
        let nearby = resolve_spans(&spans, 0.0, 0.0, 5.0, 0);
        assert_eq!(nearby.len(), 1);
        assert!((nearby[0].distance - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_resolve_spans_custom_fallback_count() {
        let spans: Vec<TextSpan> = (1..=6)
            .map(|i| span_at(&i.to_string(), 100.0 * i as f32, 0.0))
            .collect();
        let nearby = resolve_spans(&spans, 0.0, 0.0, 1.0, 5);
        let texts: Vec<&str> = nearby.iter().map(|n| n.span.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2", "3", "4", "5"]);
        assert!(nearby.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    // -- radius / coordinates --------------------------------------------------

    #[test]
    fn test_radius_absolute() {
        assert_eq!(Radius::Absolute(50.0).to_points(612.0, 792.0), 50.0);
    }

    #[test]
    fn test_radius_page_fraction_uses_larger_dimension() {
        let r = Radius::PageFraction(0.03).to_points(612.0, 792.0);
        assert!((r - 23.76).abs() < 1e-3);
        let r = Radius::PageFraction(0.03).to_points(1191.0, 842.0);
        assert!((r - 35.73).abs() < 1e-3);
    }

    #[test]
    fn test_denormalize() {
        assert_eq!(denormalize(0.5, 0.25, 600.0, 800.0), (300.0, 200.0));
        assert_eq!(denormalize(0.0, 1.0, 600.0, 800.0), (0.0, 800.0));
    }
}
