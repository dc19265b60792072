//! KML import/export for polygon collections
//!
//! Each polygon becomes one `Placemark` holding a single
//! `Polygon/outerBoundaryIs/LinearRing`. Coordinates are written `lng,lat`
//! with the closing vertex repeated, as KML requires. The format carries no
//! identity, so every import mints fresh ones.

use std::fmt::Write as _;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ParseError;
use crate::regions::{Point, Polygon, Ring};

/// Fewest decimal digits written per coordinate (about 0.1 m of latitude)
pub const MIN_COORDINATE_PRECISION: usize = 6;

pub const DEFAULT_COORDINATE_PRECISION: usize = 8;

/// Render polygons as a KML document.
///
/// `precision` below [`MIN_COORDINATE_PRECISION`] is raised to it. Vertices
/// closer together than the precision can resolve are written as the same
/// coordinate, so such a ring imports with a zero-length edge and is no
/// longer valid. Snapshots keep full precision.
pub fn export(polygons: &[Polygon], precision: usize) -> String {
    let precision = precision.max(MIN_COORDINATE_PRECISION);
    let mut out = String::new();

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n");
    out.push_str("  <Document>\n");

    for (i, polygon) in polygons.iter().enumerate() {
        let points = polygon.ring.points();
        let coordinates = points
            .iter()
            .chain(points.first())
            .map(|p| format!("{:.*},{:.*}", precision, p.lng, precision, p.lat))
            .collect::<Vec<_>>()
            .join(" ");

        // Writing to a String cannot fail
        let _ = write!(
            out,
            "    <Placemark>\n      \
             <name>Polygon {}</name>\n      \
             <Polygon>\n        \
             <outerBoundaryIs>\n          \
             <LinearRing>\n            \
             <coordinates>{}</coordinates>\n          \
             </LinearRing>\n        \
             </outerBoundaryIs>\n      \
             </Polygon>\n    \
             </Placemark>\n",
            i + 1,
            coordinates
        );
    }

    out.push_str("  </Document>\n");
    out.push_str("</kml>\n");
    out
}

/// What the parser has collected for the placemark it is inside
#[derive(Default)]
struct PlacemarkState {
    outer: Option<String>,
    has_holes: bool,
}

/// Parse a KML document into polygons with fresh identities.
///
/// No geometric validation happens here. Any malformed placemark fails the
/// whole document, so callers never see a partial result.
pub fn import(document: &str) -> Result<Vec<Polygon>, ParseError> {
    let mut reader = Reader::from_str(document);
    reader.trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;
    let mut placemark_index = 0;
    let mut current: Option<PlacemarkState> = None;
    let mut polygons = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if path.is_empty() {
                    if name != b"kml" {
                        return Err(ParseError::NotKml);
                    }
                    seen_root = true;
                }
                if name == b"Placemark" {
                    placemark_index += 1;
                    current = Some(PlacemarkState::default());
                }
                if name == b"coordinates" {
                    if let Some(state) = current.as_mut() {
                        open_ring(state, &path, placemark_index)?;
                    }
                }
                path.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if path.is_empty() && name.as_ref() != b"kml" {
                    return Err(ParseError::NotKml);
                }
                if path.is_empty() {
                    seen_root = true;
                }
                if name.as_ref() == b"Placemark" {
                    placemark_index += 1;
                    return Err(ParseError::MissingCoordinates {
                        placemark: placemark_index,
                    });
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| ParseError::Xml {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })?;
                append_coordinates(&mut current, &path, &text);
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = String::from_utf8_lossy(&bytes);
                append_coordinates(&mut current, &path, &text);
            }
            Event::End(_) => {
                let Some(name) = path.pop() else {
                    return Err(ParseError::Xml {
                        position: reader.buffer_position() as u64,
                        message: "unbalanced closing tag".to_string(),
                    });
                };
                if name == b"Placemark" {
                    if let Some(state) = current.take() {
                        polygons.push(finish_placemark(state, placemark_index)?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(ParseError::NotKml);
    }
    if !path.is_empty() {
        return Err(ParseError::Xml {
            position: reader.buffer_position() as u64,
            message: "unexpected end of document".to_string(),
        });
    }

    Ok(polygons)
}

fn inside(path: &[Vec<u8>], element: &[u8]) -> bool {
    path.iter().any(|name| name.as_slice() == element)
}

/// Register a `<coordinates>` element opening inside the current placemark
fn open_ring(
    state: &mut PlacemarkState,
    path: &[Vec<u8>],
    placemark: usize,
) -> Result<(), ParseError> {
    if !inside(path, b"Polygon") {
        return Ok(());
    }
    if inside(path, b"innerBoundaryIs") {
        state.has_holes = true;
    } else if inside(path, b"outerBoundaryIs") {
        if state.outer.is_some() {
            return Err(ParseError::MultipleRings { placemark });
        }
        state.outer = Some(String::new());
    }
    Ok(())
}

fn append_coordinates(current: &mut Option<PlacemarkState>, path: &[Vec<u8>], text: &str) {
    let in_outer_coordinates = path.last().is_some_and(|name| name.as_slice() == b"coordinates")
        && inside(path, b"outerBoundaryIs");
    if !in_outer_coordinates {
        return;
    }
    if let Some(outer) = current.as_mut().and_then(|state| state.outer.as_mut()) {
        outer.push(' ');
        outer.push_str(text);
    }
}

fn finish_placemark(state: PlacemarkState, placemark: usize) -> Result<Polygon, ParseError> {
    if state.has_holes {
        return Err(ParseError::UnsupportedHoles { placemark });
    }
    let text = state
        .outer
        .ok_or(ParseError::MissingCoordinates { placemark })?;

    let points = parse_coordinates(&text, placemark)?;
    let ring = Ring::new(points);
    if ring.len() < 3 {
        return Err(ParseError::TooFewVertices {
            placemark,
            count: ring.len(),
        });
    }
    Ok(Polygon::new(ring))
}

/// Parse whitespace-separated `lng,lat[,alt]` tuples
fn parse_coordinates(text: &str, placemark: usize) -> Result<Vec<Point>, ParseError> {
    text.split_whitespace()
        .map(|token| {
            let invalid = || ParseError::InvalidCoordinate {
                placemark,
                token: token.to_string(),
            };
            let mut parts = token.split(',');
            let (Some(lng), Some(lat)) = (parts.next(), parts.next()) else {
                return Err(invalid());
            };
            let altitude = parts.next();
            if parts.next().is_some() {
                return Err(invalid());
            }

            let lng: f64 = lng.parse().map_err(|_| invalid())?;
            let lat: f64 = lat.parse().map_err(|_| invalid())?;
            if let Some(alt) = altitude {
                alt.parse::<f64>().map_err(|_| invalid())?;
            }
            if !lng.is_finite() || !lat.is_finite() {
                return Err(invalid());
            }
            Ok(Point::new(lat, lng))
        })
        .collect()
}
