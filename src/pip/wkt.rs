//! WKT reader for `POLYGON` and `MULTIPOLYGON` geometries.
//!
//! The first ring of every polygon block is its exterior, the remaining rings
//! are holes. Rings are closed if the producer left them open. Z/M ordinates
//! are accepted and dropped. An optional EWKT `SRID=...;` prefix is ignored.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use hashbrown::HashSet;
use thiserror::Error;

/// Error type for WKT parsing. Offsets are byte positions in the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WktError {
    #[error("unexpected end of input at byte {offset}, expected {expected}")]
    UnexpectedEnd {
        expected: &'static str,
        offset: usize,
    },
    #[error("expected {expected} at byte {offset}, found {found:?}")]
    Unexpected {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("invalid number {token:?} at byte {offset}")]
    InvalidNumber { token: String, offset: usize },
    #[error("vertex at byte {offset} has {count} ordinate(s), need 2 to 4")]
    BadVertex { count: usize, offset: usize },
    #[error("unsupported geometry type {0:?}")]
    UnsupportedType(String),
    #[error("ring {ring} of polygon {polygon} has {distinct} distinct vertices, need at least 3")]
    DegenerateRing {
        polygon: usize,
        ring: usize,
        distinct: usize,
    },
    #[error("trailing input at byte {offset}")]
    TrailingInput { offset: usize },
}

/// Parse a `POLYGON` or `MULTIPOLYGON` into a multipolygon.
///
/// `POLYGON EMPTY` and `MULTIPOLYGON EMPTY` yield zero sub-polygons.
pub fn parse_wkt(text: &str) -> Result<MultiPolygon<f64>, WktError> {
    let mut cursor = Cursor::new(text);
    cursor.skip_srid();

    let keyword = cursor.word("geometry type")?;
    let polygons = match keyword.to_ascii_uppercase().as_str() {
        "POLYGON" => {
            cursor.skip_dimension();
            if cursor.take_empty() {
                Vec::new()
            } else {
                vec![cursor.polygon(0)?]
            }
        }
        "MULTIPOLYGON" => {
            cursor.skip_dimension();
            if cursor.take_empty() {
                Vec::new()
            } else {
                cursor.multi_polygon()?
            }
        }
        _ => return Err(WktError::UnsupportedType(keyword.to_string())),
    };

    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(WktError::TrailingInput { offset: cursor.pos });
    }

    Ok(MultiPolygon::new(polygons))
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), WktError> {
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(WktError::Unexpected {
                expected,
                found: c.to_string(),
                offset: self.pos,
            }),
            None => Err(WktError::UnexpectedEnd {
                expected,
                offset: self.pos,
            }),
        }
    }

    /// Consume `,` and report true, or report false if the next char is `)`.
    fn list_continues(&mut self) -> Result<bool, WktError> {
        match self.peek() {
            Some(',') => {
                self.pos += 1;
                Ok(true)
            }
            Some(')') => Ok(false),
            Some(c) => Err(WktError::Unexpected {
                expected: "',' or ')'",
                found: c.to_string(),
                offset: self.pos,
            }),
            None => Err(WktError::UnexpectedEnd {
                expected: "',' or ')'",
                offset: self.pos,
            }),
        }
    }

    fn word(&mut self, expected: &'static str) -> Result<&'a str, WktError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if len == 0 {
            return match rest.chars().next() {
                Some(c) => Err(WktError::Unexpected {
                    expected,
                    found: c.to_string(),
                    offset: self.pos,
                }),
                None => Err(WktError::UnexpectedEnd {
                    expected,
                    offset: self.pos,
                }),
            };
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn peek_word(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        (len > 0).then(|| &rest[..len])
    }

    fn skip_srid(&mut self) {
        self.skip_ws();
        let rest = self.rest();
        if rest
            .get(..5)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("SRID="))
        {
            if let Some(semi) = rest.find(';') {
                self.pos += semi + 1;
            }
        }
    }

    fn skip_dimension(&mut self) {
        if let Some(tag) = self.peek_word() {
            if matches!(tag.to_ascii_uppercase().as_str(), "Z" | "M" | "ZM") {
                self.pos += tag.len();
            }
        }
    }

    fn take_empty(&mut self) -> bool {
        match self.peek_word() {
            Some(tag) if tag.eq_ignore_ascii_case("EMPTY") => {
                self.pos += tag.len();
                true
            }
            _ => false,
        }
    }

    fn number(&mut self) -> Result<f64, WktError> {
        self.skip_ws();
        let start = self.pos;
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
            .unwrap_or(rest.len());
        if len == 0 {
            return match rest.chars().next() {
                Some(c) => Err(WktError::Unexpected {
                    expected: "number",
                    found: c.to_string(),
                    offset: start,
                }),
                None => Err(WktError::UnexpectedEnd {
                    expected: "number",
                    offset: start,
                }),
            };
        }
        let token = &rest[..len];
        self.pos += len;
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(WktError::InvalidNumber {
                token: token.to_string(),
                offset: start,
            }),
        }
    }

    fn vertex(&mut self) -> Result<Coord<f64>, WktError> {
        self.skip_ws();
        let start = self.pos;
        let mut ordinates = [0.0f64; 4];
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c == ',' || c == ')' {
                break;
            }
            if count == ordinates.len() {
                return Err(WktError::BadVertex {
                    count: count + 1,
                    offset: start,
                });
            }
            ordinates[count] = self.number()?;
            count += 1;
        }
        if count < 2 {
            return Err(WktError::BadVertex {
                count,
                offset: start,
            });
        }
        Ok(Coord {
            x: ordinates[0],
            y: ordinates[1],
        })
    }

    fn ring(&mut self, polygon: usize, ring: usize) -> Result<LineString<f64>, WktError> {
        self.expect('(', "'(' opening a ring")?;
        let mut coords = vec![self.vertex()?];
        while self.list_continues()? {
            coords.push(self.vertex()?);
        }
        self.expect(')', "')' closing a ring")?;

        let distinct = distinct_vertices(&coords);
        if distinct < 3 {
            return Err(WktError::DegenerateRing {
                polygon,
                ring,
                distinct,
            });
        }
        if coords.first() != coords.last() {
            coords.push(coords[0]);
        }
        Ok(LineString::new(coords))
    }

    fn polygon(&mut self, index: usize) -> Result<Polygon<f64>, WktError> {
        self.expect('(', "'(' opening a polygon")?;
        let exterior = self.ring(index, 0)?;
        let mut holes = Vec::new();
        while self.list_continues()? {
            holes.push(self.ring(index, holes.len() + 1)?);
        }
        self.expect(')', "')' closing a polygon")?;
        Ok(Polygon::new(exterior, holes))
    }

    fn multi_polygon(&mut self) -> Result<Vec<Polygon<f64>>, WktError> {
        self.expect('(', "'(' opening a multipolygon")?;
        let mut polygons = Vec::new();
        loop {
            if self.take_empty() {
                // empty member, nothing to add
            } else {
                polygons.push(self.polygon(polygons.len())?);
            }
            if !self.list_continues()? {
                break;
            }
        }
        self.expect(')', "')' closing a multipolygon")?;
        Ok(polygons)
    }
}

fn distinct_vertices(coords: &[Coord<f64>]) -> usize {
    // Adding +0.0 folds -0.0 into 0.0 so both hash alike
    coords
        .iter()
        .map(|c| ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits()))
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_polygon() {
        let mp = parse_wkt("POLYGON((0 0, 0 10, 10 10, 10 0, 0 0))").unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].exterior().0.len(), 5);
        assert!(mp.0[0].interiors().is_empty());
    }

    #[test]
    fn test_open_ring_is_closed() {
        let mp = parse_wkt("POLYGON((0 0, 0 10, 10 10, 10 0))").unwrap();
        let ring = &mp.0[0].exterior().0;
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_whitespace_variations() {
        let tight = parse_wkt("POLYGON((0 0,0 10,10 10,10 0,0 0))").unwrap();
        let loose = parse_wkt(
            "  polygon  (\n\t( 0   0 ,\t0 10 ,\r\n 10 10, 10 0 , 0 0 ) \n)  ",
        )
        .unwrap();
        assert_eq!(tight, loose);
    }

    #[test]
    fn test_numeric_forms() {
        let mp = parse_wkt("POLYGON((-77.5 -1.15e1, +76.5 -11.5, 7.65E1 -12.5, -77.5 -12.5))")
            .unwrap();
        let ring = &mp.0[0].exterior().0;
        assert_eq!(ring[0], Coord { x: -77.5, y: -11.5 });
        assert_eq!(ring[1].x, 76.5);
        assert_eq!(ring[2].x, 76.5);
    }

    #[test]
    fn test_polygon_with_hole() {
        let mp = parse_wkt("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0), (4 4, 6 4, 6 6, 4 6, 4 4))")
            .unwrap();
        assert_eq!(mp.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_multipolygon() {
        let mp = parse_wkt(
            "MULTIPOLYGON(((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5), (5.2 5.1, 5.8 5.1, 5.8 5.7, 5.2 5.1)))",
        )
        .unwrap();
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[1].interiors().len(), 1);
    }

    #[test]
    fn test_z_ordinates_and_srid() {
        let mp = parse_wkt("SRID=4326;POLYGON Z((0 0 1, 0 10 1, 10 10 1, 0 0 1))").unwrap();
        assert_eq!(mp.0[0].exterior().0[1], Coord { x: 0.0, y: 10.0 });

        // Some producers emit a third ordinate without the Z tag
        let untagged = parse_wkt("POLYGON((0 0 5, 0 10 5, 10 10 5))").unwrap();
        assert_eq!(untagged.0.len(), 1);
    }

    #[test]
    fn test_empty_geometries() {
        assert!(parse_wkt("POLYGON EMPTY").unwrap().0.is_empty());
        assert!(parse_wkt("MULTIPOLYGON EMPTY").unwrap().0.is_empty());
        let mp = parse_wkt("MULTIPOLYGON(EMPTY, ((0 0, 1 0, 1 1, 0 0)))").unwrap();
        assert_eq!(mp.0.len(), 1);
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let err = parse_wkt("POLYGON((0 0, 1 1, 0 0))").unwrap_err();
        assert_eq!(
            err,
            WktError::DegenerateRing {
                polygon: 0,
                ring: 0,
                distinct: 2
            }
        );

        // Repeated vertices do not count twice
        let err = parse_wkt("POLYGON((0 0, 0 0, 1 1, 1 1, 0 0))").unwrap_err();
        assert!(matches!(err, WktError::DegenerateRing { distinct: 2, .. }));

        // Negative zero is the same vertex as zero
        let err = parse_wkt("POLYGON((0 0, -0 0, 1 1))").unwrap_err();
        assert!(matches!(err, WktError::DegenerateRing { distinct: 2, .. }));
        let err = parse_wkt("POLYGON((0 -0.0, -0.0 0, 0 0, 2 2))").unwrap_err();
        assert!(matches!(err, WktError::DegenerateRing { distinct: 2, .. }));

        // Degenerate hole
        let err = parse_wkt("POLYGON((0 0, 10 0, 10 10, 0 0), (1 1, 2 2))").unwrap_err();
        assert!(matches!(err, WktError::DegenerateRing { ring: 1, .. }));
    }

    #[test]
    fn test_bad_numbers_rejected() {
        let err = parse_wkt("POLYGON((0 0, 1.2.3 0, 1 1, 0 0))").unwrap_err();
        assert!(matches!(err, WktError::InvalidNumber { ref token, .. } if token == "1.2.3"));

        let err = parse_wkt("POLYGON((0 0, abc 0, 1 1, 0 0))").unwrap_err();
        assert!(matches!(err, WktError::Unexpected { expected: "number", .. }));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            parse_wkt("POLYGON((0 0, 0 10, 10 10, 0 0)"),
            Err(WktError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            parse_wkt("POLYGON((0 0, 0 10, 10 10, 0 0))) junk"),
            Err(WktError::TrailingInput { .. })
        ));
        assert!(matches!(
            parse_wkt("POLYGON((0, 0 10, 10 10, 0 0))"),
            Err(WktError::BadVertex { count: 1, .. })
        ));
        assert!(matches!(
            parse_wkt("POINT(1 2)"),
            Err(WktError::UnsupportedType(ref t)) if t == "POINT"
        ));
        assert!(matches!(
            parse_wkt(""),
            Err(WktError::UnexpectedEnd { .. })
        ));
    }
}
