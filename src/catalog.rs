//! CSV loading for earthquake catalogs and region tables.
//!
//! Plain and gzip-compressed (`.gz`) files are both accepted.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::models::{GeoPoint, RegionSpec};

fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    })
}

fn column(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .with_context(|| format!("Column '{}' not found in {}", name, path.display()))
}

/// Catalog rows with a usable coordinate, kept alongside their points.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub points: Vec<GeoPoint>,
    /// Rows dropped for a missing or unparsable coordinate
    pub dropped: usize,
}

impl Catalog {
    /// Load a catalog CSV, dropping rows whose coordinates are missing.
    pub fn load(path: &Path, lat_column: &str, lon_column: &str) -> Result<Self> {
        info!("Loading catalog from {}", path.display());

        let reader = open_maybe_gz(path)?;
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let lat_idx = column(&headers, lat_column, path)?;
        let lon_idx = column(&headers, lon_column, path)?;

        let mut catalog = Catalog {
            headers,
            ..Default::default()
        };

        for result in csv_reader.records() {
            let record = result?;
            let lat = record.get(lat_idx).and_then(|v| v.trim().parse::<f64>().ok());
            let lon = record.get(lon_idx).and_then(|v| v.trim().parse::<f64>().ok());
            match (lat, lon) {
                (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                    catalog.points.push(GeoPoint::new(lat, lon));
                    catalog.rows.push(record);
                }
                _ => catalog.dropped += 1,
            }
        }

        if catalog.dropped > 0 {
            warn!(
                "Dropped {} row(s) without usable coordinates",
                catalog.dropped
            );
        }
        info!("Loaded {} catalog row(s)", catalog.points.len());
        Ok(catalog)
    }

    /// Write the rows with `labels` appended as column `label_column`.
    ///
    /// With `keep` given, only rows whose label passes the filter are written.
    /// Returns the number of rows written.
    pub fn write_labeled<W: Write>(
        &self,
        out: W,
        label_column: &str,
        labels: &[String],
        keep: impl Fn(&str) -> bool,
    ) -> Result<usize> {
        anyhow::ensure!(
            labels.len() == self.rows.len(),
            "Got {} labels for {} rows",
            labels.len(),
            self.rows.len()
        );

        let mut writer = WriterBuilder::new().flexible(true).from_writer(out);
        let mut header = self.headers.clone();
        header.push_field(label_column);
        writer.write_record(&header)?;

        let mut written = 0;
        for (row, label) in self.rows.iter().zip(labels) {
            if !keep(label) {
                continue;
            }
            let mut record = row.clone();
            record.push_field(label);
            writer.write_record(&record)?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}

/// Load region definitions from a CSV with a name column and a WKT column.
///
/// Row order is the tie-break order.
pub fn load_regions(path: &Path, name_column: &str, wkt_column: &str) -> Result<Vec<RegionSpec>> {
    info!("Loading regions from {}", path.display());

    let reader = open_maybe_gz(path)?;
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let name_idx = column(&headers, name_column, path)?;
    let wkt_idx = column(&headers, wkt_column, path)?;

    let mut regions = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        regions.push(RegionSpec::new(&record[name_idx], &record[wkt_idx]));
    }

    info!("Loaded {} region(s)", regions.len());
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    const CATALOG: &str = "FECHA_UTC,LATITUD,LONGITUD,MAGNITUD\n\
        19600113,-16.145,-72.144,7.5\n\
        19600115,,-75.0,6.0\n\
        19600117,-12.05,abc,5.1\n\
        19600120,-12.05,-77.04,4.9\n";

    #[test]
    fn test_load_drops_missing_coordinates() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = Catalog::load(file.path(), "LATITUD", "LONGITUD").unwrap();
        assert_eq!(catalog.points.len(), 2);
        assert_eq!(catalog.dropped, 2);
        assert_eq!(catalog.points[1], GeoPoint::new(-12.05, -77.04));
        assert_eq!(&catalog.rows[0][0], "19600113");
    }

    #[test]
    fn test_load_gzip() {
        let file = tempfile::Builder::new().suffix(".csv.gz").tempfile().unwrap();
        let mut encoder = GzEncoder::new(file.reopen().unwrap(), Compression::default());
        encoder.write_all(CATALOG.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let catalog = Catalog::load(file.path(), "LATITUD", "LONGITUD").unwrap();
        assert_eq!(catalog.points.len(), 2);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let err = Catalog::load(file.path(), "LAT", "LONGITUD").unwrap_err();
        assert!(err.to_string().contains("Column 'LAT' not found"));
    }

    #[test]
    fn test_write_labeled_with_filter() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let catalog = Catalog::load(file.path(), "LATITUD", "LONGITUD").unwrap();

        let labels = vec!["Arequipa".to_string(), "Fuera de Perú".to_string()];
        let mut out = Vec::new();
        let written = catalog
            .write_labeled(&mut out, "DEPARTAMENTO", &labels, |l| l != "Fuera de Perú")
            .unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("FECHA_UTC,LATITUD,LONGITUD,MAGNITUD,DEPARTAMENTO")
        );
        assert_eq!(lines.next(), Some("19600113,-16.145,-72.144,7.5,Arequipa"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_load_regions_keeps_order() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(
            b"NOMBDEP,WKT\nLIMA,\"POLYGON((0 0, 0 1, 1 1, 0 0))\"\nCALLAO,\"POLYGON((2 2, 2 3, 3 3, 2 2))\"\n",
        )
        .unwrap();

        let regions = load_regions(file.path(), "NOMBDEP", "WKT").unwrap();
        let names: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["LIMA", "CALLAO"]);
        assert_eq!(regions[0].wkt, "POLYGON((0 0, 0 1, 1 1, 0 0))");
    }
}
