//! JSON export of generated cities.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::city::GeneratedCity;
use crate::error::Result;

/// Writes the whole city as pretty-printed JSON.
pub fn save_city(city: &GeneratedCity, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, city)?;
    writer.flush()?;
    Ok(())
}

pub fn load_city(path: impl AsRef<Path>) -> Result<GeneratedCity> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::city::{generate, Lot};
    use crate::error::{CityError, ErrorKind};
    use crate::geometry::Vector;
    use crate::graph::{GraphParams, NamedRoad, StreetGraph};
    use crate::params::CityParams;

    fn small_city() -> GeneratedCity {
        let roads = vec![
            NamedRoad::new("Oakford Avenue", vec![Vector::new(0.0, 5.0), Vector::new(10.0, 5.0)]),
            NamedRoad::new("Elmley Street", vec![Vector::new(5.0, 0.0), Vector::new(5.0, 10.0)]),
        ];
        let graph = StreetGraph::build(&roads, &GraphParams::default()).unwrap();
        GeneratedCity {
            seed: 7,
            size: Vector::new(10.0, 10.0),
            sea: vec![Vector::new(0.0, 0.0), Vector::new(10.0, 0.0), Vector::new(10.0, 1.0 / 3.0)],
            coastline: Vec::new(),
            river: Vec::new(),
            secondary_river: Vec::new(),
            coastline_roads: Vec::new(),
            secondary_river_roads: Vec::new(),
            main_roads: roads[..1].to_vec(),
            major_roads: Vec::new(),
            minor_roads: roads[1..].to_vec(),
            parks: Vec::new(),
            blocks: Vec::new(),
            lots: vec![Lot {
                polygon: vec![Vector::new(6.0, 6.0), Vector::new(9.0, 6.0), Vector::new(9.0, 9.0)],
                door: Vector::new(7.5, 6.0),
                street_point: Vector::new(7.5, 5.0),
                street_name: "Oakford Avenue".to_string(),
            }],
            graph,
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("city.json");
        let city = small_city();
        save_city(&city, &path).unwrap();
        let loaded = load_city(&path).unwrap();
        assert_eq!(loaded, city);
    }

    #[test]
    fn test_generated_city_round_trip_is_exact() {
        let city = generate("export", Vector::new(300.0, 300.0), &CityParams::default()).unwrap();
        assert!(city.all_roads().count() > 0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generated.json");
        save_city(&city, &path).unwrap();
        let loaded = load_city(&path).unwrap();

        let moved = loaded
            .graph
            .nodes()
            .iter()
            .zip(city.graph.nodes())
            .filter(|(a, b)| a.position != b.position)
            .count();
        assert_eq!(moved, 0);
        assert_eq!(loaded, city);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_city(dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ \"seed\": ").unwrap();
        assert!(matches!(load_city(&path), Err(CityError::Serialization(_))));
    }
}
