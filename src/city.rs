//! City generation pipeline
//!
//! Stages run in a fixed order: water, main roads, major roads, big parks,
//! minor roads, small parks, lots. Each road tier treats every earlier tier
//! as existing streamlines. `CityGenerator::step` does one bounded unit of
//! work so callers can watch or interrupt the pipeline between stages.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};
use crate::field::{Integrator, VectorField};
use crate::geometry::{Bounds, Vector};
use crate::graph::{GraphParams, NamedRoad, StreetGraph};
use crate::names::{RoadTier, StreetNamePool};
use crate::params::CityParams;
use crate::polygon_finder::PolygonFinder;
use crate::seeds::{noise_seed, CitySeeds};
use crate::streamlines::{StreamlineGenerator, StreamlineParams, WaterGenerator};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CityStage {
    Coastline,
    MainRoads,
    MajorRoads,
    BigParks,
    MinorRoads,
    SmallParks,
    Lots,
    Done,
}

impl CityStage {
    pub fn label(&self) -> &'static str {
        match self {
            CityStage::Coastline => "coastline and river",
            CityStage::MainRoads => "main roads",
            CityStage::MajorRoads => "major roads",
            CityStage::BigParks => "big parks",
            CityStage::MinorRoads => "minor roads",
            CityStage::SmallParks => "small parks",
            CityStage::Lots => "blocks and lots",
            CityStage::Done => "done",
        }
    }
}

/// A building plot with its entrance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub polygon: Vec<Vector>,
    pub door: Vector,
    pub street_point: Vector,
    pub street_name: String,
}

/// Finished city description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCity {
    pub seed: u64,
    pub size: Vector,
    pub sea: Vec<Vector>,
    pub coastline: Vec<Vector>,
    pub river: Vec<Vector>,
    pub secondary_river: Vec<Vector>,
    /// Coast road and the near river bank road
    pub coastline_roads: Vec<NamedRoad>,
    /// Far river bank road
    pub secondary_river_roads: Vec<NamedRoad>,
    pub main_roads: Vec<NamedRoad>,
    pub major_roads: Vec<NamedRoad>,
    pub minor_roads: Vec<NamedRoad>,
    pub parks: Vec<Vec<Vector>>,
    pub blocks: Vec<Vec<Vector>>,
    pub lots: Vec<Lot>,
    pub graph: StreetGraph,
}

impl GeneratedCity {
    fn for_each_point_mut(&mut self, mut f: impl FnMut(&mut Vector)) {
        let polylines = [
            &mut self.sea,
            &mut self.coastline,
            &mut self.river,
            &mut self.secondary_river,
        ];
        for line in polylines {
            line.iter_mut().for_each(&mut f);
        }
        for roads in [
            &mut self.coastline_roads,
            &mut self.secondary_river_roads,
            &mut self.main_roads,
            &mut self.major_roads,
            &mut self.minor_roads,
        ] {
            for road in roads.iter_mut() {
                road.points.iter_mut().for_each(&mut f);
            }
        }
        for polygon in self.parks.iter_mut().chain(self.blocks.iter_mut()) {
            polygon.iter_mut().for_each(&mut f);
        }
        for lot in &mut self.lots {
            lot.polygon.iter_mut().for_each(&mut f);
            f(&mut lot.door);
            f(&mut lot.street_point);
        }
        self.graph.positions_mut().for_each(&mut f);
    }

    /// Mean of every stored coordinate.
    pub fn centroid(&mut self) -> Vector {
        let mut sum = Vector::ZERO;
        let mut count = 0usize;
        self.for_each_point_mut(|p| {
            sum += *p;
            count += 1;
        });
        if count == 0 {
            Vector::ZERO
        } else {
            sum / count as f64
        }
    }

    pub fn translate(&mut self, offset: Vector) {
        self.for_each_point_mut(|p| *p += offset);
    }

    /// Moves the centroid of all coordinates to the origin.
    pub fn recenter(&mut self) {
        let centroid = self.centroid();
        self.translate(-centroid);
    }

    /// Every named road in pipeline order.
    pub fn all_roads(&self) -> impl Iterator<Item = &NamedRoad> + '_ {
        self.coastline_roads
            .iter()
            .chain(self.secondary_river_roads.iter())
            .chain(self.main_roads.iter())
            .chain(self.major_roads.iter())
            .chain(self.minor_roads.iter())
    }
}

pub struct CityGenerator {
    params: CityParams,
    seeds: CitySeeds,
    world: Bounds,
    rng: ChaCha8Rng,
    field: VectorField,
    names: StreetNamePool,
    stage: CityStage,
    water: WaterGenerator,
    main: Option<StreamlineGenerator>,
    major: Option<StreamlineGenerator>,
    minor: Option<StreamlineGenerator>,
    coastline_roads: Vec<NamedRoad>,
    secondary_river_roads: Vec<NamedRoad>,
    main_roads: Vec<NamedRoad>,
    major_roads: Vec<NamedRoad>,
    minor_roads: Vec<NamedRoad>,
    big_parks: Vec<Vec<Vector>>,
    small_parks: Vec<Vec<Vector>>,
    /// Parks were supplied through `set_parks`
    parks_overridden: bool,
    blocks: Vec<Vec<Vector>>,
    lots: Vec<Lot>,
    graph: StreetGraph,
}

impl CityGenerator {
    pub fn new(seeds: CitySeeds, size: Vector, params: CityParams) -> Result<Self> {
        params.validate()?;
        if !(size.x > 0.0 && size.y > 0.0) {
            return Err(CityError::InvalidParams(format!(
                "world size must be positive, got {} x {}",
                size.x, size.y
            )));
        }

        let world = Bounds::new(Vector::ZERO, size);
        let mut rng = ChaCha8Rng::seed_from_u64(seeds.layout);
        let mut field = VectorField::with_default_layout(
            &world,
            &params.field,
            params.noise,
            noise_seed(seeds.field_noise),
            &mut rng,
        );
        field.set_global_noise_seed(noise_seed(seeds.global_noise));
        let water_params = params.water;
        let water = WaterGenerator::new(
            Integrator::new(params.integrator, water_params.streamline.dstep),
            world,
            water_params,
            rng.gen(),
        );
        let names = StreetNamePool::new(seeds.names, params.name_pool_size);

        Ok(Self {
            params,
            seeds,
            world,
            rng,
            field,
            names,
            stage: CityStage::Coastline,
            water,
            main: None,
            major: None,
            minor: None,
            coastline_roads: Vec::new(),
            secondary_river_roads: Vec::new(),
            main_roads: Vec::new(),
            major_roads: Vec::new(),
            minor_roads: Vec::new(),
            big_parks: Vec::new(),
            small_parks: Vec::new(),
            parks_overridden: false,
            blocks: Vec::new(),
            lots: Vec::new(),
            graph: StreetGraph::default(),
        })
    }

    pub fn stage(&self) -> CityStage {
        self.stage
    }

    pub fn field(&self) -> &VectorField {
        &self.field
    }

    pub fn params(&self) -> &CityParams {
        &self.params
    }

    /// Replaces the park set. Takes effect for every later stage, including
    /// the exclusion zone of minor roads if they have not started yet. Once
    /// set, the big park stage keeps these parks instead of choosing its own.
    pub fn set_parks(&mut self, parks: Vec<Vec<Vector>>) {
        self.parks_overridden = true;
        self.big_parks = parks;
        self.small_parks.clear();
        self.field.parks = self.big_parks.clone();
    }

    /// Runs the remaining stages and returns the finished city.
    pub fn run(mut self) -> Result<GeneratedCity> {
        while self.step()? {}
        Ok(self.finish())
    }

    /// One unit of work of the current stage. Returns false once done.
    pub fn step(&mut self) -> Result<bool> {
        match self.stage {
            CityStage::Coastline => {
                self.create_water()?;
                self.stage = CityStage::MainRoads;
            }
            CityStage::MainRoads => {
                if self.main.is_none() {
                    let mut generator = self.new_generator(self.params.main);
                    generator.add_existing_streamlines(self.water.generator());
                    self.main = Some(generator);
                }
                // Main roads bridge the river
                self.field.ignore_river = true;
                let more = self.main.as_mut().map_or(false, |g| g.update(&self.field));
                self.field.ignore_river = false;
                if !more {
                    let simplified = simplified_of(&self.main);
                    self.main_roads = name_roads(&mut self.names, RoadTier::Main, simplified)?;
                    log::info!("Main roads: {}", self.main_roads.len());
                    self.stage = CityStage::MajorRoads;
                }
            }
            CityStage::MajorRoads => {
                if self.major.is_none() {
                    let mut generator = self.new_generator(self.params.major);
                    generator.add_existing_streamlines(self.water.generator());
                    if let Some(main) = &self.main {
                        generator.add_existing_streamlines(main);
                    }
                    self.major = Some(generator);
                }
                let more = self.major.as_mut().map_or(false, |g| g.update(&self.field));
                if !more {
                    let simplified = simplified_of(&self.major);
                    self.major_roads = name_roads(&mut self.names, RoadTier::Major, simplified)?;
                    log::info!("Major roads: {}", self.major_roads.len());
                    self.stage = CityStage::BigParks;
                }
            }
            CityStage::BigParks if self.parks_overridden => {
                self.field.parks = self.big_parks.clone();
                log::info!("Big parks: {} (supplied)", self.big_parks.len());
                self.stage = CityStage::MinorRoads;
            }
            CityStage::BigParks => {
                let roads: Vec<NamedRoad> = self
                    .coastline_roads
                    .iter()
                    .chain(self.main_roads.iter())
                    .chain(self.major_roads.iter())
                    .cloned()
                    .collect();
                let count = self.params.parks.num_big_parks;
                let clustered = self.params.parks.cluster_big_parks;
                self.big_parks = self.select_parks(&roads, count, clustered)?;
                self.field.parks = self.big_parks.clone();
                log::info!("Big parks: {}", self.big_parks.len());
                self.stage = CityStage::MinorRoads;
            }
            CityStage::MinorRoads => {
                if self.minor.is_none() {
                    let mut generator = self.new_generator(self.params.minor);
                    generator.add_existing_streamlines(self.water.generator());
                    if let Some(main) = &self.main {
                        generator.add_existing_streamlines(main);
                    }
                    if let Some(major) = &self.major {
                        generator.add_existing_streamlines(major);
                    }
                    generator.set_exclusions(self.field.parks.clone());
                    self.minor = Some(generator);
                }
                let more = self.minor.as_mut().map_or(false, |g| g.update(&self.field));
                if !more {
                    let simplified = simplified_of(&self.minor);
                    self.minor_roads = name_roads(&mut self.names, RoadTier::Minor, simplified)?;
                    log::info!("Minor roads: {}", self.minor_roads.len());
                    self.stage = CityStage::SmallParks;
                }
            }
            CityStage::SmallParks => {
                let roads = self.all_roads();
                let count = self.params.parks.num_small_parks;
                self.small_parks = self.select_parks(&roads, count, false)?;
                let mut parks = self.big_parks.clone();
                parks.extend(self.small_parks.iter().cloned());
                self.field.parks = parks;
                log::info!("Small parks: {}", self.small_parks.len());
                self.stage = CityStage::Lots;
            }
            CityStage::Lots => {
                self.create_lots()?;
                self.stage = CityStage::Done;
            }
            CityStage::Done => return Ok(false),
        }
        Ok(true)
    }

    fn new_generator(&mut self, params: StreamlineParams) -> StreamlineGenerator {
        let integrator = Integrator::new(self.params.integrator, params.dstep);
        StreamlineGenerator::new(integrator, self.world, params, self.rng.gen())
    }

    fn create_water(&mut self) -> Result<()> {
        self.water.create_coast(&mut self.field, noise_seed(self.seeds.coast_noise));
        self.water.create_river(&mut self.field, noise_seed(self.seeds.river_noise));

        let mut coastline_roads = Vec::new();
        if self.water.coast_road().len() >= 2 {
            let name = self.names.next_name(RoadTier::Coastline)?;
            coastline_roads.push(NamedRoad::new(name, self.water.coast_road().to_vec()));
        }
        if self.water.river_road().len() >= 2 {
            let name = self.names.next_name(RoadTier::Riverside)?;
            coastline_roads.push(NamedRoad::new(name, self.water.river_road().to_vec()));
        }
        let mut secondary = Vec::new();
        if self.water.river_secondary_road().len() >= 2 {
            let name = self.names.next_name(RoadTier::Riverside)?;
            secondary.push(NamedRoad::new(name, self.water.river_secondary_road().to_vec()));
        }
        log::info!(
            "Water: sea polygon {} vertices, river polygon {} vertices",
            self.water.sea_polygon().len(),
            self.field.river.len()
        );
        self.coastline_roads = coastline_roads;
        self.secondary_river_roads = secondary;
        Ok(())
    }

    fn all_roads(&self) -> Vec<NamedRoad> {
        self.coastline_roads
            .iter()
            .chain(self.secondary_river_roads.iter())
            .chain(self.main_roads.iter())
            .chain(self.major_roads.iter())
            .chain(self.minor_roads.iter())
            .cloned()
            .collect()
    }

    /// Picks `count` faces of the graph of `roads` as parks: a run of
    /// consecutive faces when `clustered`, otherwise distinct random faces.
    fn select_parks(
        &mut self,
        roads: &[NamedRoad],
        count: usize,
        clustered: bool,
    ) -> Result<Vec<Vec<Vector>>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let graph_params = GraphParams {
            dstep: self.params.minor.dstep,
            delete_dangling: false,
        };
        let graph = StreetGraph::build(roads, &graph_params)?;
        let polygons = {
            let mut finder = PolygonFinder::new(&graph, self.params.parks.polygon);
            finder.find_polygons(&self.field)?;
            finder.polygons()
        };

        if polygons.len() <= count {
            return Ok(polygons);
        }
        if clustered {
            let start = self.rng.gen_range(0..=polygons.len() - count);
            Ok(polygons[start..start + count].to_vec())
        } else {
            Ok(rand::seq::index::sample(&mut self.rng, polygons.len(), count)
                .into_iter()
                .map(|i| polygons[i].clone())
                .collect())
        }
    }

    fn create_lots(&mut self) -> Result<()> {
        let roads = self.all_roads();
        let graph_params = GraphParams {
            dstep: self.params.minor.dstep,
            delete_dangling: true,
        };
        let graph = StreetGraph::build(&roads, &graph_params)?;

        let (blocks, divided) = {
            let mut finder = PolygonFinder::new(&graph, self.params.lots);
            finder.find_polygons(&self.field)?;
            finder.shrink();
            finder.divide(&mut self.rng);
            (finder.polygons(), finder.divided_polygons().to_vec())
        };

        let entries: Vec<Result<Option<Lot>>> = divided
            .into_par_iter()
            .map(|polygon| -> Result<Option<Lot>> {
                let entry = graph.entry_point(&polygon)?;
                Ok(entry.map(|e| Lot {
                    polygon,
                    door: e.door,
                    street_point: e.street_point,
                    street_name: e.street_name,
                }))
            })
            .collect();
        let lots: Vec<Lot> = entries
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        log::info!(
            "Graph: {} nodes, {} blocks, {} lots",
            graph.len(),
            blocks.len(),
            lots.len()
        );
        self.blocks = blocks;
        self.lots = lots;
        self.graph = graph;
        Ok(())
    }

    fn finish(self) -> GeneratedCity {
        let mut parks = self.big_parks;
        parks.extend(self.small_parks);
        let mut city = GeneratedCity {
            seed: self.seeds.master,
            size: self.world.size,
            sea: self.water.sea_polygon().to_vec(),
            coastline: self.water.coastline().to_vec(),
            river: self.water.river_polygon().to_vec(),
            secondary_river: self.water.river_secondary_road().to_vec(),
            coastline_roads: self.coastline_roads,
            secondary_river_roads: self.secondary_river_roads,
            main_roads: self.main_roads,
            major_roads: self.major_roads,
            minor_roads: self.minor_roads,
            parks,
            blocks: self.blocks,
            lots: self.lots,
            graph: self.graph,
        };
        if self.params.recenter {
            city.recenter();
        }
        city
    }
}

fn simplified_of(generator: &Option<StreamlineGenerator>) -> &[Vec<Vector>] {
    generator
        .as_ref()
        .map_or(&[], |g| g.simplified_streamlines())
}

fn name_roads(
    names: &mut StreetNamePool,
    tier: RoadTier,
    lines: &[Vec<Vector>],
) -> Result<Vec<NamedRoad>> {
    lines
        .iter()
        .filter(|points| points.len() >= 2)
        .map(|points| Ok(NamedRoad::new(names.next_name(tier)?, points.clone())))
        .collect()
}

/// Generates a complete city. Numeric seeds are used as is, other strings are
/// hashed.
pub fn generate(seed: &str, size: Vector, params: &CityParams) -> Result<GeneratedCity> {
    let seeds = CitySeeds::from_str_seed(seed);
    log::info!("Generating {} x {} city from seed {}", size.x, size.y, seeds.master);
    CityGenerator::new(seeds, size, params.clone())?.run()
}
