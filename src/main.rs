use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use city_generator::export::save_city;
use city_generator::geometry::Vector;
use city_generator::seeds::CitySeeds;
use city_generator::{CityGenerator, CityParams, CityStage, GeneratedCity, Result};

#[derive(Parser, Debug)]
#[command(name = "city_generator")]
#[command(about = "Generate procedural city maps from tensor field streamlines")]
struct Args {
    /// Seed: numbers are used as is, other strings are hashed (random if not specified)
    #[arg(short, long)]
    seed: Option<String>,

    /// Width of the world in map units
    #[arg(short = 'W', long, default_value = "800")]
    width: f64,

    /// Height of the world in map units
    #[arg(short = 'H', long, default_value = "800")]
    height: f64,

    /// JSON file with parameter overrides
    #[arg(short, long)]
    config: Option<String>,

    /// Write the generated city as JSON
    #[arg(short, long)]
    output: Option<String>,

    /// Keep world coordinates instead of moving the centroid to the origin
    #[arg(long)]
    no_recenter: bool,

    /// Print library log records to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new().filter_level(LevelFilter::Debug).init();
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut params = match &args.config {
        Some(path) => {
            println!("Loading parameters from {}", path);
            CityParams::load(path)?
        }
        None => CityParams::default(),
    };
    if args.no_recenter {
        params.recenter = false;
    }

    let seeds = match &args.seed {
        Some(seed) => CitySeeds::from_str_seed(seed),
        None => CitySeeds::from_master(rand::random()),
    };
    println!("Generating city with seed: {}", seeds.master);
    println!("World size: {}x{}", args.width, args.height);

    let mut generator = CityGenerator::new(seeds, Vector::new(args.width, args.height), params)?;
    let mut stage = generator.stage();
    println!("Generating {}...", stage.label());
    while generator.step()? {
        if generator.stage() != stage {
            stage = generator.stage();
            if stage != CityStage::Done {
                println!("Generating {}...", stage.label());
            }
        }
    }
    let city = generator.run()?;
    print_summary(&city);

    if let Some(path) = &args.output {
        save_city(&city, path)?;
        println!("Exported city to: {}", path);
    }
    Ok(())
}

fn print_summary(city: &GeneratedCity) {
    println!("City complete:");
    println!("  Coastline: {} points, sea polygon {} vertices", city.coastline.len(), city.sea.len());
    println!("  River polygon: {} vertices", city.river.len());
    println!(
        "  Roads: {} coastline/river, {} main, {} major, {} minor",
        city.coastline_roads.len() + city.secondary_river_roads.len(),
        city.main_roads.len(),
        city.major_roads.len(),
        city.minor_roads.len()
    );
    println!(
        "  Street graph: {} nodes, {} edges, {} intersections",
        city.graph.len(),
        city.graph.edge_count(),
        city.graph.intersections().len()
    );
    println!("  Parks: {}", city.parks.len());
    println!("  Blocks: {}, lots: {}", city.blocks.len(), city.lots.len());
}
