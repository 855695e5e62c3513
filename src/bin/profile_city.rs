//! Profiling tool timing each stage of city generation

use std::time::{Duration, Instant};

use city_generator::geometry::Vector;
use city_generator::seeds::CitySeeds;
use city_generator::{CityGenerator, CityParams, CityStage};

fn main() {
    let size = Vector::new(800.0, 800.0);
    let seed = "test-1";

    println!("=== Performance Profiling ===");
    println!("World size: {}x{}, seed {:?}", size.x, size.y, seed);
    println!();

    let params = CityParams {
        recenter: false,
        ..CityParams::default()
    };
    let mut generator = match CityGenerator::new(CitySeeds::from_str_seed(seed), size, params) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("Invalid parameters: {}", e);
            return;
        }
    };

    let mut timings: Vec<(CityStage, Duration, usize)> = Vec::new();
    let total = Instant::now();
    while generator.stage() != CityStage::Done {
        let stage = generator.stage();
        let start = Instant::now();
        let mut steps = 0;
        while generator.stage() == stage {
            match generator.step() {
                Ok(_) => steps += 1,
                Err(e) => {
                    eprintln!("Generation failed during {}: {}", stage.label(), e);
                    return;
                }
            }
        }
        let elapsed = start.elapsed();
        println!("{:<20} {:>10.2?} ({} steps)", stage.label(), elapsed, steps);
        timings.push((stage, elapsed, steps));
    }
    let total_time = total.elapsed();

    let city = match generator.run() {
        Ok(city) => city,
        Err(e) => {
            eprintln!("Generation failed: {}", e);
            return;
        }
    };

    println!();
    println!("=== Summary ===");
    println!("Total: {:?}", total_time);
    for (stage, elapsed, _) in &timings {
        let share = 100.0 * elapsed.as_secs_f64() / total_time.as_secs_f64().max(f64::EPSILON);
        println!("  {:<20} {:>5.1}%", stage.label(), share);
    }
    println!(
        "Roads: {} main, {} major, {} minor; {} lots",
        city.main_roads.len(),
        city.major_roads.len(),
        city.minor_roads.len(),
        city.lots.len()
    );
}
