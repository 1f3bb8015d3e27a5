use kinetica::{ScenarioConfig, Vec3};

use anyhow::Result;
use clap::Parser;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario YAML file
    #[arg(short, default_value = "spring_settle.yaml")]
    file_name: String,

    /// Number of 60 Hz steps to simulate
    #[arg(short, long, default_value_t = 300)]
    steps: usize,

    /// Run the micro benchmarks instead of a scenario
    #[arg(long, default_value_t = false)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(file_name);
    let file = File::open(&config_path)?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;
    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.bench {
        kinetica::bench_spring_step();
        kinetica::bench_collision_step();
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let (mut engine, ids) = scenario_cfg.build()?;

    let dt = 1.0 / 60.0;
    for _ in 0..args.steps {
        engine.step_by(dt);
    }

    for (index, &id) in ids.iter().enumerate() {
        if let Some(body) = engine.body(id) {
            let p: Vec3 = body.position();
            let v: Vec3 = body.velocity();
            println!(
                "body {index}: p = [{:9.4}, {:9.4}, {:9.4}], v = [{:9.4}, {:9.4}, {:9.4}]",
                p.x, p.y, p.z, v.x, v.y, v.z
            );
        }
    }
    println!("total energy = {:.6}", engine.energy());

    Ok(())
}
