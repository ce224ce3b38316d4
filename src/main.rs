use anyhow::{anyhow, bail, Context, Result};
use std::time::Instant;

use impactviz::{
    build_app, telemetry, AppConfig, CandidateQuery, HeadlessMap, ImpactForm, InteractiveMap,
    Settlement,
};

const USAGE: &str = "Usage:\n  \
impactviz simulate [--lon <deg>] [--lat <deg>] [--diameter <m>] [--density <kg/m3>] \
[--velocity <km/s>] [--angle <deg>] [--composition <stony|iron|cometary>]\n  \
impactviz candidates [--pha-only] [--limit <n>]\n\n\
Backends are configured through IMPACT_SIMULATION_URL, IMPACT_CATALOG_URL and NASA_API_KEY \
(a .env file is read if present).";

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    telemetry::init();
    let args: Vec<String> = std::env::args().collect();
    let config = AppConfig::from_env().context("loading configuration")?;

    match args.get(1).map(|s| s.as_str()) {
        Some("simulate") => simulate(&config, &args[2..]).await,
        Some("candidates") => candidates(&config, &args[2..]).await,
        Some("help") | Some("--help") | None => {
            println!("{USAGE}");
            Ok(())
        }
        Some(other) => bail!("unknown command {other:?}\n\n{USAGE}"),
    }
}

fn next_value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str> {
    *idx += 1;
    args.get(*idx)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("{flag} requires a value"))
}

fn next_f64(args: &[String], idx: &mut usize, flag: &str) -> Result<f64> {
    let raw = next_value(args, idx, flag)?;
    raw.parse::<f64>()
        .with_context(|| format!("{flag}: {raw:?} is not a number"))
}

async fn simulate(config: &AppConfig, args: &[String]) -> Result<()> {
    let mut lon = config.initial_entry.longitude;
    let mut lat = config.initial_entry.latitude;
    let mut form = ImpactForm::default();

    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--lon" => lon = next_f64(args, &mut idx, "--lon")?,
            "--lat" => lat = next_f64(args, &mut idx, "--lat")?,
            "--diameter" => form.diameter_m = next_f64(args, &mut idx, "--diameter")?,
            "--density" => form.density_kg_m3 = next_f64(args, &mut idx, "--density")?,
            "--velocity" => form.velocity_kms = next_f64(args, &mut idx, "--velocity")?,
            "--angle" => form.angle_deg = next_f64(args, &mut idx, "--angle")?,
            "--composition" => {
                form.composition = next_value(args, &mut idx, "--composition")?.to_string()
            }
            other => bail!("unknown flag {other:?}\n\n{USAGE}"),
        }
        idx += 1;
    }

    let app = build_app(config)?;
    app.set_form(form);

    // Drive the same path a user click takes: widget -> store -> eased re-centre.
    let widget = HeadlessMap::new();
    let mut map = InteractiveMap::new(widget.clone(), app.store.clone())?;
    widget.click(lon, lat);
    if map.flush().is_none() {
        bail!("({lon}, {lat}) is not a valid impact location");
    }
    app.frame(Instant::now() + app.store.ease_duration());

    let settlement = app.run_simulation()?.await;
    map.close()?;

    match settlement {
        Settlement::Applied => {}
        Settlement::Failed(message) => bail!("simulation failed: {message}"),
        Settlement::Stale => bail!("simulation response superseded"),
    }

    if let Some(result) = app.orchestrator.simulation_result() {
        tracing::info!(
            regime = %result.regime,
            energy_kt = result.energy_kt,
            "simulation complete"
        );
    }
    let overlay = app
        .overlay()
        .ok_or_else(|| anyhow!("overlay was never rendered"))?;
    println!("{}", serde_json::to_string_pretty(&overlay.to_geojson())?);
    Ok(())
}

async fn candidates(config: &AppConfig, args: &[String]) -> Result<()> {
    let mut query = CandidateQuery {
        pha_only: false,
        limit: CandidateQuery::default().limit,
    };

    let mut idx = 0;
    while idx < args.len() {
        match args[idx].as_str() {
            "--pha-only" => query.pha_only = true,
            "--limit" => {
                let raw = next_value(args, &mut idx, "--limit")?;
                query.limit = raw
                    .parse()
                    .with_context(|| format!("--limit: {raw:?} is not a count"))?;
            }
            other => bail!("unknown flag {other:?}\n\n{USAGE}"),
        }
        idx += 1;
    }

    let app = build_app(config)?;
    match app.refresh_candidates(query).await {
        Settlement::Applied => {}
        Settlement::Failed(message) => bail!("candidate search failed: {message}"),
        Settlement::Stale => bail!("candidate search superseded"),
    }
    let candidates = app.orchestrator.candidates();
    println!("{}", serde_json::to_string_pretty(&*candidates)?);
    Ok(())
}
