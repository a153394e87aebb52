use std::path::Path;
use std::time::Duration;

use clap::Args;
use incidentdesk_core::{
    CoreError, Expertise, GameContext, LevelLayout, Position, Session, SessionSummary, TimedTask,
};
use serde::Serialize;
use tracing::info;

use super::load_config;

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of levels to play
    #[arg(long)]
    levels: Option<u32>,
    /// Length of each level in seconds
    #[arg(long)]
    level_secs: Option<u64>,
    /// Simulated seconds per wall-clock second
    #[arg(long)]
    time_scale: Option<f64>,
    /// Seed for every random draw
    #[arg(long)]
    seed: Option<u64>,
    /// Wall-clock milliseconds between frames
    #[arg(long, default_value = "50")]
    frame_ms: u64,
    /// Print only the final summary
    #[arg(long)]
    summary_only: bool,
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    seed: u64,
    #[serde(flatten)]
    summary: &'a SessionSummary,
}

pub fn run(args: SimulateArgs, file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(file)?;
    if let Some(levels) = args.levels {
        config.level.max_levels = levels;
    }
    if let Some(secs) = args.level_secs {
        config.level.duration_secs = secs;
    }
    if let Some(scale) = args.time_scale {
        config.timing.time_scale = scale;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()?;
    runtime.block_on(simulate(config, &args))
}

async fn simulate(
    config: incidentdesk_core::Config,
    args: &SimulateArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = GameContext::new(config)?;
    let mut session = Session::new(&context, &LevelLayout::standard())?;
    info!(session = %session.id(), seed = context.seed(), "simulation started");

    session.start();
    let driver = context.spawn_scheduler();
    let mut frames = tokio::time::interval(Duration::from_millis(args.frame_ms.max(1)));

    loop {
        frames.tick().await;
        autopilot(&mut session)?;
        let status = session.frame();
        let events = session.drain_events();
        if !args.summary_only {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        if status.is_finished() {
            break;
        }
    }

    session.stop();
    driver.await?;
    context.shutdown();

    let summary = session.summary();
    let line = SummaryLine {
        kind: "Summary",
        seed: context.seed(),
        summary: &summary,
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

/// Play one frame of input: answer the ringing phone, then send every idle
/// character to the closest unworked incident it is best suited for.
fn autopilot(session: &mut Session) -> Result<(), CoreError> {
    let ringing = session.assets()[0]
        .active_incident()
        .is_some_and(|call| !call.is_paused());
    if ringing {
        let operator = session
            .characters()
            .iter()
            .position(|c| c.expertise() == Expertise::Helpdesk)
            .unwrap_or(0);
        session.solve_action(operator, 0)?;
    }

    let mut assignments: Vec<(usize, usize)> = Vec::new();
    for (asset_index, asset) in session.assets().iter().enumerate().skip(1) {
        let Some(incident) = asset.active_incident() else {
            continue;
        };
        if incident.is_paused() {
            continue;
        }
        let best = session
            .characters()
            .iter()
            .enumerate()
            .filter(|(i, c)| !c.is_working() && !assignments.iter().any(|(taken, _)| taken == i))
            .min_by_key(|(_, c)| {
                let rank = if c.expertise() == incident.expertise() {
                    0
                } else if c.expertise().matches(incident.expertise()) {
                    1
                } else {
                    2
                };
                (rank, distance(c.position(), asset.position()))
            })
            .map(|(i, _)| i);
        if let Some(character) = best {
            assignments.push((character, asset_index));
        }
    }

    for (character, asset) in assignments {
        session.solve_action(character, asset)?;
    }
    Ok(())
}

fn distance(a: Position, b: Position) -> u32 {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}
