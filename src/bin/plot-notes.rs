//! Plot the notes of a gesture script as pitch over time
//!
//! Usage: plot-notes <script.txt> <output.svg>

use std::collections::BTreeMap;

use chromatone::config::Config;
use chromatone::image::PixelBuffer;
use chromatone::pipeline::{Performance, VoiceOwner};
use plotters::prelude::*;

const PATTERN_COLUMNS: usize = 32;
const PATTERN_ROWS: usize = 24;

struct Args {
    script_path: String,
    output_path: String,
}

fn print_usage() {
    eprintln!("Usage: plot-notes <script.txt> <output.svg>");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  plot-notes sweep.txt sweep.svg");
}

fn parse_args() -> Result<Args, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 3 {
        print_usage();
        return Err("Invalid number of arguments".into());
    }

    Ok(Args {
        script_path: args[1].clone(),
        output_path: args[2].clone(),
    })
}

fn owner_label(owner: VoiceOwner) -> String {
    match owner {
        VoiceOwner::FreePlay => "free play".to_string(),
        VoiceOwner::Line(id) => id.to_string(),
    }
}

/// Note onsets (seconds, pitch) per owner
fn collect_notes(
    performance: &Performance,
    sample_rate: f64,
) -> BTreeMap<VoiceOwner, Vec<(f64, f64)>> {
    let mut series: BTreeMap<VoiceOwner, Vec<(f64, f64)>> = BTreeMap::new();
    for (at, facts) in performance.notes() {
        series
            .entry(facts.owner)
            .or_default()
            .push((at as f64 / sample_rate, facts.pitch as f64));
    }
    series
}

fn create_plot(
    args: &Args,
    series: &BTreeMap<VoiceOwner, Vec<(f64, f64)>>,
    duration: f64,
    pitch_range: (f64, f64),
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(&args.output_path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let title = format!("Notes: {}", args.script_path);
    let mut chart = ChartBuilder::on(&root)
        .caption(&title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..duration.max(0.1), pitch_range.0..pitch_range.1)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("MIDI pitch")
        .x_labels(10)
        .y_labels(12)
        .draw()?;

    for (index, (owner, points)) in series.iter().enumerate() {
        let color = Palette99::pick(index).to_rgba();

        if let VoiceOwner::Line(_) = owner {
            chart.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(1)))?;
        }

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&point| Circle::new(point, 3, color.filled())),
            )?
            .label(owner_label(*owner))
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = parse_args()?;
    let config = Config::load();
    let session = config.session();

    println!("Note Plot Generator");
    println!("===================");
    println!("  Script: {}", args.script_path);
    println!("  Tempo: {} bpm, {:?}", session.bpm, session.duration);
    println!();

    let content = std::fs::read_to_string(&args.script_path)?;
    let pixels = PixelBuffer::test_pattern(PATTERN_COLUMNS, PATTERN_ROWS);
    let mut performance = Performance::from_script(&config, pixels, &content)?;

    print!("  Rendering performance... ");
    let rendered = performance.render();
    let sample_rate = session.sample_rate as f64;
    let duration = rendered.len() as f64 / sample_rate;
    println!("done ({:.2}s)", duration);

    let series = collect_notes(&performance, sample_rate);
    let note_count: usize = series.values().map(Vec::len).sum();
    println!("  {} notes from {} owners", note_count, series.len());
    if note_count == 0 {
        return Err("Script produced no notes".into());
    }

    let pitch_range = (
        session.pitch_range.min as f64 - 2.0,
        session.pitch_range.max as f64 + 2.0,
    );

    print!("  Creating plot... ");
    create_plot(&args, &series, duration, pitch_range)?;
    println!("done");

    println!();
    println!("Output: {}", args.output_path);

    Ok(())
}
