//! CLI tool for playing a gesture script over an image
//!
//! Usage: chromatone <script.txt> [output.wav] [config.toml]
//!
//! If output is not specified, generates <script>.wav

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use chromatone::config::Config;
use chromatone::image::PixelBuffer;
use chromatone::pipeline::{Performance, PlaybackEvent, VoiceOwner};

const USAGE: &str = "Usage: chromatone <script.txt> [output.wav] [config.toml]

Render a gesture script over a generated test-pattern grid.

Arguments:
  script.txt    Path to gesture script
  output.wav    Output WAV file path (optional, defaults to <script>.wav)
  config.toml   Configuration file (optional, defaults to the user config)

Script lines:
  +<timesteps>| event; event   # comment
  events: down x,y | move x,y | up x,y | stop | mode single|line|loop
          scale <name> | duration quarter|eighth|sixteenth|random | bpm <n>

Examples:
  chromatone sweep.txt
  chromatone sweep.txt sweep.wav my-config.toml
";

const PATTERN_COLUMNS: usize = 32;
const PATTERN_ROWS: usize = 24;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.len() > 4 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    let input_path = &args[1];

    let output_path = match args.get(2) {
        Some(path) => path.clone(),
        None => match input_path.strip_suffix(".txt") {
            Some(stem) => format!("{}.wav", stem),
            None => format!("{}.wav", input_path),
        },
    };

    let config = match args.get(3) {
        Some(path) => Config::load_from(Path::new(path)),
        None => Config::load(),
    };

    let content = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let pixels = PixelBuffer::test_pattern(PATTERN_COLUMNS, PATTERN_ROWS);
    let mut performance = match Performance::from_script(&config, pixels, &content) {
        Ok(performance) => performance,
        Err(e) => {
            eprintln!("Error in {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let session = config.session();
    println!("Rendering {}", input_path);
    println!("  Sample rate: {} Hz", session.sample_rate);
    println!("  Tempo: {} bpm, {:?}", session.bpm, session.duration);
    println!("  Scale: {}", session.scale.name());
    println!(
        "  Pitch range: {}..={}",
        session.pitch_range.min, session.pitch_range.max
    );

    let rendered = match performance.generate_wav(Path::new(&output_path)) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Error writing {}: {}", output_path, e);
            process::exit(1);
        }
    };

    let lines = performance
        .history()
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::LineStarted { .. }))
        .count();
    let free_notes = performance
        .notes()
        .filter(|(_, facts)| facts.owner == VoiceOwner::FreePlay)
        .count();
    let line_notes = performance.notes().count() - free_notes;

    println!();
    println!("  Free-play notes: {}", free_notes);
    println!("  Lines: {} ({} notes)", lines, line_notes);
    println!(
        "  Duration: {:.2}s",
        rendered.len() as f64 / session.sample_rate as f64
    );
    println!();
    println!("Output: {}", output_path);
}
