use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use midiconvert::Midi;

#[derive(Parser, Debug)]
#[command(name = "midiconvert", about = "Inspect, slice and retime Standard MIDI Files", version)]
struct Opt {
    /// Log decode/encode details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print header and per-track summary
    Info {
        file: PathBuf,
    },
    /// Dump the file as JSON notes and control changes
    Json {
        file: PathBuf,
    },
    /// Cut out a time range (seconds) into a new file
    Slice {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Defaults to the end of the longest track
        #[arg(long)]
        end: Option<f64>,
    },
    /// Change the tempo, keeping every note on its beat
    Tempo {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        bpm: f64,
    },
}

fn open(path: &PathBuf) -> Result<Midi> {
    Midi::open(path).with_context(|| format!("reading {:?}", path))
}

fn save(midi: &Midi, path: &PathBuf) -> Result<()> {
    midi.write_file(path).with_context(|| format!("writing {:?}", path))
}

/// Format seconds as MM:SS.
fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn info(midi: &Midi) {
    let header = midi.header();
    println!("PPQ: {}", header.ppq);
    println!("Tempo: {:.1} BPM", header.bpm);
    println!("Time signature: {}/{}", header.time_signature.0, header.time_signature.1);
    match midi.duration() {
        Some(d) => println!("Length: {}", format_duration(d)),
        None => println!("Length: (no tracks)"),
    }

    println!("\nTracks:");
    for (i, track) in midi.tracks.iter().enumerate() {
        let name = if track.name.is_empty() { "(unnamed)" } else { track.name.as_str() };
        let ccs: usize = track.control_changes().values().map(Vec::len).sum();
        print!("  {:>2}  {:<24} {:>5} notes {:>5} cc", i, name, track.len(), ccs);
        if !track.instrument.is_empty() {
            print!("  [{}]", track.instrument);
        }
        println!();
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    let level = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match opt.command {
        Command::Info { file } => info(&open(&file)?),
        Command::Json { file } => println!("{}", open(&file)?.to_json()?),
        Command::Slice { input, output, start, end } => {
            let midi = open(&input)?;
            let end = end.or_else(|| midi.duration()).unwrap_or(0.0);
            if end < start {
                bail!("slice end {end} is before start {start}");
            }
            let sliced = midi.slice(start, end);
            log::info!(
                "kept {} notes between {:.3}s and {:.3}s",
                sliced.tracks.iter().map(|t| t.len()).sum::<usize>(),
                start,
                end
            );
            save(&sliced, &output)?;
        }
        Command::Tempo { input, output, bpm } => {
            let mut midi = open(&input)?;
            let from = midi.bpm();
            midi.set_bpm(bpm).context("changing tempo")?;
            log::info!("tempo {:.1} -> {:.1} BPM", from, bpm);
            save(&midi, &output)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_as_minutes_and_seconds() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(61.9), "01:01");
        assert_eq!(format_duration(-3.0), "00:00");
    }

    #[test]
    fn cli_parses_subcommands() {
        let opt = Opt::try_parse_from(["midiconvert", "slice", "a.mid", "b.mid", "--end", "4"]).unwrap();
        match opt.command {
            Command::Slice { start, end, .. } => {
                assert_eq!(start, 0.0);
                assert_eq!(end, Some(4.0));
            }
            other => panic!("parsed {other:?}"),
        }
        assert!(Opt::try_parse_from(["midiconvert", "tempo", "a.mid", "b.mid"]).is_err());
    }
}
