use std::env;
use std::fs::{self, File};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use curtain::harness::{load_scenario, run_scenario, ScenarioOutput, StepRecord};

fn main() -> ExitCode {
    let opts = match parse_args() {
        Ok(Some(opts)) => opts,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[loading-harness] {err}");
            print_help();
            return ExitCode::FAILURE;
        }
    };
    match run_cli(&opts) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("[loading-harness] error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run_cli(opts: &CliOptions) -> Result<bool> {
    let fixture = load_scenario(&opts.fixture)?;
    let output = run_scenario(&fixture)?;

    if opts.trace {
        print_trace(&output);
    }

    if let Some(path) = &opts.write_output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory '{}'", parent.display()))?;
            }
        }
        let file = File::create(path)
            .with_context(|| format!("writing scenario output to '{}'", path.display()))?;
        serde_json::to_writer_pretty(file, &output).context("serializing scenario output")?;
        println!("[loading-harness] wrote {}", path.display());
    }

    let Some(path) = &opts.golden else { return Ok(true) };
    let file =
        File::open(path).with_context(|| format!("opening golden file '{}'", path.display()))?;
    let expected: ScenarioOutput = serde_json::from_reader(file).context("parsing golden JSON")?;
    if expected == output {
        println!("[loading-harness] matched golden {}", path.display());
        return Ok(true);
    }

    eprintln!(
        "[loading-harness] golden mismatch for {} (use --write-output to refresh)",
        opts.fixture.display()
    );
    for (want, got) in expected.records.iter().zip(&output.records) {
        if want != got {
            eprintln!("  step {}:", got.step);
            eprintln!("    expected: {}", serde_json::to_string(want).unwrap_or_default());
            eprintln!("    actual:   {}", serde_json::to_string(got).unwrap_or_default());
        }
    }
    if expected.final_state != output.final_state {
        eprintln!(
            "  final state:\n    expected: {}\n    actual:   {}",
            serde_json::to_string(&expected.final_state).unwrap_or_default(),
            serde_json::to_string(&output.final_state).unwrap_or_default(),
        );
    }
    Ok(false)
}

fn print_trace(output: &ScenarioOutput) {
    for record in &output.records {
        if step_is_quiet(record) {
            continue;
        }
        println!("t={:.2} (step {})", record.step as f64 * output.dt, record.step);
        for rejection in &record.rejections {
            println!("  rejected: {rejection}");
        }
        for call in &record.host_calls {
            println!("  host: {}", serde_json::to_string(call).unwrap_or_default());
        }
        for visible in &record.visibility_events {
            println!("  visibility -> {visible}");
        }
    }
    let last = &output.final_state;
    println!(
        "final: visible={} input_blocked={} saving_performance={} live_screens={}",
        last.visible,
        last.input_blocked,
        last.saving_performance,
        last.screens.len(),
    );
}

fn step_is_quiet(record: &StepRecord) -> bool {
    record.rejections.is_empty()
        && record.host_calls.is_empty()
        && record.visibility_events.is_empty()
}

struct CliOptions {
    fixture: PathBuf,
    golden: Option<PathBuf>,
    write_output: Option<PathBuf>,
    trace: bool,
}

fn parse_args() -> Result<Option<CliOptions>> {
    let mut fixture = None;
    let mut golden = None;
    let mut write_output = None;
    let mut trace = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--golden" | "-g" => {
                golden =
                    Some(PathBuf::from(args.next().ok_or_else(|| anyhow!("--golden needs a path"))?));
            }
            "--write-output" | "-o" => {
                write_output = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--write-output needs a path"))?,
                ));
            }
            "--trace" | "-t" => trace = true,
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            flag if flag.starts_with('-') => return Err(anyhow!("unknown flag '{flag}'")),
            path => {
                if fixture.replace(PathBuf::from(path)).is_some() {
                    return Err(anyhow!("more than one fixture path given"));
                }
            }
        }
    }
    let fixture = fixture.ok_or_else(|| anyhow!("a fixture path is required"))?;
    // No golden and no output file means the caller wants to see the run.
    if golden.is_none() && write_output.is_none() {
        trace = true;
    }
    Ok(Some(CliOptions { fixture, golden, write_output, trace }))
}

fn print_help() {
    println!("Usage: loading_harness <fixture.json> [options]");
    println!("  -g, --golden <path>        Compare the run against a golden output file");
    println!("  -o, --write-output <path>  Write the run's output JSON");
    println!("  -t, --trace                Print per-step host calls and visibility edges");
}
