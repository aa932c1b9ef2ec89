//! Calcframe - derived-column calculations over CSV datasets

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};

use calcframe::api::{CalculationsApi, CreateCalculation};
use calcframe::storage::{csv, json};
use calcframe_core::dataset::store::DatasetStore;

fn print_usage() {
    eprintln!("Usage: calcframe [OPTIONS] <FILE>");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <FILE>                    CSV dataset to load");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --calc <NAME=FORMULA> Add a calculation (can be repeated).");
    eprintln!("                            Append ' by <column>' to the formula to group");
    eprintln!("                            by a dimension column, e.g.");
    eprintln!("                            -c 'total=sum(amount) by food_type'");
    eprintln!("  -l, --list                Print calculation records after applying");
    eprintln!("  -o, --output <FILE>       Export the dataset table (and aggregates) as JSON");
    eprintln!("  -h, --help                Print help");
}

struct CalcSpec {
    name: String,
    formula: String,
    group: Option<String>,
}

/// Parse `name=formula[ by group]` from a -c argument.
fn parse_calc_spec(raw: &str) -> Option<CalcSpec> {
    let (name, rest) = raw.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let rest = rest.trim();
    let (formula, group) = match rest.rsplit_once(" by ") {
        Some((formula, group)) if !group.trim().contains(' ') => {
            (formula.trim(), Some(group.trim().to_string()))
        }
        _ => (rest, None),
    };
    if formula.is_empty() {
        return None;
    }

    Some(CalcSpec {
        name: name.to_string(),
        formula: formula.to_string(),
        group,
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut file_path: Option<PathBuf> = None;
    let mut calc_specs: Vec<CalcSpec> = Vec::new();
    let mut list = false;
    let mut output_file: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-c" | "--calc" => {
                i += 1;
                if i >= args.len() {
                    bail!("--calc requires a NAME=FORMULA argument");
                }
                match parse_calc_spec(&args[i]) {
                    Some(spec) => calc_specs.push(spec),
                    None => bail!("invalid calculation spec: {}", args[i]),
                }
            }
            "-l" | "--list" => {
                list = true;
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    bail!("--output requires a file path");
                }
                output_file = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                print_usage();
                bail!("unknown option: {}", arg);
            }
            _ => {
                if file_path.is_none() {
                    file_path = Some(PathBuf::from(&args[i]));
                } else {
                    bail!("unexpected argument: {}", args[i]);
                }
            }
        }
        i += 1;
    }

    let Some(file_path) = file_path else {
        print_usage();
        bail!("no dataset file given");
    };

    let dataset_id = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset".to_string());

    let dataset = csv::parse_dataset(&file_path)
        .with_context(|| format!("failed to load {}", file_path.display()))?;

    let store = Arc::new(DatasetStore::new());
    store.insert(dataset_id.clone(), dataset);
    let api = CalculationsApi::with_store(store.clone());

    for spec in &calc_specs {
        let payload = api.create(&CreateCalculation {
            dataset_id: dataset_id.clone(),
            formula: spec.formula.clone(),
            name: spec.name.clone(),
            group: spec.group.clone(),
        });
        println!("{}", payload);
    }

    if list {
        println!("{}", api.list(&dataset_id));
    }

    if let Some(output) = output_file {
        let entry = store.find(&dataset_id)?;
        let state = entry.read();
        json::write_json(&output, &state.dataset)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }

    Ok(())
}
