//! CLI definition and dispatch.
//!
//! Progress goes to stderr, data to stdout.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::builtin_indicators::BuiltinIndicators;
use crate::adapters::console_channel::ConsoleChannel;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_action_adapter::LogActionAdapter;
use crate::domain::batch::BatchEvaluator;
use crate::domain::dispatch::{AutoActionRule, Dispatcher};
use crate::domain::error::IndigraphError;
use crate::domain::graph::{Graph, Handle, NamedKey, Node, SeriesKey};
use crate::domain::graph_config::{self, GraphConfig};
use crate::domain::group_signal::GroupSignalEngine;
use crate::domain::incremental::IncrementalRuntime;
use crate::domain::pipeline::{RuleSet, SignalPipeline};
use crate::domain::signal::SignalEngine;
use crate::ports::action_port::ActionAdapter;
use crate::ports::data_port::{Observation, SeriesPort};

#[derive(Parser, Debug)]
#[command(name = "indigraph", about = "Indicator graph evaluator and signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the evaluation order of every node
    Plan {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Evaluate named nodes over CSV history and print them as CSV
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Node to print (`name` or `name.output`); repeatable, default all
        #[arg(short, long)]
        node: Vec<String>,
    },
    /// Stream CSV history through the signal pipeline
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Plan { config } => run_plan(&config),
        Command::Evaluate { config, data, node } => run_evaluate(&config, &data, &node),
        Command::Replay { config, data } => run_replay(&config, &data),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<GraphConfig, IndigraphError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| IndigraphError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let config = graph_config::load_graph_config(&adapter)?;
    eprintln!(
        "Graph '{}': {} node(s), {} signal(s), {} group(s)",
        config.name,
        config.graph.len(),
        config.signals.len(),
        config.groups.len()
    );
    Ok(config)
}

fn base_keys(graph: &Graph) -> Vec<(Handle, SeriesKey)> {
    graph
        .handles()
        .filter_map(|h| match graph.node(h) {
            Ok(Node::Base(key)) => Some((h, key.clone())),
            _ => None,
        })
        .collect()
}

fn label(graph: &Graph, handle: Handle) -> String {
    graph
        .name_of(handle)
        .map(|k| k.to_string())
        .unwrap_or_else(|| handle.to_string())
}

fn run_plan(config_path: &Path) -> Result<(), IndigraphError> {
    let config = load_config(config_path)?;
    let graph = &config.graph;
    let all: Vec<Handle> = graph.handles().collect();
    for handle in graph.topological_order(&all)? {
        println!("{}\t{}\t{}", handle, label(graph, handle), graph.node(handle)?);
    }
    Ok(())
}

fn run_evaluate(config_path: &Path, data_dir: &Path, nodes: &[String]) -> Result<(), IndigraphError> {
    let config = load_config(config_path)?;
    let graph = &config.graph;

    let columns: Vec<(String, Handle)> = if nodes.is_empty() {
        graph
            .names()
            .into_iter()
            .map(|(k, h)| (k.to_string(), h))
            .collect()
    } else {
        nodes
            .iter()
            .map(|n| {
                let key: NamedKey = graph_config::named_key(n);
                Ok((key.to_string(), graph.resolve_name(&key)?))
            })
            .collect::<Result<_, IndigraphError>>()?
    };

    let data = CsvAdapter::new(data_dir.to_path_buf());
    let indicators = BuiltinIndicators;
    let mut evaluator = BatchEvaluator::new(graph, &indicators);
    let mut timestamps = Vec::new();
    for (i, (_, key)) in base_keys(graph).into_iter().enumerate() {
        let observations = data.fetch_series(&key)?;
        eprintln!("Loaded {} bar(s) for {}", observations.len(), key);
        if i == 0 {
            timestamps = observations.iter().map(|o| o.timestamp).collect();
        }
        evaluator.set_base(key, observations.iter().map(|o| o.value).collect());
    }

    let targets: Vec<Handle> = columns.iter().map(|(_, h)| *h).collect();
    let snapshot = evaluator.evaluate(&targets)?;

    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    let write_err = |e: csv::Error| IndigraphError::Data {
        reason: format!("failed to write output: {}", e),
    };
    let mut header = vec!["timestamp".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    wtr.write_record(&header).map_err(write_err)?;

    for row in 0..snapshot.bar_count() {
        let mut record = vec![
            timestamps
                .get(row)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        ];
        for (_, handle) in &columns {
            let cell = snapshot
                .get(*handle)?
                .and_then(|values| values.get(row))
                .map(|v| v.to_string())
                .unwrap_or_default();
            record.push(cell);
        }
        wtr.write_record(&record).map_err(write_err)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Every base observation, oldest first. Ties keep base allocation order.
pub fn merge_observations(
    series: Vec<(SeriesKey, Vec<Observation>)>,
) -> Vec<(SeriesKey, Observation)> {
    let mut merged: Vec<(SeriesKey, Observation)> = series
        .into_iter()
        .flat_map(|(key, obs)| obs.into_iter().map(move |o| (key.clone(), o)))
        .collect();
    merged.sort_by_key(|(_, o)| o.timestamp);
    merged
}

fn run_replay(config_path: &Path, data_dir: &Path) -> Result<(), IndigraphError> {
    let config = load_config(config_path)?;

    let data = CsvAdapter::new(data_dir.to_path_buf());
    let mut series = Vec::new();
    for (_, key) in base_keys(&config.graph) {
        let observations = data.fetch_series(&key)?;
        eprintln!("Loaded {} bar(s) for {}", observations.len(), key);
        series.push((key, observations));
    }

    let adapter: Arc<dyn ActionAdapter> = Arc::new(LogActionAdapter::new());
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_channel(Box::new(ConsoleChannel::stdout()));
    for binding in &config.actions {
        dispatcher.add_rule(AutoActionRule {
            signal_id: binding.signal_id.clone(),
            action: binding.action,
            adapter: Arc::clone(&adapter),
        });
    }
    let rules = RuleSet::new(
        SignalEngine::new(config.signals),
        GroupSignalEngine::new(config.groups),
        dispatcher,
    );

    let runtime = IncrementalRuntime::new(
        config.graph,
        Box::new(BuiltinIndicators),
        config.activation,
    )?;
    let mut pipeline = SignalPipeline::new(runtime, rules)?;

    let observations = merge_observations(series);
    let mut fired = 0;
    for (key, obs) in &observations {
        fired += pipeline.on_observation(key, obs.value, obs.timestamp)?.len();
    }
    eprintln!(
        "Replayed {} observation(s), {} signal(s) fired",
        observations.len(),
        fired
    );
    Ok(())
}
