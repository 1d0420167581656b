// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ResultDB CLI
//!
//! Command-line access to experiments, analysis results, figures and data
//! files, against the hosted database or a local store.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resultdb_client::ExperimentService;
use resultdb_core::{AnalysisResultFilter, ExperimentFilter};
use resultdb_telemetry::{init_logging, LogConfig};
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use tracing::debug;

use crate::config::ResultDbConfig;

#[derive(Parser)]
#[command(name = "resultdb")]
#[command(about = "ResultDB - experiment and analysis result database client", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the local store even if a remote is configured
    #[arg(long)]
    local: bool,

    /// Local store directory (enables on-disk persistence)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Do not ask before deleting
    #[arg(short, long)]
    yes: bool,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List experiments
    Experiments {
        /// Experiment type
        #[arg(long = "type")]
        experiment_type: Option<String>,

        /// Match the type as a substring
        #[arg(long)]
        like: bool,

        /// Backend (device) name
        #[arg(long)]
        backend: Option<String>,

        /// Tags to match (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// How tags combine: AND or OR
        #[arg(long, default_value = "OR")]
        tags_operator: String,

        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        hub: Option<String>,

        #[arg(long)]
        group: Option<String>,

        #[arg(long)]
        project: Option<String>,

        /// Only experiments owned by the current user
        #[arg(long)]
        mine: bool,

        /// Only public experiments
        #[arg(long)]
        public: bool,

        /// Sort entries, `key:asc` or `key:desc` (repeatable)
        #[arg(long = "sort")]
        sort_by: Vec<String>,

        /// Maximum number of experiments (defaults to the configured limit)
        #[arg(long)]
        limit: Option<usize>,

        /// Return every match
        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },

    /// Show one experiment
    Experiment {
        experiment_id: String,
    },

    /// List analysis results
    Results {
        /// Experiment ID
        #[arg(long)]
        experiment: Option<String>,

        /// Result type
        #[arg(long = "type")]
        result_type: Option<String>,

        #[arg(long)]
        like: bool,

        #[arg(long)]
        backend: Option<String>,

        /// Qualities to include: good, bad, unknown (repeatable)
        #[arg(long = "quality")]
        qualities: Vec<String>,

        #[arg(long)]
        verified: Option<bool>,

        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long, default_value = "OR")]
        tags_operator: String,

        #[arg(long = "sort")]
        sort_by: Vec<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },

    /// Show one analysis result
    #[command(name = "result")]
    ShowResult {
        result_id: String,
    },

    /// Delete an experiment with its results and figures
    DeleteExperiment {
        experiment_id: String,
    },

    /// Delete an analysis result
    DeleteResult {
        result_id: String,
    },

    /// List the data files of an experiment
    Files {
        experiment_id: String,
    },

    /// Download a data file
    DownloadFile {
        experiment_id: String,

        file_name: String,

        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Save a figure to disk
    Figure {
        experiment_id: String,

        figure_name: String,

        /// Output path (defaults to the figure name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List devices and their components
    Devices {
        /// Only this device
        #[arg(long)]
        backend: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ResultDbConfig::load(path)?,
        None => ResultDbConfig {
            log: LogConfig::from_env(),
            ..ResultDbConfig::default()
        },
    };

    // Setup logging
    if cli.verbose {
        config.log.level = "debug".to_string();
    }
    init_logging(&config.log).context("Failed to initialize logging")?;

    if cli.yes {
        config.service.prompt_for_delete = false;
    }
    if let Some(dir) = &cli.data_dir {
        config.local.main_dir = Some(dir.clone());
        config.local.local_save = true;
    }

    let service = open_service(&cli, &config)?;
    let default_limit = Some(config.service.default_limit);

    match cli.command {
        Commands::Experiments {
            experiment_type,
            like,
            backend,
            tags,
            tags_operator,
            parent,
            hub,
            group,
            project,
            mine,
            public,
            sort_by,
            limit,
            all,
        } => {
            let mut filter = ExperimentFilter::new();
            if let Some(experiment_type) = experiment_type {
                filter = filter.experiment_type(experiment_type);
                if like {
                    filter = filter.experiment_type_operator("like");
                }
            }
            if let Some(backend) = backend {
                filter = filter.backend_name(backend);
            }
            if !tags.is_empty() {
                filter = filter.tags(tags, tags_operator);
            }
            if let Some(parent) = parent {
                filter = filter.parent_id(parent);
            }
            if let Some(hub) = hub {
                filter = filter.hub(hub);
            }
            if let Some(group) = group {
                filter = filter.group(group);
            }
            if let Some(project) = project {
                filter = filter.project(project);
            }
            if mine {
                filter = filter.mine_only();
            }
            if public {
                filter = filter.public_only();
            }
            for entry in sort_by {
                filter = filter.sort_by(entry);
            }
            let limit = if all { None } else { limit.or(default_limit) };
            let experiments = service
                .experiments(&filter, limit)
                .context("Failed to list experiments")?;
            print_list(&experiments, cli.json)?;
        }

        Commands::Experiment { experiment_id } => {
            let experiment = service.experiment(&experiment_id)?;
            print_one(&experiment, cli.json)?;
        }

        Commands::Results {
            experiment,
            result_type,
            like,
            backend,
            qualities,
            verified,
            tags,
            tags_operator,
            sort_by,
            limit,
            all,
        } => {
            let mut filter = AnalysisResultFilter::new();
            if let Some(experiment) = experiment {
                filter = filter.experiment_id(experiment);
            }
            if let Some(result_type) = result_type {
                filter = filter.result_type(result_type);
                if like {
                    filter = filter.result_type_operator("like");
                }
            }
            if let Some(backend) = backend {
                filter = filter.backend_name(backend);
            }
            if !qualities.is_empty() {
                filter = filter.qualities(qualities);
            }
            if let Some(verified) = verified {
                filter = filter.verified(verified);
            }
            if !tags.is_empty() {
                filter = filter.tags(tags, tags_operator);
            }
            for entry in sort_by {
                filter = filter.sort_by(entry);
            }
            let limit = if all { None } else { limit.or(default_limit) };
            let results = service
                .analysis_results(&filter, limit)
                .context("Failed to list analysis results")?;
            print_list(&results, cli.json)?;
        }

        Commands::ShowResult { result_id } => {
            let result = service.analysis_result(&result_id)?;
            print_one(&result, cli.json)?;
        }

        Commands::DeleteExperiment { experiment_id } => {
            service.delete_experiment(&experiment_id)?;
        }

        Commands::DeleteResult { result_id } => {
            service.delete_analysis_result(&result_id)?;
        }

        Commands::Files { experiment_id } => {
            let files = service.files(&experiment_id)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                for file in files {
                    println!("{}\t{}\t{}", file.key, file.size, file.last_modified);
                }
            }
        }

        Commands::DownloadFile {
            experiment_id,
            file_name,
            output,
        } => {
            let contents = service.file_download(&experiment_id, &file_name)?;
            let text = serde_json::to_string_pretty(&contents)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✓ Saved {} to {}", file_name, path.display());
                }
                None => println!("{}", text),
            }
        }

        Commands::Figure {
            experiment_id,
            figure_name,
            output,
        } => {
            let path = output.unwrap_or_else(|| PathBuf::from(&figure_name));
            let size = service.figure_to_file(&experiment_id, &figure_name, &path)?;
            println!("✓ Saved {} ({} bytes) to {}", figure_name, size, path.display());
        }

        Commands::Devices { backend } => match backend {
            Some(name) => {
                let components = service.device_components(&name)?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&components)?);
                } else {
                    println!("{}: {}", name, components.join(", "));
                }
            }
            None => {
                let all = service.all_device_components()?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&all)?);
                } else {
                    for (device, components) in all {
                        println!("{}: {}", device, components.join(", "));
                    }
                }
            }
        },
    }

    Ok(())
}

fn open_service(cli: &Cli, config: &ResultDbConfig) -> Result<ExperimentService> {
    match (&config.remote, cli.local) {
        (Some(settings), false) => {
            debug!("Connecting to remote results database");
            ExperimentService::remote(settings, config.service.clone())
                .context("Failed to connect to the results database")
        }
        _ => {
            debug!(dir = ?config.local.main_dir, "Opening local store");
            ExperimentService::local(config.local.clone(), config.service.clone())
                .context("Failed to open local store")
        }
    }
}

fn print_list<T: Display + Serialize>(items: &[T], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("No entries found");
    }
    for item in items {
        println!("{}\n", item);
    }
    Ok(())
}

fn print_one<T: Display + Serialize>(item: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(item)?);
    } else {
        println!("{}", item);
    }
    Ok(())
}
