use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info, warn};

use ade20k_masks::build_info::BuildInfo;
use ade20k_masks::export::{export_instances, summarize};
use ade20k_masks::logging::setup_logger;
use ade20k_masks::{Ade20kDataset, InstanceDataset, Loader, LoaderSettings, Subset};

#[derive(Parser)]
#[command(name = "ade20k-masks", version, about = "Inspect ADE20K catalogs and instance masks")]
struct Cli {
    /// YAML settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DatasetArgs {
    /// Directory holding the index, the size table and the images
    dataset_dir: PathBuf,

    /// "train" or "val"
    #[arg(long, default_value = "train")]
    subset: String,

    /// Comma-separated class ids; all classes present in the subset when omitted
    #[arg(long, value_delimiter = ',')]
    class_ids: Vec<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Load the catalog and report its size
    Catalog {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Write the catalog as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Decode the instance masks of one image
    Masks {
        #[command(flatten)]
        dataset: DatasetArgs,

        #[arg(long)]
        image_id: usize,

        /// Export every mask as PNG plus a JSON summary
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Count decoded instances per class over the subset
    Stats {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Only decode the first N images
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print build information
    Version,
}

fn load_dataset(args: &DatasetArgs, settings: LoaderSettings) -> Result<Ade20kDataset> {
    let subset: Subset = args.subset.parse()?;
    let class_ids = (!args.class_ids.is_empty()).then_some(args.class_ids.as_slice());
    let dataset = Ade20kDataset::load(&args.dataset_dir, subset, class_ids, settings)
        .with_context(|| format!("Failed to load dataset from {}", args.dataset_dir.display()))?;
    Ok(dataset)
}

fn run_catalog(args: &DatasetArgs, json: Option<PathBuf>, settings: LoaderSettings) -> Result<()> {
    let subset: Subset = args.subset.parse()?;
    let class_ids = (!args.class_ids.is_empty()).then_some(args.class_ids.as_slice());
    let catalog = Loader::new(settings).load(&args.dataset_dir, subset, class_ids)?;

    println!("subset:  {}", subset);
    println!("classes: {}", catalog.classes.len());
    println!("images:  {}", catalog.images.len());

    if let Some(path) = json {
        let content = serde_json::to_string_pretty(&catalog)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write catalog to {}", path.display()))?;
        info!("Catalog written to {}", path.display());
    }
    Ok(())
}

fn run_masks(args: &DatasetArgs, image_id: usize, out: Option<PathBuf>, settings: LoaderSettings) -> Result<()> {
    let dataset = load_dataset(args, settings)?;
    let info = dataset
        .image_info(image_id)
        .with_context(|| format!("Image {} is not in the catalog", image_id))?;
    debug!("Image {}: {}", image_id, info.path.display());

    let masks = dataset.load_mask(image_id)?;
    let class_name = |id: i32| {
        usize::try_from(id)
            .ok()
            .and_then(|id| dataset.class_name(id))
            .map(str::to_string)
    };

    println!("{:>8}  {:>6}  {:<24}  {:>8}", "instance", "class", "name", "area");
    for summary in summarize(&masks, class_name) {
        println!(
            "{:>8}  {:>6}  {:<24}  {:>8}",
            summary.index,
            summary.class_id,
            summary.class_name.as_deref().unwrap_or("-"),
            summary.area
        );
    }

    if let Some(dir) = out {
        let summary_path = export_instances(&masks, class_name, &dir)?;
        println!("exported: {}", summary_path.display());
    }
    Ok(())
}

fn run_stats(args: &DatasetArgs, limit: Option<usize>, settings: LoaderSettings) -> Result<()> {
    let dataset = load_dataset(args, settings)?;
    let ids: Vec<usize> = dataset
        .image_ids()
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    info!("Decoding masks for {} image(s)", ids.len());

    let mut counts: HashMap<i32, usize> = HashMap::new();
    let mut failures = 0usize;
    for (id, result) in dataset.load_masks(&ids) {
        match result {
            Ok(masks) => {
                for class_id in masks.class_ids {
                    *counts.entry(class_id).or_insert(0) += 1;
                }
            }
            Err(e) => {
                warn!("Image {}: {}", id, e);
                failures += 1;
            }
        }
    }

    let mut rows: Vec<(i32, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("{:>6}  {:<24}  {:>9}", "class", "name", "instances");
    for (class_id, count) in rows {
        let name = usize::try_from(class_id)
            .ok()
            .and_then(|id| dataset.class_name(id))
            .unwrap_or("-");
        println!("{:>6}  {:<24}  {:>9}", class_id, name, count);
    }
    if failures > 0 {
        error!("{} image(s) failed to decode", failures);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.verbose);
    debug!("ade20k-masks {}", BuildInfo::display_version());

    if let Command::Version = cli.command {
        println!("{}", BuildInfo::detailed_info());
        return Ok(());
    }

    let settings = LoaderSettings::load(cli.settings.as_deref())?;
    match cli.command {
        Command::Catalog { dataset, json } => run_catalog(&dataset, json, settings),
        Command::Masks { dataset, image_id, out } => run_masks(&dataset, image_id, out, settings),
        Command::Stats { dataset, limit } => run_stats(&dataset, limit, settings),
        Command::Version => Ok(()),
    }
}
