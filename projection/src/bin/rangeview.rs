use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use projection::{
    colors::{ColorResolver, DEFAULT_INSTANCE_SEED},
    config::DatasetConfig,
    dataset::{Dataset, DatasetOptions},
    export::{write_color_png, write_range_png},
    scan::{ProcessedScan, ScanProcessor},
    stats::ScanStats,
};

#[derive(Parser)]
#[command(author, version, about = "Projects LiDAR scans into range images", long_about = None)]
struct Args {
    /// Dataset root, containing the scan directory and, for separate label files, a `labels` directory
    #[arg(short, long)]
    dataset: PathBuf,
    #[arg(short, long, default_value = "config/semantic-kitti.yaml")]
    config: PathBuf,
    #[arg(short, long, help = "Only use the points, ignore all labels")]
    ignore_labels: bool,
    #[arg(long, help = "Scans are stored as [x, y, z, intensity, label] rows")]
    combined: bool,
    #[arg(long, help = "Reduce semantic classes with the learning_map of the config")]
    mapping: bool,
    #[arg(short, long, help = "Directory to write range and label images to")]
    export: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_INSTANCE_SEED)]
    seed: u64,
    #[arg(long, help = "Skip scans that can't be read instead of aborting")]
    keep_going: bool,
}

fn export_scan(
    dir: &Path,
    stem: &str,
    processed: &ProcessedScan,
    config: &DatasetConfig,
) -> Result<()> {
    let image = &processed.projection.image;
    write_range_png(&dir.join(format!("{}_range.png", stem)), image)?;

    if let Some(ref labels) = processed.labels {
        let pixels = &labels.pixel_labels;
        write_color_png(
            &dir.join(format!("{}_semantic.png", stem)),
            &pixels.semantic_colors,
            pixels.width,
            pixels.height,
            config.color_order,
        )?;
        write_color_png(
            &dir.join(format!("{}_instance.png", stem)),
            &pixels.instance_colors,
            pixels.width,
            pixels.height,
            config.color_order,
        )?;
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = DatasetConfig::load(&args.config)?;
    let params = config.projection_params()?;
    let remap = if args.mapping {
        Some(config.remap_table()?)
    } else {
        None
    };
    let colors = ColorResolver::new(
        config.semantic_color_table(args.mapping)?,
        config.instance_color_table(args.seed),
    );
    let processor = ScanProcessor::new(params, colors, remap)?;

    let dataset = Dataset::discover(
        &args.dataset,
        &config.lidar.manufacturer,
        DatasetOptions {
            combined: args.combined,
            ignore_labels: args.ignore_labels,
        },
    )?;
    if dataset.is_empty() {
        bail!("No scans found in {}", args.dataset.display());
    }

    if let Some(ref dir) = args.export {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    }

    for (index, entry) in dataset.entries().iter().enumerate() {
        let start = Instant::now();
        let scan = match dataset.open(index) {
            Ok(scan) => scan,
            Err(why) if args.keep_going => {
                warn!("Skipping {} ({})", entry.scan.display(), why);
                continue;
            }
            Err(why) => {
                return Err(why).with_context(|| format!("Failed to read {}", entry.scan.display()))
            }
        };

        let processed = processor.process(scan);
        let stats = ScanStats::from_processed(&processed, start.elapsed());
        info!("{}\n{}", entry.scan.display(), stats);
        for (id, count) in stats.semantic_classes.iter() {
            info!(
                "  {:>5} {:<20} {}",
                id,
                config.class_name(*id).unwrap_or("unknown"),
                count
            );
        }

        if let Some(ref dir) = args.export {
            let stem = entry
                .scan
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("{:06}", index));
            export_scan(dir, &stem, &processed, &config)
                .with_context(|| format!("Failed to export {}", entry.scan.display()))?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();
    run(&args)
}
