use anyhow::{Context, Result};
use appmeta::{AppMetadata, ExtractOptions, Extractor, IosDistributionInfo, Platform};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Package to inspect, an `.apk` or `.ipa`
    package: PathBuf,
    /// TOML file with extraction options
    #[clap(long)]
    config: Option<PathBuf>,
    /// Screen density the Android icon lookup aims for
    #[clap(long)]
    density: Option<u16>,
    /// Log decoding details to stderr
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Icon {
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct Report {
    platform: Platform,
    name: Option<String>,
    bundle_id: String,
    version: String,
    build: Option<String>,
    size_bytes: u64,
    icon: Option<Icon>,
    ios_info: Option<IosDistributionInfo>,
    issues: Vec<String>,
}

impl From<AppMetadata> for Report {
    fn from(metadata: AppMetadata) -> Self {
        Self {
            platform: metadata.platform,
            name: metadata.name,
            bundle_id: metadata.bundle_id,
            version: metadata.version,
            build: metadata.build,
            size_bytes: metadata.size_bytes,
            icon: metadata.icon.map(|icon| Icon {
                width: icon.width(),
                height: icon.height(),
            }),
            ios_info: metadata.ios_info,
            issues: metadata.issues.iter().map(ToString::to_string).collect(),
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("appmeta=debug")
        } else {
            EnvFilter::new("appmeta=info")
        }
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut options = match &args.config {
        Some(path) => ExtractOptions::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExtractOptions::default(),
    };
    if let Some(density) = args.density {
        options.target_density = density;
    }

    let metadata = Extractor::new(options)
        .extract_path(&args.package)
        .with_context(|| format!("Failed to extract {}", args.package.display()))?;
    let report = Report::from(metadata);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
