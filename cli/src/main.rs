use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use mkfat_core::{FileMedium, ImageOptions};
use mkfat_formatters::{import_host_directory, Fat16Image, ImagePlan, Manifest};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mkfat")]
#[command(about = "Build FAT16 disk images from files, directories and links", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an image from a JSON manifest
    Build {
        #[arg(short, long)]
        manifest: PathBuf,
        /// Image file to create (truncated if it exists)
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Build an image from the contents of a host directory
    Pack {
        dir: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the planned layout without writing anything
    Plan {
        #[arg(short, long, conflicts_with = "dir", required_unless_present = "dir")]
        manifest: Option<PathBuf>,
        #[arg(short, long)]
        dir: Option<PathBuf>,
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Volume options that override the manifest (or the defaults)
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Volume label (up to 11 characters)
    #[arg(long)]
    label: Option<String>,
    /// Volume serial number in hex, e.g. 1234ABCD
    #[arg(long, value_parser = parse_hex_u32)]
    serial: Option<u32>,
    /// Number of FAT copies
    #[arg(long)]
    fat_count: Option<u8>,
    #[arg(long)]
    reserved_sectors: Option<u16>,
    /// Media descriptor in hex (F0 or F8-FF)
    #[arg(long, value_parser = parse_hex_u8)]
    media: Option<u8>,
    /// Extra free space to reserve, in bytes
    #[arg(long)]
    extra_space: Option<u64>,
    /// Bootstrap code placed after the BPB (at most 448 bytes)
    #[arg(long)]
    boot_code: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, options: &mut ImageOptions) -> anyhow::Result<()> {
        if let Some(label) = &self.label {
            options.label = label.clone();
        }
        if let Some(serial) = self.serial {
            options.serial = Some(serial);
        }
        if let Some(count) = self.fat_count {
            options.fat_count = count;
        }
        if let Some(reserved) = self.reserved_sectors {
            options.reserved_sectors = reserved;
        }
        if let Some(media) = self.media {
            options.media_descriptor = media;
        }
        if let Some(extra) = self.extra_space {
            options.extra_space = extra;
        }
        if let Some(path) = &self.boot_code {
            let code = std::fs::read(path)
                .with_context(|| format!("reading boot code from {}", path.display()))?;
            options.boot_code = Some(code);
        }
        Ok(())
    }
}

fn parse_hex_u32(s: &str) -> Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn image_from_manifest(path: &Path, overrides: &Overrides) -> anyhow::Result<Fat16Image> {
    let manifest = Manifest::load(path).with_context(|| format!("loading {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut image = manifest.into_image(base_dir)?;
    overrides.apply(image.options_mut())?;
    Ok(image)
}

fn image_from_dir(dir: &Path, overrides: &Overrides) -> anyhow::Result<Fat16Image> {
    let mut options = ImageOptions::default();
    overrides.apply(&mut options)?;
    let mut image = Fat16Image::new(options);
    let count = import_host_directory(image.tree_mut(), dir)
        .with_context(|| format!("importing {}", dir.display()))?;
    info!("Imported {} entries from {}", count, dir.display());
    Ok(image)
}

async fn write_image_file(image: &Fat16Image, output: &Path) -> anyhow::Result<()> {
    let medium = FileMedium::create(output)
        .with_context(|| format!("creating {}", output.display()))?;

    let result = async {
        let plan = image.write_to(&medium).await?;
        medium.sync().await?;
        Ok::<_, mkfat_core::MkfatError>(plan)
    }
    .await;

    match result {
        Ok(plan) => {
            print_summary(&plan, output);
            Ok(())
        }
        Err(e) => {
            // A partial image is worse than none
            if let Err(remove_err) = std::fs::remove_file(output) {
                warn!("Could not remove partial image {}: {}", output.display(), remove_err);
            }
            Err(e.into())
        }
    }
}

fn print_summary(plan: &ImagePlan, output: &Path) {
    let geometry = &plan.geometry;
    println!("Wrote {}", output.display());
    println!("  Size: {} bytes ({} sectors)", plan.image_size, plan.total_sectors);
    println!(
        "  Clusters: {} x {} bytes ({} used)",
        geometry.total_clusters(),
        geometry.cluster_bytes(),
        geometry.data_clusters
    );
    println!("  FAT: {} x {} sectors", geometry.fat_count, geometry.fat_sectors);
    println!("  Root entries: {}", geometry.max_root_entries);
    println!("  Entries: {}", plan.entries.len());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Build { manifest, output, overrides } => {
            let image = image_from_manifest(&manifest, &overrides)?;
            write_image_file(&image, &output).await?;
        }
        Commands::Pack { dir, output, overrides } => {
            let image = image_from_dir(&dir, &overrides)?;
            write_image_file(&image, &output).await?;
        }
        Commands::Plan { manifest, dir, overrides } => {
            let image = match (manifest, dir) {
                (Some(manifest), _) => image_from_manifest(&manifest, &overrides)?,
                (None, Some(dir)) => image_from_dir(&dir, &overrides)?,
                (None, None) => anyhow::bail!("either --manifest or --dir is required"),
            };
            let plan = image.plan().await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
    }

    Ok(())
}
