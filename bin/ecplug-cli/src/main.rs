//! ecplug - erasure coder plugin CLI
//!
//! Lists raw coder plugins, shows which raw coder a configuration selects,
//! and encodes/decodes files into erasure units.

mod manifest;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecplug_common::{CoderConf, ErasureSchema, keys};
use ecplug_erasure::{ErasureCodec, ErasureCoder, ErasureCoders, RawCoderRegistry};
use manifest::{Manifest, unit_file_name};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ecplug")]
#[command(about = "Erasure coder plugin tool")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/ecplug/ecplug.toml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Redundancy scheme flags shared by several commands
#[derive(clap::Args, Debug, Clone)]
struct SchemaArgs {
    /// Codec name
    #[arg(long, default_value = "rs")]
    codec: String,

    /// Number of data units
    #[arg(short = 'k', long, default_value = "6")]
    data_units: usize,

    /// Number of parity units
    #[arg(short = 'm', long, default_value = "3")]
    parity_units: usize,
}

impl SchemaArgs {
    fn schema(&self) -> ErasureSchema {
        ErasureSchema::new(&self.codec, self.data_units, self.parity_units)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered raw coder factories
    Plugins,
    /// Show which raw coder a codec resolves to
    Resolve {
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Encode a file into units plus a manifest
    Encode {
        /// Input file
        input: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        #[command(flatten)]
        schema: SchemaArgs,
    },
    /// Rebuild a file from the units in a directory
    Decode {
        /// Directory holding the manifest and units
        in_dir: PathBuf,
        /// Output file
        output: PathBuf,
    },
}

/// Load the coder configuration, or `None` when the file does not exist
fn load_conf(path: &Path) -> Result<Option<Arc<CoderConf>>> {
    if !path.exists() {
        info!("Config file {} not found, using built-in coders", path.display());
        return Ok(None);
    }
    let conf = CoderConf::load(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok(Some(Arc::new(conf)))
}

fn plugins(registry: &RawCoderRegistry, conf: Option<&CoderConf>) -> Vec<String> {
    registry
        .factory_names()
        .map(|name| {
            let bound: Vec<&str> = conf
                .into_iter()
                .flat_map(CoderConf::iter)
                .filter(|(_, v)| v.trim() == name)
                .map(|(k, _)| k)
                .collect();
            if bound.is_empty() {
                name.to_string()
            } else {
                format!("{name} (bound to {})", bound.join(", "))
            }
        })
        .collect()
}

fn resolve(
    schema: &ErasureSchema,
    conf: Option<Arc<CoderConf>>,
    registry: Arc<RawCoderRegistry>,
) -> Result<String> {
    let key = keys::rawcoder_key(schema.codec_name());
    let configured = conf
        .as_deref()
        .and_then(|c| c.get_factory(&key))
        .map(str::to_string);

    let encoder = ErasureCoders::create_encoder(schema, conf, registry)?;
    let source = configured.map_or_else(
        || "built-in".to_string(),
        |factory| format!("configured via {key} = {factory}"),
    );

    Ok(format!(
        "{schema}: {} data + {} parity units, raw coder {source}, prefer direct buffer: {}",
        encoder.num_data_units(),
        encoder.num_parity_units(),
        encoder.prefer_direct_buffer(),
    ))
}

fn encode(codec: &ErasureCodec, input: &Path, out_dir: &Path) -> Result<Manifest> {
    let data =
        std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let units = codec.encode_units(&data)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    for unit in &units {
        let path = out_dir.join(unit_file_name(unit.index));
        std::fs::write(&path, &unit.data)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let manifest = Manifest::new(codec.schema(), data.len(), &units);
    manifest.save(out_dir)?;
    info!(
        schema = %codec.schema(),
        units = units.len(),
        unit_size = manifest.unit_size,
        "Encoded {}",
        input.display()
    );
    Ok(manifest)
}

fn decode(
    in_dir: &Path,
    output: &Path,
    conf: Option<Arc<CoderConf>>,
    registry: Arc<RawCoderRegistry>,
) -> Result<usize> {
    let manifest = Manifest::load(in_dir)?;
    let codec = ErasureCodec::new(&manifest.schema(), conf, registry)?;

    let units = (0..manifest.total_units())
        .map(|i| manifest.read_unit(in_dir, i))
        .collect::<Result<Vec<_>>>()?;
    let missing = units.iter().filter(|u| u.is_none()).count();

    let data = codec.decode(&units, manifest.original_size)?;
    std::fs::write(output, &data)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(missing, bytes = data.len(), "Decoded {}", output.display());
    Ok(data.len())
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let conf = load_conf(&args.config)?;
    let registry = Arc::new(RawCoderRegistry::with_builtins());

    match args.command {
        Commands::Plugins => {
            for line in plugins(&registry, conf.as_deref()) {
                println!("{line}");
            }
        }
        Commands::Resolve { schema } => {
            println!("{}", resolve(&schema.schema(), conf, registry)?);
        }
        Commands::Encode {
            input,
            out_dir,
            schema,
        } => {
            let codec = ErasureCodec::new(&schema.schema(), conf, registry)?;
            let manifest = encode(&codec, &input, &out_dir)?;
            println!(
                "Wrote {} units of {} bytes to {}",
                manifest.total_units(),
                manifest.unit_size,
                out_dir.display()
            );
        }
        Commands::Decode { in_dir, output } => {
            let bytes = decode(&in_dir, &output, conf, registry)?;
            println!("Wrote {bytes} bytes to {}", output.display());
        }
    }

    Ok(())
}
