use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use serde::Deserialize;
use structured_logger::json::new_writer;
use structured_logger::Builder;
use tqdm::tqdm;

use osm_xml_writer::data::header::Header;
use osm_xml_writer::data::osm::Bounds;
use osm_xml_writer::data::{load_entity_cache, Buffer};
use osm_xml_writer::errors::{Error, Result};
use osm_xml_writer::output::{OutputFile, OutputFormat, OutputFormatRegistry};
use osm_xml_writer::worker::Pool;

fn default_block_size() -> usize {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generator() -> String {
    format!("osm_xml_writer/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Deserialize)]
pub struct RunConfig {
    pub input_path: String,
    pub output_path: String,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default = "default_generator")]
    pub generator: String,
    #[serde(default)]
    pub josm_upload: Option<bool>,
    /// Output options such as `add_metadata` or `xml_change_format`.
    #[serde(default)]
    pub options: HashMap<String, String>,
    /// `[min_lon, min_lat, max_lon, max_lat]` boxes for the header.
    #[serde(default)]
    pub bounds: Vec<[f64; 4]>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn load_run_config(path: &str) -> Result<RunConfig> {
    let file = File::open(path)
        .map_err(|err| Error::config(format!("Could not open config file {path}: {err}")))?;
    Ok(serde_json::from_reader(file)?)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();
}

fn build_header(config: &RunConfig) -> Header {
    let mut header = Header::new();
    header.set("generator", config.generator.as_str());
    if let Some(upload) = config.josm_upload {
        header.set("xml_josm_upload", upload.to_string());
    }
    for [min_lon, min_lat, max_lon, max_lat] in &config.bounds {
        header.add_box(Bounds::from_degrees(*min_lon, *min_lat, *max_lon, *max_lat));
    }
    header
}

fn run(config: &RunConfig) -> Result<()> {
    let mut file = OutputFile::from_name(&config.output_path)?;
    for (name, value) in &config.options {
        file.set(name.as_str(), value.as_str());
    }

    let entities = load_entity_cache(Path::new(&config.input_path))?;
    let blocks = Buffer::split_into_blocks(entities, config.block_size);

    let pool = Arc::new(Pool::new(config.threads.unwrap_or_else(Pool::default_size))?);
    info!(
        threads = pool.num_threads(),
        blocks = blocks.len(),
        output = config.output_path.as_str();
        "Writing output"
    );

    let sink = BufWriter::new(File::create(&config.output_path)?);
    let registry = OutputFormatRegistry::with_defaults();
    let mut output = registry.create(&file, pool, Box::new(sink))?;

    output.write_header(&build_header(config))?;
    for block in tqdm(blocks.into_iter()) {
        output.write_buffer(block)?;
    }
    output.write_end()?;

    info!(output = config.output_path.as_str(); "Done");
    Ok(())
}

fn main() -> ExitCode {
    let Some(config_path) = env::args().nth(1) else {
        eprintln!("usage: osm_xml_writer <config.json>");
        return ExitCode::FAILURE;
    };

    let config = match load_run_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config.log_level);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(err = err.message.as_str(), kind = format!("{:?}", err.kind); "Run failed");
            ExitCode::FAILURE
        }
    }
}
