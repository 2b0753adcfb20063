mod cli;

use dvml::eval::functions::BUILTINS;
use dvml::hcl_documents::HclDocuments;
use dvml::model::{Model, Registry};
use dvml::target::TargetSchemas;
use dvml::value::Value;
use indexmap::IndexMap;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_env("DVML_LOG")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

fn run(cli: &cli::Cli) -> anyhow::Result<()> {
    let documents = load(cli)?;

    let mut registry = Registry::default();
    if let Some(schema) = &cli.schema {
        let mut schema_documents = HclDocuments::default();
        schema_documents.load_file(schema)?;
        registry.targets = TargetSchemas::from_documents(&schema_documents)
            .map_err(dvml::model::Error::from)?;
    }

    let model = Model::decode(&documents, &registry).map_err(dvml::model::Error::from)?;
    let targets = model.evaluate(&registry.targets, &BUILTINS)?;

    let mut rendered = IndexMap::from_iter([("targets".to_string(), targets.to_value())]);
    if cli.tree {
        rendered.insert("model".to_string(), model.to_value());
    }

    output(&cli.output, &Value::Object(rendered))
}

fn load(cli: &cli::Cli) -> anyhow::Result<HclDocuments> {
    let mut documents = HclDocuments::default();

    if let Some(dir_path) = &cli.dir {
        documents.load_directory(dir_path)?;
    }

    if let Some(file_path) = &cli.file {
        documents.load_file(file_path)?;
    }

    tracing::info!(files = documents.source_count(), "documents loaded");
    Ok(documents)
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), value)?;
            println!();
        }
    };

    Ok(())
}
