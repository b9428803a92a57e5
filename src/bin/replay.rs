use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::AsyncReadExt;

use workflow_exporter::projection::{
    HandlerRegistry, NoHierarchy, ProjectionRunner, RecordingOperationSink,
};
use workflow_exporter::telemetry::{init_telemetry, TelemetryConfig};
use workflow_exporter::{ExporterConfig, InMemoryDocumentStore, Record};

fn print_help() {
    eprintln!(
        "\
projection-replay

Replays NDJSON engine records through the projection into an in-memory
store and prints the resulting documents.

USAGE:
  projection-replay [options]

OPTIONS:
  --input <path>          NDJSON records (default: stdin)
  --batch-size <n>        Records per exported batch (default: 100)
  --index <name>          Only print documents of this index (full name)
  --format <json|ndjson>  Output format (default: ndjson)
  --stats                 Print export statistics to stderr
  -h, --help

ENV:
  EXPORTER_INDEX_PREFIX / EXPORTER_BULK_CHUNK_SIZE / EXPORTER_CONTINUE_ON_MAPPING_ERROR
  LOG_LEVEL / LOG_JSON / LOG_CONSOLE
"
    );
}

#[derive(Debug)]
struct Options {
    input: Option<String>,
    batch_size: usize,
    index: Option<String>,
    format: OutputFormat,
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Ndjson,
}

fn parse_options(mut args: VecDeque<String>) -> anyhow::Result<Option<Options>> {
    let mut options = Options {
        input: None,
        batch_size: 100,
        index: None,
        format: OutputFormat::Ndjson,
        stats: false,
    };

    while let Some(arg) = args.pop_front() {
        match arg.as_str() {
            "--input" => {
                options.input = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --input"))?,
                );
            }
            "--batch-size" => {
                let raw = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --batch-size"))?;
                options.batch_size = raw
                    .parse()
                    .with_context(|| format!("invalid --batch-size: {raw}"))?;
                if options.batch_size == 0 {
                    anyhow::bail!("--batch-size must be at least 1");
                }
            }
            "--index" => {
                options.index = Some(
                    args.pop_front()
                        .ok_or_else(|| anyhow::anyhow!("missing value for --index"))?,
                );
            }
            "--format" => {
                let raw = args
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("missing value for --format"))?;
                options.format = match raw.as_str() {
                    "json" => OutputFormat::Json,
                    "ndjson" => OutputFormat::Ndjson,
                    other => anyhow::bail!("unknown format: {other}"),
                };
            }
            "--stats" => options.stats = true,
            "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    Ok(Some(options))
}

async fn read_input(input: Option<&str>) -> anyhow::Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {path}")),
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}

fn parse_records(input: &str) -> anyhow::Result<Vec<Record>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid record on line {}", number + 1))
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: VecDeque<String> = std::env::args().skip(1).collect();
    let Some(options) = parse_options(args)? else {
        print_help();
        return Ok(());
    };

    init_telemetry(&TelemetryConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;

    let records = parse_records(&read_input(options.input.as_deref()).await?)?;

    let config = ExporterConfig::from_env();
    let store = Arc::new(InMemoryDocumentStore::new());
    let operations = Arc::new(RecordingOperationSink::new());
    let registry = HandlerRegistry::standard(&config, Arc::new(NoHierarchy), operations.clone());
    let runner = ProjectionRunner::new(config, Arc::new(registry), store.clone())?;

    for chunk in records.chunks(options.batch_size) {
        let outcome = runner.export_batch(chunk).await?;
        for failure in &outcome.mapping_failures {
            eprintln!("mapping failure: {failure}");
        }
        for failure in &outcome.persistence_failures {
            eprintln!("write failure: {failure}");
        }
    }

    let documents: Vec<serde_json::Value> = store
        .snapshot()
        .await
        .into_iter()
        .filter(|(index, _, _)| options.index.as_deref().map_or(true, |wanted| wanted == index))
        .map(|(index, id, document)| {
            serde_json::json!({
                "index": index,
                "id": id,
                "document": document,
            })
        })
        .collect();

    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&documents)?),
        OutputFormat::Ndjson => {
            for document in &documents {
                println!("{}", serde_json::to_string(document)?);
            }
        }
    }

    if options.stats {
        let stats = runner.stats().await;
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
        for completion in operations.completions() {
            eprintln!(
                "operation completed: {} process_instance_key={} target_key={}",
                completion.operation, completion.process_instance_key, completion.target_key
            );
        }
    }

    Ok(())
}
