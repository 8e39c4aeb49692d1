//! sparql2thingtalk CLI: convert single queries or whole QALD-style datasets
//!
//! Every conversion goes through the same pipeline: the shortcut table is
//! consulted first, then the rule-based preprocessor, then the converter
//! whose output is post-processed against the utterance.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use serde::Deserialize;
use sparql2thingtalk::text::tokenize;
use sparql2thingtalk::{
    CodeKind, ConverterConfig, ConverterOptions, KnowledgeBase, PatternConverter, PostProcessor,
    RuleBasedPreprocessor, Schema, SparqlToThingTalkConverter, WikidataClient,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "sparql2thingtalk", version, about = "SPARQL to ThingTalk converter")]
struct Cli {
    /// Converter configuration (YAML)
    #[arg(long, global = true, env = "SPARQL2THINGTALK_CONFIG")]
    config: Option<PathBuf>,

    /// Domain/property schema document, overrides `schema_path`
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Knowledge-base cache directory, overrides `cache_path`
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Query the knowledge base without the persistent cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Emit entities without display strings
    #[arg(long, global = true)]
    exclude_entity_display: bool,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Language {
    Sparql,
    Thingtalk,
}

impl From<Language> for CodeKind {
    fn from(language: Language) -> Self {
        match language {
            Language::Sparql => CodeKind::Sparql,
            Language::Thingtalk => CodeKind::ThingTalk,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one SPARQL query
    Convert {
        /// The SPARQL query
        sparql: String,

        /// The question the query answers
        #[arg(long, default_value = "")]
        utterance: String,

        /// Skip post-processing
        #[arg(long)]
        raw: bool,

        /// Print the expression tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Convert a QALD-style JSON dataset into TSV
    Batch {
        /// QALD-style dataset
        input: PathBuf,

        /// TSV output (`id`, `utterance`, `target`); stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Failed records (`id`, `utterance`, `sparql`, `error`)
        #[arg(long)]
        drop_file: Option<PathBuf>,

        /// Records to skip at the start of the dataset
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Look code up in the shortcut table
    Pattern {
        code: String,

        /// Language of `code`
        #[arg(long, value_enum, default_value = "sparql")]
        from: Language,
    },
    /// Apply the rule-based rewrites
    Preprocess {
        code: String,

        /// Language of `code`
        #[arg(long, value_enum, default_value = "sparql")]
        from: Language,
    },
}

#[derive(Deserialize)]
struct Dataset {
    questions: Vec<Record>,
}

#[derive(Deserialize)]
struct Record {
    id: serde_json::Value,
    question: Vec<Question>,
    query: RecordQuery,
}

#[derive(Deserialize)]
struct Question {
    string: String,
}

#[derive(Deserialize)]
struct RecordQuery {
    sparql: String,
}

/// Where a target program came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Shortcut,
    Converter,
}

/// Everything loaded once per process and shared by every conversion
struct Pipeline {
    patterns: PatternConverter,
    preprocessor: RuleBasedPreprocessor,
    converter: SparqlToThingTalkConverter,
    postprocessor: PostProcessor,
}

impl Pipeline {
    async fn load(config: &ConverterConfig, no_cache: bool) -> anyhow::Result<Self> {
        let schema_path = config
            .schema_path
            .as_ref()
            .ok_or_else(|| anyhow!("no schema document, pass --schema or set schema_path"))?;
        let schema = Schema::load(schema_path)?;

        let kb: Arc<dyn KnowledgeBase> = if no_cache {
            Arc::new(WikidataClient::new(config)?)
        } else {
            Arc::new(WikidataClient::with_cache(config)?)
        };

        let patterns = match &config.patterns_path {
            Some(path) => PatternConverter::load(path)?,
            None => PatternConverter::embedded()?,
        };
        let abstract_properties = Arc::new(config.abstract_properties()?);
        let postprocessor = PostProcessor::load(kb.as_ref(), &abstract_properties, schema.device()).await?;
        let converter = SparqlToThingTalkConverter::new(
            Arc::new(schema),
            kb.clone(),
            abstract_properties,
            ConverterOptions {
                exclude_entity_display: config.exclude_entity_display,
            },
        );

        Ok(Self {
            patterns,
            preprocessor: RuleBasedPreprocessor::new(kb),
            converter,
            postprocessor,
        })
    }

    async fn run(&self, sparql: &str, utterance: &str) -> anyhow::Result<(String, Source)> {
        if let Some(program) = self.patterns.from_sparql(sparql) {
            return Ok((program, Source::Shortcut));
        }
        let sparql = self.preprocessor.preprocess(sparql, CodeKind::Sparql).await?;
        let expression = self.converter.convert(&sparql, utterance).await?;
        let expression = self.postprocessor.post_process(utterance, expression);
        Ok((expression.to_statement(), Source::Converter))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ConverterConfig> {
    let mut config = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::default(),
    };
    if let Some(schema) = &cli.schema {
        config.schema_path = Some(schema.clone());
    }
    if let Some(cache) = &cli.cache {
        config.cache_path = cache.clone();
    }
    if cli.exclude_entity_display {
        config.exclude_entity_display = true;
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Convert {
            sparql,
            utterance,
            raw,
            json,
        } => {
            let pipeline = Pipeline::load(&config, cli.no_cache).await?;
            run_convert(&pipeline, &sparql, &utterance, raw, json).await
        }
        Commands::Batch {
            input,
            output,
            drop_file,
            offset,
        } => {
            let pipeline = Pipeline::load(&config, cli.no_cache).await?;
            run_batch(&pipeline, &input, output.as_deref(), drop_file.as_deref(), offset).await
        }
        Commands::Pattern { code, from } => run_pattern(&config, &code, from),
        Commands::Preprocess { code, from } => {
            let kb = WikidataClient::with_cache(&config)?;
            let preprocessor = RuleBasedPreprocessor::new(Arc::new(kb));
            println!("{}", preprocessor.preprocess(&code, from.into()).await?);
            Ok(())
        }
    }
}

async fn run_convert(
    pipeline: &Pipeline,
    sparql: &str,
    utterance: &str,
    raw: bool,
    json: bool,
) -> anyhow::Result<()> {
    let utterance = tokenize(utterance);

    if json {
        let expression = pipeline.converter.convert(sparql, &utterance).await?;
        let expression = if raw {
            expression
        } else {
            pipeline.postprocessor.post_process(&utterance, expression)
        };
        println!("{}", serde_json::to_string_pretty(&expression)?);
        return Ok(());
    }

    if raw {
        let expression = pipeline.converter.convert(sparql, &utterance).await?;
        println!("{}", expression.to_statement());
    } else {
        let (program, _) = pipeline.run(sparql, &utterance).await?;
        println!("{}", program);
    }
    Ok(())
}

fn open_writer(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    })
}

fn record_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn run_batch(
    pipeline: &Pipeline,
    input: &Path,
    output: Option<&Path>,
    drop_file: Option<&Path>,
    offset: usize,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let dataset: Dataset = serde_json::from_str(&content)?;
    info!("Loaded {} records from {}", dataset.questions.len(), input.display());

    let mut out = open_writer(output)?;
    let mut dropped = drop_file.map(|path| open_writer(Some(path))).transpose()?;

    let (mut shortcut, mut converted, mut failed) = (0usize, 0usize, 0usize);
    for record in dataset.questions.iter().skip(offset) {
        let id = record_id(&record.id);
        let Some(question) = record.question.first() else {
            warn!("Record {} has no question, skipping", id);
            failed += 1;
            continue;
        };
        let utterance = tokenize(&question.string);
        let sparql = single_line(&record.query.sparql);

        match pipeline.run(&sparql, &utterance).await {
            Ok((program, source)) => {
                match source {
                    Source::Shortcut => shortcut += 1,
                    Source::Converter => converted += 1,
                }
                writeln!(out, "{}\t{}\t{}", id, utterance, program)?;
            }
            Err(e) => {
                failed += 1;
                warn!("Record {} failed: {:#}", id, e);
                if let Some(dropped) = dropped.as_mut() {
                    writeln!(dropped, "{}\t{}\t{}\t{}", id, utterance, sparql, single_line(&format!("{:#}", e)))?;
                }
            }
        }
    }
    out.flush()?;
    if let Some(mut dropped) = dropped {
        dropped.flush()?;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Records", "Skipped", "Shortcut", "Converted", "Failed"]);
    table.add_row(vec![
        dataset.questions.len().to_string(),
        offset.min(dataset.questions.len()).to_string(),
        shortcut.to_string(),
        converted.to_string(),
        failed.to_string(),
    ]);
    eprintln!("{}", table);
    Ok(())
}

fn run_pattern(config: &ConverterConfig, code: &str, from: Language) -> anyhow::Result<()> {
    let patterns = match &config.patterns_path {
        Some(path) => PatternConverter::load(path)?,
        None => PatternConverter::embedded()?,
    };
    let hit = match from {
        Language::Sparql => patterns.from_sparql(code),
        Language::Thingtalk => patterns.to_sparql(code),
    };
    match hit {
        Some(translated) => println!("{}", translated),
        None => println!("(no pattern)"),
    }
    Ok(())
}
