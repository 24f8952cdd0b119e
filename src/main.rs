use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use apiref::analyzer::{Cancellation, ProblemDetector, ReferenceAnalyzer};
use apiref::detectors::{MissingReferenceDetector, SystemApiDetector, reporting_descriptor};
use apiref::extract::{ExtractorConfig, extract_all};
use apiref::scan::{scan_baseline, scan_inputs};
use apiref::universe::ClassUniverse;
use clap::Parser;
use serde_json::json;
use serde_sarif::sarif::{
    Artifact, Invocation, ReportingDescriptor, Result as SarifResult, Run, SCHEMA_URL, Sarif, Tool,
    ToolComponent,
};
use tracing_subscriber::EnvFilter;

/// CLI arguments for apiref execution.
#[derive(Parser, Debug)]
#[command(
    name = "apiref",
    about = "Find references from JVM class and JAR files that their classpath or execution environment cannot satisfy.",
    version
)]
struct Cli {
    /// Class file, JAR file or directory to analyze.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Classes the input is compiled against; repeatable.
    #[arg(long, value_name = "PATH")]
    baseline: Vec<PathBuf>,
    /// Stub classes describing the minimum execution environment.
    #[arg(long, value_name = "PATH")]
    system_stubs: Option<PathBuf>,
    /// Also report references from a type to itself and its member types.
    #[arg(long)]
    include_local_refs: bool,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    run(cli)
}

/// Logs go to stderr so SARIF on stdout stays clean.
fn init_tracing(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("input not found: {}", cli.input.display());
    }
    for entry in &cli.baseline {
        if !entry.exists() {
            anyhow::bail!("baseline entry not found: {}", entry.display());
        }
    }
    if let Some(stubs) = &cli.system_stubs {
        if !stubs.exists() {
            anyhow::bail!("system stubs not found: {}", stubs.display());
        }
    }

    let started_at = Instant::now();
    let scan = scan_inputs(&cli.input, &cli.baseline)?;
    let class_count = scan.class_count();
    let universe = Arc::new(ClassUniverse::new(
        scan.classes.iter().cloned().chain(scan.baseline),
    ));

    let mut detectors: Vec<Box<dyn ProblemDetector>> =
        vec![Box::new(MissingReferenceDetector::new(universe.clone()))];
    if let Some(stubs) = &cli.system_stubs {
        let stubs = scan_baseline(std::slice::from_ref(stubs))?;
        detectors.push(Box::new(SystemApiDetector::new(ClassUniverse::new(
            stubs.baseline,
        ))));
    }
    let mut analyzer = ReferenceAnalyzer::new(detectors);

    let config = ExtractorConfig {
        include_local_refs: cli.include_local_refs,
        reference_kinds: analyzer.reference_kinds(),
    };
    let extraction = extract_all(&scan.classes, universe.as_ref(), config);
    let failure_count = scan.failures.len() + extraction.failures.len();
    let mut references = extraction.into_references();
    let reference_count = references.len();
    analyzer.analyze(&mut references, universe.as_ref(), &Cancellation::new());

    let rules = analyzer.metadata().iter().map(reporting_descriptor).collect();
    let results = analyzer.problems();
    let result_count = results.len();
    let artifact_count = scan.artifacts.len();
    let invocation = build_invocation();
    let sarif = build_sarif(scan.artifacts, rules, results, invocation);

    let mut writer = output_writer(cli.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &sarif)
        .context("failed to serialize SARIF output")?;
    writer
        .write_all(b"\n")
        .context("failed to write SARIF output")?;

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} classes={} artifacts={} references={} results={} failures={}",
            started_at.elapsed().as_millis(),
            class_count,
            artifact_count,
            reference_count,
            result_count,
            failure_count
        );
    }

    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

fn build_invocation() -> Invocation {
    let arguments: Vec<String> = std::env::args().collect();
    let command_line = arguments.join(" ");

    Invocation::builder()
        .execution_successful(true)
        .arguments(arguments)
        .command_line(command_line)
        .build()
}

fn build_sarif(
    artifacts: Vec<Artifact>,
    rules: Vec<ReportingDescriptor>,
    results: Vec<SarifResult>,
    invocation: Invocation,
) -> Sarif {
    let driver = ToolComponent::builder()
        .name("apiref")
        .version(env!("CARGO_PKG_VERSION"))
        .rules(rules)
        .build();
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiref::analyzer::DetectorMetadata;

    #[test]
    fn sarif_is_minimal_and_valid_shape() {
        let invocation = Invocation::builder()
            .execution_successful(true)
            .arguments(Vec::<String>::new())
            .build();
        let sarif = build_sarif(Vec::new(), Vec::new(), Vec::new(), invocation);
        let value = serde_json::to_value(&sarif).expect("serialize SARIF");

        assert_eq!(value["version"], "2.1.0");
        assert_eq!(value["$schema"], SCHEMA_URL);
        assert_eq!(value["runs"][0]["tool"]["driver"]["name"], "apiref");
        assert!(
            value["runs"][0]["results"]
                .as_array()
                .expect("results array")
                .is_empty()
        );
        assert_eq!(
            value["runs"][0]["invocations"][0]["executionSuccessful"],
            true
        );
    }

    #[test]
    fn sarif_lists_detector_rules() {
        let invocation = Invocation::builder()
            .execution_successful(true)
            .arguments(Vec::<String>::new())
            .build();
        let metadata = DetectorMetadata {
            id: "MISSING_REFERENCE",
            name: "Missing reference",
            description: "References to types or members absent from the analyzed classpath",
        };
        let sarif = build_sarif(
            Vec::new(),
            vec![reporting_descriptor(&metadata)],
            Vec::new(),
            invocation,
        );
        let value = serde_json::to_value(&sarif).expect("serialize SARIF");

        let rule = &value["runs"][0]["tool"]["driver"]["rules"][0];
        assert_eq!(rule["id"], "MISSING_REFERENCE");
        assert_eq!(
            rule["shortDescription"]["text"],
            "References to types or members absent from the analyzed classpath"
        );
    }
}
