//! `pd-migrate`: upgrade protocol documents from the command line

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pd_catalog::{DefinitionCatalog, InMemoryCatalog};
use pd_migration::{
    MigrationConfig, MigrationDriver, MigrationOutcome, ProtocolDocument, SchemaVersion,
};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("pd-migrate")
        .version(pd_migration::VERSION)
        .about("Upgrade protocol documents to the current schema")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON on stderr"),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate one or more documents")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf))
                        .help("Protocol JSON file(s)"),
                )
                .arg(
                    Arg::new("definitions")
                        .long("definitions")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of labware definition *.json files"),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .help("Target version (default: configured or current)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file, or directory when migrating several inputs"),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .action(ArgAction::SetTrue)
                        .help("Print the stage report as JSON on stderr"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show a document's version and the stages it would run")
                .arg(
                    Arg::new("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(Arg::new("target").long("target").help("Target version")),
        )
        .subcommand(Command::new("stages").about("List the registered migration chain"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn parse_target(args: &ArgMatches) -> Result<Option<SchemaVersion>> {
    args.get_one::<String>("target")
        .map(|raw| {
            raw.parse::<SchemaVersion>()
                .with_context(|| format!("invalid --target '{raw}'"))
        })
        .transpose()
}

fn read_document(path: &Path) -> Result<ProtocolDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a protocol document", path.display()))
}

/// Built-in split table plus every `*.json` definition in `dir`
fn load_catalog(dir: Option<&Path>) -> Result<InMemoryCatalog> {
    let mut catalog = InMemoryCatalog::with_builtin_splits();
    let Some(dir) = dir else {
        return Ok(catalog);
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read definitions directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let body: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not JSON", path.display()))?;
        let uri = catalog
            .insert_value(body)
            .with_context(|| format!("invalid definition {}", path.display()))?;
        tracing::debug!("Loaded definition {} from {}", uri, path.display());
    }
    tracing::info!("Definition catalog: {} definition(s)", catalog.len());
    Ok(catalog)
}

fn load_config(args: &ArgMatches) -> Result<MigrationConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => MigrationConfig::from_file(path)?,
        None => MigrationConfig::default(),
    };
    if let Some(target) = parse_target(args)? {
        config = config.with_target_version(target);
    }
    Ok(config)
}

fn write_outcome(outcome: &MigrationOutcome, output: Option<&Path>, report: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(&outcome.document)?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => println!("{json}"),
    }
    if report {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }
    Ok(())
}

/// Output file name for each input; two inputs may not share one
fn output_names<'p>(inputs: &[&'p PathBuf]) -> Result<Vec<&'p OsStr>> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let name = input
                .file_name()
                .with_context(|| format!("{} has no file name", input.display()))?;
            if !seen.insert(name) {
                bail!(
                    "several inputs are named {}; their outputs would overwrite each other",
                    name.to_string_lossy()
                );
            }
            Ok(name)
        })
        .collect()
}

fn run_migrate(args: &ArgMatches) -> Result<()> {
    let config = load_config(args)?;
    let catalog = load_catalog(args.get_one::<PathBuf>("definitions").map(PathBuf::as_path))?;
    let catalog: Arc<dyn DefinitionCatalog> = Arc::new(catalog);
    let driver = MigrationDriver::new(catalog).with_config(config);

    let inputs: Vec<&PathBuf> = args.get_many::<PathBuf>("input").into_iter().flatten().collect();
    let output = args.get_one::<PathBuf>("output");
    let report = args.get_flag("report");

    if let [input] = inputs.as_slice() {
        let outcome = driver
            .migrate(read_document(input)?)
            .with_context(|| format!("cannot migrate {}", input.display()))?;
        return write_outcome(&outcome, output.map(PathBuf::as_path), report);
    }

    let Some(dir) = output else {
        bail!("--output <DIR> is required when migrating several documents");
    };
    let names = output_names(&inputs)?;
    std::fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;

    let mut failed = 0;
    let mut readable = Vec::with_capacity(inputs.len());
    let mut docs = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        match read_document(input) {
            Ok(doc) => {
                readable.push(i);
                docs.push(doc);
            }
            Err(e) => {
                failed += 1;
                tracing::error!("{:#}", e);
            }
        }
    }

    for (i, result) in readable.into_iter().zip(driver.migrate_batch(docs)) {
        match result {
            Ok(outcome) => write_outcome(&outcome, Some(&dir.join(names[i])), report)?,
            Err(e) => {
                failed += 1;
                tracing::error!("{}: {}", inputs[i].display(), e);
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} document(s) could not be migrated", inputs.len());
    }
    Ok(())
}

fn run_inspect(args: &ArgMatches) -> Result<()> {
    let path = args.get_one::<PathBuf>("input").context("missing input")?;
    let doc = read_document(path)?;
    let driver = MigrationDriver::new(Arc::new(InMemoryCatalog::new()));
    let from = doc.declared_version();
    let target = parse_target(args)?.unwrap_or(driver.config().target_version);

    println!("Document:        {}", path.display());
    println!("Declared version: {from}");
    println!("Target version:   {target}");
    println!("Commands:         {}", doc.commands.len());
    let plan = driver.registry().plan(from, target)?;
    if plan.is_empty() {
        println!("Up to date");
    } else {
        println!("Stages:");
        for migrator in plan {
            println!(
                "  {:<8} {} -> {}",
                migrator.name(),
                migrator.from_version(),
                migrator.to_version()
            );
        }
    }
    Ok(())
}

fn run_stages() {
    let driver = MigrationDriver::new(Arc::new(InMemoryCatalog::new()));
    for migrator in driver.registry().iter() {
        println!(
            "{:<8} {} -> {}",
            migrator.name(),
            migrator.from_version(),
            migrator.to_version()
        );
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("migrate", args)) => run_migrate(args),
        Some(("inspect", args)) => run_inspect(args),
        Some(("stages", _)) => {
            run_stages();
            Ok(())
        }
        _ => Ok(()),
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_test_utils::definitions::{all_bodies, PCR_PLATE};
    use pd_test_utils::v6_ot2_builder;
    use std::ffi::OsString;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn parses_migrate_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "pd-migrate", "migrate", "a.json", "b.json", "--target", "7.1.0", "-o", "out",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_many::<PathBuf>("input").unwrap().count(), 2);
        assert_eq!(parse_target(args).unwrap(), Some(SchemaVersion::new(7, 1, 0)));
    }

    #[test]
    fn bad_target_is_an_error() {
        let matches = cli()
            .try_get_matches_from(["pd-migrate", "inspect", "a.json", "--target", "latest"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(parse_target(args).is_err());
    }

    #[test]
    fn loads_definitions_directory() {
        let dir = tempfile::tempdir().unwrap();
        for (i, (_, body)) in all_bodies().into_iter().enumerate() {
            std::fs::write(dir.path().join(format!("{i}.json")), body.to_string()).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = load_catalog(Some(dir.path())).unwrap();
        assert_eq!(catalog.len(), all_bodies().len());
        assert!(catalog.get(PCR_PLATE).is_some());
    }

    fn definitions_dir(root: &Path) -> PathBuf {
        let defs = root.join("defs");
        std::fs::create_dir(&defs).unwrap();
        for (i, (_, body)) in all_bodies().into_iter().enumerate() {
            std::fs::write(defs.join(format!("{i}.json")), body.to_string()).unwrap();
        }
        defs
    }

    fn migrate_args(inputs: &[&Path], defs: &Path, output: &Path) -> ArgMatches {
        let mut argv: Vec<OsString> = vec!["pd-migrate".into(), "migrate".into()];
        argv.extend(inputs.iter().map(|p| p.as_os_str().to_owned()));
        argv.extend([
            "--definitions".into(),
            defs.as_os_str().to_owned(),
            "--output".into(),
            output.as_os_str().to_owned(),
        ]);
        cli().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn migrates_file_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let defs = definitions_dir(dir.path());
        let input = dir.path().join("protocol.json");
        std::fs::write(&input, v6_ot2_builder().to_value().to_string()).unwrap();
        let output = dir.path().join("out.json");

        let argv: Vec<OsString> = vec![
            "pd-migrate".into(),
            "migrate".into(),
            input.into_os_string(),
            "--definitions".into(),
            defs.into_os_string(),
            "--output".into(),
            output.clone().into_os_string(),
        ];
        let matches = cli().try_get_matches_from(argv).unwrap();
        run(&matches).unwrap();

        let migrated: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(migrated["schemaVersion"], serde_json::json!(8));
    }

    #[test]
    fn unreadable_input_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let defs = definitions_dir(dir.path());
        let good = dir.path().join("good.json");
        std::fs::write(&good, v6_ot2_builder().to_value().to_string()).unwrap();
        let missing = dir.path().join("missing.json");
        let out = dir.path().join("out");

        let matches = migrate_args(&[missing.as_path(), good.as_path()], &defs, &out);
        let err = run(&matches).unwrap_err();

        assert!(err.to_string().contains("1 of 2"), "{err:#}");
        assert!(out.join("good.json").exists());
        assert!(!out.join("missing.json").exists());
    }

    #[test]
    fn clashing_output_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let defs = definitions_dir(dir.path());
        let mut inputs = Vec::new();
        for sub in ["a", "b"] {
            let path = dir.path().join(sub).join("protocol.json");
            std::fs::create_dir(dir.path().join(sub)).unwrap();
            std::fs::write(&path, v6_ot2_builder().to_value().to_string()).unwrap();
            inputs.push(path);
        }
        let out = dir.path().join("out");

        let matches = migrate_args(&[inputs[0].as_path(), inputs[1].as_path()], &defs, &out);
        let err = run(&matches).unwrap_err();

        assert!(err.to_string().contains("protocol.json"), "{err:#}");
        assert!(!out.exists());
    }

    #[test]
    fn missing_file_cannot_be_opened() {
        let err = read_document(Path::new("/nonexistent/protocol.json")).unwrap_err();
        assert!(err.to_string().contains("cannot open"));
    }

    #[test]
    fn several_inputs_need_an_output_directory() {
        let matches = cli()
            .try_get_matches_from(["pd-migrate", "migrate", "a.json", "b.json"])
            .unwrap();
        let err = run(&matches).unwrap_err();
        assert!(err.to_string().contains("--output"));
    }
}
