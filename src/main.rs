mod cli;

use cli::{CliError, Command, InspectConfig, RunConfig, USAGE};
use tracing_subscriber::EnvFilter;
use trapqc_core::router::join_reasons;
use trapqc_core::{
    print_inspection, print_summary, progress, write_json, ImageClassifier, QualityControlRouter,
    RoutingDecision,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = Command::from_env().unwrap_or_else(|err| match err {
        CliError::Help => {
            println!("{}", USAGE);
            std::process::exit(0);
        }
        _ => {
            eprintln!("{}", err);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    });

    match command {
        Command::Run(config) => run_quality_control(config),
        Command::Inspect(config) => run_inspect(config),
    }
}

fn run_quality_control(config: RunConfig) {
    let classifier_config = config.overrides.resolve().unwrap_or_else(|error| {
        eprintln!("Invalid configuration: {}", error);
        std::process::exit(1);
    });

    if let Some(path) = config.write_config.as_ref() {
        match classifier_config.save(path) {
            Ok(_) => println!("Configuration written to {}", path.display()),
            Err(error) => eprintln!("Error writing configuration: {}", error),
        }
    }

    let router = QualityControlRouter::new(classifier_config)
        .with_threading(config.threading)
        .with_dry_run(config.dry_run);

    let progress_bar = progress::run_bar(config.show_progress);
    let summary = router.run(&config.root, &progress_bar).unwrap_or_else(|error| {
        progress_bar.abandon();
        eprintln!("Error: {}", error);
        std::process::exit(1);
    });
    progress_bar.finish_with_message("Quality control complete");

    print_summary(&summary);

    if let Some(path) = config.report.as_ref() {
        match write_json(&summary, path) {
            Ok(_) => println!("JSON report written to {}", path.display()),
            Err(error) => eprintln!("Error writing JSON report: {}", error),
        }
    }
}

fn run_inspect(config: InspectConfig) {
    let classifier_config = config.overrides.resolve().unwrap_or_else(|error| {
        eprintln!("Invalid configuration: {}", error);
        std::process::exit(1);
    });

    let raster = trapqc_core::load_raster(&config.image).unwrap_or_else(|error| {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    });

    let classifier = ImageClassifier::new(classifier_config);
    let result = classifier.inspect(&raster);
    print_inspection(&config.image, &result);

    match RoutingDecision::from_result(&classifier.enabled_outcomes(&result)) {
        RoutingDecision::Retain => println!("Decision: retain"),
        RoutingDecision::Relocate { reasons } => {
            println!("Decision: relocate [{}]", join_reasons(&reasons))
        }
    }
}
