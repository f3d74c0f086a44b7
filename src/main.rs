use clap::{Arg, Command};
use idea_validator::config::Config;
use idea_validator::shell::{Shell, SubmissionStatus};
use idea_validator::validator::IdeaValidator;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("validate")
        .about("Startup idea validator - de-risk your idea before building")
        .long_about("Sends a short description of a business idea to a hosted LLM crew and prints a markdown validation report: score, signals and recommendations")
        .arg(Arg::new("idea")
            .help("Description of the idea to validate")
            .num_args(1..))
        .arg(Arg::new("interactive")
            .long("interactive")
            .short('i')
            .help("Validate several ideas in one session")
            .action(clap::ArgAction::SetTrue))
        .arg(Arg::new("output-dir")
            .long("output-dir")
            .short('o')
            .help("Directory to save validator_report.md into")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Save an API key, e.g. --set-api-key GROQ_API_KEY gsk_...")
            .value_names(["CREDENTIAL", "API_KEY"])
            .num_args(2))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(clap::ArgAction::SetTrue))
        .get_matches();

    // Handle configuration commands
    if let Some(mut values) = matches.get_many::<String>("set-api-key") {
        let (Some(credential), Some(api_key)) = (values.next(), values.next()) else {
            anyhow::bail!("--set-api-key needs a credential name and a key");
        };
        // Env overrides must not be written back to the file.
        let mut config = Config::load_file_or_default()?;
        config.set_api_key(credential, api_key.clone())?;
        config.save()?;
        println!("✅ API key for {} saved successfully", credential);
        return Ok(());
    }

    if matches.get_flag("config") {
        Config::show_config_info()?;
        return Ok(());
    }

    let config = Config::load()?;
    let validator = IdeaValidator::from_config(&config)?;
    let output_dir = matches.get_one::<PathBuf>("output-dir").cloned();
    let mut shell = Shell::new(&validator, output_dir);

    if matches.get_flag("interactive") {
        return shell.run().await;
    }

    let idea = matches
        .get_many::<String>("idea")
        .unwrap_or_default()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    if idea.trim().is_empty() {
        eprintln!("No idea provided. Use 'validate --help' for usage information.");
        return Ok(());
    }

    info!("Validating idea: {}", idea);
    match shell.submit(&idea).await? {
        SubmissionStatus::Reported { .. } => Ok(()),
        SubmissionStatus::Throttled | SubmissionStatus::Failed => std::process::exit(1),
    }
}
