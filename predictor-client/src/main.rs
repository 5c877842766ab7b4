use anyhow::{Context, Result};
use clap::{Args, Parser};
use colored::*;
use logger_redacted::LoggerConfig;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use predictor_client::{ClientAdapter, ClientConfig, ClientError, Prediction, PredictionSource};
use predictor_core::{FlagInput, PatientRecordInput, PredictorError};

/// Predict whether a COVID patient will be hospitalized
#[derive(Parser, Debug)]
#[command(name = "covid-predict")]
#[command(about = "Predict whether a COVID patient will be hospitalized")]
#[command(version)]
struct Cli {
    /// Patient record as a JSON file, `-` for stdin; replaces the field flags
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,

    #[command(flatten)]
    patient: PatientArgs,

    /// Prediction service base URL [default: $PREDICTOR_API_URL or http://127.0.0.1:8001]
    #[arg(long)]
    api_url: Option<String>,

    /// Remote call timeout in milliseconds [default: $PREDICTOR_TIMEOUT_MS or 10000]
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Local model bundle used when the service is unreachable [default: $PREDICTOR_LOCAL_MODEL]
    #[arg(long)]
    model: Option<PathBuf>,

    /// Print the prediction as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
#[command(next_help_heading = "Patient fields")]
struct PatientArgs {
    #[arg(long, default_value_t = 30, allow_negative_numbers = true)]
    age: i64,
    #[arg(long, default_value = "Male")]
    gender: String,
    #[arg(long, default_value = "Hovedstaden")]
    region: String,
    #[arg(long, default_value = "Cardiovascular")]
    preexisting_condition: String,
    #[arg(long, default_value = "Alpha")]
    covid_strain: String,
    #[arg(long, default_value = "Mild")]
    symptoms: String,
    #[arg(long, default_value = "Low")]
    severity: String,
    #[arg(long, default_value = "Yes")]
    icu_admission: String,
    #[arg(long, default_value = "Yes")]
    ventilator_support: String,
    #[arg(long, default_value = "Yes")]
    recovered: String,
    #[arg(long, default_value = "Yes")]
    reinfection: String,
    #[arg(long, default_value = "Yes")]
    vaccination_status: String,
    #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
    doses_received: i64,
    #[arg(long, default_value = "Student")]
    occupation: String,
    #[arg(long, default_value = "Never")]
    smoking_status: String,
    #[arg(long, default_value_t = 22.0, allow_negative_numbers = true)]
    bmi: f64,
}

impl From<PatientArgs> for PatientRecordInput {
    fn from(args: PatientArgs) -> Self {
        Self {
            age: args.age,
            gender: args.gender,
            region: args.region,
            preexisting_condition: args.preexisting_condition,
            covid_strain: args.covid_strain,
            symptoms: args.symptoms,
            severity: args.severity,
            icu_admission: FlagInput::Text(args.icu_admission),
            ventilator_support: FlagInput::Text(args.ventilator_support),
            recovered: FlagInput::Text(args.recovered),
            reinfection: FlagInput::Text(args.reinfection),
            vaccination_status: args.vaccination_status,
            doses_received: args.doses_received,
            occupation: args.occupation,
            smoking_status: args.smoking_status,
            bmi: args.bmi,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let logger = LoggerConfig::from_env(["covid-predict", "predictor-client", "predictor-core"])?
        .with_level("warn")
        .log_to_stderr(true)
        .verbose(cli.verbose);
    logger_redacted::init(&logger)?;

    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(model) = cli.model {
        config.local_model_path = Some(model);
    }

    let input = match &cli.record {
        Some(path) => read_record(path)?,
        None => cli.patient.into(),
    };

    let adapter = ClientAdapter::from_config(&config)?;
    let prediction = adapter.predict_input(&input).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
    } else {
        print_prediction(&prediction);
    }
    Ok(())
}

fn read_record(path: &Path) -> Result<PatientRecordInput> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read patient record from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read patient record from {}", path.display()))?
    };
    let value: serde_json::Value = serde_json::from_str(&raw).context("Patient record is not valid JSON")?;
    Ok(PatientRecordInput::from_json(&value).map_err(ClientError::InvalidInput)?)
}

fn print_prediction(prediction: &Prediction) {
    let source = match prediction.source {
        PredictionSource::Remote => "prediction service".bright_blue(),
        PredictionSource::LocalFallback => "local model (service unreachable)".bright_yellow(),
    };
    let result = &prediction.result;

    println!("{} {}", "Source:".bold(), source);
    println!("{} {}", "Prediction:".bold(), result.prediction.bright_white().bold());
    println!("{} {:.2}%", "Confidence:".bold(), result.confidence * 100.0);
    println!("{}", "Probabilities:".bold());
    for (label, probability) in &result.probabilities {
        println!("  {:<20} {:>7.2}%", label, probability * 100.0);
    }
}

fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<ClientError>() {
        Some(client_error) => {
            eprintln!(
                "{} {}",
                format!("[{}]", client_error.kind()).bright_red().bold(),
                client_error
            );
            if let ClientError::InvalidInput(PredictorError::InvalidInput { field_errors, .. }) =
                client_error
            {
                for (field, messages) in field_errors {
                    for message in messages {
                        eprintln!("  {}: {}", field.bright_yellow(), message);
                    }
                }
            }
        }
        None => eprintln!("{} {:#}", "[error]".bright_red().bold(), error),
    }
}
