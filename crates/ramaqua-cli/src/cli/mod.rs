mod commands;

use clap::Parser;
use ramaqua_core::CoreError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("ERROR: {error}");
            let mut source = std::error::Error::source(&error);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("ramaqua".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "ramaqua",
    about = "Raman spectroscopy water-content estimation for glasses"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Reduce a sample table to band areas and water/silicate ratios
    Reduce(commands::ReduceArgs),
    /// Reduce a calibration table and fit a calibration model
    Calibrate(commands::CalibrateArgs),
    /// Reduce a sample table and predict water contents
    Predict(commands::PredictArgs),
    /// Estimate water contents against reference spectra of known content
    External(commands::ExternalArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Reduce(args) => commands::run_reduce_command(args),
        CliCommand::Calibrate(args) => commands::run_calibrate_command(args),
        CliCommand::Predict(args) => commands::run_predict_command(args),
        CliCommand::External(args) => commands::run_external_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Compute(#[from] CoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Compute(error) => match error {
                CoreError::UnsupportedMethod { .. } | CoreError::Config { .. } => 2,
                CoreError::Table { .. } | CoreError::SpectrumFile { .. } => 3,
                _ => 4,
            },
            Self::Internal(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};
    use ramaqua_core::CoreError;

    #[test]
    fn usage_errors_map_to_exit_code_two() {
        let error = run(["reduce"]).expect_err("missing required args");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn compute_errors_carry_category_exit_codes() {
        let unsupported = CliError::Compute(CoreError::UnsupportedMethod {
            label: "wavelet".to_string(),
            expected: "'spline', 'polynomial'",
        });
        assert_eq!(unsupported.exit_code(), 2);

        let missing_table = CliError::Compute(CoreError::Table {
            path: "liste.csv".into(),
            detail: "missing required column 'Name'".to_string(),
        });
        assert_eq!(missing_table.exit_code(), 3);

        let underdetermined = CliError::Compute(CoreError::UnderdeterminedFit {
            rows: 1,
            parameters: 2,
        });
        assert_eq!(underdetermined.exit_code(), 4);
    }
}
