use super::CliError;
use anyhow::Context;
use ramaqua_core::{
    external_calibration, fit_model, predict_water, BaselineMethod, BaselineSpec, BatchReducer,
    CalibrationMethod, Delimiter, ExecutionMode, ExternalConfig, ParamSeq, ReductionConfig,
    ReductionOutput, Roi, SampleTable, WaterModel, DEFAULT_LASER_NM, DEFAULT_POLYNOMIAL_ORDER,
    DEFAULT_SPLINE_SMOOTHING, DEFAULT_TEMPERATURE_C,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args, Debug)]
pub struct ReductionOpts {
    /// Sample table file (header row with Name, "Water, wt%", FeO and ROI columns)
    #[arg(long)]
    pub table: PathBuf,
    /// Directory holding the spectrum files named in the table
    #[arg(long)]
    pub spectra: PathBuf,
    /// Baseline strategy: spline | polynomial
    #[arg(long, default_value = "spline")]
    pub method: String,
    /// Column delimiter for table and spectrum files: tab | comma
    #[arg(long, default_value = "tab")]
    pub delimiter: String,
    /// Laser excitation line in nm
    #[arg(long, default_value_t = DEFAULT_LASER_NM)]
    pub laser: f64,
    /// Sample temperature in Celsius
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE_C)]
    pub temperature: f64,
    /// Smoothing coefficient for the spline baseline
    #[arg(long, default_value_t = DEFAULT_SPLINE_SMOOTHING)]
    pub smoothing: f64,
    /// Polynomial order for the piecewise-polynomial baseline
    #[arg(long, default_value_t = DEFAULT_POLYNOMIAL_ORDER)]
    pub polynomial_order: usize,
    /// Number of ROI low/high column pairs in the table
    #[arg(long, default_value_t = 6)]
    pub roi_pairs: usize,
    /// Reduce samples with a parallel worker pool
    #[arg(long)]
    pub parallel: bool,
}

#[derive(clap::Args, Debug)]
pub struct ReduceArgs {
    #[command(flatten)]
    pub reduction: ReductionOpts,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub reduction: ReductionOpts,
    /// Calibration model: saturation | feo-linear
    #[arg(long, default_value = "saturation")]
    pub model: String,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub reduction: ReductionOpts,
    /// Calibration model: saturation | feo-linear
    #[arg(long, default_value = "saturation")]
    pub model: String,
    /// Fitted saturation coefficient; literature value when omitted
    #[arg(long)]
    pub a: Option<f64>,
    /// Fitted FeO slope; literature value when omitted
    #[arg(long)]
    pub slope: Option<f64>,
    /// Fitted FeO intercept; literature value when omitted
    #[arg(long)]
    pub intercept: Option<f64>,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ExternalArgs {
    /// Sample table file with Ref and "Water Ref" columns filled in
    #[arg(long)]
    pub table: PathBuf,
    /// Directory holding the sample spectrum files
    #[arg(long)]
    pub spectra: PathBuf,
    /// Directory holding the reference spectrum files
    #[arg(long)]
    pub references: PathBuf,
    /// Column delimiter for table and spectrum files: tab | comma
    #[arg(long, default_value = "tab")]
    pub delimiter: String,
    /// Number of ROI low/high column pairs in the table
    #[arg(long, default_value_t = 6)]
    pub roi_pairs: usize,
    /// Water-peak integration lower bound in cm^-1
    #[arg(long, default_value_t = 3200.0)]
    pub peak_low: f64,
    /// Water-peak integration upper bound in cm^-1
    #[arg(long, default_value_t = 3750.0)]
    pub peak_high: f64,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct SampleRow {
    name: String,
    silicate_area: f64,
    water_area: f64,
    ratio: f64,
}

#[derive(Serialize)]
struct ReduceReport {
    method: &'static str,
    laser_nm: f64,
    grid_points: usize,
    samples: Vec<SampleRow>,
}

#[derive(Serialize)]
struct CalibrateReport {
    method: &'static str,
    model: WaterModel,
    samples: Vec<SampleRow>,
}

#[derive(Serialize)]
struct PredictReport {
    method: &'static str,
    model: WaterModel,
    names: Vec<String>,
    ratio: Vec<f64>,
    water_predicted: Vec<f64>,
}

#[derive(Serialize)]
struct ExternalReport {
    names: Vec<String>,
    water_predicted: Vec<f64>,
    sample_area: Vec<f64>,
    reference_area: Vec<f64>,
}

pub fn run_reduce_command(args: ReduceArgs) -> Result<i32, CliError> {
    let (table, output) = run_reduction(&args.reduction)?;
    let report = ReduceReport {
        method: BaselineMethod::from_label(&args.reduction.method)?.as_label(),
        laser_nm: args.reduction.laser,
        grid_points: output.grid.len(),
        samples: sample_rows(&table, &output),
    };
    emit(&args.output, &report)?;
    Ok(0)
}

pub fn run_calibrate_command(args: CalibrateArgs) -> Result<i32, CliError> {
    let method = CalibrationMethod::from_label(&args.model)?;
    let (table, output) = run_reduction(&args.reduction)?;

    let feo = table.feo_column();
    let model = fit_model(
        method,
        &output.ratio,
        &table.water_column(),
        Some(&feo),
    )?;
    info!(method = method.as_label(), ?model, "calibration fitted");

    let report = CalibrateReport {
        method: method.as_label(),
        model,
        samples: sample_rows(&table, &output),
    };
    emit(&args.output, &report)?;
    Ok(0)
}

pub fn run_predict_command(args: PredictArgs) -> Result<i32, CliError> {
    let method = CalibrationMethod::from_label(&args.model)?;
    let model = resolve_model(method, args.a, args.slope, args.intercept)?;
    let (table, output) = run_reduction(&args.reduction)?;

    let feo = table.feo_column();
    let water_predicted = predict_water(&model, method, &output.ratio, Some(&feo))?;

    let report = PredictReport {
        method: method.as_label(),
        model,
        names: table
            .records()
            .iter()
            .map(|record| record.name.clone())
            .collect(),
        ratio: output.ratio.clone(),
        water_predicted,
    };
    emit(&args.output, &report)?;
    Ok(0)
}

pub fn run_external_command(args: ExternalArgs) -> Result<i32, CliError> {
    let delimiter = Delimiter::from_label(&args.delimiter)?;
    let table = SampleTable::from_csv(&args.table, delimiter, args.roi_pairs)?;

    let config = ExternalConfig {
        integration_window: Roi::new(args.peak_low, args.peak_high),
        delimiter,
        ..ExternalConfig::default()
    };
    let output = external_calibration(&table, &args.spectra, &args.references, &config)?;
    info!(samples = table.len(), "external calibration complete");

    let report = ExternalReport {
        names: table
            .records()
            .iter()
            .map(|record| record.name.clone())
            .collect(),
        water_predicted: output.water_predicted,
        sample_area: output.sample_area,
        reference_area: output.reference_area,
    };
    emit(&args.output, &report)?;
    Ok(0)
}

fn run_reduction(opts: &ReductionOpts) -> Result<(SampleTable, ReductionOutput), CliError> {
    let method = BaselineMethod::from_label(&opts.method)?;
    let delimiter = Delimiter::from_label(&opts.delimiter)?;
    let table = SampleTable::from_csv(&opts.table, delimiter, opts.roi_pairs)?;

    let baseline = match method {
        BaselineMethod::Spline => BaselineSpec::Spline {
            smoothing: ParamSeq::Uniform(opts.smoothing),
        },
        BaselineMethod::Polynomial => BaselineSpec::Polynomial {
            order: ParamSeq::Uniform(opts.polynomial_order),
        },
    };
    let config = ReductionConfig {
        baseline,
        delimiter,
        laser_nm: opts.laser,
        temperature_c: opts.temperature,
        execution: if opts.parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        },
    };

    let reducer = BatchReducer::new(config)?;
    let output = reducer.reduce(&table, &opts.spectra)?;
    info!(
        samples = table.len(),
        method = method.as_label(),
        "batch reduction complete"
    );

    Ok((table, output))
}

fn resolve_model(
    method: CalibrationMethod,
    a: Option<f64>,
    slope: Option<f64>,
    intercept: Option<f64>,
) -> Result<WaterModel, CliError> {
    match method {
        CalibrationMethod::Saturation => Ok(a
            .map(|a| WaterModel::Saturation { a })
            .unwrap_or_else(|| WaterModel::literature_default(method))),
        CalibrationMethod::FeoLinear => match (slope, intercept) {
            (Some(slope), Some(intercept)) => Ok(WaterModel::FeoLinear { slope, intercept }),
            (None, None) => Ok(WaterModel::literature_default(method)),
            _ => Err(CliError::Usage(
                "--slope and --intercept must be given together".to_string(),
            )),
        },
    }
}

fn sample_rows(table: &SampleTable, output: &ReductionOutput) -> Vec<SampleRow> {
    table
        .records()
        .iter()
        .enumerate()
        .map(|(index, record)| SampleRow {
            name: record.name.clone(),
            silicate_area: output.silicate_area[index],
            water_area: output.water_area[index],
            ratio: output.ratio[index],
        })
        .collect()
}

fn emit<T: Serialize>(output: &Option<PathBuf>, report: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(report).context("serializing the JSON report")?;
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("writing report to '{}'", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}
