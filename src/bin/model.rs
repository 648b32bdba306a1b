use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use clap::Parser;
use stanza::renderer::console::Console;
use stanza::renderer::Renderer;
use tracing::{debug, info, warn};

use epicurve::coalesce::coalesce;
use epicurve::config::Config;
use epicurve::csv::CsvReader;
use epicurve::data::{Metric, RawObservation};
use epicurve::file::ReadJsonFile;
use epicurve::fit::{fit, Guess};
use epicurve::model::ModelKind;
use epicurve::print::{tabulate_curve, tabulate_parameters, tabulate_series};
use epicurve::reshape::{merge, read_long_table, WideTable};
use epicurve::sample::sample;
use epicurve::timed::Timed;

#[derive(Debug, clap::Parser, Clone)]
struct Args {
    /// long CSV with one row per region and date
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,

    /// wide CSV of cumulative confirmed cases, one column per date
    #[clap(long)]
    confirmed: Option<PathBuf>,

    /// wide CSV of cumulative deaths
    #[clap(long)]
    deaths: Option<PathBuf>,

    /// wide CSV of cumulative recoveries
    #[clap(long)]
    recovered: Option<PathBuf>,

    /// country to model
    #[clap(short = 'c', long, default_value = "Mexico")]
    country: String,

    /// fit the derivative of the logistic curve instead of a Gaussian
    #[clap(short = 'l', long)]
    logistic: bool,

    /// initial guess of the peak amplitude [new cases]
    #[clap(long, default_value_t = 5000.0)]
    amplitude: f64,

    /// initial guess of the peak day, counted from the first case
    #[clap(long, default_value_t = 70.0)]
    peak: f64,

    /// initial guess of the Gaussian standard deviation [days]
    #[clap(long, default_value_t = 15.0)]
    stddev: f64,

    /// initial guess of the logistic growth rate
    #[clap(short = 'k', long, default_value_t = 0.15)]
    growth_rate: f64,

    /// derive the initial guess from the incidence
    #[clap(long)]
    auto_guess: bool,

    /// fit the smoothed incidence rather than the raw one
    #[clap(long)]
    smoothed: bool,

    /// smoothing window length
    #[clap(long)]
    window: Option<usize>,

    /// smoothing polynomial degree
    #[clap(long)]
    degree: Option<usize>,

    /// number of points at which to sample the fitted model
    #[clap(long)]
    points: Option<usize>,

    /// show the infected (confirmed less deaths and recoveries) column
    #[clap(long)]
    infected: bool,

    /// JSON file with solver, smoothing and sampling settings
    #[clap(long)]
    config: Option<PathBuf>,
}
impl Args {
    fn validate(&self) -> anyhow::Result<()> {
        let wide = [&self.confirmed, &self.deaths, &self.recovered];
        let num_wide = wide.iter().filter(|path| path.is_some()).count();
        match (&self.file, num_wide) {
            (Some(_), 0) | (None, 3) => {}
            (Some(_), _) => bail!("the -f flag cannot be combined with the wide tables"),
            (None, 0) => bail!("either the -f flag or all three wide tables must be specified"),
            (None, _) => bail!("--confirmed, --deaths and --recovered must be specified together"),
        }
        if !self.auto_guess {
            for (name, value) in [
                ("amplitude", self.amplitude),
                ("peak", self.peak),
                ("stddev", self.stddev),
                ("growth rate", self.growth_rate),
            ] {
                if !value.is_finite() || value <= 0.0 {
                    bail!("{name} must be positive");
                }
            }
        }
        Ok(())
    }

    fn model_kind(&self) -> ModelKind {
        if self.logistic {
            ModelKind::Logistic
        } else {
            ModelKind::Gaussian
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "full")
    }
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info")
    }
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    args.validate()?;
    debug!("args: {args:?}");

    let config = load_config(&args)?;
    debug!("config: {config:?}");

    let observations = read_observations(&args)?;
    debug!("read {} observations", observations.len());
    let (coalesced, incidence) = coalesce(&observations, &args.country)?;
    let anchor = coalesced
        .first_date()
        .ok_or_else(|| anyhow!("no dates for {}", args.country))?;
    info!(
        "{}: {} days of data since the first case on {anchor}",
        coalesced.country,
        coalesced.len()
    );

    let days = incidence.days();
    let raw = incidence.values(Metric::Confirmed);
    let smoothed = match config.smoothing.apply(&raw) {
        Ok(smoothed) => Some(smoothed),
        Err(err) if !args.smoothed => {
            warn!("skipping smoothing: {err}");
            None
        }
        Err(err) => return Err(err.into()),
    };
    let table = tabulate_series(&coalesced, &incidence, smoothed.as_deref(), args.infected);
    info!("\n{}", Console::default().render(&table));

    let values = match (&smoothed, args.smoothed) {
        (Some(smoothed), true) => smoothed,
        _ => &raw,
    };
    let kind = args.model_kind();
    let guess = if args.auto_guess {
        Guess::from_incidence(kind, &days, values)
            .ok_or_else(|| anyhow!("no positive incidence to derive a guess from"))?
    } else {
        Guess {
            amplitude: args.amplitude,
            peak: args.peak,
            width: match kind {
                ModelKind::Gaussian => args.stddev,
                ModelKind::Logistic => args.growth_rate,
            },
        }
    };
    debug!("initial guess: {guess:?}");

    let model = Timed::result(|| fit(&days, values, kind, &guess, &config.fit_options))?;
    let stats = model.value.stats();
    info!(
        "fitted {kind} in {:.3}s: {} after {} evaluations ({} iterations), ssr: {:.3}",
        model.elapsed.as_secs_f64(),
        stats.termination,
        stats.evaluations,
        stats.iterations,
        stats.ssr
    );
    let model = model.value;
    let table = tabulate_parameters(&model);
    info!("\n{}", Console::default().render(&table));

    let curve = sample(&model, model.default_range(), config.points, anchor)?;
    let divergence = curve.peak_divergence(&model);
    if divergence > 1.0 {
        warn!("sampled peak is {divergence:.1} grid cells from the fitted peak");
    }
    debug!("\n{}", Console::default().render(&tabulate_curve(&curve)));

    match model.peak_date(anchor) {
        Some(peak_date) => info!("Peak date: {peak_date}"),
        None => warn!("fitted peak on day {} lies outside the calendar", model.peak_day()),
    }
    info!("Peak new cases: {:.1}", model.peak_value());
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::read_json_file(path)?,
        None => Config::default(),
    };
    if let Some(window) = args.window {
        config.smoothing.window = window;
    }
    if let Some(degree) = args.degree {
        config.smoothing.degree = degree;
    }
    if let Some(points) = args.points {
        config.points = points;
    }
    config.validate()?;
    Ok(config)
}

fn read_observations(args: &Args) -> anyhow::Result<Vec<RawObservation>> {
    if let Some(path) = &args.file {
        info!("reading {}", path.display());
        return Ok(read_long_table(CsvReader::open(path)?)?);
    }
    match (&args.confirmed, &args.deaths, &args.recovered) {
        (Some(confirmed), Some(deaths), Some(recovered)) => {
            let confirmed = read_wide_table(confirmed, Metric::Confirmed)?;
            let deaths = read_wide_table(deaths, Metric::Deaths)?;
            let recovered = read_wide_table(recovered, Metric::Recovered)?;
            Ok(merge(&confirmed, &deaths, &recovered))
        }
        _ => bail!("no input tables"),
    }
}

fn read_wide_table(path: &Path, metric: Metric) -> anyhow::Result<WideTable> {
    info!("reading {metric} from {}", path.display());
    Ok(WideTable::parse(CsvReader::open(path)?, metric)?)
}
