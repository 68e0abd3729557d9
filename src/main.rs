use std::{fs::File, io, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use egui::Vec2;
use itertools::Itertools;
use log::{LevelFilter, error, info, warn};
use tokio::runtime::Runtime;

use laptrace::{
    ApiClient, CascadeGraph, CascadingSelectorController, FieldId, LaptraceError, OptionValue,
    TelemetryFetcher, ViewerConfig, build_cascade,
    headless,
    render::{ChartRenderer, JsonLinesRenderer, JsonRenderer, SummaryRenderer},
    ui::ViewerApp,
};

const DEFAULT_JSONL_OUTPUT: &str = "telemetry.jsonl";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Log every request and state change
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Telemetry server, overrides the config file
    #[arg(long, global = true)]
    server: Option<String>,

    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct Choices {
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    gp: Option<String>,
    #[arg(long)]
    session: Option<String>,
    #[arg(long)]
    driver: Option<String>,
    #[arg(long)]
    lap: Option<String>,
    /// Any other field of the cascade, as FIELD=VALUE
    #[arg(short, long = "select", value_parser = parse_choice)]
    select: Vec<(String, String)>,
}

impl Choices {
    fn into_pairs(self) -> Vec<(FieldId, OptionValue)> {
        [
            ("year", self.year),
            ("gp", self.gp),
            ("session", self.session),
            ("driver", self.driver),
            ("lap", self.lap),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|v| (field.to_string(), v)))
        .chain(self.select)
        .map(|(field, value)| (FieldId::new(field), OptionValue::new(value)))
        .collect()
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum OutputFormat {
    /// Raw samples as a JSON array
    #[default]
    Json,
    /// One JSON object per sample
    Jsonl,
    /// Lap headline numbers
    Summary,
    /// Lap headline numbers as a JSON object
    SummaryJson,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the desktop viewer
    View,
    /// Print the options of the first field not given on the command line
    List {
        #[command(flatten)]
        choices: Choices,
    },
    /// Load the telemetry of one lap
    Fetch {
        #[command(flatten)]
        choices: Choices,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_choice(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(field, _)| !field.is_empty())
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))
}

fn load_config(args: &Args) -> Result<ViewerConfig, LaptraceError> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_path(path)?,
        None => ViewerConfig::from_local_file()?.unwrap_or_default(),
    };
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    Ok(config)
}

fn build_runtime() -> Result<Runtime, LaptraceError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| LaptraceError::RuntimeError { source: e })
}

fn view(
    config: ViewerConfig,
    runtime: Runtime,
    graph: CascadeGraph,
    telemetry: Arc<dyn TelemetryFetcher>,
) -> Result<(), LaptraceError> {
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = native_options
        .viewport
        .with_title("Laptrace")
        .with_inner_size(Vec2::new(config.window_size.width, config.window_size.height));

    eframe::run_native(
        "Laptrace",
        native_options,
        Box::new(|cc| Ok(Box::new(ViewerApp::new(runtime, graph, telemetry, config, cc)))),
    )
    .map_err(|e| LaptraceError::GuiError {
        description: e.to_string(),
    })
}

fn list(
    runtime: Runtime,
    graph: CascadeGraph,
    telemetry: Arc<dyn TelemetryFetcher>,
    choices: Choices,
) -> Result<(), LaptraceError> {
    let mut controller = CascadingSelectorController::new(
        graph,
        telemetry,
        JsonRenderer::new(io::sink()),
        runtime.handle().clone(),
    );
    let choices = headless::order_choices(&controller, choices.into_pairs())?;
    match runtime.block_on(headless::list_options(&mut controller, &choices))? {
        Some((label, options)) if options.is_empty() => info!("No {} available", label),
        Some((label, options)) => {
            info!("{} options:", label);
            println!("{}", options.iter().join("\n"));
        }
        None => info!("Every field is set, use `fetch` to load the lap"),
    }
    Ok(())
}

fn fetch(
    runtime: Runtime,
    graph: CascadeGraph,
    telemetry: Arc<dyn TelemetryFetcher>,
    choices: Choices,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), LaptraceError> {
    let writer = || -> Result<Box<dyn io::Write>, LaptraceError> {
        Ok(match &output {
            Some(path) => Box::new(
                File::create(path).map_err(|e| LaptraceError::RenderIOError { source: e })?,
            ),
            None => Box::new(io::stdout()),
        })
    };
    let renderer: Box<dyn ChartRenderer> = match format {
        OutputFormat::Json => Box::new(JsonRenderer::new(writer()?)),
        OutputFormat::Jsonl => Box::new(JsonLinesRenderer::new(
            output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JSONL_OUTPUT)),
        )),
        OutputFormat::Summary => Box::new(SummaryRenderer::new(writer()?)),
        OutputFormat::SummaryJson => Box::new(SummaryRenderer::new(writer()?).json()),
    };

    let mut controller =
        CascadingSelectorController::new(graph, telemetry, renderer, runtime.handle().clone());
    let choices = headless::order_choices(&controller, choices.into_pairs())?;
    runtime.block_on(headless::fetch(&mut controller, &choices))
}

fn run(args: Args) -> Result<(), LaptraceError> {
    let config = load_config(&args)?;
    info!("Using telemetry server at {}", config.server_url);

    let client = Arc::new(ApiClient::new(
        &config.server_url,
        Duration::from_secs(config.request_timeout_s),
    )?);
    let (graph, telemetry) = build_cascade(&config, client)?;
    let runtime = build_runtime()?;

    match args.command {
        Commands::View => view(config, runtime, graph, telemetry),
        Commands::List { choices } => list(runtime, graph, telemetry, choices),
        Commands::Fetch {
            choices,
            format,
            output,
        } => fetch(runtime, graph, telemetry, choices, format, output),
    }
}

fn main() {
    let cli = Args::parse();
    colog::default_builder()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    if let Err(e) = ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}
