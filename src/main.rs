use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lumberjack_console::api::{ApiError, ConsoleClient, HttpTransport};
use lumberjack_console::config::Config;
use lumberjack_console::datetime::{DateTimeContext, DateTimeFormat};
use lumberjack_console::format::TimeRangeFormatter;
use lumberjack_console::login::{LoginStatus, LoginTestRequest};
use lumberjack_console::timerange::TimeRange;
use lumberjack_console::validation::{
    Parameter, ParameterBinding, ValidationQuery, build_validation_payload,
};
use lumberjack_console::worker::{WorkerHandle, spawn_worker};

#[derive(Parser)]
#[command(
    name = "lumberjack-console",
    version,
    about = "Search and authentication helpers for the log console"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a time range (JSON) the way the search bar shows it
    FormatRange {
        range: String,
        /// Show absolute bounds in the user's timezone using this format
        #[arg(long)]
        localize: Option<DateTimeFormat>,
    },
    /// Print the validation payload without sending it
    Payload(QueryArgs),
    /// Validate a query against the backend
    Validate(QueryArgs),
    /// Test a login against an authentication backend configuration
    TestLogin {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long)]
        backend_id: Option<String>,
        /// Backend configuration as JSON
        #[arg(long, default_value = "{}")]
        backend_config: String,
    },
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long)]
    query: String,
    #[arg(long = "stream")]
    streams: Vec<String>,
    /// Time range as JSON, e.g. '{"type":"relative","range":300}'
    #[arg(long)]
    range: Option<String>,
    #[arg(long)]
    filter: Option<String>,
    /// Parameter binding as name=value, may be repeated
    #[arg(long = "param")]
    params: Vec<String>,
}

impl QueryArgs {
    fn into_query(self) -> Result<ValidationQuery> {
        let time_range = self
            .range
            .as_deref()
            .map(parse_time_range)
            .transpose()?;

        let mut parameters = Vec::new();
        let mut parameter_bindings = BTreeMap::new();
        for param in self.params {
            let (name, value) = param
                .split_once('=')
                .ok_or_else(|| eyre!("parameter {param:?} must look like name=value"))?;
            parameters.push(Parameter::new(name));
            parameter_bindings.insert(name.to_string(), ParameterBinding::value(value));
        }

        Ok(ValidationQuery {
            query_string: self.query,
            time_range,
            streams: self.streams,
            parameters,
            parameter_bindings,
            filter: self.filter,
        })
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = Config::load().map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    init_logging(&config);

    let context = config.date_time_context()?;

    match cli.command {
        Command::FormatRange { range, localize } => {
            let range = parse_time_range(&range)?;
            println!("{}", format_range(&range, &context, localize));
        }
        Command::Payload(args) => {
            let payload = build_validation_payload(&args.into_query()?, &context)?;
            print_json(&payload)?;
        }
        Command::Validate(args) => {
            let query = args.into_query()?;
            let worker = start_worker(&config, context)?;
            let response = wait_for(worker.validate_query(query))?;
            print_json(&response)?;
            if let Some(state) = &response.result {
                for line in state.messages() {
                    eprintln!("{line}");
                }
            }
        }
        Command::TestLogin {
            username,
            password,
            backend_id,
            backend_config,
        } => {
            let backend_configuration: JsonValue = serde_json::from_str(&backend_config)
                .wrap_err("backend configuration is not valid JSON")?;
            let mut request = LoginTestRequest::new(backend_configuration, username, password);
            if let Some(id) = backend_id {
                request = request.with_backend_id(id);
            }

            let worker = start_worker(&config, context)?;
            let status = LoginStatus::finished(wait_for(worker.test_login(request))?);
            if let Some(message) = &status.message {
                println!("{message}");
            }
            for line in status.summary_lines() {
                println!("{line}");
            }
            if !status.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.default_level));
    let noisy_crates = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";
    let env_filter =
        EnvFilter::try_new(format!("{},{}", env_filter, noisy_crates)).unwrap_or(env_filter);

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn start_worker(config: &Config, context: DateTimeContext) -> Result<WorkerHandle> {
    let transport = HttpTransport::new(&config.http_settings())?;
    let client = ConsoleClient::new(transport, context).with_paths(config.api_paths());
    spawn_worker(client).wrap_err("failed to start request worker")
}

fn wait_for<T>(rx: Receiver<Result<T, ApiError>>) -> Result<T> {
    let reply = rx
        .recv()
        .map_err(|_| eyre!("worker stopped before answering"))?;
    Ok(reply?)
}

fn parse_time_range(raw: &str) -> Result<TimeRange> {
    serde_json::from_str(raw).wrap_err_with(|| format!("invalid time range {raw:?}"))
}

fn format_range(
    range: &TimeRange,
    context: &DateTimeContext,
    localize: Option<DateTimeFormat>,
) -> String {
    let formatter = TimeRangeFormatter::new(context);
    match localize {
        Some(format) => formatter
            .with_localizer(move |ts| match context.to_utc(ts) {
                Ok(instant) => context.format_as_user_time(instant, format),
                Err(_) => ts.to_string(),
            })
            .format(range),
        None => formatter.format(range),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
