use anyhow::Context;
use chrono::Local;
use clap::{ArgAction, ColorChoice, CommandFactory, Parser, ValueEnum};
use clap_complete::Shell;
use is_terminal::IsTerminal;
use serde::{Deserialize, Serialize};
mod config;
mod error;
mod pattern;
mod ranking;
mod render;
mod report;
mod scanner;
mod time_local;
mod window;

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, ValueEnum, Serialize, Deserialize)]
enum LogFormat { Text, Json }

#[derive(Parser, Debug)]
#[command(
    name = "nginx-aggregate",
    version,
    about = "Summarises HTTP errors found in nginx access logs",
    long_about = "Turns an nginx log_format into a line matcher, collects 4xx/5xx requests from the configured access logs and reports the most frequent problem URIs.",
    after_long_help = "Examples:\n  nginx-aggregate\n  nginx-aggregate -c api -f /etc/nginx-aggregate/config.yml\n  nginx-aggregate -c nightly --output json --csv-path top.csv",
    color = ColorChoice::Auto
)]
struct Args {
    /// Named configuration to layer over `default`
    #[arg(long = "configuration", short = 'c', default_value = config::DEFAULT_CFG_NAME)]
    configuration: String,
    /// YAML file holding the configurations
    #[arg(long, short = 'f', default_value = config::DEFAULT_CFG_FILE)]
    file: String,
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(short = 'q', long, default_value_t = false)]
    quiet: bool,
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFmt,
    /// Also write the report as JSON to this path, whatever `--output` is
    #[arg(long, short = 'j')]
    json_path: Option<String>,
    #[arg(long)]
    csv_path: Option<String>,
    #[arg(long, default_value_t = false)]
    progress: bool,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else if args.verbose > 0 {
        let f = if args.verbose >= 3 { log::LevelFilter::Trace } else if args.verbose == 2 { log::LevelFilter::Debug } else { log::LevelFilter::Info };
        builder.filter_level(f);
    }
    if let Some(fmt) = args.log_format {
        match fmt {
            LogFormat::Json => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let ts = chrono::Local::now().to_rfc3339();
                    let obj = serde_json::json!({
                        "ts": ts,
                        "level": record.level().to_string(),
                        "target": record.target(),
                        "msg": record.args().to_string(),
                    });
                    writeln!(buf, "{}", obj)
                });
            }
            LogFormat::Text => {
                builder.format(|buf, record| {
                    use std::io::Write;
                    let ts = chrono::Local::now().format("%H:%M:%S");
                    writeln!(buf, "[{:<5} {}] {}", record.level(), ts, record.args())
                });
            }
        }
    }
    builder.target(env_logger::Target::Stderr);
    builder.init();
}

fn run(args: &Args) -> anyhow::Result<()> {
    let now = Local::now();
    let doc = config::load_document(&args.file)?;
    let selected = config::select(&doc, &args.configuration)?;
    let profile = &selected.profile;
    let window = profile.window(now).with_context(|| format!("configuration {} has an unusable time_local window", selected.name))?;
    let pattern = pattern::LogPattern::compile(&profile.format)?;
    log::info!("Using configuration {} with {} log fields", selected.name, pattern.fields().len());
    // Loaded up front so a missing template fails before any scanning.
    let template = match args.output { OutputFmt::Text => Some(render::load_template(&profile.template)?), OutputFmt::Json => None };

    let paths = scanner::expand_sources(&profile.sources());
    let progress = args.progress && !args.quiet && std::io::stderr().is_terminal();
    let scanned = scanner::scan(&pattern, &paths, progress);
    let entries = window::filter(scanned.entries, &window);
    let top = ranking::rank(&entries, &profile.ranking());
    let run = report::RunInfo { configuration: selected.name.clone(), generated_at: now.fixed_offset(), window, stats: scanned.stats };
    let rep = report::assemble(entries, top, selected.passthrough, run);

    match (args.output, template) {
        (OutputFmt::Text, Some(tpl)) => print!("{}", render::render_text(&tpl, &rep)),
        _ if args.json_path.is_none() => println!("{}", serde_json::to_string_pretty(&rep).context("serialising report")?),
        _ => {}
    }
    if let Some(p) = args.json_path.as_ref() {
        let body = serde_json::to_string_pretty(&rep).context("serialising report")?;
        std::fs::write(p, body).with_context(|| format!("JSON write failed for {}", p))?;
        if !args.quiet { eprintln!("JSON written: {}", p); }
    }
    if let Some(p) = args.csv_path.as_ref() {
        if let Err(e) = render::write_csv(p, &rep) { log::error!("CSV write failed for {}: {}", p, e); } else if !args.quiet { eprintln!("CSV written: {}", p); }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Some(sh) = args.completions {
        let mut cmd = Args::command();
        clap_complete::generate(sh, &mut cmd, "nginx-aggregate", &mut std::io::stdout());
        return;
    }
    init_logging(&args);
    if let Err(e) = run(&args) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
