use std::io::{self, Write};
use std::path::PathBuf;
use std::process::exit;

use check_ssl_cert::config::{Config, OutputFormat, PrometheusConfig};
use check_ssl_cert::metrics::prom::prometheus_metrics;
use check_ssl_cert::verdict::{report, Verdict};
use clap::{ArgAction, Parser};
use log::{debug, warn, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about = "Checks that a TLS endpoint presents a valid certificate that is not about to expire",
    long_about = None
)]
struct Cli {
    /// Critical threshold in days [default: 7]
    #[arg(short = 'c', long = "critical")]
    critical: Option<i64>,

    /// Warning threshold in days, must be greater than the critical one [default: 14]
    #[arg(short = 'w', long = "warning")]
    warning: Option<i64>,

    /// Port number [default: 443]
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,

    /// Hostname to check [default: localhost]
    #[arg(short = 'H', long = "hostname")]
    hostname: Option<String>,

    /// IP address to dial (optional, defaults to hostname)
    #[arg(short = 'I', long = "ip-address")]
    ip_address: Option<String>,

    /// TCP connection timeout in seconds [default: 30]
    #[arg(short = 't', long = "timeout", allow_negative_numbers = true)]
    timeout: Option<i64>,

    /// Custom DNS server (e.g., 8.8.8.8:53)
    #[arg(short = 'd', long = "dns-server")]
    dns_server: Option<String>,

    /// Lowest protocol version to accept: none, ssl3, tls1, tls1.1, tls1.2, tls1.3 [default: none]
    #[arg(long = "min-tls-version")]
    min_tls_version: Option<String>,

    /// Output format: text, json [default: text]
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Print an example configuration file and exit
    #[arg(long = "generate-config")]
    generate_config: bool,

    /// Push the result to a Prometheus push gateway
    #[arg(long = "prometheus")]
    prometheus: bool,

    /// Prometheus push gateway address [default: http://localhost:9091]
    #[arg(long = "prometheus-address")]
    prometheus_address: Option<String>,

    /// Increase log verbosity on stderr (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> Config {
        Config {
            hostname: self.hostname.clone(),
            ip_address: self.ip_address.clone(),
            port: self.port,
            warning: self.warning,
            critical: self.critical,
            timeout: self.timeout,
            dns_server: self.dns_server.clone(),
            min_tls_version: self.min_tls_version.clone(),
            output: self.output.clone(),
            prometheus: Some(PrometheusConfig {
                enabled: self.prometheus.then_some(true),
                address: self.prometheus_address.clone(),
            }),
        }
    }
}

fn init_logger(verbose: u8) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    builder.parse_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Info);
        }
        _ => {
            builder.filter_level(LevelFilter::Debug);
        }
    }
    builder.target(env_logger::Target::Stderr);
    builder.init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    exit(1);
}

/// Writes the report. A failed write is logged; the exit code still follows
/// the verdict.
fn write_report<W: Write>(verdict: &Verdict, format: OutputFormat, out: &mut W) {
    if let Err(e) = report(verdict, format, out) {
        warn!("Failed to write report: {}", e);
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if cli.generate_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let mut config = Config::defaults();
    if let Some(path) = &cli.config {
        debug!("loading configuration from {}", path.display());
        match Config::from_file(path) {
            Ok(file_config) => config = config.merge_with(file_config),
            Err(e) => fail(e),
        }
    }
    let config = config.merge_with(cli.to_config());

    let format = config.output_format().unwrap_or_else(|e| fail(e));
    let prometheus_address = config.prometheus_address();
    let request = config.into_request().unwrap_or_else(|e| fail(e));

    let verdict = check_ssl_cert::check(&request);

    write_report(&verdict, format, &mut io::stdout().lock());
    if let Some(address) = prometheus_address {
        prometheus_metrics(&verdict, &address);
    }

    exit(verdict.exit_code);
}
