// # sitednsd - site DNS runner
//
// Thin integration layer: reads configuration from the environment, builds
// the provider through the registry and hands a plan to the `Reconciler`.
// All DNS, routing and binding logic lives in sitedns-core.
//
// The runner is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers
// 4. Running one command and reporting the outcome through the exit code
//
// ## Commands
//
// `sitednsd [setup|list|email|routes|audit]` (default `setup`)
//
// - `setup`: resolve the zone, create records, configure email routing,
//   bind custom domains
// - `list`: print the records of the zone
// - `email`: mail records and email routing only
// - `routes`: print routing rules and destination addresses
// - `audit`: compare the zone's records with the plan, read-only
//
// ## Configuration
//
// ### Cloudflare
// - `CLOUDFLARE_EMAIL`: Account email (required)
// - `CLOUDFLARE_GLOBAL_API_KEY`: Global API key (required)
// - `CLOUDFLARE_ACCOUNT_ID`: Account ID (required)
// - `CLOUDFLARE_ZONE_ID`: Zone ID (optional, looked up by domain)
// - `CLOUDFLARE_PROJECT_NAME`: Pages project (default `site`)
//
// ### Site
// - `SITEDNS_DOMAIN`: Apex domain (required)
// - `SITEDNS_PAGES_TARGET`: CNAME target (default `<project>.pages.dev`)
// - `SITEDNS_NOTIFY_EMAIL`: Forwarding destination; enables email setup
// - `SITEDNS_MAIL_ALIASES`: Comma-separated aliases
//
// ### Runner
// - `SITEDNS_CONCURRENCY`: Record creations in flight (1-16, default 4)
// - `SITEDNS_MODE`: `live` or `dry-run` (default `live`)
// - `SITEDNS_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
//
// ## Example
//
// ```bash
// export CLOUDFLARE_EMAIL=ops@example.com
// export CLOUDFLARE_GLOBAL_API_KEY=your_key
// export CLOUDFLARE_ACCOUNT_ID=your_account
// export CLOUDFLARE_PROJECT_NAME=example-site
// export SITEDNS_DOMAIN=example.com
// export SITEDNS_NOTIFY_EMAIL=owner@mail.example.net
//
// sitednsd setup
// ```

use anyhow::{Context, Result};
use sitedns_core::config::{
    DEFAULT_MAIL_ALIASES, EngineConfig, MailConfig, ProviderConfig, SiteConfig, SiteDnsConfig,
    validate_domain_name,
};
use sitedns_core::{
    AuditReport, BindOutcome, ProviderRegistry, ReconciliationPlan, Reconciler, RoutingOutcome,
    RunReport, UpsertOutcome,
};
use std::env;
use std::fmt;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for the runner
///
/// - 0: Every requested operation succeeded
/// - 1: Configuration or startup error
/// - 2: Runtime error or partial failure
#[derive(Debug, Clone, Copy)]
enum SitednsExitCode {
    /// Everything succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error or at least one failed operation
    RuntimeError = 2,
}

impl From<SitednsExitCode> for ExitCode {
    fn from(code: SitednsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command selected by the first argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Setup,
    List,
    Email,
    Routes,
    Audit,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        match arg.unwrap_or("setup") {
            "setup" => Ok(Command::Setup),
            "list" => Ok(Command::List),
            "email" => Ok(Command::Email),
            "routes" => Ok(Command::Routes),
            "audit" => Ok(Command::Audit),
            other => anyhow::bail!(
                "Unknown command '{}'. \
                Usage: sitednsd [setup|list|email|routes|audit]",
                other
            ),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Setup => "setup",
            Command::List => "list",
            Command::Email => "email",
            Command::Routes => "routes",
            Command::Audit => "audit",
        };
        f.write_str(name)
    }
}

/// Application configuration
struct Config {
    command: Command,
    email: String,
    api_key: String,
    account_id: String,
    zone_id: Option<String>,
    project: String,
    domain: String,
    pages_target: Option<String>,
    notify_email: Option<String>,
    mail_aliases: Vec<String>,
    concurrency: usize,
    mode: String,
    log_level: String,
}

fn required(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{} is required. Set it via: export {}=...", name, name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the command line and environment variables
    fn from_env(args: &[String]) -> Result<Self> {
        let command = Command::parse(args.get(1).map(String::as_str))?;

        let concurrency = match optional("SITEDNS_CONCURRENCY") {
            Some(value) => value.trim().parse().with_context(|| {
                format!("SITEDNS_CONCURRENCY must be a number. Got: {}", value)
            })?,
            None => EngineConfig::default().concurrency,
        };

        let mail_aliases = match optional("SITEDNS_MAIL_ALIASES") {
            Some(value) => value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_MAIL_ALIASES.iter().map(|a| a.to_string()).collect(),
        };

        Ok(Self {
            command,
            email: required("CLOUDFLARE_EMAIL")?,
            api_key: required("CLOUDFLARE_GLOBAL_API_KEY")?,
            account_id: required("CLOUDFLARE_ACCOUNT_ID")?,
            zone_id: optional("CLOUDFLARE_ZONE_ID"),
            project: optional("CLOUDFLARE_PROJECT_NAME").unwrap_or_else(|| "site".to_string()),
            domain: required("SITEDNS_DOMAIN")?.trim().to_ascii_lowercase(),
            pages_target: optional("SITEDNS_PAGES_TARGET"),
            notify_email: optional("SITEDNS_NOTIFY_EMAIL"),
            mail_aliases,
            concurrency,
            mode: env::var("SITEDNS_MODE").unwrap_or_else(|_| "live".to_string()),
            log_level: env::var("SITEDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        // Check for obvious placeholder keys (common mistake)
        let key_lower = self.api_key.to_lowercase();
        if key_lower.is_empty()
            || key_lower.contains("your_key")
            || key_lower.contains("replace_me")
            || key_lower == "key"
        {
            anyhow::bail!(
                "CLOUDFLARE_GLOBAL_API_KEY appears to be a placeholder. \
                Use the global API key from your Cloudflare profile."
            );
        }

        if !self.email.contains('@') {
            anyhow::bail!("CLOUDFLARE_EMAIL is not an email address. Got: {}", self.email);
        }

        validate_domain_name(&self.domain).context("SITEDNS_DOMAIN is invalid")?;

        match self.mode.to_lowercase().as_str() {
            "live" | "dry-run" => {}
            _ => anyhow::bail!(
                "SITEDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }

        if self.command == Command::Email && self.notify_email.is_none() {
            anyhow::bail!(
                "SITEDNS_NOTIFY_EMAIL is required for the email command. \
                Set it via: export SITEDNS_NOTIFY_EMAIL=you@example.net"
            );
        }

        // Validate log level
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "SITEDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.site_config().validate()?;
        Ok(())
    }

    fn dry_run(&self) -> bool {
        self.mode.eq_ignore_ascii_case("dry-run")
    }

    /// Build the immutable library configuration
    fn site_config(&self) -> SiteDnsConfig {
        let provider = ProviderConfig::Cloudflare {
            email: self.email.clone(),
            api_key: self.api_key.clone(),
            account_id: self.account_id.clone(),
            zone_id: self.zone_id.clone(),
            dry_run: self.dry_run(),
        };

        let mut site = SiteConfig::new(self.domain.clone(), self.project.clone());
        if let Some(target) = &self.pages_target {
            site = site.with_target(target.clone());
        }

        SiteDnsConfig {
            provider,
            site,
            mail: MailConfig {
                notify_address: self.notify_email.clone(),
                aliases: self.mail_aliases.clone(),
                ..MailConfig::default()
            },
            engine: EngineConfig {
                concurrency: self.concurrency,
                ..EngineConfig::default()
            },
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    // Load configuration from environment
    let config = match Config::from_env(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SitednsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return SitednsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SitednsExitCode::ConfigError.into();
    }

    info!("Starting sitednsd ({}) for {}", config.command, config.domain);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SitednsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        tokio::select! {
            outcome = run(&config) => match outcome {
                Ok(true) => SitednsExitCode::Success,
                Ok(false) => {
                    warn!("Finished with failures");
                    SitednsExitCode::RuntimeError
                }
                Err(e) => {
                    error!("Run failed: {:#}", e);
                    SitednsExitCode::RuntimeError
                }
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted; records already submitted are left in place");
                SitednsExitCode::RuntimeError
            }
        }
    });

    result.into()
}

/// Run the selected command
///
/// Returns whether every requested operation succeeded.
async fn run(config: &Config) -> Result<bool> {
    let site_config = config.site_config();

    // Create provider registry
    let registry = ProviderRegistry::new();

    // Register built-in providers
    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        sitedns_provider_cloudflare::register(&registry);
    }

    let provider = registry.create_provider(&site_config.provider)?;
    let (reconciler, mut events) = Reconciler::new(provider, &site_config.engine)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "engine event");
        }
    });

    let plan = ReconciliationPlan::from_config(&site_config);

    match config.command {
        Command::Setup => {
            let report = reconciler.run(&plan).await;
            print_run_report(&report);
            Ok(report.is_success())
        }
        Command::List => {
            let zone = reconciler.resolve_zone(&plan.domain).await?;
            let records = reconciler.list_records(&zone).await;
            println!("DNS records for {} ({}):", zone.name, records.len());
            for meta in records {
                println!("  {:<6} {} -> {}", meta.record.record_type, meta.record.name, meta.record.content);
            }
            Ok(true)
        }
        Command::Email => {
            let zone = reconciler.resolve_zone(&plan.domain).await?;
            let mail = reconciler.apply_mail_records(&zone, &plan.mail_records).await;
            for (record, outcome) in &mail {
                println!("  [{}] {}", outcome.tag(), record);
            }

            let routing = match &plan.routing {
                Some(routing) => Some(reconciler.configure_routing(&zone, routing).await),
                None => None,
            };
            if let Some(routing) = &routing {
                print_routing(routing);
            }

            Ok(mail.iter().all(|(_, o)| o.is_success())
                && routing.as_ref().is_none_or(|r| r.failures().is_empty()))
        }
        Command::Routes => {
            let zone = reconciler.resolve_zone(&plan.domain).await?;
            let rules = reconciler.list_routing_rules(&zone).await;
            println!("Routing rules for {} ({}):", zone.name, rules.len());
            for rule in rules {
                let state = if rule.enabled { "on" } else { "off" };
                println!("  [{}] {} -> {}", state, rule.name, rule.forward_targets().join(", "));
            }

            let destinations = reconciler.list_destinations().await;
            println!("Destination addresses ({}):", destinations.len());
            for destination in destinations {
                let state = if destination.verified { "verified" } else { "pending" };
                println!("  [{}] {}", state, destination.email);
            }
            Ok(true)
        }
        Command::Audit => {
            let zone = reconciler.resolve_zone(&plan.domain).await?;
            let audit = reconciler.audit(&zone, &plan).await;
            print_audit(&audit);
            Ok(audit.is_clean())
        }
    }
}

fn print_outcome(label: &str, outcome: &UpsertOutcome) {
    match outcome {
        UpsertOutcome::Failed { reason, .. } => println!("  [failed] {}: {}", label, reason),
        other => println!("  [{}] {}", other.tag(), label),
    }
}

fn print_routing(routing: &RoutingOutcome) {
    println!("Email routing:");
    for (step, outcome) in &routing.steps {
        print_outcome(&step.to_string(), outcome);
    }
}

fn print_run_report(report: &RunReport) {
    println!("Reconciliation of {}: {}", report.domain, report.state);
    if let Some(zone_id) = &report.zone_id {
        println!("Zone: {}", zone_id);
    }

    if report.records.total() > 0 {
        println!("DNS records ({}):", report.records.summary());
        for (name, outcome) in report.records.outcomes() {
            print_outcome(name, outcome);
        }
    }

    if !report.mail_records.is_empty() {
        println!("Mail records:");
        for (record, outcome) in &report.mail_records {
            print_outcome(&record.to_string(), outcome);
        }
    }

    if let Some(routing) = &report.routing {
        print_routing(routing);
    }

    if !report.bindings.is_empty() {
        println!("Custom domains:");
        for (domain, outcome) in &report.bindings {
            match outcome {
                BindOutcome::Failed { reason, .. } => println!("  [failed] {}: {}", domain, reason),
                other => println!("  [{}] {}", other.tag(), domain),
            }
        }
    }

    println!(
        "Finished at {} with {} failure(s)",
        report.finished_at.to_rfc3339(),
        report.failure_count()
    );
}

fn print_audit(audit: &AuditReport) {
    println!(
        "Audit: {} present, {} missing, {} conflicting",
        audit.present.len(),
        audit.missing.len(),
        audit.conflicting.len()
    );
    for record in &audit.missing {
        println!("  [missing] {}", record);
    }
    for record in &audit.conflicting {
        println!("  [conflict] {}", record);
    }
}
