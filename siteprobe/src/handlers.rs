use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use siteprobe_core::model::{Completeness, Severity};
use siteprobe_core::report::{
    Report, ReportFormat, generate_json_report, generate_text_report, save_report,
};
use siteprobe_core::signatures::SIGNATURES;
use siteprobe_core::{AnalysisConfig, Pipeline, PipelineEvent, PipelineProgressCallback};
use siteprobe_scanner::urls::extract_url_path;
use siteprobe_scanner::{AssetProber, HttpRenderer, Renderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

pub const BANNER: &str = r#"
     _ _                       _
 ___(_) |_ ___ _ __  _ __ ___ | |__   ___
/ __| | __/ _ \ '_ \| '__/ _ \| '_ \ / _ \
\__ \ | ||  __/ |_) | | | (_) | |_) |  __/
|___/_|\__\___| .__/|_|  \___/|_.__/ \___|
              |_|
"#;

pub fn print_banner() {
    eprintln!("{}", BANNER.bright_cyan());
    eprintln!(
        "  {} {}\n",
        "automated website discovery".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

/// Parse the root URL argument, defaulting to https:// when no scheme is given
pub fn parse_root_url(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(input)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(url.to_string());
    }

    let with_scheme = format!("https://{}", input);
    match Url::parse(&with_scheme) {
        Ok(url) if url.host_str().is_some() => Some(url.to_string()),
        _ => None,
    }
}

/// Resolve settings: defaults, then the config file, then command-line overrides.
pub fn build_config(args: &ArgMatches) -> Result<AnalysisConfig> {
    let mut config = match args.get_one::<String>("config") {
        Some(path) => {
            let expanded = shellexpand::tilde(path);
            AnalysisConfig::from_json_file(Path::new(expanded.as_ref()))?
        }
        None => AnalysisConfig::default(),
    };

    if let Some(max_pages) = args.get_one::<usize>("max-pages") {
        config.max_pages = *max_pages;
    }
    if let Some(max_depth) = args.get_one::<usize>("max-depth") {
        config.max_depth = *max_depth;
    }
    if let Some(concurrency) = args.get_one::<usize>("concurrency") {
        config.render_concurrency = *concurrency;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout-ms") {
        config.per_page_timeout_ms = *timeout;
    }
    if let Some(threshold) = args.get_one::<f64>("color-threshold") {
        config.color_cluster_threshold = *threshold;
    }
    if args.get_flag("no-asset-sizes") {
        config.resolve_asset_sizes = false;
    }

    config.validate()?;
    Ok(config)
}

pub fn output_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

async fn build_renderer(args: &ArgMatches, config: &AnalysisConfig) -> Result<Arc<dyn Renderer>> {
    let engine = args
        .get_one::<String>("engine")
        .map(String::as_str)
        .unwrap_or("http");
    let mut options = config.render_options();
    options.screenshot_dir = args.get_one::<PathBuf>("screenshots").cloned();

    match engine {
        "http" => {
            if options.screenshot_dir.is_some() {
                eprintln!(
                    "{} Screenshots need the chromium engine; ignoring --screenshots",
                    "⚠".yellow().bold()
                );
            }
            Ok(Arc::new(HttpRenderer::new(&options)?))
        }
        #[cfg(feature = "chromium")]
        "chromium" => {
            let chrome_path = args.get_one::<PathBuf>("chrome-path").cloned();
            let renderer = siteprobe_scanner::ChromiumRenderer::launch(options, chrome_path)
                .await
                .context("Could not start Chromium; try --engine http")?;
            Ok(Arc::new(renderer))
        }
        #[cfg(not(feature = "chromium"))]
        "chromium" => bail!("siteprobe was built without chromium support; use --engine http"),
        other => bail!("Unknown engine '{}'", other),
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Translate pipeline events into spinner messages.
pub fn progress_callback(bar: ProgressBar) -> PipelineProgressCallback {
    Arc::new(move |event: PipelineEvent| match event {
        PipelineEvent::RenderStarted { url, depth } => {
            bar.set_message(format!("rendering {} (depth {})", extract_url_path(&url), depth));
        }
        PipelineEvent::PageFinished {
            url,
            status,
            pages_done,
        } => {
            bar.set_message(format!("{} page(s) analysed", pages_done));
            if !status.is_ok() {
                bar.println(format!(
                    "  {} {} {}",
                    "⚠".yellow(),
                    extract_url_path(&url),
                    status.as_str().dimmed()
                ));
            }
        }
        PipelineEvent::StageDegraded { url, stage, error } => {
            bar.println(format!(
                "  {} {} failed on {}: {}",
                "✗".red(),
                stage.as_str(),
                extract_url_path(&url),
                error
            ));
        }
        PipelineEvent::ProbingAssets { count } => {
            bar.set_message(format!("probing {} asset size(s)", count));
        }
        PipelineEvent::Finished { pages, cancelled } => {
            let suffix = if cancelled { " (cancelled)" } else { "" };
            bar.set_message(format!("{} page(s) analysed{}", pages, suffix));
        }
    })
}

pub fn render_report(report: &Report, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Json => {
            generate_json_report(report).context("Failed to serialize report to JSON")
        }
        ReportFormat::Text => Ok(generate_text_report(report)),
    }
}

pub fn write_report(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            save_report(content, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn flag_label(flag: Completeness) -> String {
    match flag {
        Completeness::Complete => flag.as_str().green().to_string(),
        Completeness::Partial => flag.as_str().yellow().to_string(),
        Completeness::Failed => flag.as_str().red().to_string(),
        Completeness::Skipped => flag.as_str().dimmed().to_string(),
    }
}

pub fn print_summary(report: &Report) {
    let site = &report.site;
    let counts = report.severity_counts();

    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!("{}", "  ANALYSIS SUMMARY".bright_white().bold());
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
    eprintln!(
        "{} Pages: {}   Swatches: {}   Fonts: {}   Technologies: {}   Assets: {}",
        "→".blue(),
        site.pages.len().to_string().cyan(),
        site.design.colors.len().to_string().cyan(),
        site.design.fonts.len().to_string().cyan(),
        site.tech.signatures.len().to_string().cyan(),
        site.assets.len().to_string().cyan()
    );
    eprintln!(
        "{} Findings: {} high, {} medium, {} low, {} info",
        "→".blue(),
        (counts.critical + counts.high).to_string().red().bold(),
        counts.medium.to_string().yellow(),
        counts.low.to_string().bright_white(),
        counts.info.to_string().dimmed()
    );

    let degraded: Vec<String> = report
        .stages
        .iter()
        .filter(|(_, flag)| !matches!(flag, Completeness::Complete | Completeness::Skipped))
        .map(|(stage, flag)| format!("{} {}", stage.as_str(), flag_label(*flag)))
        .collect();
    if report.is_complete() {
        eprintln!("{} Every stage completed", "✓".green().bold());
    } else {
        if report.cancelled {
            eprintln!("{} Run cancelled; report is partial", "⚠".yellow().bold());
        }
        if !degraded.is_empty() {
            eprintln!("{} Degraded: {}", "⚠".yellow().bold(), degraded.join(", "));
        }
    }

    for finding in site
        .risk
        .findings
        .iter()
        .filter(|f| matches!(f.severity, Severity::Critical | Severity::High))
    {
        eprintln!("  {} {}", "•".red(), finding.title.bright_white());
    }
    eprintln!();
}

pub async fn handle_analyze(args: &ArgMatches, quiet: bool) -> Result<()> {
    let raw_url = args
        .get_one::<String>("URL")
        .map(String::as_str)
        .unwrap_or_default();
    let Some(root) = parse_root_url(raw_url) else {
        bail!("'{}' is not a valid http(s) URL", raw_url);
    };

    let config = build_config(args)?;
    let format = output_format(args);
    let output = args.get_one::<PathBuf>("output");

    if !quiet {
        eprintln!("{} Analyzing {}", "→".blue(), root.bright_white());
        eprintln!(
            "  max pages: {}, depth: {}, concurrency: {}, timeout: {}ms",
            config.max_pages,
            config.max_depth,
            config.render_concurrency,
            config.per_page_timeout_ms
        );
        eprintln!();
    }

    let renderer = build_renderer(args, &config).await?;
    debug!("Using the {} renderer", renderer.name());

    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing with the pages rendered so far");
            ctrl_c_token.cancel();
        }
    });

    let bar = spinner(quiet);
    let mut pipeline = Pipeline::new(renderer, config.clone())
        .with_cancellation(token)
        .with_progress_callback(progress_callback(bar.clone()));
    if config.resolve_asset_sizes {
        pipeline =
            pipeline.with_asset_prober(AssetProber::new(&config.user_agent, config.asset_probe_timeout())?);
    }

    let result = pipeline.analyze(&root).await;
    bar.finish_and_clear();
    let report = result?;

    let content = render_report(&report, format)?;
    write_report(&content, output.map(PathBuf::as_path))?;

    if !quiet {
        print_summary(&report);
    }
    Ok(())
}

pub fn handle_signatures(args: &ArgMatches) {
    let category = args.get_one::<String>("category").map(|c| c.to_lowercase());

    let mut shown = 0;
    for rule in SIGNATURES
        .iter()
        .filter(|r| category.as_deref().is_none_or(|c| r.category.as_str() == c))
    {
        println!(
            "{:<22}{:<16}{:<16}{:>4.0}%  {}",
            rule.name.bright_white(),
            rule.category.as_str().cyan(),
            rule.channel.as_str(),
            rule.confidence * 100.0,
            rule.pattern.dimmed()
        );
        shown += 1;
    }

    if shown == 0 {
        eprintln!("{} No signatures match that category", "✗".red().bold());
    }
}
