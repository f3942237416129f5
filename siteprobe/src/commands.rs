use clap::{arg, command};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("siteprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("siteprobe")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v debug, -vv trace)")
                .required(false)
                .action(clap::ArgAction::Count),
        )
        .subcommand_required(false)
        .subcommand(
            command!("analyze")
                .about(
                    "Render a site, extract its design system, stack, structure, assets and \
                integrations, and score migration risk.",
                )
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("Root URL of the site. A missing scheme defaults to https://"),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("JSON file with analysis settings; flags override its values"),
                )
                .arg(
                    arg!(-p --"max-pages" <NUM>)
                        .required(false)
                        .help("Upper bound on pages analysed, root included")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-d --"max-depth" <NUM>)
                        .required(false)
                        .help("Link depth followed from the root page")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"concurrency" <NUM>)
                        .required(false)
                        .help("Pages rendered at the same time")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"timeout-ms" <MILLIS>)
                        .required(false)
                        .help("Per-page render timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"color-threshold" <DELTA_E>)
                        .required(false)
                        .help("CIE76 distance below which colors share a swatch")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(-e --"engine" <ENGINE>)
                        .required(false)
                        .help("Rendering engine: chromium executes scripts, http reads raw HTML")
                        .value_parser(["chromium", "http"])
                        .default_value("http"),
                )
                .arg(
                    arg!(--"chrome-path" <PATH>)
                        .required(false)
                        .help("Chromium executable to launch (default: auto-detect)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"screenshots" <DIR>)
                        .required(false)
                        .help("Save full-page screenshots to this directory (chromium only)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"no-asset-sizes")
                        .required(false)
                        .help("Skip HEAD requests that resolve asset byte sizes")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("signatures")
                .about("List the built-in technology signatures")
                .arg(
                    arg!(--"category" <CATEGORY>)
                        .required(false)
                        .help("Only show one category, e.g. analytics or css-framework"),
                ),
        )
}
