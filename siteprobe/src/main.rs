use siteprobe::commands::command_argument_builder;
use siteprobe::handlers::{handle_analyze, handle_signatures, print_banner};
use tracing::Level;

fn init_tracing(verbosity: u8, quiet: bool) {
    let level = match (quiet, verbosity) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    // Reports may go to stdout, so logs stay on stderr.
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbosity = chosen_command.get_count("verbose");

    init_tracing(verbosity, quiet);

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("analyze", primary_command)) => handle_analyze(primary_command, quiet).await,
        Some(("signatures", primary_command)) => {
            handle_signatures(primary_command);
            Ok(())
        }
        // No subcommand provided, just show the banner
        _ => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
