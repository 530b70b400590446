/*!
  kubeadm-ignition reads a node description from a TOML file and writes the Ignition config that
  bootstraps the node with kubeadm on first boot.
*/

#[macro_use]
extern crate log;

use argh::FromArgs;
use kubeadm_ignition::node::NodeInput;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use snafu::ResultExt;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

/// Generate the first-boot Ignition config for a kubeadm node
#[derive(FromArgs, Debug)]
struct Args {
    #[argh(option, short = 'i')]
    /// path to the TOML node input
    input: PathBuf,
    #[argh(option, short = 'o')]
    /// where to write the output; stdout if not given
    output: Option<PathBuf>,
    #[argh(switch)]
    /// write the generated Container Linux Config instead of Ignition
    emit_clc: bool,
    #[argh(option, default = "LevelFilter::Info", short = 'l')]
    /// log-level trace|debug|info|warn|error
    log_level: LevelFilter,
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();

    // Output may go to stdout, so logs always go to stderr.
    TermLogger::init(
        args.log_level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context(error::LoggerSnafu)?;

    info!("Reading node input from {}", args.input.display());
    let input_str = fs::read_to_string(&args.input).context(error::InputReadSnafu {
        path: args.input.clone(),
    })?;
    let input: NodeInput = toml::from_str(&input_str).context(error::InputParseSnafu {
        path: args.input.clone(),
    })?;

    let output = if args.emit_clc {
        kubeadm_ignition::render_clc(&input)
            .context(error::GenerateSnafu)?
            .into_bytes()
    } else {
        kubeadm_ignition::generate(Some(&input)).context(error::GenerateSnafu)?
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &output).context(error::OutputWriteSnafu { path: path.clone() })?;
            info!("Wrote {} bytes to {}", output.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&output)
                .and_then(|_| stdout.flush())
                .context(error::StdoutSnafu)?;
        }
    }

    Ok(())
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(1);
    }
}

mod error {
    use snafu::Snafu;
    use std::path::PathBuf;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum Error {
        #[snafu(display("Logger setup error: {}", source))]
        Logger { source: log::SetLoggerError },

        #[snafu(display("Unable to read node input from {}: {}", path.display(), source))]
        InputRead {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Unable to parse node input from {}: {}", path.display(), source))]
        InputParse {
            path: PathBuf,
            #[snafu(source(from(toml::de::Error, Box::new)))]
            source: Box<toml::de::Error>,
        },

        #[snafu(display("{}", source))]
        Generate { source: kubeadm_ignition::Error },

        #[snafu(display("Unable to write output to {}: {}", path.display(), source))]
        OutputWrite {
            path: PathBuf,
            source: std::io::Error,
        },

        #[snafu(display("Unable to write output to stdout: {}", source))]
        Stdout { source: std::io::Error },
    }
}
type Result<T> = std::result::Result<T, error::Error>;
