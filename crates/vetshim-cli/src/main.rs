//! vetshim command-line front end

mod commands;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::{BuildArgs, BundlesArgs, CheckArgs};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vetshim_transform::BuildOptions;

fn cli() -> Command {
    let file = || {
        Arg::new("file")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Application source file (.jsx or .tsx)")
    };
    let strict = || {
        Arg::new("strict")
            .long("strict")
            .action(ArgAction::SetTrue)
            .help("Treat advisory findings as errors")
    };

    Command::new("vetshim")
        .version(vetshim_transform::VERSION)
        .about("Vet and build AI-generated apps for the sandbox runtime")
        .subcommand_required(true)
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
        .subcommand(
            Command::new("check")
                .about("Run security validation only")
                .arg(file())
                .arg(strict()),
        )
        .subcommand(
            Command::new("bundles")
                .about("List the runtime bundles a source needs")
                .arg(file())
                .arg(
                    Arg::new("base-path")
                        .long("base-path")
                        .help("URL prefix for bundle files"),
                ),
        )
        .subcommand(
            Command::new("build")
                .about("Build an executable payload")
                .arg(file())
                .arg(
                    Arg::new("app-id")
                        .long("app-id")
                        .help("Application id (defaults to the file stem)"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Pipeline configuration (TOML)"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the payload here instead of stdout"),
                )
                .arg(
                    Arg::new("esbuild")
                        .long("esbuild")
                        .default_value("esbuild")
                        .value_parser(value_parser!(PathBuf))
                        .help("Transpiler executable"),
                )
                .arg(
                    Arg::new("minify")
                        .long("minify")
                        .action(ArgAction::SetTrue)
                        .help("Minify transpiled code"),
                )
                .arg(
                    Arg::new("source-maps")
                        .long("source-maps")
                        .action(ArgAction::SetTrue)
                        .help("Embed an inline source map"),
                )
                .arg(strict()),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn file_arg(matches: &ArgMatches) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>("file")
        .cloned()
        .context("missing source file")
}

async fn run(matches: ArgMatches) -> Result<ExitCode> {
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("check", sub)) => {
            commands::check(CheckArgs {
                file: file_arg(sub)?,
                strict: sub.get_flag("strict"),
                json,
            })
            .await
        }
        Some(("bundles", sub)) => {
            commands::bundles(BundlesArgs {
                file: file_arg(sub)?,
                base_path: sub.get_one::<String>("base-path").cloned(),
                json,
            })
            .await
        }
        Some(("build", sub)) => {
            let options = BuildOptions::default()
                .with_minify(sub.get_flag("minify"))
                .with_source_maps(sub.get_flag("source-maps"))
                .with_strict(sub.get_flag("strict"));
            commands::build(BuildArgs {
                file: file_arg(sub)?,
                app_id: sub.get_one::<String>("app-id").cloned(),
                config: sub.get_one::<PathBuf>("config").cloned(),
                out: sub.get_one::<PathBuf>("out").cloned(),
                esbuild: sub
                    .get_one::<PathBuf>("esbuild")
                    .cloned()
                    .context("missing transpiler path")?,
                options,
                json,
            })
            .await
        }
        _ => {
            cli().print_help()?;
            Ok(ExitCode::from(2))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    match run(matches).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn build_flags_parse() {
        let matches = cli()
            .try_get_matches_from([
                "vetshim", "build", "app.tsx", "--minify", "--strict", "-o", "out.js", "--json",
            ])
            .unwrap();
        assert!(matches.get_flag("json"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "build");
        assert!(sub.get_flag("minify"));
        assert!(!sub.get_flag("source-maps"));
        assert_eq!(
            sub.get_one::<PathBuf>("esbuild").unwrap(),
            &PathBuf::from("esbuild")
        );
        assert_eq!(file_arg(sub).unwrap(), PathBuf::from("app.tsx"));
    }

    #[test]
    fn check_requires_file() {
        assert!(cli().try_get_matches_from(["vetshim", "check"]).is_err());
    }
}
