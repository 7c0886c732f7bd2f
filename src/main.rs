use std::process::ExitCode;

use clap::{CommandFactory, FromArgMatches};

use graft::cli::{self, Cli, Command};

fn main() -> ExitCode {
    // Parsed twice on purpose: the typed Cli for the argument values, the
    // raw matches for the value indices that order interleaved flags.
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    let result = match &cli.command {
        Command::Patch(args) => match matches.subcommand_matches("patch") {
            Some(sub) => cli::run_patch(args, sub),
            None => Ok(()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("graft: {err}");
            ExitCode::FAILURE
        }
    }
}
