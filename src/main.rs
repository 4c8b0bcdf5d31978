use std::ffi::OsString;

use benchctl::args::{ControllerArgs, partition_raw_args};
use benchctl::{app, logger};
use clap::{CommandFactory, FromArgMatches};
use tracing::error;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cmd = ControllerArgs::command();
    let raw: Vec<OsString> = std::env::args_os().collect();
    let (kept, overrides) = partition_raw_args(&cmd, raw);

    let matches = cmd.get_matches_from(kept);
    let args = match ControllerArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => {
            let _print_result = err.print();
            return 2;
        }
    };

    logger::init_logging(args.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to build runtime: {}", err);
            return -1;
        }
    };

    runtime.block_on(async move {
        match app::execute(args, overrides).await {
            Ok(code) => code,
            Err(err) => {
                error!("{}", err);
                if err.is_preflight() { -1 } else { 1 }
            }
        }
    })
}
