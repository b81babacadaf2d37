use std::{env, path::PathBuf, process};

use sqlitedag::{
    DagError, SqliteDag,
    cli::{CommandLineConfig, handle_command},
};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", CommandLineConfig::help());
        return;
    }
    let arg_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let config = match CommandLineConfig::from_args(&arg_refs) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let dag = match open_dag(&config) {
        Ok(dag) => dag,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };

    match handle_command(&dag, &config.command, &config.args) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("command failed: {err}");
            process::exit(1);
        }
    }
}

fn open_dag(config: &CommandLineConfig) -> Result<SqliteDag, DagError> {
    if config.database == "memory" {
        SqliteDag::open_in_memory()
    } else {
        SqliteDag::open(PathBuf::from(&config.database))
    }
}
