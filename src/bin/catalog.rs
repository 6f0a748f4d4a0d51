use std::env;
use std::path::PathBuf;

use airflow_catalog::AppConfig;
use env_logger::Env;

fn print_usage() {
    eprintln!("Usage: catalog [--config PATH] <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve               Start the HTTP API server");
    eprintln!("  list                Print the cases matching the filters");
    eprintln!("  download            Download the selected files");
    eprintln!();
    eprintln!("Options for list and download:");
    eprintln!("  --filter DIM=VALUE  Accept VALUE for a dimension (repeatable)");
    eprintln!("                      DIM: country, city, height_distribution,");
    eprintln!("                           wind_direction, density, alignment");
    eprintln!("  --search TEXT       Match case names (case-insensitive)");
    eprintln!("  --type EXT[,EXT]    Only files with these extensions");
    eprintln!("  --case ID           Select every visible file of a case (repeatable)");
    eprintln!("  --file ID:KEY       Select one file of a case (repeatable)");
    eprintln!("  --all               Select every visible case");
    eprintln!("  --mode MODE         archive (default) or direct");
    eprintln!("  -o, --output DIR    Where files and archives are written");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --config PATH       Configuration file (default: $CATALOG_CONFIG or");
    eprintln!("                      the user config directory)");
    eprintln!("  -h, --help          Show this help");
}

fn exit_with(message: &str) -> ! {
    eprintln!("Error: {message}");
    eprintln!();
    print_usage();
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> airflow_catalog::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut config_path: Option<PathBuf> = None;
    let mut command: Option<String> = None;
    let mut rest = Vec::new();

    let args: Vec<String> = env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--config" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config_path = Some(PathBuf::from(path)),
                    None => exit_with("--config requires a value"),
                }
            }
            arg if command.is_none() && !arg.starts_with('-') => command = Some(arg.to_string()),
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let Some(command) = command else {
        print_usage();
        std::process::exit(0);
    };

    let config = AppConfig::load_or_default(config_path.as_deref())?;

    match command.as_str() {
        "serve" => {
            if !rest.is_empty() {
                exit_with(&format!("serve takes no options, got {}", rest.join(" ")));
            }
            #[cfg(feature = "server")]
            {
                airflow_catalog::api::run_server(&config).await
            }
            #[cfg(not(feature = "server"))]
            {
                eprintln!("Server support not compiled in");
                std::process::exit(1);
            }
        }
        "list" | "download" => {
            #[cfg(feature = "cli")]
            {
                use airflow_catalog::cli::{CommandOptions, run_download, run_list};

                let options = CommandOptions::parse(&rest).unwrap_or_else(|e| exit_with(&e));
                if command == "list" {
                    run_list(&config, &options).await
                } else {
                    run_download(&config, &options).await
                }
            }
            #[cfg(not(feature = "cli"))]
            {
                let _ = (config, rest);
                eprintln!("CLI support not compiled in");
                std::process::exit(1);
            }
        }
        other => exit_with(&format!("unknown command: {other}")),
    }
}
