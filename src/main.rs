use std::sync::Arc;

use storefront_session::config::{load_config, print_schema};
use storefront_session::navigation::TracingNavigator;
use storefront_session::startup::run;
use storefront_session::utils::logger::init_logging;

struct Args {
    schema: bool,
    logout: bool,
    callback_url: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        schema: false,
        logout: false,
        callback_url: None,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--schema" => args.schema = true,
            "--logout" => args.logout = true,
            "--callback" => {
                let url = iter
                    .next()
                    .ok_or_else(|| "--callback requires a URL".to_string())?;
                args.callback_url = Some(url);
            }
            other => return Err(format!("Unknown argument '{}'", other)),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: storefront-session [--schema] [--callback <url>] [--logout]");
            std::process::exit(2);
        }
    };

    if args.schema {
        print_schema();
        return;
    }

    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config, Arc::new(TracingNavigator), args.callback_url, args.logout).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
