// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Mustekala CLI - Headless Chrome Rendering Proxy
//!
//! Example usage and demonstration of the mustekala library.

use std::env;
use std::process::ExitCode;

use mustekala::{Action, ProxyConfig, RenderRequest, RenderService};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mustekala=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    match args[1].as_str() {
        "screenshot" => {
            if args.len() < 3 {
                eprintln!("Usage: mustekala screenshot <url> [output]");
                return ExitCode::from(1);
            }
            run_action(Action::Screenshot, &args[2], args.get(3).map(String::as_str)).await
        }
        "render" => {
            if args.len() < 3 {
                eprintln!("Usage: mustekala render <url> [output]");
                return ExitCode::from(1);
            }
            run_action(Action::Render, &args[2], args.get(3).map(String::as_str)).await
        }
        "pdf" => {
            if args.len() < 3 {
                eprintln!("Usage: mustekala pdf <url> [output]");
                return ExitCode::from(1);
            }
            run_action(Action::Pdf, &args[2], args.get(3).map(String::as_str)).await
        }
        "--help" | "-h" | "help" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "--version" | "-v" | "version" => {
            println!("mustekala {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"Mustekala - Headless Chrome Rendering Proxy

USAGE:
    mustekala <COMMAND> <URL> [OUTPUT]

COMMANDS:
    screenshot <url> [output]   Capture a PNG screenshot (default: page.png)
    render <url> [output]       Save the sanitized HTML snapshot (default: stdout)
    pdf <url> [output]          Convert the page to PDF (default: page.pdf)
    help                        Show this help message
    version                     Show version information

EXAMPLES:
    mustekala screenshot https://example.com shot.png
    mustekala render "https://example.com/article?id=42"
    mustekala pdf https://example.com report.pdf

For more information, see: https://github.com/bountyyfi/mustekala
"#
    );
}

async fn run_action(action: Action, url: &str, output: Option<&str>) -> ExitCode {
    let service = match RenderService::new(ProxyConfig::default()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to build service: {}", e);
            return ExitCode::from(1);
        }
    };

    println!("Fetching: {}", url);
    let response = service.handle(RenderRequest::new(action, url)).await;

    if response.status_code != 200 {
        eprintln!("{}", String::from_utf8_lossy(&response.body));
        service.shutdown().await;
        return ExitCode::from(1);
    }

    let result = match (action, output) {
        (Action::Render, None) => {
            println!("{}", String::from_utf8_lossy(&response.body));
            Ok(())
        }
        (_, output) => {
            let path = output.unwrap_or(match action {
                Action::Screenshot => "page.png",
                Action::Render => "page.html",
                Action::Pdf => "page.pdf",
            });
            match tokio::fs::write(path, &response.body).await {
                Ok(()) => {
                    println!(
                        "Wrote {} bytes of {} to {}",
                        response.body.len(),
                        response.content_type,
                        path
                    );
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    };

    service.shutdown().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to write output: {}", e);
            ExitCode::from(1)
        }
    }
}
