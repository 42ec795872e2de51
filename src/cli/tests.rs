//! Unit tests for CLI commands

use crate::cli::{Cli, Commands};
use clap::Parser;

#[test]
fn test_serve_defaults() {
    let cli = Cli::try_parse_from(["alice-httpd", "serve"]).unwrap();

    match cli.command {
        Commands::Serve {
            host,
            port,
            cert,
            key,
            scripts_dir,
            public_dir,
            rate_limit,
            rate_window_secs,
        } => {
            assert_eq!(host, "0.0.0.0");
            assert_eq!(port, 8443);
            assert_eq!(cert.to_string_lossy(), "server.crt");
            assert_eq!(key.to_string_lossy(), "server.key");
            assert_eq!(scripts_dir.to_string_lossy(), "ass_scripts");
            assert_eq!(public_dir.to_string_lossy(), "public");
            assert_eq!(rate_limit, 100);
            assert_eq!(rate_window_secs, 60);
        }
        Commands::Render { .. } => panic!("Expected Serve command"),
    }
}

#[test]
fn test_serve_with_flags() {
    let cli = Cli::try_parse_from([
        "alice-httpd",
        "serve",
        "--host",
        "127.0.0.1",
        "--port",
        "9443",
        "--rate-limit",
        "3",
        "--rate-window-secs",
        "10",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            host,
            port,
            rate_limit,
            rate_window_secs,
            ..
        } => {
            assert_eq!(host, "127.0.0.1");
            assert_eq!(port, 9443);
            assert_eq!(rate_limit, 3);
            assert_eq!(rate_window_secs, 10);
        }
        Commands::Render { .. } => panic!("Expected Serve command"),
    }
}

#[test]
fn test_render_command() {
    let cli = Cli::try_parse_from([
        "alice-httpd",
        "render",
        "--template",
        "ass_scripts/index.ass",
        "--user",
        "admin",
    ])
    .unwrap();

    match cli.command {
        Commands::Render { template, user } => {
            assert_eq!(template.to_string_lossy(), "ass_scripts/index.ass");
            assert_eq!(user.as_deref(), Some("admin"));
        }
        Commands::Serve { .. } => panic!("Expected Render command"),
    }
}

#[test]
fn test_all_commands_parse() {
    // Verify all commands can be parsed
    let commands = vec![
        vec!["alice-httpd", "serve"],
        vec!["alice-httpd", "serve", "--port", "8444"],
        vec!["alice-httpd", "render", "--template", "x.ass"],
    ];

    for args in commands {
        let cli = Cli::try_parse_from(&args);
        assert!(cli.is_ok(), "Failed to parse command: {:?}", args);
    }
}
