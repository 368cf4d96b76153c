//! Component Weave CLI
//!
//! Usage:
//!   component-weave [OPTIONS] [FILE]
//!
//! Options:
//!   -c, --components <DIR>   Directory of NAME.html components (repeatable)
//!   -s, --settings <FILE>    Settings file (TOML format)
//!       --strategy <NAME>    Dependency strategy
//!       --isolated           Components see only globals and their own data
//!   -D, --define <KEY=VALUE> Global template variable (repeatable)
//!   -h, --help               Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use component_weave::{
    ContextBehavior, DependencyStrategy, Engine, Environment, RenderError, Settings,
};

#[derive(Parser)]
#[command(name = "component-weave")]
#[command(about = "Render a page template against a directory of components")]
struct Cli {
    /// Page template (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Directory of components: NAME.html with optional NAME.css / NAME.js
    #[arg(short, long = "components", value_name = "DIR")]
    components: Vec<PathBuf>,

    /// Settings file (TOML format)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Dependency strategy: document, simple, fragment, prepend, append, ignore
    #[arg(long)]
    strategy: Option<DependencyStrategy>,

    /// Render components with isolated scoping
    #[arg(long)]
    isolated: bool,

    /// Global variable available to every template
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_define)]
    defines: Vec<(String, String)>,
}

fn parse_define(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // If no input file and stdin is a terminal (interactive), show help
    if cli.input.is_none() && io::stdin().is_terminal() {
        print_intro();
        return;
    }

    // Load settings
    let mut settings = match &cli.settings {
        Some(path) => match Settings::from_file(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error loading settings '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };
    if cli.isolated {
        settings = settings.with_context_behavior(ContextBehavior::Isolated);
    }
    for dir in &cli.components {
        settings = settings.with_dir(dir.clone());
    }

    let mut engine = Engine::new(settings);
    for dir in &cli.components {
        match engine.registry_mut().load_dir(dir) {
            Ok(count) => tracing::info!(dir = %dir.display(), count, "loaded components"),
            Err(e) => {
                eprintln!("Error loading components from '{}': {}", dir.display(), e);
                std::process::exit(1);
            }
        }
    }

    // Read input
    let (source, filename) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            match io::stdin().read_to_string(&mut buffer) {
                Ok(_) => (buffer, "<stdin>".to_string()),
                Err(e) => {
                    eprintln!("Error reading from stdin: {}", e);
                    std::process::exit(1);
                }
            }
        }
    };

    let mut env = Environment::new();
    for (key, value) in cli.defines {
        env.set_global(key, value);
    }

    match engine.render_source(&source, env, cli.strategy) {
        Ok(html) => {
            println!("{}", html);
        }
        Err(e) => {
            if matches!(e, RenderError::Parse { .. }) {
                eprintln!("Error in {}:", filename);
            }
            eprintln!("{}", e.report());
            std::process::exit(1);
        }
    }
}

fn print_intro() {
    println!(
        r#"Component Weave - nestable template components

USAGE:
    component-weave [OPTIONS] [FILE]
    echo '<template>' | component-weave -c components/

OPTIONS:
    -c, --components   Directory of NAME.html components (repeatable)
    -s, --settings     Settings file (TOML)
    --strategy         document | simple | fragment | prepend | append | ignore
    --isolated         Components see only globals and their own data
    -D, --define       Global variable KEY=VALUE (repeatable)
    -h, --help         Print help

QUICK START:
    echo '{{% component "card" title="Hi" / %}}' | component-weave -c components/

Set RUST_LOG=component_weave=debug to trace scheduling and dependency collection."#
    );
}
