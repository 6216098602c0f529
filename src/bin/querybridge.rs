//! querybridge: the command-line front end.
//!
//! ```bash
//! querybridge rest sql 'GET /users?age=gte.18&status=eq.active'
//! echo "DELETE FROM users WHERE id = 1" | querybridge sql dsl
//! querybridge dsl rest "supabase.from('users').insert({ name: 'Alice' })" --json
//! ```

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use querybridge::codec::OPERATORS;
use querybridge::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "querybridge")]
#[command(version)]
#[command(about = "Translate queries between SQL, PostgREST requests and client chains", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "EXAMPLES:
    querybridge rest sql 'GET /users?select=name&age=gte.18'
    querybridge sql rest 'UPDATE users SET active = false WHERE id = 7'
    querybridge dsl sql \"supabase.from('users').select('*').eq('id', 1)\"")]
struct Cli {
    /// Input syntax: sql, rest or dsl
    from: Option<Syntax>,

    /// Output syntax: sql, rest or dsl
    to: Option<Syntax>,

    /// The query to convert. Read from stdin when omitted.
    input: Option<String>,

    /// Print the full result envelope as JSON
    #[arg(long)]
    json: bool,

    /// Reject unknown DSL methods instead of ignoring them
    #[arg(long)]
    strict: bool,

    /// Options file (TOML)
    #[arg(short, long, env = "QUERYBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the operator table
    Operators,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(Commands::Operators) = cli.command {
        show_operators();
        return;
    }

    let (Some(from), Some(to)) = (cli.from, cli.to) else {
        println!("{}", "querybridge".cyan().bold());
        println!();
        println!("Usage: querybridge <FROM> <TO> [INPUT]");
        println!();
        println!("Try: querybridge --help");
        return;
    };

    if let Err(e) = run(&cli, from, to) {
        report(&e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `warn`, or `debug` with `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli, from: Syntax, to: Syntax) -> Result<()> {
    let mut options = match &cli.config {
        Some(path) => ConvertOptions::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ConvertOptions::discover().context("failed to load config")?,
    };
    if cli.strict {
        options.strict_methods = true;
    }

    let input = match &cli.input {
        Some(input) => input.clone(),
        None => read_stdin()?,
    };
    if cli.verbose {
        eprintln!("{} {}", "Input:".dimmed(), input.trim().yellow());
    }

    let converter = Converter::new(options);
    let result = converter.convert(from, to, &input)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.http_only {
        println!("{} {}", "HTTP only:".cyan().bold(), result.output);
        if let Some(request) = &result.http {
            println!("{}", request);
        }
    } else {
        println!("{}", result.output);
    }

    for warning in &result.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    if cli.verbose {
        for (key, value) in &result.metadata {
            eprintln!("{} {} = {}", "meta:".dimmed(), key, value);
        }
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        anyhow::bail!("no input: pass the query as an argument or pipe it on stdin");
    }
    let input = std::io::read_to_string(stdin).context("failed to read stdin")?;
    if input.trim().is_empty() {
        anyhow::bail!("stdin was empty");
    }
    Ok(input)
}

fn report(error: &anyhow::Error) {
    match error.downcast_ref::<ConvertError>() {
        Some(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e.to_string().red());
            if !e.fragment().is_empty() {
                eprintln!("  {} {}", "at:".dimmed(), e.fragment());
            }
            if !e.hint_text().is_empty() {
                eprintln!("  {} {}", "hint:".cyan(), e.hint_text());
            }
        }
        None => eprintln!("{} {:#}", "Error:".red().bold(), error),
    }
}

fn show_operators() {
    println!("{}", "Operators".cyan().bold());
    println!();
    println!("  {:<8} {:<24} {}", "TAG".bold(), "SQL".bold(), "CHAIN METHOD".bold());
    for entry in OPERATORS.iter() {
        let sql = match entry.ts_function {
            Some(function) => format!("{} {}", entry.sql, function),
            None => entry.sql.to_string(),
        };
        let method = match entry.dsl_method {
            Some(method) => format!(".{}()", method),
            None if entry.ts_function.is_some() => ".textSearch()".to_string(),
            None => format!(".filter(col, '{}', v)", entry.tag),
        };
        println!("  {:<8} {:<24} {}", entry.tag.yellow(), sql, method.dimmed());
    }
}
