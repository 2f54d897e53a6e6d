use clap::{Parser as ClapParser, Subcommand};
use odata_filter::{Filter, Lexer, Query, Value};
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "odata-filter")]
#[command(about = "Compile OData $filter expressions to SQL, MongoDB, or in-memory predicates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the token stream for a filter expression
    Tokens {
        /// The $filter expression to lex
        filter: String,
    },

    /// Compile a filter expression for a backend
    Compile {
        /// The $filter expression to compile
        filter: String,

        /// Backend to lower to (mysql, gorm, mongodb)
        #[arg(short, long, default_value = "mysql")]
        backend: String,

        /// Positional placeholder values, bound to ':0', ':1', ... in order
        #[arg(short, long)]
        arg: Vec<String>,
    },

    /// Filter a JSON array through the in-memory backend
    Run {
        /// The $filter expression to apply
        filter: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Tokens { filter } => {
            let mut lexer = Lexer::new(&filter)?;
            while let Some(token) = lexer.next_token()? {
                println!(
                    "{:>4} {:>4}  {:<22} {}",
                    token.start, token.end, token.kind, token.text
                );
            }
            Ok(())
        }
        Commands::Compile {
            filter,
            backend,
            arg,
        } => {
            let compiled = Filter::compile(&filter)?;
            let args: Vec<Value> = arg.iter().map(|raw| parse_arg(raw)).collect();
            let query = if args.is_empty() {
                compiled.compile_for(&backend)?
            } else {
                compiled.compile_for_with_args(&backend, &args)?
            };
            match query {
                Query::Sql(sql) => println!("{}", sql),
                Query::Clause(clause) => {
                    println!("{}", clause.clause);
                    for value in &clause.args {
                        println!("  {}", serde_json::to_string(&value.to_json())?);
                    }
                }
                Query::Document(doc) => println!("{}", serde_json::to_string(&doc)?),
                Query::Evaluator(_) => {
                    println!("in-memory evaluator (use `run` to filter records)")
                }
            }
            Ok(())
        }
        Commands::Run { filter, input } => {
            let compiled = Filter::compile(&filter)?;
            let text = match input {
                Some(text) => text,
                None => {
                    let mut buffer = String::new();
                    io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let records: Vec<serde_json::Value> = serde_json::from_str(&text)?;
            let evaluator = compiled
                .compile_for("memory")?
                .into_evaluator()
                .expect("memory backend produces an evaluator");
            let kept = evaluator.filter_slice(&records)?;
            println!("{}", serde_json::to_string(&kept)?);
            Ok(())
        }
    }
}

/// Placeholder values from the command line: integer, then float, then
/// string, mirroring the literal forms substitution supports.
fn parse_arg(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Integer(n);
    }
    if let Ok(n) = raw.parse::<f64>() {
        return Value::Float(n);
    }
    Value::String(raw.to_string())
}
