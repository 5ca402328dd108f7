//! Command-line access to raw documents.
//!
//! # Responsibility
//! - Resolve client configuration from the environment.
//! - Read, query and delete documents without a typed schema.
//! - Print one JSON object per document on stdout.

use clap::{Parser, Subcommand};
use firecoll_core::query::plan::{plan_query, run_plan};
use firecoll_core::schema::validate::validate_collection_name;
use firecoll_core::{
    init_logging_from_config, open_store, ClientConfig, Condition, Document, DocumentId,
    DocumentStore, OrderBy,
};
use log::info;
use serde_json::Value;
use std::error::Error;
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "firecoll")]
#[command(about = "Inspect document collections", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one document
    Get {
        collection: String,
        id: String,
    },
    /// Print every document in a collection
    List {
        collection: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Print documents matching all filters
    Query {
        collection: String,
        /// Filter as `FIELD OP VALUE`, e.g. `age >= 18`; VALUE is parsed as JSON
        #[arg(short = 'w', long = "where", required = true)]
        filters: Vec<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Delete one document
    Delete {
        collection: String,
        id: String,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    /// Maximum number of documents; 0 means unlimited
    #[arg(short, long)]
    limit: Option<usize>,
    /// Field to order by
    #[arg(short, long)]
    order_by: Option<String>,
    /// Order descending
    #[arg(long, requires = "order_by")]
    desc: bool,
}

impl PageArgs {
    fn order(&self) -> Vec<OrderBy> {
        match &self.order_by {
            Some(field) if self.desc => vec![OrderBy::desc(field.as_str())],
            Some(field) => vec![OrderBy::asc(field.as_str())],
            None => Vec::new(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("firecoll: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = ClientConfig::from_env()?;
    init_logging_from_config(&config)?;
    let store = open_store(&config)?;
    info!(
        "event=cli_start module=cli status=ok project_id={} version={}",
        config.project_id,
        firecoll_core::core_version()
    );

    match cli.command {
        Commands::Get { collection, id } => {
            validate_collection_name(&collection)?;
            let id = DocumentId::parse(id)?;
            match store.get_document(&collection, &id)? {
                Some(document) => print_document(document),
                None => Err(format!("document {collection}.{id} could not be found").into()),
            }
        }
        Commands::List { collection, page } => {
            let documents = run_conditions(&store, &collection, Vec::new(), &page)?;
            documents.into_iter().try_for_each(print_document)
        }
        Commands::Query {
            collection,
            filters,
            page,
        } => {
            let conditions = filters
                .iter()
                .map(|filter| parse_filter(filter))
                .collect::<CliResult<Vec<_>>>()?;
            let documents = run_conditions(&store, &collection, conditions, &page)?;
            documents.into_iter().try_for_each(print_document)
        }
        Commands::Delete { collection, id } => {
            validate_collection_name(&collection)?;
            let id = DocumentId::parse(id)?;
            store.delete_document(&collection, &id)?;
            info!("event=cli_delete module=cli status=ok collection={collection} id={id}");
            Ok(())
        }
    }
}

fn run_conditions(
    store: &impl DocumentStore,
    collection: &str,
    conditions: Vec<Condition>,
    page: &PageArgs,
) -> CliResult<Vec<Document>> {
    validate_collection_name(collection)?;
    let plan = plan_query(conditions, page.limit, &page.order())?;
    Ok(run_plan(store, collection, &plan)?)
}

/// Parses `FIELD OP VALUE`; a VALUE that is not valid JSON is taken as a string.
fn parse_filter(raw: &str) -> CliResult<Condition> {
    let mut parts = raw.trim().splitn(3, char::is_whitespace);
    let (Some(field), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("filter `{raw}` must look like `FIELD OP VALUE`").into());
    };

    let value = value.trim();
    let value = serde_json::from_str::<Value>(value)
        .unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(Condition::new(field, op.parse()?, value))
}

fn print_document(document: Document) -> CliResult<()> {
    println!("{}", serde_json::to_string(&document.into_value())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_filter, Cli};
    use clap::CommandFactory;
    use firecoll_core::Operator;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_filter_reads_json_operands() {
        let condition = parse_filter("age >= 18").unwrap();
        assert_eq!(condition.field, "age");
        assert_eq!(condition.op, Operator::GreaterThanOrEqual);
        assert_eq!(condition.value, json!(18));

        let condition = parse_filter(r#"tags array-contains-any ["a", "b"]"#).unwrap();
        assert_eq!(condition.op, Operator::ArrayContainsAny);
        assert_eq!(condition.value, json!(["a", "b"]));
    }

    #[test]
    fn parse_filter_falls_back_to_strings() {
        let condition = parse_filter("email == john@doe.com").unwrap();
        assert_eq!(condition.value, json!("john@doe.com"));
    }

    #[test]
    fn parse_filter_rejects_incomplete_input() {
        assert!(parse_filter("age >=").is_err());
        assert!(parse_filter("age ~ 3").is_err());
    }
}
