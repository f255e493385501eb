use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dwh::TransferMode;

/// Loads raw financial data into the staging schema and the dimensional warehouse.
#[derive(Parser, Debug)]
#[command(name = "dwh-loader", version)]
#[command(about = "Stages raw tables and merges them into the financial warehouse")]
pub struct Cli {
    /// Print the run report as JSON on stdout once the command finishes
    #[arg(long, global = true)]
    pub report_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the schemas, dimensions and fact tables, then seed the configured date range
    Prepare,

    /// Add every day from START to END inclusive to the date dimension
    SeedDates {
        #[arg(long, value_name = "START")]
        start: NaiveDate,
        #[arg(long, value_name = "END")]
        end: NaiveDate,
    },

    /// Copy one raw table into its staging table
    Transfer {
        /// Raw table name, e.g. raw_yfinance
        table: String,
        /// `full` (or `historical`) or `incremental`; defaults to the configured mode
        #[arg(long)]
        mode: Option<TransferMode>,
    },

    /// Merge staging into one dimension or fact table
    Merge {
        /// Warehouse table name, e.g. dim_company_informations
        table: String,
    },

    /// Copy every raw table into staging
    Stage {
        #[arg(long)]
        mode: Option<TransferMode>,
    },

    /// Merge the company dimension, then every fact table
    Transform,

    /// Stage every raw table, then run every transform
    Run {
        #[arg(long)]
        mode: Option<TransferMode>,
    },
}

impl Command {
    /// Whether the command processes every table of a stage.
    pub fn spans_tables(&self) -> bool {
        matches!(
            self,
            Command::Stage { .. } | Command::Transform | Command::Run { .. }
        )
    }

    /// Transfer mode requested on the command line, if the command copies raw tables.
    pub fn requested_mode(&self) -> Option<TransferMode> {
        match self {
            Command::Transfer { mode, .. } | Command::Stage { mode } | Command::Run { mode } => {
                *mode
            }
            _ => None,
        }
    }
}
