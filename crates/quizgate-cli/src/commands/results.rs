use clap::Subcommand;
use quizgate_core::storage::Database;
use quizgate_core::CoreError;

#[derive(Subcommand)]
pub enum ResultsAction {
    /// Most recent results, newest first
    Recent {
        #[arg(long, default_value = "10")]
        limit: u32,
    },
}

pub fn run(action: ResultsAction) -> Result<(), CoreError> {
    let db = Database::open()?;
    match action {
        ResultsAction::Recent { limit } => {
            let results = db.recent_results(limit)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}
