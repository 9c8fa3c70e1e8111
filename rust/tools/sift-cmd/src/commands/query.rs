//! Query command implementation

use anyhow::{Context, Result};

use super::{IndexArgs, format_result, open_processor, search_options};

pub fn run(args: IndexArgs, or: bool, limit: Option<usize>, query: Vec<String>) -> Result<()> {
    let config = args.load_config()?;
    let processor = open_processor(&config)?;
    let query = query.join(" ");
    let results = processor
        .search(&query, &search_options(or, limit))
        .with_context(|| format!("Query {query:?} failed"))?;
    for doc in &results {
        println!("{}", format_result(processor.reader(), doc));
    }
    log::info!("{} results for {query:?}", results.len());
    Ok(())
}
