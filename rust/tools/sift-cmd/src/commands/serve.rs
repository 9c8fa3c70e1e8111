//! Interactive query loop over stdin.

use std::io::{BufRead, Write};

use anyhow::Result;
use sift_index::{QueryProcessor, SearchOptions};

use super::{IndexArgs, format_result, open_processor, search_options};

pub fn run(args: IndexArgs, or: bool, limit: usize) -> Result<()> {
    let config = args.load_config()?;
    let processor = open_processor(&config)?;
    let options = search_options(or, Some(limit));
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let served = serve(&processor, &options, stdin.lock(), stdout.lock())?;
    log::info!("served {served} queries");
    Ok(())
}

/// Answers one query per input line until end of input or a line reading `e` or
/// `exit`. A failing query, including one that is not valid UTF-8, prints no
/// results and the loop carries on.
pub fn serve<R: BufRead, W: Write>(
    processor: &QueryProcessor,
    options: &SearchOptions,
    mut input: R,
    mut out: W,
) -> Result<usize> {
    let mut served = 0;
    let mut line = Vec::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let query = match std::str::from_utf8(&line) {
            Ok(text) => text.trim(),
            Err(e) => {
                log::warn!("skipping query that is not valid UTF-8: {e}");
                writeln!(out, "(0 results)")?;
                served += 1;
                continue;
            }
        };
        if query == "e" || query == "exit" {
            break;
        }
        if !query.is_empty() {
            let results = processor.search_or_empty(query, options);
            for doc in &results {
                writeln!(out, "{}", format_result(processor.reader(), doc))?;
            }
            writeln!(out, "({} results)", results.len())?;
            served += 1;
        }
    }
    Ok(served)
}
