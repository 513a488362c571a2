//! Line-oriented console in front of a [`Ledger`].
//!
//! Reads an action per line, prompts for the fields that action needs, runs
//! it against the ledger and prints the result. Every action is timed with a
//! [`Stopwatch`].

use crate::error::ConsoleError;
use crate::ledger::{Ledger, ProductStatistics, SearchQuery};
use crate::record::Revision;
use chrono::{DateTime, Utc};
use std::io::{BufRead, Write};
use std::time::Instant;
use tracing::info;

const LEGEND: &str = "Unrecognised action. Accepted actions:
view -> Current product ledger is printed.
add -> Create a new product record.
addMultiple -> Create multiple product records.
search -> Search for a product record.
statistics -> Show statistics of a product.
validate -> Check current ledger validity.
quit -> Terminates the application.";

/// An action entered at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    View,
    Add,
    AddMultiple,
    Search,
    Statistics,
    Validate,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse an action name, ignoring case and surrounding whitespace.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match input.to_ascii_lowercase().as_str() {
            "view" => Command::View,
            "add" => Command::Add,
            "addmultiple" => Command::AddMultiple,
            "search" => Command::Search,
            "statistics" => Command::Statistics,
            "validate" => Command::Validate,
            "quit" => Command::Quit,
            _ => Command::Unknown(input.to_string()),
        }
    }
}

/// Turn free-form price text into a number.
///
/// Commas count as decimal points, every character other than digits and
/// points is dropped, and only the last point is kept. Text that still does
/// not parse, or overflows to infinity, becomes `0.0`.
pub fn sanitize_price(raw: &str) -> f64 {
    let kept: String = raw
        .chars()
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let normalized = match kept.rfind('.') {
        Some(pos) => format!("{}.{}", kept[..pos].replace('.', ""), &kept[pos + 1..]),
        None => kept,
    };
    // A long enough run of digits parses to infinity, which JSON cannot store.
    normalized
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// Digits of `raw` as a count; `0` when there are none.
pub fn sanitize_count(raw: &str) -> usize {
    raw.chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Logs how long a named console action took.
pub struct Stopwatch {
    process: &'static str,
    started: Instant,
}

impl Stopwatch {
    pub fn start(process: &'static str) -> Self {
        info!(target: "ledger::console", process, "Process started");
        Self {
            process,
            started: Instant::now(),
        }
    }

    /// Stop the watch and return the elapsed seconds.
    pub fn stop(self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        info!(target: "ledger::console", process = self.process, elapsed_secs = elapsed, "Process finished");
        elapsed
    }
}

/// Interactive session owning the ledger it serves.
pub struct Console<R, W> {
    ledger: Ledger,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(ledger: Ledger, input: R, output: W) -> Self {
        Self { ledger, input, output }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Serve actions until `quit` or end of input.
    pub fn run(&mut self) -> Result<(), ConsoleError> {
        info!(
            target: "ledger::console",
            workers = self.ledger.config().workers,
            difficulty = self.ledger.config().difficulty,
            "Product ledger console started"
        );

        while let Some(line) = self.prompt("Enter action: ")? {
            match Command::parse(&line) {
                Command::View => self.view()?,
                Command::Add => self.add()?,
                Command::AddMultiple => self.add_multiple()?,
                Command::Search => self.search()?,
                Command::Statistics => self.statistics()?,
                Command::Validate => self.validate()?,
                Command::Quit => break,
                Command::Unknown(_) => writeln!(self.output, "{LEGEND}")?,
            }
        }

        info!(target: "ledger::console", "Product ledger console terminated");
        Ok(())
    }

    /// Print `text` and read one line. `None` at end of input.
    fn prompt(&mut self, text: &str) -> Result<Option<String>, ConsoleError> {
        writeln!(self.output, "{text}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    fn view(&mut self) -> Result<(), ConsoleError> {
        writeln!(self.output, "Current product ledger:")?;
        writeln!(self.output, "{}", serde_json::to_string_pretty(self.ledger.records())?)?;
        Ok(())
    }

    /// Collect the fields of one revision. `None` if input ended midway.
    fn read_revision(&mut self) -> Result<Option<Revision>, ConsoleError> {
        let Some(product_code) = self.prompt("Provide Product Code: ")? else {
            return Ok(None);
        };
        let Some(title) = self.prompt("Provide Product Title: ")? else {
            return Ok(None);
        };
        let Some(category) = self.prompt("Provide Product Category: ")? else {
            return Ok(None);
        };
        let Some(description) = self.prompt("Provide Product Description: ")? else {
            return Ok(None);
        };
        let Some(price) = self.prompt(
            "Provide Product Price (positive number with decimals, all other characters will be filtered): ",
        )?
        else {
            return Ok(None);
        };

        let revision = Revision::new(product_code, title, category, description, sanitize_price(&price));
        info!(
            target: "ledger::console",
            code = %revision.product_code,
            title = %revision.title,
            price = revision.price,
            "Product revision entered"
        );
        Ok(Some(revision))
    }

    fn add(&mut self) -> Result<(), ConsoleError> {
        let Some(revision) = self.read_revision()? else {
            return Ok(());
        };
        writeln!(self.output, "Please wait...")?;

        let watch = Stopwatch::start("add");
        let index = self.ledger.append(revision)?.index;
        watch.stop();

        writeln!(self.output, "Product record {index} has been created.")?;
        Ok(())
    }

    fn add_multiple(&mut self) -> Result<(), ConsoleError> {
        let mut text = "Provide Products Count (positive number without decimals, all other characters will be filtered): ";
        let count = loop {
            let Some(raw) = self.prompt(text)? else {
                return Ok(());
            };
            match sanitize_count(&raw) {
                0 => text = "Count must be a positive number without decimals. Please retry: ",
                n => break n,
            }
        };

        let mut revisions = Vec::new();
        for n in 1..=count {
            writeln!(self.output, "Creating Product: {n}")?;
            let Some(revision) = self.read_revision()? else {
                return Ok(());
            };
            revisions.push(revision);
        }
        writeln!(self.output, "Please wait...")?;

        let watch = Stopwatch::start("addMultiple");
        let appended = self.ledger.append_many(revisions)?;
        watch.stop();

        writeln!(self.output, "{appended} product records have been created.")?;
        Ok(())
    }

    fn search(&mut self) -> Result<(), ConsoleError> {
        let mut fields = Vec::with_capacity(4);
        for label in ["Code", "Title", "Category", "Description"] {
            let Some(value) = self.prompt(&format!("Provide Product {label} to search (leave empty if not required): "))? else {
                return Ok(());
            };
            fields.push(value);
        }

        let mut text = "Retrieve latest product (enter \"false\" for the oldest record, otherwise leave empty): ";
        let retrieve_latest = loop {
            let Some(raw) = self.prompt(text)? else {
                return Ok(());
            };
            if raw.is_empty() {
                break true;
            }
            if raw.eq_ignore_ascii_case("false") {
                break false;
            }
            text = "You must enter \"false\" for the oldest record, otherwise leave empty. Please retry: ";
        };

        if self.ledger.is_empty() {
            writeln!(self.output, "No products exist in the ledger.")?;
            return Ok(());
        }

        let mut fields = fields.into_iter();
        let query = SearchQuery {
            product_code: fields.next().unwrap_or_default(),
            title: fields.next().unwrap_or_default(),
            category: fields.next().unwrap_or_default(),
            description: fields.next().unwrap_or_default(),
            retrieve_latest,
        };

        let watch = Stopwatch::start("search");
        let found = self.ledger.search(&query)?;
        watch.stop();

        if found.is_empty() {
            writeln!(self.output, "No products matching your search found.")?;
        } else {
            writeln!(self.output, "Product records found:")?;
            writeln!(self.output, "{}", serde_json::to_string_pretty(&found)?)?;
        }
        Ok(())
    }

    fn statistics(&mut self) -> Result<(), ConsoleError> {
        let Some(code) = self.prompt("Provide Product Code to search: ")? else {
            return Ok(());
        };
        if self.ledger.is_empty() {
            writeln!(self.output, "No products exist in the ledger.")?;
            return Ok(());
        }

        let watch = Stopwatch::start("statistics");
        let stats = self.ledger.statistics(&code)?;
        watch.stop();

        match stats {
            Some(stats) => self.print_statistics(&stats)?,
            None => writeln!(self.output, "Product not found.")?,
        }
        Ok(())
    }

    fn print_statistics(&mut self, stats: &ProductStatistics) -> Result<(), ConsoleError> {
        writeln!(self.output, "Product found:")?;
        writeln!(self.output, "{}", serde_json::to_string_pretty(&stats.latest)?)?;
        writeln!(self.output, "- Price changes:")?;
        for point in &stats.history {
            writeln!(self.output, "\t{} -> {}", format_timestamp(point.timestamp), point.price)?;
        }
        writeln!(self.output, "Statistics:")?;
        writeln!(self.output, "- Revisions: {}", stats.revisions)?;
        writeln!(self.output, "- Price median: {}", stats.median_price)?;
        writeln!(self.output, "- Max price: {}", stats.max_price)?;
        writeln!(self.output, "- Min price: {}", stats.min_price)?;
        Ok(())
    }

    fn validate(&mut self) -> Result<(), ConsoleError> {
        let watch = Stopwatch::start("validate");
        let validation = self.ledger.validate();
        watch.stop();

        if validation.is_valid() {
            writeln!(self.output, "Ledger has been successfully validated.")?;
        } else {
            writeln!(self.output, "Ledger is not valid:")?;
            for violation in &validation.violations {
                writeln!(self.output, "- {violation}")?;
            }
        }
        Ok(())
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y/%m/%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}
