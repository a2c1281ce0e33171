//! cosheet CLI - evaluate formulas and replay edit scripts

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use cosheet::prelude::*;
use cosheet::EntryId;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cosheet")]
#[command(author, version, about = "Collaborative spreadsheet engine tool")]
struct Cli {
    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single formula, e.g. `=2*3+4`
    Eval {
        /// Formula text; the leading '=' is optional
        formula: String,
    },

    /// Replay an edit script against an empty sheet and print the result
    Run {
        /// Script file, one command per line
        script: PathBuf,

        /// Initial number of rows
        #[arg(short, long, default_value = "10")]
        rows: u32,

        /// Initial number of columns
        #[arg(short, long, default_value = "10")]
        cols: u16,

        /// Name recorded as the author of every edit
        #[arg(short, long, default_value = "cli")]
        user: String,
    },
}

/// One line of an edit script
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Set(CellAddress, String),
    Clear(CellAddress),
    InsertRow(u32),
    DeleteRow(u32),
    InsertColumn(u32),
    DeleteColumn(u32),
    Revert(CellAddress, EntryId),
    History(CellAddress),
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    match cli.command {
        Commands::Eval { formula } => eval(&formula),
        Commands::Run {
            script,
            rows,
            cols,
            user,
        } => run(&script, rows, cols, &User::from_id(user)),
    }
}

fn eval(formula: &str) -> Result<()> {
    let text = if formula.trim_start().starts_with('=') {
        formula.to_string()
    } else {
        format!("={}", formula)
    };

    let mut sheet = Spreadsheet::new(1, 1);
    sheet.update_contents("A1", &text, &User::from_id("cli"))?;
    let cell = sheet.cell("A1")?;
    println!("{}", cell.display());

    if let Some(error) = cell.error() {
        bail!("{}", error);
    }
    Ok(())
}

fn run(script: &Path, rows: u32, cols: u16, user: &User) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("Failed to read '{}'", script.display()))?;
    let commands = parse_script(&source)?;

    let mut sheet = Spreadsheet::new(rows, cols);
    let mut out = io::stdout().lock();
    for (line, command) in commands {
        log::debug!("line {}: {:?}", line, command);
        execute(&mut sheet, command, user, &mut out)
            .with_context(|| format!("line {} failed", line))?;
    }
    Ok(())
}

fn execute<W: Write>(
    sheet: &mut Spreadsheet,
    command: Command,
    user: &User,
    out: &mut W,
) -> Result<()> {
    let stats = match command {
        Command::Set(addr, text) => sheet.update_contents_at(addr, &text, user)?,
        Command::Clear(addr) => sheet.clear_cell(addr, user)?,
        Command::InsertRow(n) => sheet.insert_row(n, user)?,
        Command::DeleteRow(n) => sheet.delete_row(n, user)?,
        Command::InsertColumn(n) => sheet.insert_column(n, user)?,
        Command::DeleteColumn(n) => sheet.delete_column(n, user)?,
        Command::Revert(addr, entry) => sheet.revert(addr, entry)?,
        Command::History(addr) => {
            print_history(sheet, addr, out)?;
            return Ok(());
        }
        Command::Show => {
            print_sheet(sheet, out)?;
            return Ok(());
        }
    };

    if stats.circular_references > 0 {
        log::warn!("{} cells on a reference cycle", stats.circular_references);
    }
    log::info!(
        "recalculated {} cells ({} errors)",
        stats.cells_calculated,
        stats.errors
    );
    Ok(())
}

/// Parse a script into commands tagged with their 1-based line numbers
///
/// Blank lines and lines starting with '#' are skipped.
fn parse_script(source: &str) -> Result<Vec<(usize, Command)>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            parse_command(line.trim())
                .with_context(|| format!("line {}: cannot parse '{}'", i + 1, line.trim()))
                .map(|command| (i + 1, command))
        })
        .collect()
}

fn parse_command(line: &str) -> Result<Command> {
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim_start();

    match word {
        "set" => {
            let (address, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Ok(Command::Set(address_arg(address)?, text.to_string()))
        }
        "clear" => Ok(Command::Clear(address_arg(rest)?)),
        "insert-row" => Ok(Command::InsertRow(index_arg(rest)?)),
        "delete-row" => Ok(Command::DeleteRow(index_arg(rest)?)),
        "insert-column" => Ok(Command::InsertColumn(index_arg(rest)?)),
        "delete-column" => Ok(Command::DeleteColumn(index_arg(rest)?)),
        "revert" => {
            let (address, entry) = rest
                .split_once(' ')
                .ok_or_else(|| anyhow!("expected 'revert <address> <version>'"))?;
            let entry: EntryId = entry.trim().parse()?;
            Ok(Command::Revert(address_arg(address)?, entry))
        }
        "history" => Ok(Command::History(address_arg(rest)?)),
        "show" => Ok(Command::Show),
        other => bail!("unknown command '{}'", other),
    }
}

fn address_arg(text: &str) -> Result<CellAddress> {
    CellAddress::parse(text.trim()).with_context(|| format!("bad cell address '{}'", text))
}

fn index_arg(text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .with_context(|| format!("bad index '{}'", text))
}

/// Print every non-empty cell as `address<TAB>input<TAB>display`
fn print_sheet<W: Write>(sheet: &Spreadsheet, out: &mut W) -> Result<()> {
    let (rows, cols) = sheet.dimensions();
    writeln!(out, "# {} rows x {} columns", rows, cols)?;
    for (addr, cell) in sheet.cells().filter(|(_, cell)| !cell.is_empty()) {
        writeln!(out, "{}\t{}\t{}", addr, cell.input(), cell.display())?;
    }
    Ok(())
}

fn print_history<W: Write>(sheet: &Spreadsheet, addr: CellAddress, out: &mut W) -> Result<()> {
    let history = sheet.cell_at(addr)?.history();
    for (index, branch) in history.branches().iter().enumerate() {
        match branch.parent() {
            Some(parent) => writeln!(out, "branch {} (from {})", index, parent.entry)?,
            None => writeln!(out, "branch {}", index)?,
        }
        for entry in branch.entries() {
            writeln!(
                out,
                "  {}\t{}\t{}\t{:?}",
                entry.id(),
                entry.timestamp().format("%Y-%m-%d %H:%M:%S"),
                entry.author().name(),
                entry.content()
            )?;
        }
    }
    Ok(())
}
