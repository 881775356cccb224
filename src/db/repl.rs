//! Interactive REPL (Read-Eval-Print Loop) for exercising a coordinator.
//!
//! Each line is one call a participant would make: `begin`, `commit`,
//! `rollback`, a data access, or a fault to inject into the driver. The REPL
//! makes it easy to replay a nesting scenario and watch which physical calls
//! reach the connection.

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::error::{ReplError, ReplResult};
use crate::connection::MemoryConnection;
use crate::record::BatchIterator;
use crate::schema::ColumnTypeMap;
use crate::transaction::SharedCoordinator;

/// REPL configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt string.
    pub prompt: String,
    /// Echo each command before its output (useful for scripts).
    pub echo: bool,
    /// Default batch size for `rows`.
    pub batch_size: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "txnest> ".into(),
            echo: false,
            batch_size: 10,
        }
    }
}

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The interactive REPL.
pub struct Repl {
    coordinator: SharedCoordinator<MemoryConnection>,
    config: ReplConfig,
    types: ColumnTypeMap,
    history: Vec<String>,
}

impl Repl {
    /// Create a new REPL over the given coordinator.
    pub fn new(coordinator: SharedCoordinator<MemoryConnection>) -> Self {
        Self::with_config(coordinator, ReplConfig::default())
    }

    /// Create a REPL with custom configuration.
    pub fn with_config(coordinator: SharedCoordinator<MemoryConnection>, config: ReplConfig) -> Self {
        Self {
            coordinator,
            config,
            types: ColumnTypeMap::mssql(),
            history: Vec::new(),
        }
    }

    /// The coordinator this REPL drives.
    pub fn coordinator(&self) -> &SharedCoordinator<MemoryConnection> {
        &self.coordinator
    }

    /// Run the REPL interactively on stdin/stdout.
    pub fn run(&mut self) -> ReplResult<()> {
        self.print_banner();
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        self.run_with(stdin.lock(), &mut stdout, true)
    }

    /// Run the loop over any reader. Errors are reported and the loop goes on.
    pub fn run_with<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        out: &mut W,
        prompt: bool,
    ) -> ReplResult<()> {
        loop {
            if prompt {
                write!(out, "{}", self.config.prompt)?;
                out.flush()?;
            }

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                // EOF.
                if prompt {
                    writeln!(out, "\nGoodbye!")?;
                }
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match self.execute(line, out) {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => writeln!(out, "Error: {}", e)?,
            }
        }
        Ok(())
    }

    /// Execute `;`-separated commands, stopping at the first error.
    pub fn execute_script<W: Write>(&mut self, script: &str, out: &mut W) -> ReplResult<()> {
        for cmd in script.split(';') {
            let cmd = cmd.trim();
            if cmd.is_empty() {
                continue;
            }
            if self.execute(cmd, out)? == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Execute a single command.
    pub fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> ReplResult<Flow> {
        self.history.push(line.to_string());
        if self.config.echo {
            writeln!(out, "> {}", line)?;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let command = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();

        match command.as_str() {
            "begin" => {
                self.coordinator.begin()?;
                writeln!(out, "BEGIN (depth {})", self.coordinator.depth())?;
            }
            "commit" => {
                self.coordinator.commit()?;
                writeln!(out, "COMMIT (depth {})", self.coordinator.depth())?;
            }
            "rollback" => {
                self.coordinator.rollback()?;
                writeln!(out, "ROLLBACK (depth {})", self.coordinator.depth())?;
            }
            "set" => {
                let (key, raw) = split_key_value(line)?;
                let value: Value = serde_json::from_str(raw)?;
                let mut guard = self.coordinator.lock();
                guard.check_writable()?;
                guard.connection_mut().put(key, value)?;
                writeln!(out, "OK")?;
            }
            "delete" => {
                let key = arg(&parts, 1, "delete <key>")?;
                let mut guard = self.coordinator.lock();
                guard.check_writable()?;
                let existed = guard.connection_mut().delete(key)?;
                writeln!(out, "{}", if existed { "deleted" } else { "(not found)" })?;
            }
            "get" => {
                let key = arg(&parts, 1, "get <key>")?;
                match self.coordinator.lock().connection().get(key)? {
                    Some(value) => writeln!(out, "{}", value)?,
                    None => writeln!(out, "(not found)")?,
                }
            }
            "rows" => {
                let batch_size = match parts.get(1) {
                    Some(n) => n
                        .parse::<usize>()
                        .map_err(|_| ReplError::usage(format!("invalid batch size: {}", n)))?,
                    None => self.config.batch_size,
                };
                self.print_rows(batch_size, out)?;
            }
            "fail" => {
                let op = arg(&parts, 1, "fail <begin|commit|rollback> [message]")?;
                let message = if parts.len() > 2 {
                    parts[2..].join(" ")
                } else {
                    format!("injected {} failure", op)
                };
                let mut guard = self.coordinator.lock();
                let conn = guard.connection_mut();
                match op.to_lowercase().as_str() {
                    "begin" => conn.fail_next_begin(message),
                    "commit" => conn.fail_next_commit(message),
                    "rollback" => conn.fail_next_rollback(message),
                    other => return Err(ReplError::usage(format!("cannot inject failure into '{}'", other))),
                }
                writeln!(out, "next {} will fail", op)?;
            }
            "offline" => {
                let reason = if parts.len() > 1 {
                    parts[1..].join(" ")
                } else {
                    "connection closed".to_string()
                };
                self.coordinator.lock().connection_mut().set_offline(reason);
                writeln!(out, "connection offline")?;
            }
            "online" => {
                self.coordinator.lock().connection_mut().set_online();
                writeln!(out, "connection online")?;
            }
            "status" => self.print_status(out)?,
            ".stats" | "stats" => {
                let stats = self.coordinator.stats();
                writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
            }
            ".log" | "log" => {
                let guard = self.coordinator.lock();
                let calls = guard.connection().calls();
                if calls.is_empty() {
                    writeln!(out, "(no physical calls)")?;
                }
                for (i, call) in calls.iter().enumerate() {
                    writeln!(out, "  {}: {}", i + 1, call)?;
                }
            }
            ".type" => {
                if parts.len() < 2 {
                    return Err(ReplError::usage("Usage: .type <abstract type> [modifiers]"));
                }
                writeln!(out, "{}", self.types.resolve(&parts[1..].join(" ")))?;
            }
            ".history" => {
                for (i, cmd) in self.history.iter().enumerate() {
                    writeln!(out, "  {}: {}", i + 1, cmd)?;
                }
            }
            ".help" | ".h" | ".?" | "help" => self.print_help(out)?,
            ".quit" | ".exit" | ".q" | "quit" | "exit" => return Ok(Flow::Exit),
            other => {
                return Err(ReplError::usage(format!(
                    "unknown command: {} (type .help for commands)",
                    other
                )));
            }
        }

        Ok(Flow::Continue)
    }

    fn print_rows<W: Write>(&self, batch_size: usize, out: &mut W) -> ReplResult<()> {
        let mut guard = self.coordinator.lock();
        let mut batches = BatchIterator::new(guard.connection_mut(), batch_size)?;

        for batch in batches.by_ref() {
            let batch = batch?;
            for (key, value) in batch {
                writeln!(out, "{} = {}", key, value)?;
            }
        }
        writeln!(out, "({} rows)", batches.retrieved_count())?;
        Ok(())
    }

    fn print_status<W: Write>(&self, out: &mut W) -> ReplResult<()> {
        let guard = self.coordinator.lock();
        writeln!(out, "connection:  {}", guard.config().name)?;
        writeln!(out, "policy:      {}", guard.config().poison_policy)?;
        writeln!(out, "depth:       {}", guard.depth())?;
        writeln!(out, "poisoned:    {}", guard.is_poisoned())?;
        writeln!(out, "driver open: {}", guard.connection().in_transaction())?;
        writeln!(out, "online:      {}", guard.connection().is_online())?;
        if let Some(nesting) = guard.nesting() {
            writeln!(out, "nesting:     {} (since {})", nesting.id, nesting.started_at.to_rfc3339())?;
        }
        Ok(())
    }

    fn print_banner(&self) {
        println!("txnest v{}", env!("CARGO_PKG_VERSION"));
        println!("Nested transactions over one connection. Type .help for commands.");
        println!();
    }

    fn print_help<W: Write>(&self, out: &mut W) -> ReplResult<()> {
        writeln!(out, "Transactions:")?;
        writeln!(out, "  begin | commit | rollback   Logical transaction calls")?;
        writeln!(out, "  status                      Depth, poison flag and driver state")?;
        writeln!(out)?;
        writeln!(out, "Data:")?;
        writeln!(out, "  set <key> <json>            Write a row")?;
        writeln!(out, "  get <key>                   Read a row")?;
        writeln!(out, "  delete <key>                Delete a row")?;
        writeln!(out, "  rows [batch]                List rows in batches")?;
        writeln!(out)?;
        writeln!(out, "Driver:")?;
        writeln!(out, "  fail <begin|commit|rollback> [msg]  Fail the next physical call")?;
        writeln!(out, "  offline [reason] | online           Toggle connection availability")?;
        writeln!(out)?;
        writeln!(out, "Meta:")?;
        writeln!(out, "  .stats                      Coordinator counters (JSON)")?;
        writeln!(out, "  .log                        Physical calls issued so far")?;
        writeln!(out, "  .type <abstract>            Resolve a column type (SQL Server)")?;
        writeln!(out, "  .history                    Command history")?;
        writeln!(out, "  .help | .quit")?;
        Ok(())
    }
}

fn arg<'a>(parts: &[&'a str], index: usize, usage: &str) -> ReplResult<&'a str> {
    parts
        .get(index)
        .copied()
        .ok_or_else(|| ReplError::usage(format!("Usage: {}", usage)))
}

/// Split `set <key> <json...>` into key and raw JSON.
fn split_key_value(line: &str) -> ReplResult<(&str, &str)> {
    let usage = || ReplError::usage("Usage: set <key> <json>");
    let rest = line
        .trim_start()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim_start())
        .ok_or_else(usage)?;
    let (key, raw) = rest.split_once(char::is_whitespace).ok_or_else(usage)?;
    Ok((key, raw.trim()))
}
