use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
};

use crossterm::{
    cursor::MoveTo,
    execute,
    terminal::{Clear, ClearType},
};

use super::*;

/// Writes the report table to any writer.
pub struct TableReporter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> TableReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> Reporter for TableReporter<W> {
    async fn report(&self, report: &SnapshotReport) -> Result<()> {
        let table = report.to_table();
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(table.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

/// Redraws the report table on a cleared terminal.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    async fn report(&self, report: &SnapshotReport) -> Result<()> {
        let table = report.to_table();
        let mut stdout = io::stdout().lock();
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        stdout.write_all(table.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}

/// Writes every report as one line of JSON.
pub struct JsonReporter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> Reporter for JsonReporter<W> {
    async fn report(&self, report: &SnapshotReport) -> Result<()> {
        let line = serde_json::to_string(report)?;
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
