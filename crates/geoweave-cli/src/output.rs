//! Human and JSON rendering of command results.
//!
//! In JSON mode stdout carries a single `{"status": "success", "data": ..}`
//! document per command. Notices are written to stderr as JSON lines so they
//! never interleave with that document.

use console::{style, StyledObject};
use serde::Serialize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy)]
enum Notice {
    Success,
    Info,
    Warning,
}

impl Notice {
    fn status(self) -> &'static str {
        match self {
            Notice::Success => "success",
            Notice::Info => "info",
            Notice::Warning => "warning",
        }
    }

    fn marker(self) -> StyledObject<&'static str> {
        match self {
            Notice::Success => style("✓").green().bold(),
            Notice::Info => style("ℹ").blue().bold(),
            Notice::Warning => style("⚠").yellow().bold(),
        }
    }
}

pub struct OutputWriter {
    json: bool,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn success(&self, message: impl Display) {
        self.notice(Notice::Success, message);
    }

    pub fn info(&self, message: impl Display) {
        self.notice(Notice::Info, message);
    }

    pub fn warning(&self, message: impl Display) {
        self.notice(Notice::Warning, message);
    }

    fn notice(&self, notice: Notice, message: impl Display) {
        if self.json {
            let line = serde_json::json!({
                "status": notice.status(),
                "message": message.to_string(),
            });
            eprintln!("{}", line);
            return;
        }
        match notice {
            Notice::Warning => eprintln!("{} {}", notice.marker(), message),
            Notice::Success | Notice::Info => println!("{} {}", notice.marker(), message),
        }
    }

    /// A heading followed by `key: value` lines with aligned values
    pub fn fields(&self, title: impl Display, fields: &[(&str, String)]) {
        if self.json {
            return;
        }
        self.heading(title);
        let width = fields.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in fields {
            println!("{:width$}  {}", style(key).bold(), value, width = width);
        }
    }

    /// A heading followed by a rounded table
    pub fn table<T: Tabled>(&self, title: impl Display, rows: Vec<T>) {
        if self.json {
            return;
        }
        self.heading(title);
        if rows.is_empty() {
            println!("{}", style("(none)").dim());
            return;
        }
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }

    fn heading(&self, title: impl Display) {
        println!("\n{}", style(title).bold().underlined());
    }

    /// Print a rendered document such as an SVG drawing
    pub fn raw(&self, text: impl Display) {
        println!("{}", text);
    }

    /// The command's data; wrapped in a status envelope in JSON mode
    pub fn result<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        let document = if self.json {
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "success",
                "data": data,
            }))?
        } else {
            serde_json::to_string_pretty(&data)?
        };
        println!("{}", document);
        Ok(())
    }
}
