//! Command reports
//!
//! Every command produces a report that renders as plain text for a
//! terminal or as JSON for scripts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use types::context::Namespace;
use types::entry::JournalEntry;
use types::time::format_date;

// ── Entry Summary ───────────────────────────────────────────────────

/// One journal entry, flattened for display.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub index: u64,
    pub timestamp: String,
    pub method: String,
    pub no_op: bool,
    pub login_id: Option<String>,
    pub arguments: Vec<(String, String)>,
    pub recovery: Vec<(String, Vec<String>)>,
}

impl EntrySummary {
    pub fn from_entry(index: u64, entry: &JournalEntry) -> Self {
        let context = entry.context();
        Self {
            index,
            timestamp: format_date(&entry.timestamp()),
            method: entry.method().to_string(),
            no_op: context.is_no_op(),
            login_id: context
                .attributes(Namespace::Subject)
                .first("loginId")
                .map(str::to_string),
            arguments: entry
                .arguments()
                .iter()
                .map(|a| (a.name.clone(), a.value.to_string()))
                .collect(),
            recovery: context
                .attributes(Namespace::Recovery)
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
        }
    }

    fn render(&self, out: &mut String) {
        let _ = write!(out, "#{:<5} {}  {}", self.index, self.timestamp, self.method);
        if self.no_op {
            out.push_str(" (no-op)");
        }
        if let Some(login) = &self.login_id {
            let _ = write!(out, "  by {}", login);
        }
        out.push('\n');
        for (name, value) in &self.arguments {
            let _ = writeln!(out, "         {} = {}", name, value);
        }
        for (key, values) in &self.recovery {
            let _ = writeln!(out, "         [recovery] {} = {}", key, values.join(", "));
        }
    }
}

// ── Inspect ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub file: String,
    pub repository_hash: String,
    pub created: String,
    pub entries: Vec<EntrySummary>,
}

impl InspectReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Journal:         {}", self.file);
        let _ = writeln!(out, "Repository hash: {}", self.repository_hash);
        let _ = writeln!(out, "Created:         {}", self.created);
        let _ = writeln!(out, "Entries:         {}", self.entries.len());
        out.push('\n');
        for entry in &self.entries {
            entry.render(&mut out);
        }
        out
    }
}

// ── Verify ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub journal_dir: String,
    pub files: Vec<String>,
    pub entries: u64,
    pub by_method: BTreeMap<String, u64>,
    pub first_entry: Option<String>,
    pub last_entry: Option<String>,
}

impl VerifyReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Journal directory: {}", self.journal_dir);
        let _ = writeln!(out, "Files:             {}", self.files.len());
        let _ = writeln!(out, "Entries:           {}", self.entries);
        if let (Some(first), Some(last)) = (&self.first_entry, &self.last_entry) {
            let _ = writeln!(out, "Span:              {} .. {}", first, last);
        }
        for (method, count) in &self.by_method {
            let _ = writeln!(out, "  {:<30} {}", method, count);
        }
        out.push_str("OK\n");
        out
    }
}

// ── Dry-Run Replay ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub journal_dir: String,
    pub entries_replayed: u64,
    pub files_read: u64,
    pub elapsed_ms: u64,
    pub calls: Vec<String>,
}

impl ReplayReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for (i, call) in self.calls.iter().enumerate() {
            let _ = writeln!(out, "#{:<5} {}", i + 1, call);
        }
        let _ = writeln!(
            out,
            "Dry run replayed {} entries from {} files in {}ms ({})",
            self.entries_replayed, self.files_read, self.elapsed_ms, self.journal_dir
        );
        out
    }
}

/// Serialize a report as pretty JSON.
pub fn to_json<T: Serialize>(report: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
