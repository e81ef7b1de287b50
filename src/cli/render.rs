// Terminal rendering
// Plain-text tables and detail panels for deployment records

use chrono::{DateTime, NaiveDateTime};

use crate::auth::Credentials;
use crate::models::Deployment;

const NOT_AVAILABLE: &str = "N/A";

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM:SS`.
///
/// Unparseable input is cut to its first 19 characters with `T` replaced, so a
/// surprising server format still renders.
pub fn format_timestamp(raw: &str) -> String {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(FORMAT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format(FORMAT).to_string();
    }
    raw.chars()
        .take(19)
        .collect::<String>()
        .replace('T', " ")
}

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or(NOT_AVAILABLE)
}

fn prefix(value: &str, len: usize) -> String {
    value.chars().take(len).collect()
}

/// Left-aligned text table with a title line
pub struct Table {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = vec![self.title.clone(), line(&self.headers)];
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        out.extend(self.rows.iter().map(|row| line(row)));
        out.join("\n")
    }
}

pub fn deployments_table(deployments: &[Deployment]) -> String {
    let mut table = Table::new(
        "Deployments",
        &[
            "ID", "Name", "Version", "Status", "Created", "Provider", "Account", "Region", "Cell",
        ],
    );
    for d in deployments {
        table.add_row(vec![
            d.id.clone(),
            d.name.clone(),
            d.version.clone(),
            d.status.clone(),
            d.created_at.as_deref().map(format_timestamp).unwrap_or_default(),
            d.provider.clone().unwrap_or_default(),
            d.cloud_account_id.clone().unwrap_or_default(),
            d.region.clone().unwrap_or_default(),
            d.cell().unwrap_or_default().to_string(),
        ]);
    }
    table.render()
}

pub fn history_table(name: &str, environment: &str, deployments: &[Deployment]) -> String {
    let mut table = Table::new(
        format!("History: {} ({})", name, environment),
        &["Version", "Status", "Trigger", "Created", "Actor", "Lineage"],
    );
    for d in deployments {
        let lineage = match d.source_deployment_id.as_deref() {
            Some(source) if d.is_rollback() => format!("<- {}", prefix(source, 8)),
            _ => String::new(),
        };
        table.add_row(vec![
            prefix(&d.version, 12),
            d.status.clone(),
            d.trigger.clone(),
            d.created_at.as_deref().map(format_timestamp).unwrap_or_default(),
            or_na(d.created_by_actor.as_deref()).to_string(),
            lineage,
        ]);
    }
    table.render()
}

pub fn deployment_details(d: &Deployment) -> String {
    let fields = [
        ("ID", d.id.as_str()),
        ("Name", d.name.as_str()),
        ("Version", d.version.as_str()),
        ("Status", d.status.as_str()),
        ("Trigger", d.trigger.as_str()),
        ("Type", or_na(d.deployment_type.as_deref())),
        ("Environment", or_na(d.environment.as_deref())),
        ("Provider", or_na(d.provider.as_deref())),
        ("Cloud Account", or_na(d.cloud_account_id.as_deref())),
        ("Region", or_na(d.region.as_deref())),
        ("Cell", or_na(d.cell())),
        ("Created", or_na(d.created_at.as_deref())),
        ("Updated", or_na(d.updated_at.as_deref())),
    ];

    let mut lines = vec![format!("Deployment: {}", d.name)];
    lines.extend(fields.iter().map(|(label, value)| format!("  {}: {}", label, value)));
    lines.push(format!(
        "  Created By: {} ({})",
        or_na(d.created_by_actor.as_deref()),
        or_na(d.created_by_repo.as_deref())
    ));
    lines.push(format!(
        "  Source Deployment: {}",
        or_na(d.source_deployment_id.as_deref())
    ));
    lines.push(format!(
        "  Rollback From: {}",
        or_na(d.rollback_from_deployment_id.as_deref())
    ));
    lines.join("\n")
}

pub fn current_summary(d: &Deployment) -> String {
    let mut lines = vec![
        format!("{} @ {}", d.name, d.version),
        format!("Status: {}", d.status),
        format!("Trigger: {}", d.trigger),
        format!(
            "Created: {}",
            d.created_at.as_deref().map(format_timestamp).unwrap_or_default()
        ),
    ];
    if let Some(source) = d.source_deployment_id.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Source: {}...", prefix(source, 8)));
    }
    lines.join("\n")
}

pub fn rollback_summary(d: &Deployment) -> String {
    [
        format!("Rollback created: {} -> {}", d.name, d.version),
        format!("  ID: {}", d.id),
        format!("  Source: {}", or_na(d.source_deployment_id.as_deref())),
        format!(
            "  Rollback from: {}",
            or_na(d.rollback_from_deployment_id.as_deref())
        ),
    ]
    .join("\n")
}

pub fn session(creds: &Credentials, api_url: &str, source: &str) -> String {
    [
        "Current Session".to_string(),
        format!("  Username: {}", creds.username),
        format!("  Organisation: {}", creds.organisation),
        format!("  API URL: {}", api_url),
        format!("  Source: {}", source),
    ]
    .join("\n")
}
