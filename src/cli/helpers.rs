use crate::identity::TrustLevel;
use crate::sync::{RefreshReport, RefreshStatus};
use crate::trust::MutualOverlap;
use colored::*;

/// 按信任级别着色
pub fn format_level(level: TrustLevel) -> String {
    let text = level.as_str();
    match level {
        TrustLevel::Reported => text.red().bold().to_string(),
        TrustLevel::Suspicious => text.yellow().to_string(),
        TrustLevel::JustMet => text.normal().to_string(),
        TrustLevel::AlreadyKnown => text.cyan().to_string(),
        TrustLevel::Recovery => text.green().bold().to_string(),
    }
}

/// 格式化表格
pub fn format_table(headers: &[&str], rows: &[Vec<String>], widths: &[usize]) -> String {
    let mut result = String::new();

    let header_row = headers
        .iter()
        .zip(widths.iter())
        .map(|(h, w)| format!("{:width$}", h.bold(), width = *w))
        .collect::<Vec<_>>()
        .join(" | ");
    result.push_str(&header_row);
    result.push('\n');

    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");
    result.push_str(&separator);
    result.push('\n');

    for row in rows {
        let data_row = row
            .iter()
            .zip(widths.iter())
            .map(|(cell, w)| format!("{:width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join(" | ");
        result.push_str(&data_row);
        result.push('\n');
    }

    result
}

pub fn format_refresh_report(report: &RefreshReport) -> String {
    let stages = |list: &[crate::sync::Stage]| {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
    };

    let mut lines = vec![format!("Refresh #{}: updated {}", report.generation, stages(&report.published))];
    if !report.skipped.is_empty() {
        lines.push(format!(
            "Skipped {} ({} operations pending)",
            stages(&report.skipped),
            report.pending_operations
        ));
    }

    match &report.status {
        RefreshStatus::Complete => {}
        RefreshStatus::Failed(failure) => {
            lines.push(format!("Stopped at {}: {}", failure.stage, failure.message));
        }
        RefreshStatus::Superseded { at } => {
            lines.push(format!("Superseded by a newer refresh before {}", at));
        }
    }

    lines.join("\n")
}

pub fn format_overlap(overlap: &MutualOverlap) -> String {
    let mut lines = vec![format!("Overlap with {}", overlap.peer_id.to_string().yellow())];

    lines.push(format!("Mutual connections ({}):", overlap.mutual_connections.len()));
    for conn in &overlap.mutual_connections {
        lines.push(format!("  {} [{}]", conn.display_name(), format_level(conn.level)));
    }

    lines.push(format!("Mutual groups ({}):", overlap.mutual_groups.len()));
    for group in &overlap.mutual_groups {
        lines.push(format!("  {}", group.id));
    }

    if overlap.verifications.is_empty() {
        lines.push("Verifications: none".to_string());
    } else {
        lines.push(format!("Verifications: {}", overlap.verifications.join(", ")));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Connection, UserId};

    #[test]
    fn test_format_table_layout() {
        colored::control::set_override(false);
        let table = format_table(&["A", "B"], &[vec!["x".to_string(), "yy".to_string()]], &[3, 2]);
        assert_eq!(table, "A   | B \n----+---\nx   | yy\n");
    }

    #[test]
    fn test_format_overlap() {
        colored::control::set_override(false);
        let overlap = MutualOverlap {
            peer_id: UserId::from("bob"),
            mutual_connections: vec![Connection::new("carol", TrustLevel::Recovery, 0).with_name("Carol")],
            mutual_groups: Vec::new(),
            verifications: Vec::new(),
        };

        let text = format_overlap(&overlap);
        assert!(text.contains("Mutual connections (1):"));
        assert!(text.contains("  Carol [recovery]"));
        assert!(text.ends_with("Verifications: none"));
    }
}
