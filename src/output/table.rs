//! Impact report rendering.
//!
//! Renders impacted resources as a kubectl-style table or as JSON.

use anyhow::Result;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::OutputFormat;
use crate::model::ParentResource;
use crate::scan::ScanReport;

const TITLE: &str = "Kubernetes resources impacted by active PodDisruptionBudgets";

/// Row for the impacted resource table.
#[derive(Tabled)]
struct ImpactRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "NAMESPACE")]
    namespace: String,
    #[tabled(rename = "APIVERSION/KIND")]
    group_version_kind: String,
    #[tabled(rename = "PDB")]
    pdb: String,
}

impl From<&ParentResource> for ImpactRow {
    fn from(parent: &ParentResource) -> Self {
        Self {
            name: parent.name.clone(),
            namespace: parent.namespace.clone(),
            group_version_kind: parent.group_version_kind(),
            pdb: parent.pdb.clone(),
        }
    }
}

/// Print the scan report in the requested format.
pub fn print_report(report: &ScanReport, context_name: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_table(report, context_name),
        OutputFormat::Json => println!("{}", render_json(&report.impacted)?),
    }
    Ok(())
}

fn print_table(report: &ScanReport, context_name: &str) {
    println!(
        "{} (context: {}, snapshot: {}, {} namespaces, {}/{} active PDBs, {} matched pods):",
        TITLE.bold(),
        context_name,
        report.taken_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.namespaces_scanned,
        report.active_pdbs,
        report.total_pdbs,
        report.matched_pods
    );

    if report.impacted.is_empty() {
        println!(
            "{}",
            "No resources are blocked by active PodDisruptionBudgets.".green()
        );
        return;
    }

    println!("{}", render_table(&report.impacted));
}

/// Render rows in the order given; the scan already sorted them by PDB.
fn render_table(impacted: &[ParentResource]) -> String {
    let rows: Vec<ImpactRow> = impacted.iter().map(ImpactRow::from).collect();
    let mut table = Table::new(&rows);
    apply_table_style(&mut table);
    table.to_string()
}

fn render_json(impacted: &[ParentResource]) -> Result<String> {
    Ok(serde_json::to_string_pretty(impacted)?)
}

/// Apply kubectl-style formatting: no borders, no separators, left-aligned.
fn apply_table_style(table: &mut Table) {
    use tabled::settings::object::Columns;
    use tabled::settings::themes::Theme;
    use tabled::settings::{Modify, Padding};

    let mut theme = Theme::from_style(Style::empty());
    theme.remove_horizontal_lines();
    table.with(theme);
    table.with(Modify::new(Columns::new(..)).with(Padding::new(0, 2, 0, 0)));
}
