//! Table rendering for CLI output

use super::colors::table_color_to_colored_str;
use super::{ColorTheme, StatusIcon};
use crate::domain::output::contains_unknown;
use crate::domain::plan::{Plan, StepOp};
use crate::domain::stack::ApplySummary;
use crate::infrastructure::state::{StackState, StackSummary};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};
use serde_json::Value;

const MAX_CHANGED_FIELDS: usize = 4;

/// Table renderer for formatted output
pub struct TableRenderer {
    theme: ColorTheme,
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRenderer {
    /// Create a new table renderer with default theme
    pub fn new() -> Self {
        Self {
            theme: ColorTheme::default(),
        }
    }

    /// Render a preview as one row per resource
    pub fn render_plan(&self, plan: &Plan) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("OP").set_alignment(CellAlignment::Center),
                Cell::new("RESOURCE").set_alignment(CellAlignment::Left),
                Cell::new("TYPE").set_alignment(CellAlignment::Left),
                Cell::new("CHANGED").set_alignment(CellAlignment::Left),
            ]);

        for step in &plan.steps {
            let color = self.theme.get_op_color(step.op);
            let mut changed: Vec<&str> = step
                .changed_fields
                .iter()
                .take(MAX_CHANGED_FIELDS)
                .map(String::as_str)
                .collect();
            let more = step.changed_fields.len().saturating_sub(MAX_CHANGED_FIELDS);
            let more_text = format!("(+{} more)", more);
            if more > 0 {
                changed.push(&more_text);
            }

            table.add_row(vec![
                Cell::new(format!(
                    "{} {}",
                    StatusIcon::get_op_icon(step.op),
                    StatusIcon::get_op_text(step.op)
                ))
                .fg(color),
                Cell::new(&step.name),
                Cell::new(step.kind.as_str()).fg(self.theme.muted),
                Cell::new(changed.join("\n")),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Preview {} ─╮\n",
            format!("[{}]", plan.stack).bright_black()
        ));
        output.push_str(&table.to_string());
        output.push('\n');
        output.push_str(&format!(
            "Resources: {} to create, {} to update, {} to replace, {} to delete, {} unchanged\n",
            plan.count(StepOp::Create).to_string().green(),
            plan.count(StepOp::Update).to_string().yellow(),
            plan.count(StepOp::Replace).to_string().magenta(),
            plan.count(StepOp::Delete).to_string().red(),
            plan.count(StepOp::Same)
        ));
        for warning in &plan.warnings {
            output.push_str(&format!("{} {}\n", StatusIcon::WARNING.yellow(), warning));
        }

        output
    }

    pub fn render_summary(&self, summary: &ApplySummary) -> String {
        format!(
            "{} {} created, {} updated, {} replaced, {} unchanged",
            StatusIcon::SUCCESS.color(table_color_to_colored_str(self.theme.create)),
            summary.created,
            summary.updated,
            summary.replaced,
            summary.same
        )
    }

    /// Render the published outputs of one stack. Secrets are masked
    /// unless `show_secrets` is set.
    pub fn render_outputs(&self, stack: &str, state: &StackState, show_secrets: bool) -> String {
        if state.outputs.is_empty() && state.secrets.is_empty() {
            return format!("Stack {} has no outputs", stack);
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("OUTPUT").set_alignment(CellAlignment::Left),
                Cell::new("VALUE").set_alignment(CellAlignment::Left),
            ]);

        for (name, value) in &state.outputs {
            let cell = if contains_unknown(value) {
                Cell::new(format!("{} {}", StatusIcon::PENDING, render_value(value)))
                    .fg(Color::Yellow)
            } else {
                Cell::new(render_value(value)).fg(self.theme.info)
            };
            table.add_row(vec![Cell::new(name), cell]);
        }

        for name in state.secrets.keys() {
            let value = if show_secrets {
                state.secrets.get(name).cloned().unwrap_or_default()
            } else {
                "[secret]".to_string()
            };
            table.add_row(vec![
                Cell::new(format!("{} {}", StatusIcon::SECRET, name)),
                Cell::new(value).fg(self.theme.muted),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Outputs {} ─╮\n",
            format!("[{}]", stack).bright_black()
        ));
        output.push_str(&table.to_string());
        output
    }

    /// Render stacks known to the state backend
    pub fn render_stacks(&self, stacks: &[StackSummary]) -> String {
        if stacks.is_empty() {
            return "No stacks found".to_string();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("STACK").set_alignment(CellAlignment::Left),
                Cell::new("RESOURCES").set_alignment(CellAlignment::Center),
                Cell::new("OUTPUTS").set_alignment(CellAlignment::Center),
                Cell::new("UPDATED").set_alignment(CellAlignment::Left),
            ]);

        for stack in stacks {
            table.add_row(vec![
                Cell::new(stack.identifier.to_string()),
                Cell::new(stack.resource_count).set_alignment(CellAlignment::Center),
                Cell::new(stack.output_count).set_alignment(CellAlignment::Center),
                Cell::new(stack.updated_at.format("%Y-%m-%d %H:%M:%S UTC")).fg(self.theme.muted),
            ]);
        }

        let mut output = String::new();
        output.push_str(&format!(
            "╭─ Stacks {} ─╮\n",
            format!("[{} stacks]", stacks.len()).bright_black()
        ));
        output.push_str(&table.to_string());
        output
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::ResourceKind;
    use crate::domain::plan::PlanStep;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_render_empty_stacks() {
        let renderer = TableRenderer::new();
        let output = renderer.render_stacks(&[]);
        assert!(output.contains("No stacks found"));
    }

    #[test]
    fn test_render_stacks() {
        let renderer = TableRenderer::new();
        let stacks = vec![StackSummary {
            identifier: "wijayasena/cluster-general/dev".parse().unwrap(),
            updated_at: Utc::now(),
            resource_count: 7,
            output_count: 2,
        }];

        let output = renderer.render_stacks(&stacks);
        assert!(output.contains("wijayasena/cluster-general/dev"));
        assert!(output.contains('7'));
    }

    #[test]
    fn test_render_plan_lists_changes_and_warnings() {
        let renderer = TableRenderer::new();
        let plan = Plan {
            stack: "wijayasena/cluster-general/dev".parse().unwrap(),
            steps: vec![PlanStep {
                name: "ccc-dev-cluster".to_string(),
                kind: ResourceKind::ManagedCluster,
                op: StepOp::Update,
                changed_fields: vec!["/body/properties/agentPoolProfiles/0/count".to_string()],
            }],
            warnings: Vec::new(),
        }
        .with_warning("foundation changed");

        let output = renderer.render_plan(&plan);
        assert!(output.contains("ccc-dev-cluster"));
        assert!(output.contains("agentPoolProfiles"));
        assert!(output.contains("foundation changed"));
    }

    #[test]
    fn test_render_outputs_masks_secrets() {
        let renderer = TableRenderer::new();
        let mut state = StackState::default();
        state.outputs.insert("rgName".to_string(), json!("ccc-dev"));
        state
            .secrets
            .insert("sshPrivateKeyPem".to_string(), "PRIVATE".to_string());

        let masked = renderer.render_outputs("dev", &state, false);
        assert!(masked.contains("ccc-dev"));
        assert!(!masked.contains("PRIVATE"));

        let shown = renderer.render_outputs("dev", &state, true);
        assert!(shown.contains("PRIVATE"));
    }
}
