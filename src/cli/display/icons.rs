//! Status icons for CLI output

use crate::domain::plan::StepOp;

pub struct StatusIcon;

impl StatusIcon {
    /// Operation finished
    pub const SUCCESS: &'static str = "✓";

    /// Warning attached to a plan
    pub const WARNING: &'static str = "⚠";

    /// Operation failed
    pub const ERROR: &'static str = "✗";

    /// Value not known until apply
    pub const PENDING: &'static str = "⏳";

    pub const SECRET: &'static str = "🔒";

    /// Get icon for a planned operation, same as the apply progress lines
    pub fn get_op_icon(op: StepOp) -> &'static str {
        op.symbol()
    }

    /// Get human readable text for a planned operation
    pub fn get_op_text(op: StepOp) -> &'static str {
        match op {
            StepOp::Create => "create",
            StepOp::Update => "update",
            StepOp::Replace => "replace",
            StepOp::Delete => "delete",
            StepOp::Same => "unchanged",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_op_icon() {
        assert_eq!(StatusIcon::get_op_icon(StepOp::Create), "+");
        assert_eq!(StatusIcon::get_op_icon(StepOp::Replace), "+-");
        assert_eq!(StatusIcon::get_op_icon(StepOp::Same), "=");
    }

    #[test]
    fn test_get_op_text() {
        assert_eq!(StatusIcon::get_op_text(StepOp::Update), "update");
        assert_eq!(StatusIcon::get_op_text(StepOp::Same), "unchanged");
    }
}
