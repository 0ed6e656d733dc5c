//! Color theme for CLI output

use crate::domain::plan::StepOp;
use comfy_table::Color as TableColor;

#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub create: TableColor,
    pub update: TableColor,
    pub replace: TableColor,
    pub delete: TableColor,
    pub muted: TableColor,
    pub info: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            create: TableColor::Green,
            update: TableColor::Yellow,
            replace: TableColor::Magenta,
            delete: TableColor::Red,
            muted: TableColor::DarkGrey,
            info: TableColor::Cyan,
        }
    }
}

impl ColorTheme {
    /// Get color for a planned operation
    pub fn get_op_color(&self, op: StepOp) -> TableColor {
        match op {
            StepOp::Create => self.create,
            StepOp::Update => self.update,
            StepOp::Replace => self.replace,
            StepOp::Delete => self.delete,
            StepOp::Same => self.muted,
        }
    }
}

pub fn table_color_to_colored_str(color: TableColor) -> &'static str {
    match color {
        TableColor::Green => "green",
        TableColor::Yellow => "yellow",
        TableColor::Magenta => "magenta",
        TableColor::Red => "red",
        TableColor::Cyan => "cyan",
        TableColor::DarkGrey => "bright black",
        _ => "white",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_theme() {
        let theme = ColorTheme::default();
        assert_eq!(theme.create, TableColor::Green);
        assert_eq!(theme.update, TableColor::Yellow);
        assert_eq!(theme.delete, TableColor::Red);
    }

    #[test]
    fn test_get_op_color() {
        let theme = ColorTheme::default();
        assert_eq!(theme.get_op_color(StepOp::Create), TableColor::Green);
        assert_eq!(theme.get_op_color(StepOp::Replace), TableColor::Magenta);
        assert_eq!(theme.get_op_color(StepOp::Same), TableColor::DarkGrey);
        assert_eq!(table_color_to_colored_str(theme.muted), "bright black");
    }
}
