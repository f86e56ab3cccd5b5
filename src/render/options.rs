//! Rendering options configuration.

/// Options for the plain text report.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Widest a preview column may be drawn, in terminal cells
    pub max_cell_width: usize,

    /// Formulas listed per sheet before the list is cut short
    pub max_formulas: usize,

    /// Print the header and sample rows
    pub include_preview: bool,

    /// Print sheet-local warnings
    pub include_warnings: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_cell_width: 24,
            max_formulas: 10,
            include_preview: true,
            include_warnings: true,
        }
    }
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preview column width cap.
    pub fn with_max_cell_width(mut self, width: usize) -> Self {
        self.max_cell_width = width.max(1);
        self
    }

    /// Set how many formulas are listed per sheet.
    pub fn with_max_formulas(mut self, count: usize) -> Self {
        self.max_formulas = count;
        self
    }

    /// Enable or disable the header and sample preview.
    pub fn with_preview(mut self, include: bool) -> Self {
        self.include_preview = include;
        self
    }

    /// Enable or disable warning output.
    pub fn with_warnings(mut self, include: bool) -> Self {
        self.include_warnings = include;
        self
    }
}
