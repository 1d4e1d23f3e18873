use serde::Serialize;
use shared::domain::{Question, TallyTable};

/// One bar of a results chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub label: String,
    pub votes: u64,
    pub percent: f64,
}

/// Shapes a question's tally into chart rows, in option order.
pub fn chart_rows(question: &Question, tally: &TallyTable) -> Vec<ChartRow> {
    let total = tally.total_for(&question.id);
    question
        .options
        .iter()
        .map(|option| {
            let votes = tally.count(&question.id, &option.id);
            let percent = if total == 0 {
                0.0
            } else {
                votes as f64 * 100.0 / total as f64
            };
            ChartRow {
                label: option.text.clone(),
                votes,
                percent,
            }
        })
        .collect()
}

/// Renders rows as fixed-width text bars for terminal output.
pub fn render_bars(rows: &[ChartRow], width: usize) -> Vec<String> {
    let label_width = rows
        .iter()
        .map(|row| row.label.chars().count())
        .max()
        .unwrap_or(0);
    rows.iter()
        .map(|row| {
            let filled = ((row.percent / 100.0) * width as f64).round() as usize;
            format!(
                "{:<label_width$} {}{} {:>3} ({:.0}%)",
                row.label,
                "#".repeat(filled.min(width)),
                ".".repeat(width - filled.min(width)),
                row.votes,
                row.percent,
            )
        })
        .collect()
}
