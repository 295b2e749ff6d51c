use chrono::{DateTime, Utc};

/// Left-aligned plain-text table.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|header| (*header).to_owned()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut widths = self
            .headers
            .iter()
            .map(|header| header.chars().count())
            .collect::<Vec<_>>();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(index) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(render_line(&self.headers, &widths));
        lines.push(
            widths
                .iter()
                .map(|width| "-".repeat(*width))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &self.rows {
            lines.push(render_line(row, &widths));
        }

        lines.join("\n")
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let padded = widths
        .iter()
        .enumerate()
        .map(|(index, width)| {
            let cell = cells.get(index).map_or("", String::as_str);
            format!("{cell:<width$}")
        })
        .collect::<Vec<_>>()
        .join("  ");

    padded.trim_end().to_owned()
}

pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_optional_timestamp(instant: Option<DateTime<Utc>>) -> String {
    instant.map_or_else(|| "-".to_owned(), format_timestamp)
}

pub fn format_megabytes(megabytes: f64) -> String {
    format!("{megabytes:.2} MB")
}
