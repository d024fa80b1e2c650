//! Centered box tables with one color per column.

use colored::{Color, Colorize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Column colors, cycled: red, yellow, green, blue, magenta, cyan
pub const RAINBOW: [Color; 6] = [
    Color::Red,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
];

/// Border and title color
pub const BABY_PINK: Color = Color::TrueColor { r: 255, g: 175, b: 215 };
/// Warning banner color
pub const HOT_PINK: Color = Color::TrueColor { r: 255, g: 0, b: 255 };

/// Widest a column may get, padding included
const MAX_COL_WIDTH: usize = 70;

/// Apply `color` when coloring is enabled.
pub fn paint(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.color(color).to_string()
    } else {
        text.to_string()
    }
}

/// Same as [`paint`] but bold.
pub fn paint_bold(text: &str, color: Color, enabled: bool) -> String {
    if enabled {
        text.color(color).bold().to_string()
    } else {
        text.to_string()
    }
}

/// Left padding that centers `text_width` columns in `width`.
pub fn center_pad(width: usize, text_width: usize) -> String {
    " ".repeat(width.saturating_sub(text_width) / 2)
}

/// Center a line of plain text.
pub fn center(text: &str, width: usize) -> String {
    format!("{}{}", center_pad(width, UnicodeWidthStr::width(text)), text)
}

/// Cut `text` to `max` display columns, ending in "..." when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let budget = max.saturating_sub(3);
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(&".".repeat(max.min(3)));
    out
}

/// A titled table ready to be drawn.
#[derive(Debug, Clone)]
pub struct Table {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    colors: Vec<Color>,
}

impl Table {
    pub fn new(title: &str, headers: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            colors: Vec::new(),
        }
    }

    /// Use the rainbow starting at `offset` instead of at red.
    pub fn rainbow_from(mut self, offset: usize) -> Self {
        self.colors = (0..self.headers.len())
            .map(|i| RAINBOW[(offset + i) % RAINBOW.len()])
            .collect();
        self
    }

    pub fn row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_color(&self, index: usize) -> Color {
        self.colors
            .get(index)
            .copied()
            .unwrap_or(RAINBOW[index % RAINBOW.len()])
    }

    fn widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|i| {
                let cells = self.rows.iter().filter_map(|r| r.get(i));
                let longest = std::iter::once(&self.headers[i])
                    .chain(cells)
                    .map(|c| UnicodeWidthStr::width(c.as_str()))
                    .max()
                    .unwrap_or(0);
                (longest + 2).min(MAX_COL_WIDTH)
            })
            .collect()
    }

    /// Draw the table centered in `term_width` columns.
    pub fn render(&self, term_width: usize, color: bool) -> String {
        if self.headers.is_empty() {
            return String::new();
        }

        let widths = self.widths();
        let mut total = widths.iter().sum::<usize>() + widths.len() + 1;
        // A long title widens the last column
        let title_width = UnicodeWidthStr::width(self.title.as_str()) + 4;
        let mut widths = widths;
        if title_width > total {
            if let Some(last) = widths.last_mut() {
                *last += title_width - total;
            }
            total = title_width;
        }

        let pad = center_pad(term_width, total);
        let border = |left: &str, mid: &str, right: &str| {
            let line: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            format!("{}{}", pad, paint(&format!("{}{}{}", left, line.join(mid), right), BABY_PINK, color))
        };
        let bar = paint("│", BABY_PINK, color);

        let top_mid = if self.title.is_empty() { "┬" } else { "─" };
        let mut lines = vec![border("┌", top_mid, "┐")];

        if !self.title.is_empty() {
            let inner = total - 2;
            let title = truncate(&self.title, inner);
            let title_w = UnicodeWidthStr::width(title.as_str());
            let left = (inner - title_w) / 2;
            let text = format!("{}{}{}", " ".repeat(left), title, " ".repeat(inner - title_w - left));
            lines.push(format!("{}{}{}{}", pad, bar, paint_bold(&text, BABY_PINK, color), bar));
            lines.push(border("├", "┬", "┤"));
        }

        lines.push(self.render_row(&self.headers, &widths, &pad, &bar, color));
        lines.push(border("├", "┼", "┤"));
        for row in &self.rows {
            lines.push(self.render_row(row, &widths, &pad, &bar, color));
        }
        lines.push(border("└", "┴", "┘"));

        lines.join("\n")
    }

    fn render_row(&self, cells: &[String], widths: &[usize], pad: &str, bar: &str, color: bool) -> String {
        let rendered: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let text = truncate(cells.get(i).map(String::as_str).unwrap_or(""), width - 2);
                let fill = width - 1 - UnicodeWidthStr::width(text.as_str());
                let cell = format!(" {}{}", text, " ".repeat(fill));
                paint(&cell, self.column_color(i), color)
            })
            .collect();
        format!("{}{}{}{}", pad, bar, rendered.join(bar), bar)
    }
}
