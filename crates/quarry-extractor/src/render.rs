//! Render sheet rows as header-aligned Markdown tables

/// Join a row's cells with ` | `, dropping trailing empty cells
pub fn row_line(row: &[String]) -> String {
    let populated = row
        .iter()
        .rposition(|cell| !cell.trim().is_empty())
        .map_or(0, |idx| idx + 1);
    row[..populated]
        .iter()
        .map(|cell| cell.trim())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Render the first `limit` rows as one ` | `-joined line per row
pub fn render_preview(rows: &[Vec<String>], limit: usize) -> String {
    rows.iter()
        .take(limit)
        .map(|row| row_line(row))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of columns implied by a header block (pipes on the widest line, plus one)
pub fn header_width(header_text: &str) -> usize {
    header_text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.matches('|').count() + 1)
        .max()
        .unwrap_or(0)
}

/// Render `rows` under `header_text` as a Markdown table
///
/// Every row is trimmed or padded to the header's width. Without a header a
/// synthetic `Column 1 | Column 2 | ...` header sized to the widest row is
/// used.
pub fn render_table(header_text: &str, rows: &[Vec<String>]) -> String {
    let header_lines: Vec<&str> = header_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let (header, width) = if header_lines.is_empty() {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let synthetic = (1..=width)
            .map(|i| format!("Column {}", i))
            .collect::<Vec<_>>()
            .join(" | ");
        (synthetic, width)
    } else {
        (header_lines.join("\n"), header_width(header_text))
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(header);
    lines.push(vec!["---"; width].join(" | "));

    for row in rows {
        let mut cells: Vec<&str> = row.iter().take(width).map(|c| c.trim()).collect();
        cells.resize(width, "");
        lines.push(cells.join(" | "));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_rows_padded_and_trimmed_to_header() {
        let rendered = render_table(
            "Item | Description | Unit",
            &[row(&["1", "Ball valve"]), row(&["2", "Gate valve", "nr", "extra"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Item | Description | Unit");
        assert_eq!(lines[1], "--- | --- | ---");
        assert_eq!(lines[2], "1 | Ball valve | ");
        assert_eq!(lines[3], "2 | Gate valve | nr");
    }

    #[test]
    fn test_multi_line_header_uses_widest_line() {
        let header = "Ref | Description\nRef | Description | Qty | Unit";
        assert_eq!(header_width(header), 4);
        let rendered = render_table(header, &[row(&["A"])]);
        assert!(rendered.contains("--- | --- | --- | ---"));
        assert!(rendered.ends_with("A |  |  | "));
    }

    #[test]
    fn test_synthetic_header() {
        let rendered = render_table("", &[row(&["a", "b", "c"]), row(&["d"])]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Column 1 | Column 2 | Column 3");
        assert_eq!(lines[3], "d |  | ");
    }

    #[test]
    fn test_row_line_drops_trailing_blanks() {
        assert_eq!(row_line(&row(&["PROJECT", " Riverside ", "", ""])), "PROJECT | Riverside");
        assert_eq!(row_line(&row(&["", ""])), "");
    }

    #[test]
    fn test_preview_limit() {
        let rows = vec![row(&["a"]), row(&["b"]), row(&["c"])];
        assert_eq!(render_preview(&rows, 2), "a\nb");
    }
}
