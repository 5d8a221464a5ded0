//! Text cleanup and table row detection for extracted page text.

/// Separator placed between table cells.
pub const CELL_SEPARATOR: &str = " | ";

/// Normalizes extracted text.
///
/// Runs of whitespace collapse to a single space, a hyphen followed by whitespace is removed so
/// that words split across lines are re-joined, and the result is trimmed.
///
/// ```rust
/// use arxivlens_pdf::clean_text;
///
/// assert_eq!(clean_text("  Trans-\n formers   use\tattention "), "Transformers use attention");
/// ```
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }
    collapsed.replace("- ", "").trim().to_string()
}

/// Returns the rows of `text` that look like table rows, with cells joined by
/// [`CELL_SEPARATOR`].
///
/// A line is tabular when it has at least two column gaps, where a gap is a tab or a run of two
/// or more spaces.
#[must_use]
pub fn table_rows(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let cells = split_cells(line);
            (cells.len() >= 3).then(|| cells.join(CELL_SEPARATOR))
        })
        .collect()
}

fn split_cells(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let gap = match c {
            '\t' => true,
            ' ' => chars.peek().is_some_and(|&(_, next)| next == ' ' || next == '\t'),
            _ => false,
        };
        if !gap {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if next != ' ' && next != '\t' {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        push_cell(&mut cells, &line[start..i]);
        start = end;
    }
    push_cell(&mut cells, &line[start..]);
    cells
}

fn push_cell<'a>(cells: &mut Vec<&'a str>, cell: &'a str) {
    let cell = cell.trim();
    if !cell.is_empty() {
        cells.push(cell);
    }
}
