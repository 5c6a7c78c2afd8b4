use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Rows of the editor buffer that fit the pane, with the caret position
/// relative to the pane's inner area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorViewport {
    pub rows: Vec<String>,
    /// Columns scrolled off to the left when lines are not wrapped.
    pub column_offset: u16,
    pub caret: Option<(u16, u16)>,
}

struct Chunk {
    text: String,
    start: usize,
}

/// Lays out `buffer` for a `width` x `height` pane. `caret` is the zero-based
/// line and display column. Wrapped rows break at grapheme boundaries so the
/// caret tracks the same rows that are drawn.
pub fn editor_viewport(
    buffer: &str,
    caret: (usize, usize),
    width: usize,
    height: usize,
    linewrap: bool,
) -> EditorViewport {
    if width == 0 || height == 0 {
        return EditorViewport {
            rows: Vec::new(),
            column_offset: 0,
            caret: None,
        };
    }
    let (line, column) = caret;

    let (rows, caret_row, caret_col, offset) = if linewrap {
        let mut rows = Vec::new();
        let mut caret_row = 0;
        let mut caret_col = 0;
        for (index, text) in buffer.split('\n').enumerate() {
            let chunks = wrap_line(text, width);
            if index == line {
                let (row, col) = locate(&chunks, column, width);
                caret_row = rows.len() + row;
                caret_col = col;
            }
            rows.extend(chunks.into_iter().map(|chunk| chunk.text));
        }
        (rows, caret_row, caret_col, 0)
    } else {
        let offset = column.saturating_sub(width - 1);
        let rows = buffer.split('\n').map(str::to_string).collect();
        (rows, line, column - offset, offset)
    };

    let scroll = caret_row.saturating_sub(height - 1);
    let column_offset = u16::try_from(offset).ok();
    let caret = column_offset.and_then(|_| {
        let x = u16::try_from(caret_col).ok()?;
        let y = u16::try_from(caret_row - scroll).ok()?;
        Some((x, y))
    });
    EditorViewport {
        rows: rows.into_iter().skip(scroll).take(height).collect(),
        column_offset: column_offset.unwrap_or(u16::MAX),
        caret,
    }
}

/// Splits `text` into rows no wider than `width` cells.
pub(super) fn wrap_graphemes(text: &str, width: usize) -> Vec<String> {
    wrap_line(text, width.max(1))
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

/// Cuts `text` to `width` cells, ending with an ellipsis when shortened.
pub(super) fn truncate_graphemes(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for grapheme in text.graphemes(true) {
        let cells = grapheme.width();
        if used + cells + 1 > width {
            break;
        }
        out.push_str(grapheme);
        used += cells;
    }
    if width > 0 {
        out.push('…');
    }
    out
}

fn wrap_line(text: &str, width: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Chunk {
        text: String::new(),
        start: 0,
    };
    let mut current_width = 0;
    for grapheme in text.graphemes(true) {
        let cells = grapheme.width();
        if current_width > 0 && current_width + cells > width {
            let start = current.start + current_width;
            chunks.push(std::mem::replace(
                &mut current,
                Chunk {
                    text: String::new(),
                    start,
                },
            ));
            current_width = 0;
        }
        current.text.push_str(grapheme);
        current_width += cells;
    }
    chunks.push(current);
    chunks
}

fn locate(chunks: &[Chunk], column: usize, width: usize) -> (usize, usize) {
    let index = chunks
        .iter()
        .rposition(|chunk| chunk.start <= column)
        .unwrap_or(0);
    let col = column - chunks.get(index).map_or(0, |chunk| chunk.start);
    if col >= width {
        (index + 1, col - width)
    } else {
        (index, col)
    }
}
