//! Minimal comma-separated table codec for the metadata store.
//!
//! Fields containing `,` `"` CR or LF are wrapped in double quotes with inner
//! quotes doubled. Rows end in LF on write; LF and CRLF are both accepted on
//! read, and blank lines are skipped.

/// Encode one row without a line terminator.
pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let field = field.as_ref();
        if field.contains([',', '"', '\r', '\n']) {
            line.push('"');
            line.push_str(&field.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(field);
        }
    }
    line
}

/// Parse a whole table into rows of fields.
///
/// The error names the physical line where parsing stopped.
pub fn parse(content: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // the current field was quoted; only a separator or line end may follow it
    let mut quoted = false;
    let mut line = 1usize;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                finish_row(&mut rows, &mut row, &mut field, quoted);
                quoted = false;
                line += 1;
            }
            '"' => return Err(format!("line {line}: unexpected quote inside field")),
            _ if quoted => return Err(format!("line {line}: data after closing quote")),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(format!("line {line}: unterminated quoted field"));
    }
    finish_row(&mut rows, &mut row, &mut field, quoted);
    Ok(rows)
}

fn finish_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, field: &mut String, quoted: bool) {
    if row.is_empty() && field.is_empty() && !quoted {
        return;
    }
    row.push(std::mem::take(field));
    rows.push(std::mem::take(row));
}
