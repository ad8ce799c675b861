//! Positional `?` markers in resolved SQL.

/// Byte offsets of the `?` markers in `sql`.
///
/// A `?` inside a single-quoted literal is text, not a marker. A doubled quote
/// (`''`) toggles twice and so stays inside the literal.
pub fn positional_markers(sql: &str) -> impl Iterator<Item = usize> + '_ {
    let mut in_literal = false;
    sql.char_indices().filter_map(move |(offset, ch)| match ch {
        '\'' => {
            in_literal = !in_literal;
            None
        }
        '?' if !in_literal => Some(offset),
        _ => None,
    })
}

/// Replace each marker with `render(position)`, positions counting from 1.
pub fn rewrite_markers(sql: &str, mut render: impl FnMut(usize) -> String) -> String {
    let mut rewritten = String::with_capacity(sql.len() + 8);
    let mut copied = 0;
    for (index, offset) in positional_markers(sql).enumerate() {
        rewritten.push_str(&sql[copied..offset]);
        rewritten.push_str(&render(index + 1));
        copied = offset + 1;
    }
    rewritten.push_str(&sql[copied..]);
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_inside_literals_are_skipped() {
        let sql = "update t_user set username = 'who?' where id = ?";
        let markers: Vec<_> = positional_markers(sql).collect();
        assert_eq!(markers, vec![sql.len() - 1]);
    }

    #[test]
    fn escaped_quotes_stay_inside_the_literal() {
        let sql = "select * from t_user where username = 'it''s ?' and id = ?";
        assert_eq!(positional_markers(sql).count(), 1);
    }

    #[test]
    fn rewrite_numbers_markers_in_order() {
        assert_eq!(
            rewrite_markers("where a = ? and b = '?' and c = ?", |n| format!(":{n}")),
            "where a = :1 and b = '?' and c = :2"
        );
    }
}
