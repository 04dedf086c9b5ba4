use std::borrow::Cow;

pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Clip a long statement for log output.
pub fn truncate_sql(query: &str) -> Cow<'_, str> {
    const LIMIT: usize = 497;
    match query.char_indices().nth(LIMIT) {
        Some((i, _)) => Cow::Owned(format!("{}...", query[..i].trim_end())),
        None => Cow::Borrowed(query),
    }
}
