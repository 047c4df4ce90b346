/// Split the contents of a migration file into executable statements.
///
/// Statements are separated by `;`, trimmed, and empty fragments are dropped. Both
/// directions split the same way. A `;` inside a string literal or comment is still
/// treated as a separator.
pub fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}
