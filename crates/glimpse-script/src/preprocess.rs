//! Conditional compilation: `#if`, `#else` and `#endif` lines.

use std::collections::BTreeSet;

use crate::error::Error;

struct Frame {
    line: usize,
    /// Whether the enclosing region is active at all.
    parent_active: bool,
    condition: bool,
    in_else: bool,
}

impl Frame {
    fn active(&self) -> bool {
        self.parent_active && (self.condition != self.in_else)
    }
}

/// Strip the regions excluded by the given conditional symbols.
///
/// Directive lines and excluded lines are replaced by empty lines so that
/// line numbers in later errors still point at the original source.
pub fn preprocess(source: &str, symbols: &BTreeSet<String>) -> Result<String, Error> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut output = String::with_capacity(source.len());

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        let active = stack.last().map_or(true, Frame::active);

        if let Some(rest) = trimmed.strip_prefix("#if") {
            let expr = rest.trim();
            let (negated, symbol) = match expr.strip_prefix('!') {
                Some(symbol) => (true, symbol.trim()),
                None => (false, expr),
            };
            if symbol.is_empty() || !symbol.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(Error::preprocess(line, format!("invalid #if condition '{}'", expr)));
            }
            stack.push(Frame {
                line,
                parent_active: active,
                condition: symbols.contains(symbol) != negated,
                in_else: false,
            });
        } else if trimmed == "#else" {
            match stack.last_mut() {
                Some(frame) if !frame.in_else => frame.in_else = true,
                Some(_) => return Err(Error::preprocess(line, "duplicate #else")),
                None => return Err(Error::preprocess(line, "#else without #if")),
            }
        } else if trimmed == "#endif" {
            if stack.pop().is_none() {
                return Err(Error::preprocess(line, "#endif without #if"));
            }
        } else if trimmed.starts_with('#') {
            return Err(Error::preprocess(line, format!("unknown directive '{}'", trimmed)));
        } else if active {
            output.push_str(raw);
        }
        output.push('\n');
    }

    if let Some(frame) = stack.last() {
        return Err(Error::preprocess(frame.line, "#if without matching #endif"));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_source_passes_through() {
        assert_eq!(preprocess("a\nb", &symbols(&[])).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_if_else() {
        let source = "#if DEBUG\nx\n#else\ny\n#endif";
        assert_eq!(preprocess(source, &symbols(&["DEBUG"])).unwrap(), "\nx\n\n\n\n");
        assert_eq!(preprocess(source, &symbols(&[])).unwrap(), "\n\n\ny\n\n");
    }

    #[test]
    fn test_negated_and_nested() {
        let source = "#if !LINUX\na\n#if DEBUG\nb\n#endif\n#endif\nc";
        let out = preprocess(source, &symbols(&["DEBUG"])).unwrap();
        assert_eq!(out.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>(), vec!["a", "b", "c"]);

        let out = preprocess(source, &symbols(&["DEBUG", "LINUX"])).unwrap();
        assert_eq!(out.lines().filter(|l| !l.is_empty()).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn test_unbalanced() {
        assert!(matches!(
            preprocess("#if A\nx", &symbols(&[])),
            Err(Error::Preprocess { line: 1, .. })
        ));
        assert!(matches!(
            preprocess("x\n#endif", &symbols(&[])),
            Err(Error::Preprocess { line: 2, .. })
        ));
        assert!(preprocess("#if A\n#else\n#else\n#endif", &symbols(&[])).is_err());
    }
}
