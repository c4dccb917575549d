// Definition loading errors
// Carries line/column info, a source excerpt and fix suggestions for malformed files

use std::fmt;

/// Detailed parse error with location and context
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Line number (1-indexed, 0 when unknown)
    pub line: usize,
    /// Column number (1-indexed, 0 when unknown)
    pub column: usize,
    /// Surrounding source lines
    pub context: String,
    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// YAML or JSON syntax error
    Syntax,
    /// Well-formed document with the wrong shape
    InvalidSchema,
    /// File could not be read
    Io,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            context: String::new(),
            suggestion: None,
            kind: ParseErrorKind::InvalidSchema,
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(message, 0, 0).with_kind(ParseErrorKind::Io)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_kind(mut self, kind: ParseErrorKind) -> Self {
        self.kind = kind;
        self
    }

    fn with_suggestion_opt(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Fill `context` with the lines around the error
    pub fn with_source_context(mut self, source: &str, context_lines: usize) -> Self {
        if self.line == 0 {
            return self;
        }

        let lines: Vec<&str> = source.lines().collect();
        let start = self.line.saturating_sub(context_lines + 1);
        let end = (self.line + context_lines).min(lines.len());

        let mut context = String::new();
        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            let prefix = if line_num == self.line { ">" } else { " " };
            context.push_str(&format!("{} {:4} | {}\n", prefix, line_num, line));

            if line_num == self.line && self.column > 0 {
                let indicator = " ".repeat(self.column - 1) + "^";
                context.push_str(&format!("       | {}\n", indicator));
            }
        }

        self.context = context;
        self
    }

    pub fn from_yaml_error(err: &serde_yaml::Error, source: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((0, 0));

        let raw = err.to_string();
        Self::located(&raw, line, column, source)
    }

    pub fn from_json_error(err: &serde_json::Error, source: &str) -> Self {
        let raw = err.to_string();
        let error = Self::located(&raw, err.line(), err.column(), source);
        if err.is_syntax() || err.is_eof() {
            error.with_kind(ParseErrorKind::Syntax)
        } else {
            error
        }
    }

    fn located(raw: &str, line: usize, column: usize, source: &str) -> Self {
        let kind = if is_schema_message(raw) {
            ParseErrorKind::InvalidSchema
        } else {
            ParseErrorKind::Syntax
        };

        ParseError::new(format_error_message(raw), line, column)
            .with_kind(kind)
            .with_source_context(source, 2)
            .with_suggestion_opt(suggest_fix(raw, source, line))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;
        if self.line > 0 {
            writeln!(f, "  --> line {}:{}", self.line, self.column)?;
        }

        if !self.context.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.context)?;
        }

        if let Some(suggestion) = &self.suggestion {
            writeln!(f)?;
            writeln!(f, "help: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Result type for loader operations
pub type ParseResult<T> = Result<T, ParseError>;

fn is_schema_message(msg: &str) -> bool {
    msg.contains("missing field")
        || msg.contains("unknown field")
        || msg.contains("invalid type")
        || msg.contains("did not match any variant")
}

/// Rewrite serde messages into something shorter
fn format_error_message(msg: &str) -> String {
    let msg = strip_location(msg);

    if msg.contains("missing field") {
        if let Some(field) = extract_between(msg, "missing field `", "`") {
            return format!("missing required field '{}'", field);
        }
    }

    if msg.contains("invalid type") {
        if let (Some(found), Some(expected)) = (
            extract_between(msg, "invalid type: ", ", expected"),
            msg.split(", expected ").nth(1),
        ) {
            return format!("expected {}, but found {}", expected, found);
        }
    }

    if msg.contains("did not match any variant") {
        return "entry has an unsupported shape (expected a name or a mapping)".to_string();
    }

    msg.to_string()
}

fn strip_location(msg: &str) -> &str {
    match msg.rfind(" at line ") {
        Some(index) => &msg[..index],
        None => msg,
    }
}

fn extract_between(msg: &str, prefix: &str, suffix: &str) -> Option<String> {
    let start = msg.find(prefix)? + prefix.len();
    let end = msg[start..].find(suffix)? + start;
    Some(msg[start..end].to_string())
}

/// Suggest fixes for common definition mistakes
fn suggest_fix(msg: &str, source: &str, line: usize) -> Option<String> {
    let error_line = source
        .lines()
        .nth(line.saturating_sub(1))
        .unwrap_or_default();

    if msg.contains("missing field `id`") {
        return Some("every axis value needs an 'id:'".to_string());
    }

    if msg.contains("missing field `name`") {
        return Some(
            "axes, matrices, variants and tasks are identified by 'name:'".to_string(),
        );
    }

    if error_line.starts_with('\t') {
        return Some(
            "YAML prefers spaces over tabs for indentation. Replace tabs with spaces.".to_string(),
        );
    }

    let typo_suggestions = [
        ("dependson", "depends_on"),
        ("displayname", "display_name"),
        ("runon", "run_on"),
        ("excludes", "exclude"),
        ("build_variant:", "buildvariants"),
        ("addtasks", "add_tasks"),
        ("removetasks", "remove_tasks"),
    ];

    let lower_line = error_line.to_lowercase();
    for (typo, correct) in typo_suggestions {
        if lower_line.contains(typo) {
            return Some(format!("did you mean '{}'?", correct));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("missing required field 'id'", 10, 5)
            .with_suggestion("every axis value needs an 'id:'");

        let output = format!("{}", err);
        assert!(output.contains("missing required field"));
        assert!(output.contains("line 10:5"));
        assert!(output.contains("help:"));
    }

    #[test]
    fn test_parse_error_with_source_context() {
        let source = "axes:\n  - name: os\n    values:\n      - display_name: Linux\n";

        let err = ParseError::new("missing required field 'id'", 4, 9).with_source_context(source, 1);

        assert!(err.context.contains("> "));
        assert!(err.context.contains("display_name: Linux"));
        assert!(err.context.contains('^'));
    }

    #[test]
    fn test_io_error_has_no_location() {
        let err = ParseError::io("failed to read file: not found");
        assert_eq!(err.kind, ParseErrorKind::Io);
        assert!(!err.to_string().contains("-->"));
    }

    #[test]
    fn test_extract_between() {
        let msg = "axes[0]: missing field `name` at line 2 column 5";
        assert_eq!(
            extract_between(msg, "missing field `", "`"),
            Some("name".to_string())
        );
        assert_eq!(format_error_message(msg), "missing required field 'name'");
    }

    #[test]
    fn test_typo_suggestion() {
        let source = "tasks:\n  - name: compile\n    dependsOn: [lint]\n";
        assert_eq!(
            suggest_fix("unknown thing", source, 3),
            Some("did you mean 'depends_on'?".to_string())
        );
    }
}
