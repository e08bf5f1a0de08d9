use regex::Regex;

/// What the instrumenter should do with one source line.
///
/// Decisions are mutually exclusive; the classifier resolves overlapping
/// heuristics so the caller inserts at most one probe per line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDecision {
    /// A control condition and its statement share the line; wrap the
    /// statement after the condition in a synthetic brace pair.
    InlineConditional { condition_end: usize },

    /// The previous line was a braceless `if`/`for`/`while`/`else` header and
    /// this line is its single-statement body; wrap the whole line in a block.
    SingleLineWrap,

    /// `case <expr>:` or `default:`; insert a probe right after the colon.
    LabelProbe { insert_at: usize },

    /// A whole `{ ... }` block on one line; insert a probe after the brace.
    InlineBlock { insert_at: usize },

    /// Multiple braces on one line with no recognizable block shape.
    Ambiguous,

    /// Nothing to rewrite on this line.
    Plain,
}

/// Heuristic, line-oriented classifier for C-family source.
///
/// Works on a comment-stripped view of each line and the previous line's
/// stripped text. This is deliberately not a lexer: `//` inside string
/// literals, block comments and multi-line literals are not recognized.
pub struct LineClassifier {
    /// `if`/`for`/`while` followed by a parenthesized condition
    conditional_head_regex: Regex,

    /// bare `else` keyword
    else_head_regex: Regex,

    /// `for` header, for the split-header wrapping exception
    for_head_regex: Regex,

    /// standalone `enum` keyword (opens data, not executable scope)
    data_keyword_regex: Regex,

    /// standalone `class`/`struct`/`switch`, avoiding casts and templates
    dispatch_keyword_regex: Regex,

    /// `case <expr>:` label
    case_label_regex: Regex,

    /// `default:` label
    default_label_regex: Regex,

    /// an entire `{ ... }` block on a single line
    inline_block_regex: Regex,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self {
            conditional_head_regex: Regex::new(r"(^|\s)(if|for|while)\s*\(")
                .expect("Invalid conditional head regex"),
            else_head_regex: Regex::new(r"(^|\s)else(\s|$)")
                .expect("Invalid else head regex"),
            for_head_regex: Regex::new(r"(^|\s)for\s*\(")
                .expect("Invalid for head regex"),
            data_keyword_regex: Regex::new(r"(^|[^A-Za-z_])enum([^A-Za-z_]|$)")
                .expect("Invalid data keyword regex"),
            dispatch_keyword_regex: Regex::new(r"(^|[^A-Za-z_<(])(class|struct|switch)([^A-Za-z_]|$)")
                .expect("Invalid dispatch keyword regex"),
            case_label_regex: Regex::new(r"case[^A-Za-z_].*:")
                .expect("Invalid case label regex"),
            default_label_regex: Regex::new(r"default\s*:")
                .expect("Invalid default label regex"),
            inline_block_regex: Regex::new(r"^\s*\{.*\}\s*$")
                .expect("Invalid inline block regex"),
        }
    }

    /// Strip the line comment for classification. Everything from the first
    /// `//` is dropped; the original line is kept for output.
    pub fn strip_comment<'a>(&self, line: &'a str) -> &'a str {
        match line.find("//") {
            Some(index) => &line[..index],
            None => line,
        }
    }

    /// Classify one comment-stripped line given the previous stripped line
    /// and this line's brace counts.
    pub fn classify(&self, prev_line: &str, line: &str, inc: usize, dec: usize) -> LineDecision {
        let mut decision = if let Some(condition_end) = self.condition_with_statement(line) {
            LineDecision::InlineConditional { condition_end }
        } else if self.wraps_single_statement(prev_line, line) {
            LineDecision::SingleLineWrap
        } else {
            LineDecision::Plain
        };

        // Multiple braces on one line: a recognizable whole-line block gets an
        // inline probe; anything else is too ambiguous to instrument.
        if inc + dec > 1 {
            if self.inline_block_regex.is_match(line)
                && !prev_line.trim_end().ends_with(',')
            {
                // insert_at is safe on the raw line: '{' precedes any comment
                let insert_at = line.find('{').map(|i| i + 1).unwrap_or(0);
                decision = LineDecision::InlineBlock { insert_at };
            } else if decision == LineDecision::Plain {
                decision = LineDecision::Ambiguous;
            }
        }

        if let Some(insert_at) = self.label_probe(line) {
            decision = LineDecision::LabelProbe { insert_at };
        }

        decision
    }

    /// `if (...) stmt;` on one line: the condition's close paren is followed
    /// by a statement terminator. Returns the index just past the close paren.
    fn condition_with_statement(&self, line: &str) -> Option<usize> {
        if !self.conditional_head_regex.is_match(line) {
            return None;
        }
        let end = self.find_condition_end(line);
        if end > 0 && line[end..].contains(';') {
            Some(end)
        } else {
            None
        }
    }

    /// Index just past the close paren matching the first open paren,
    /// tracked by nesting so embedded calls do not end the condition early.
    /// Returns 0 when the parens never balance on this line.
    pub fn find_condition_end(&self, line: &str) -> usize {
        let mut nest = 0usize;
        let mut opened = false;
        for (i, c) in line.char_indices() {
            if c == '(' {
                opened = true;
                nest += 1;
            } else if c == ')' && opened {
                nest -= 1;
                if nest == 0 {
                    return i + 1;
                }
            }
        }
        0
    }

    /// The previous line was a control header without a block and this line
    /// is its single-statement body. A `for` header that does not carry its
    /// two semicolons on the previous line is still continuing and must not
    /// be wrapped.
    fn wraps_single_statement(&self, prev_line: &str, line: &str) -> bool {
        let header = (self.conditional_head_regex.is_match(prev_line)
            || self.else_head_regex.is_match(prev_line))
            && !prev_line.contains('{');
        if !header {
            return false;
        }
        if !line.contains(';') || line.contains('{') {
            return false;
        }
        if self.for_head_regex.is_match(prev_line)
            && prev_line.matches(';').count() != 2
        {
            return false;
        }
        true
    }

    /// `case`/`default` labels get a probe right after the colon.
    fn label_probe(&self, line: &str) -> Option<usize> {
        if self.case_label_regex.is_match(line) || self.default_label_regex.is_match(line) {
            line.find(':').map(|i| i + 1)
        } else {
            None
        }
    }

    /// The opening brace starts a data region: aggregate initializer
    /// (previous line ends with `=`) or an `enum` body.
    pub fn opens_data_region(&self, prev_line: &str, line: &str) -> bool {
        prev_line.trim_end().ends_with('=')
            || self.data_keyword_regex.is_match(line)
            || self.data_keyword_regex.is_match(prev_line)
    }

    /// The opening brace starts a declarative or dispatch scope whose body
    /// entry should not count as a hit.
    pub fn opens_dispatch_region(&self, prev_line: &str) -> bool {
        self.dispatch_keyword_regex.is_match(prev_line)
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new()
    }
}
