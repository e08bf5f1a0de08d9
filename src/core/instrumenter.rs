use tracing::warn;

use super::classifier::{LineClassifier, LineDecision};
use super::tracker::BraceTracker;

/// Name of the generated declarations file included by instrumented sources.
pub const SUPPORT_HEADER: &str = "coverage.h";

/// Probe call text; the generated macro expands to a counter increment.
pub fn probe_call(file_index: usize, probe_index: usize) -> String {
    format!("COV_IN({},{})", file_index, probe_index)
}

/// Result of instrumenting one file.
pub struct InstrumentedFile {
    /// Rewritten lines, including the support include at the top.
    pub lines: Vec<String>,

    /// Probes allocated for this file; indices are the contiguous
    /// sequence 0..probe_count.
    pub probe_count: usize,
}

impl InstrumentedFile {
    pub fn text(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Single-pass, line-oriented probe inserter for one source file.
///
/// Lines must be processed in original order: every decision depends on the
/// brace depth and suppression state carried from the previous line.
pub struct FileInstrumenter<'a> {
    classifier: &'a LineClassifier,
    tracker: BraceTracker,
    file_index: usize,
    next_probe: usize,
    display_warnings: bool,
    display_name: String,
}

impl<'a> FileInstrumenter<'a> {
    pub fn new(
        classifier: &'a LineClassifier,
        file_index: usize,
        display_warnings: bool,
        display_name: &str,
    ) -> Self {
        Self {
            classifier,
            tracker: BraceTracker::new(),
            file_index,
            next_probe: 0,
            display_warnings,
            display_name: display_name.to_string(),
        }
    }

    /// Instrument a whole file's content. Probe indices start at zero for
    /// every file and increase with no gaps, however many candidate lines
    /// were rejected.
    pub fn instrument(mut self, content: &str) -> InstrumentedFile {
        let mut out = Vec::new();
        out.push(format!("#include \"{}\"", SUPPORT_HEADER));

        let mut prev_line = String::new();
        for (line_num, raw) in content.lines().enumerate() {
            let code = self.classifier.strip_comment(raw).to_string();
            self.tracker.line_start();

            let inc = code.matches('{').count();
            let dec = code.matches('}').count();
            let decision = self.classifier.classify(&prev_line, &code, inc, dec);

            self.tracker.close(dec);

            let mut wrapped = false;
            let text = match decision {
                LineDecision::InlineConditional { condition_end } => {
                    self.wrap_after_condition(&code, condition_end)
                }
                LineDecision::InlineBlock { insert_at } => self.insert_probe(raw, insert_at),
                LineDecision::LabelProbe { insert_at } => self.insert_probe(raw, insert_at),
                LineDecision::SingleLineWrap => {
                    wrapped = true;
                    raw.to_string()
                }
                LineDecision::Ambiguous => {
                    if self.display_warnings {
                        warn!(
                            "Too many braces on a line: {} line {}: {}",
                            self.display_name,
                            line_num + 1,
                            raw.trim()
                        );
                    }
                    raw.to_string()
                }
                LineDecision::Plain => raw.to_string(),
            };

            if wrapped {
                out.push("{".to_string());
                out.push(self.probe_line());
                out.push(text);
                out.push("}".to_string());
            } else {
                out.push(text);
            }

            if inc > 0 {
                let data = self.classifier.opens_data_region(&prev_line, &code);
                let dispatch = self.classifier.opens_dispatch_region(&prev_line);
                let entry_probe = self.tracker.open(inc, data, dispatch);
                // multi-brace lines were handled (or rejected) above
                if entry_probe && inc + dec <= 1 {
                    out.push(self.probe_line());
                }
            }

            prev_line = code;
        }

        if self.tracker.level() != 0 {
            warn!(
                "Brace count error: {} ends at depth {}",
                self.display_name,
                self.tracker.level()
            );
        }

        InstrumentedFile {
            lines: out,
            probe_count: self.next_probe,
        }
    }

    fn allocate(&mut self) -> usize {
        let index = self.next_probe;
        self.next_probe += 1;
        index
    }

    /// A standalone probe line, placed after an opening brace or inside a
    /// synthesized block.
    fn probe_line(&mut self) -> String {
        let index = self.allocate();
        probe_call(self.file_index, index)
    }

    /// Insert a probe call into an existing line at a byte offset. Offsets
    /// come from the comment-stripped view but always precede the comment,
    /// so they are valid on the raw line.
    fn insert_probe(&mut self, line: &str, at: usize) -> String {
        let index = self.allocate();
        format!("{}{}{}", &line[..at], probe_call(self.file_index, index), &line[at..])
    }

    /// Wrap the statement after an inline condition in a synthetic block:
    /// `if (x) run();` becomes `if (x){ COV_IN(f,i) run();}`. Uses the
    /// stripped line; a trailing comment would otherwise swallow the
    /// closing brace.
    fn wrap_after_condition(&mut self, code: &str, condition_end: usize) -> String {
        let index = self.allocate();
        format!(
            "{}{{ {}{}}}",
            &code[..condition_end],
            probe_call(self.file_index, index),
            code[condition_end..].trim_end()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instrument(content: &str) -> InstrumentedFile {
        let classifier = LineClassifier::new();
        FileInstrumenter::new(&classifier, 0, false, "test.cpp").instrument(content)
    }

    fn probe_lines(file: &InstrumentedFile) -> Vec<String> {
        file.lines
            .iter()
            .filter(|l| l.contains("COV_IN"))
            .cloned()
            .collect()
    }

    #[test]
    fn test_function_body_entry_probe() {
        let file = instrument("int main()\n{\nreturn 0;\n}\n");
        assert_eq!(file.probe_count, 1);
        assert_eq!(file.lines[0], "#include \"coverage.h\"");
        // probe sits right after the opening brace line
        let brace = file.lines.iter().position(|l| l == "{").unwrap();
        assert_eq!(file.lines[brace + 1], "COV_IN(0,0)");
    }

    #[test]
    fn test_probe_indices_are_contiguous() {
        let content = "\
void f()
{
if (x)
  {
  run();
  }
while (y)
  {
  spin();
  }
}
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 3);
        let probes = probe_lines(&file);
        for (i, line) in probes.iter().enumerate() {
            assert_eq!(line, &probe_call(0, i));
        }
    }

    #[test]
    fn test_aggregate_initializer_not_probed() {
        let content = "\
struct S s =
{
1, 2
};
void f()
{
run();
}
";
        let file = instrument(content);
        // only the function body entry is probed
        assert_eq!(file.probe_count, 1);
    }

    #[test]
    fn test_single_statement_if_is_wrapped() {
        let content = "\
void f()
{
if (x > 0)
doWork();
}
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 2);
        let body = file.lines.iter().position(|l| l == "doWork();").unwrap();
        assert_eq!(file.lines[body - 2], "{");
        assert_eq!(file.lines[body - 1], "COV_IN(0,1)");
        assert_eq!(file.lines[body + 1], "}");
    }

    #[test]
    fn test_split_for_header_not_wrapped() {
        let content = "\
void f()
{
for (int i=0;
i<n;i++)
doWork();
}
";
        let file = instrument(content);
        // entry probe only; neither continuation line is wrapped
        assert_eq!(file.probe_count, 1);
    }

    #[test]
    fn test_complete_for_header_wraps_body() {
        let content = "\
void f()
{
for (int i=0;i<n;i++)
doWork();
}
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 2);
    }

    #[test]
    fn test_inline_conditional_statement() {
        let content = "\
void f()
{
if (x > 0) doWork();
}
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 2);
        assert!(file
            .lines
            .iter()
            .any(|l| l == "if (x > 0){ COV_IN(0,1) doWork();}"));
    }

    #[test]
    fn test_switch_labels() {
        let content = "\
void f(int v)
{
switch (v)
{
case 3: run();
break;
default: stop();
break;
}
}
";
        let file = instrument(content);
        // entry probe for f, one per label; no probe for the switch brace
        assert_eq!(file.probe_count, 3);
        assert!(file.lines.iter().any(|l| l == "case 3:COV_IN(0,1) run();"));
        assert!(file.lines.iter().any(|l| l == "default:COV_IN(0,2) stop();"));
    }

    #[test]
    fn test_class_body_entry_not_probed() {
        let content = "\
class Widget
{
public:
void f()
{
run();
}
};
";
        let file = instrument(content);
        // method body gets a probe, class scope entry does not
        assert_eq!(file.probe_count, 1);
    }

    #[test]
    fn test_enum_body_not_probed() {
        let content = "\
enum Color
{
Red,
Green
};
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 0);
    }

    #[test]
    fn test_inline_block_single_probe() {
        let content = "\
int f()
{ return 3; }
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 1);
        assert!(file.lines.iter().any(|l| l == "{COV_IN(0,0) return 3; }"));
    }

    #[test]
    fn test_trailing_comment_ignored_for_decisions() {
        let content = "\
void f()
{
run(); // if (fake) { not real }
}
";
        let file = instrument(content);
        assert_eq!(file.probe_count, 1);
        // comment preserved verbatim on output
        assert!(file
            .lines
            .iter()
            .any(|l| l == "run(); // if (fake) { not real }"));
    }
}
