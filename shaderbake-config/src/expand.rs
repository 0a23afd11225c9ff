use crate::error::ConfigError;

/// Conditional-block evaluator for the config preprocessor.
///
/// Supports `#ifdef MACRO`, `#if 1`, `#if 0`, `#else` and `#endif`. The
/// stack starts with a single `true` so top-level lines are always active.
#[derive(Debug)]
pub struct ConditionStack {
    blocks: Vec<bool>,
}

/// What a directive line did to the stack, or that the line is a plain
/// shader declaration.
#[derive(Debug, Eq, PartialEq)]
pub enum LineKind {
    Directive,
    Declaration,
}

impl ConditionStack {
    pub fn new() -> Self {
        ConditionStack { blocks: vec![true] }
    }

    /// Whether declarations at the current position are active.
    pub fn active(&self) -> bool {
        *self.blocks.last().unwrap_or(&true)
    }

    /// Interpret one trimmed config line against the global define list.
    ///
    /// `#ifdef` matches against the defines exactly as written, so a global
    /// `-D A=1` does not satisfy `#ifdef A`.
    pub fn apply(
        &mut self,
        line: &str,
        line_no: u32,
        defines: &[String],
    ) -> Result<LineKind, ConfigError> {
        if let Some(pos) = line.find("#ifdef") {
            let name = line[pos + "#ifdef".len()..].trim();
            let state = self.active() && defines.iter().any(|define| define == name);
            self.blocks.push(state);
            return Ok(LineKind::Directive);
        }

        if line.contains("#if 1") {
            self.blocks.push(self.active());
            return Ok(LineKind::Directive);
        }

        if line.contains("#if 0") {
            self.blocks.push(false);
            return Ok(LineKind::Directive);
        }

        if line.contains("#endif") {
            if self.blocks.len() == 1 {
                return Err(ConfigError::UnexpectedEndif { line: line_no });
            }
            self.blocks.pop();
            return Ok(LineKind::Directive);
        }

        if line.contains("#else") {
            if self.blocks.len() < 2 {
                return Err(ConfigError::UnexpectedElse { line: line_no });
            }
            // Only flip when the enclosing block is active, otherwise both
            // branches stay disabled.
            if self.blocks[self.blocks.len() - 2] {
                let top = self.blocks.last_mut().unwrap();
                *top = !*top;
            }
            return Ok(LineKind::Directive);
        }

        Ok(LineKind::Declaration)
    }
}

impl Default for ConditionStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand the first `{a,b,c}` set on the line into one copy per choice,
/// recursing so several sets multiply. Expansion is depth-first and keeps
/// the comma order, so permutations come out in declaration order.
pub fn expand_braces(line: &str, line_no: u32) -> Result<Vec<String>, ConfigError> {
    let Some(opening) = line.find('{') else {
        return Ok(vec![line.to_string()]);
    };

    let closing = line[opening..]
        .find('}')
        .map(|rel| opening + rel)
        .ok_or(ConfigError::MissingClosingBrace { line: line_no })?;

    let mut expanded = Vec::new();
    for choice in line[opening + 1..closing].split(',') {
        let rewritten = format!("{}{}{}", &line[..opening], choice, &line[closing + 1..]);
        expanded.extend(expand_braces(&rewritten, line_no)?);
    }

    Ok(expanded)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expands_single_brace_set() {
        let lines = expand_braces("shader.hlsl -D A={0,1}", 1).unwrap();
        assert_eq!(lines, ["shader.hlsl -D A=0", "shader.hlsl -D A=1"]);
    }

    #[test]
    fn brace_sets_multiply_in_declaration_order() {
        let lines = expand_braces("s.hlsl -D A={0,1} -D B={X,Y}", 1).unwrap();
        assert_eq!(
            lines,
            [
                "s.hlsl -D A=0 -D B=X",
                "s.hlsl -D A=0 -D B=Y",
                "s.hlsl -D A=1 -D B=X",
                "s.hlsl -D A=1 -D B=Y",
            ]
        );
    }

    #[test]
    fn missing_closing_brace_is_an_error() {
        let err = expand_braces("s.hlsl -D A={0,1", 7).unwrap_err();
        assert!(matches!(err, ConfigError::MissingClosingBrace { line: 7 }));
    }

    #[test]
    fn ifdef_matches_whole_define() {
        let defines = vec![String::from("FOO"), String::from("BAR=1")];

        let mut stack = ConditionStack::new();
        stack.apply("#ifdef FOO", 1, &defines).unwrap();
        assert!(stack.active());

        let mut stack = ConditionStack::new();
        stack.apply("#ifdef BAR", 1, &defines).unwrap();
        assert!(!stack.active());
    }

    #[test]
    fn else_flips_only_when_parent_is_active() {
        let mut stack = ConditionStack::new();
        stack.apply("#if 0", 1, &[]).unwrap();
        stack.apply("#if 1", 2, &[]).unwrap();
        assert!(!stack.active());
        // Parent block is inactive, both branches stay off.
        stack.apply("#else", 3, &[]).unwrap();
        assert!(!stack.active());
        stack.apply("#endif", 4, &[]).unwrap();
        stack.apply("#else", 5, &[]).unwrap();
        assert!(stack.active());
    }

    #[test]
    fn unbalanced_directives_are_errors() {
        let mut stack = ConditionStack::new();
        assert!(matches!(
            stack.apply("#endif", 3, &[]),
            Err(ConfigError::UnexpectedEndif { line: 3 })
        ));
        assert!(matches!(
            stack.apply("#else", 4, &[]),
            Err(ConfigError::UnexpectedElse { line: 4 })
        ));
    }
}
