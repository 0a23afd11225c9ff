use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::char;
use nom::combinator::{map, rest};
use nom::multi::many1;
use nom::sequence::{delimited, preceded};
use nom::IResult;

/// Normalize a raw config line: trim surrounding whitespace, turn tabs into
/// spaces and collapse runs of spaces into one.
pub fn trim_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last_was_space = false;

    for ch in line.trim().chars() {
        let ch = if ch == '\t' { ' ' } else { ch };
        if ch == ' ' && last_was_space {
            continue;
        }
        last_was_space = ch == ' ';
        out.push(ch);
    }

    out
}

/// A trimmed line that carries no shader declaration.
pub fn is_skippable(line: &str) -> bool {
    line.is_empty() || line.starts_with("//")
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), is_not("\""), char('"'))(input)
}

// A quote that never closes swallows the rest of the line.
fn unterminated(input: &str) -> IResult<&str, &str> {
    preceded(char('"'), rest)(input)
}

fn bare(input: &str) -> IResult<&str, &str> {
    is_not(" \"")(input)
}

fn token(input: &str) -> IResult<&str, String> {
    map(many1(alt((quoted, bare, unterminated))), |parts| {
        parts.concat()
    })(input)
}

/// Split a trimmed line into argv-style tokens. Double-quoted regions keep
/// their spaces and lose their quotes, and quotes may start mid-token, so
/// `-I"path with spaces"` is one token.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut input = line;

    loop {
        input = input.trim_start_matches(' ');
        if input.is_empty() {
            break;
        }

        match token(input) {
            Ok((remaining, token)) => {
                tokens.push(token);
                input = remaining;
            }
            Err(_) => break,
        }
    }

    tokens
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(trim_line("  a\t\tb   c  "), "a b c");
        assert_eq!(trim_line("\t"), "");
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(is_skippable(""));
        assert!(is_skippable("// a comment"));
        assert!(!is_skippable("shader.hlsl -T vs"));
    }

    #[test]
    fn tokenizes_simple_line() {
        assert_eq!(
            tokenize("shader.hlsl -T vs -E main"),
            ["shader.hlsl", "-T", "vs", "-E", "main"]
        );
    }

    #[test]
    fn keeps_spaces_inside_quotes() {
        assert_eq!(
            tokenize(r#"shader.hlsl -o "sub dir" -D A=1"#),
            ["shader.hlsl", "-o", "sub dir", "-D", "A=1"]
        );
    }

    #[test]
    fn quotes_may_start_mid_token() {
        assert_eq!(tokenize(r#"-I"path with spaces""#), ["-Ipath with spaces"]);
    }

    #[test]
    fn unterminated_quote_runs_to_end_of_line() {
        assert_eq!(tokenize(r#"-o "sub dir"#), ["-o", "sub dir"]);
    }
}
