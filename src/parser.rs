use std::path::PathBuf;

use crate::command::{Pipeline, Stage};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Pipe,
    Less,
    Great,
    Amp,
}

/// Parse a normalized command line into a pipeline in execution order.
/// e.g., "cat < in | sort > out &" -> 2 stages, both redirections, background
pub fn parse(line: &str) -> Result<Pipeline, ParseError> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyLine);
    }

    let mut stages = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut stdin = None;
    let mut stdout = None;
    let mut stdout_stage = 0;
    let mut background = false;

    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        if background {
            return Err(ParseError::MisplacedBackground);
        }
        match token {
            Token::Word(word) => current.push(word),
            Token::Pipe => {
                if current.is_empty() {
                    return Err(ParseError::EmptyStage);
                }
                stages.push(Stage::new(std::mem::take(&mut current)));
            }
            Token::Less => {
                let target = redirect_target(tokens.next(), '<')?;
                if !stages.is_empty() {
                    return Err(ParseError::MisplacedRedirect('<', "start"));
                }
                if stdin.replace(target).is_some() {
                    return Err(ParseError::DuplicateRedirect('<'));
                }
            }
            Token::Great => {
                let target = redirect_target(tokens.next(), '>')?;
                if stdout.replace(target).is_some() {
                    return Err(ParseError::DuplicateRedirect('>'));
                }
                stdout_stage = stages.len();
            }
            Token::Amp => background = true,
        }
    }

    if current.is_empty() {
        return Err(ParseError::EmptyStage);
    }
    stages.push(Stage::new(current));

    if stdout.is_some() && stdout_stage != stages.len() - 1 {
        return Err(ParseError::MisplacedRedirect('>', "end"));
    }

    Ok(Pipeline {
        stages,
        stdin,
        stdout,
        background,
    })
}

fn redirect_target(token: Option<Token>, op: char) -> Result<PathBuf, ParseError> {
    match token {
        Some(Token::Word(target)) => Ok(PathBuf::from(target)),
        _ => Err(ParseError::MissingTarget(op)),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // distinguishes "" (an empty argument) from no word at all
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            } else {
                current.push(c);
            }
            continue;
        }

        let op = match c {
            '|' => Some(Token::Pipe),
            '<' => Some(Token::Less),
            '>' => Some(Token::Great),
            '&' => Some(Token::Amp),
            _ => None,
        };

        if op.is_some() || c.is_whitespace() {
            if in_word {
                tokens.push(Token::Word(std::mem::take(&mut current)));
                in_word = false;
            }
            tokens.extend(op);
            continue;
        }

        in_word = true;
        match c {
            '"' | '\'' => quote = Some(c),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            _ => current.push(c),
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_word {
        tokens.push(Token::Word(current));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(pipeline: &Pipeline) -> Vec<Vec<&str>> {
        pipeline
            .stages
            .iter()
            .map(|s| s.argv().iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn single_command() {
        let p = parse("ls -l /tmp").unwrap();
        assert_eq!(argv(&p), vec![vec!["ls", "-l", "/tmp"]]);
        assert!(p.stdin.is_none());
        assert!(p.stdout.is_none());
        assert!(!p.background);
    }

    #[test]
    fn stages_keep_execution_order() {
        let p = parse("echo hello | tr a-z A-Z | wc -c").unwrap();
        assert_eq!(
            argv(&p),
            vec![vec!["echo", "hello"], vec!["tr", "a-z", "A-Z"], vec!["wc", "-c"]]
        );
    }

    #[test]
    fn operators_need_no_spaces() {
        let p = parse("cat<in.txt|sort>out.txt&").unwrap();
        assert_eq!(argv(&p), vec![vec!["cat"], vec!["sort"]]);
        assert_eq!(p.stdin, Some(PathBuf::from("in.txt")));
        assert_eq!(p.stdout, Some(PathBuf::from("out.txt")));
        assert!(p.background);
    }

    #[test]
    fn redirections_are_independent() {
        let p = parse("sort > out.txt").unwrap();
        assert!(p.stdin.is_none());
        assert_eq!(p.stdout, Some(PathBuf::from("out.txt")));

        let p = parse("sort < in.txt").unwrap();
        assert_eq!(p.stdin, Some(PathBuf::from("in.txt")));
        assert!(p.stdout.is_none());
    }

    #[test]
    fn redirect_may_precede_arguments() {
        let p = parse("< in.txt cat -n").unwrap();
        assert_eq!(argv(&p), vec![vec!["cat", "-n"]]);
        assert_eq!(p.stdin, Some(PathBuf::from("in.txt")));
    }

    #[test]
    fn quotes_group_words() {
        let p = parse(r#"echo "a | b" 'c > d' "" x\ y"#).unwrap();
        assert_eq!(argv(&p), vec![vec!["echo", "a | b", "c > d", "", "x y"]]);
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(parse(""), Err(ParseError::EmptyLine));
        assert_eq!(parse("   "), Err(ParseError::EmptyLine));
        assert_eq!(parse("| wc"), Err(ParseError::EmptyStage));
        assert_eq!(parse("ls |"), Err(ParseError::EmptyStage));
        assert_eq!(parse("ls || wc"), Err(ParseError::EmptyStage));
        assert_eq!(parse("&"), Err(ParseError::EmptyStage));
        assert_eq!(parse("cat <"), Err(ParseError::MissingTarget('<')));
        assert_eq!(parse("cat > | wc"), Err(ParseError::MissingTarget('>')));
        assert_eq!(parse("cat < a < b"), Err(ParseError::DuplicateRedirect('<')));
        assert_eq!(parse("cat > a > b"), Err(ParseError::DuplicateRedirect('>')));
        assert_eq!(
            parse("ls | cat < a"),
            Err(ParseError::MisplacedRedirect('<', "start"))
        );
        assert_eq!(
            parse("ls > a | cat"),
            Err(ParseError::MisplacedRedirect('>', "end"))
        );
        assert_eq!(parse("sleep 1 & ls"), Err(ParseError::MisplacedBackground));
        assert_eq!(parse("sleep 1 & &"), Err(ParseError::MisplacedBackground));
        assert_eq!(parse("echo 'abc"), Err(ParseError::UnterminatedQuote));
    }
}
