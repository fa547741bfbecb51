//! Command line parsing.
//!
//! Turns one raw input line into a [`CommandLine`]: an ordered pipeline of
//! commands plus redirection and background metadata. The grammar is the
//! classic minimal one:
//!
//! ```text
//! line        := command ('|' command)* redirection* '&'?
//! redirection := '<' path | '>' path
//! command     := word+
//! ```
//!
//! `parse` holds no state between calls and never panics; malformed input
//! is reported as a [`ParseError`] with a message suitable for the prompt.

use thiserror::Error;


/// Which stream a redirection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Input,
    Output,
}

impl std::fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RedirectKind::Input => f.write_str("input"),
            RedirectKind::Output => f.write_str("output"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("multiple '&' not allowed")]
    MultipleBackground,

    #[error("multiple {0} redirections not allowed")]
    DuplicateRedirect(RedirectKind),

    #[error("{0} redirection requires a file name")]
    MissingRedirectTarget(RedirectKind),

    #[error("pipe with no command")]
    EmptyPipelineStage,
}

/// One elementary command of a pipeline. Immutable once produced;
/// `argv` always holds at least one word and `argv[0]` is the program name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
}

impl Command {
    fn new(argv: Vec<String>) -> Self {
        debug_assert!(!argv.is_empty());
        Command { argv }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn name(&self) -> &str {
        // never empty, the parser only closes stages holding a word
        &self.argv[0]
    }
}

/// A parsed input line: pipeline stages left to right (upstream to
/// downstream), whole-line redirections and the background flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    pub pipeline: Vec<Command>,
    pub stdin_file: Option<String>,
    pub stdout_file: Option<String>,
    pub background: bool,
}

impl CommandLine {
    /// An empty line (or a line of only whitespace) parses to an empty
    /// pipeline. It is not an error and triggers no action.
    pub fn is_empty(&self) -> bool {
        self.pipeline.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    RedirectIn,
    RedirectOut,
    Pipe,
    Background,
}

/// Splits a line on whitespace. `<`, `>`, `|` and `&` are single-character
/// operator tokens even when glued to adjacent text; any other maximal
/// non-whitespace run is a word.
fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    };

    for c in line.chars() {
        match c {
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            '<' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::RedirectIn);
            }
            '>' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::RedirectOut);
            }
            '|' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Pipe);
            }
            '&' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Background);
            }
            _ => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

/// Parses one input line into a fresh [`CommandLine`].
///
/// The token stream is walked left to right while the current stage's
/// argument list accumulates. A `|` closes the current stage (which must
/// be non-empty); at end of input a non-empty trailing stage is appended
/// and an empty one is silently dropped, so a line ending in whitespace
/// or a trailing `|`-closed stage parses cleanly.
pub fn parse(line: &str) -> Result<CommandLine, ParseError> {
    let mut pipeline: Vec<Command> = Vec::new();
    let mut argv: Vec<String> = Vec::new();
    let mut stdin_file: Option<String> = None;
    let mut stdout_file: Option<String> = None;
    let mut background = false;

    let mut tokens = tokenize(line).into_iter();
    while let Some(token) = tokens.next() {
        match token {
            Token::Word(w) => argv.push(w),
            Token::Background => {
                if background {
                    return Err(ParseError::MultipleBackground);
                }
                background = true;
            }
            Token::RedirectIn => {
                if stdin_file.is_some() {
                    return Err(ParseError::DuplicateRedirect(RedirectKind::Input));
                }
                match tokens.next() {
                    Some(Token::Word(path)) => stdin_file = Some(path),
                    _ => return Err(ParseError::MissingRedirectTarget(RedirectKind::Input)),
                }
            }
            Token::RedirectOut => {
                if stdout_file.is_some() {
                    return Err(ParseError::DuplicateRedirect(RedirectKind::Output));
                }
                match tokens.next() {
                    Some(Token::Word(path)) => stdout_file = Some(path),
                    _ => return Err(ParseError::MissingRedirectTarget(RedirectKind::Output)),
                }
            }
            Token::Pipe => {
                if argv.is_empty() {
                    return Err(ParseError::EmptyPipelineStage);
                }
                pipeline.push(Command::new(std::mem::take(&mut argv)));
            }
        }
    }

    if !argv.is_empty() {
        pipeline.push(Command::new(argv));
    }

    Ok(CommandLine {
        pipeline,
        stdin_file,
        stdout_file,
        background,
    })
}
