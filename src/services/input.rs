//! Input collection from a literal argument, a file, or standard input.

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::PathBuf;

use crate::error::{ConfigError, InputError};
use crate::models::TextItem;
use crate::utils::normalize_line;

/// The single place input texts are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Text(String),
    File(PathBuf),
    Stdin,
}

impl InputSource {
    /// Select exactly one source; zero or several is a configuration error.
    pub fn from_args(
        text: Option<String>,
        file: Option<PathBuf>,
        console: bool,
    ) -> Result<Self, ConfigError> {
        let selected = usize::from(text.is_some()) + usize::from(file.is_some()) + usize::from(console);
        if selected != 1 {
            let message = if selected == 0 {
                "no input source given: use one of --text, --file or --console"
            } else {
                "--text, --file and --console are mutually exclusive"
            };
            return Err(ConfigError::InputSelection(message.to_string()));
        }

        Ok(match (text, file) {
            (Some(text), _) => InputSource::Text(text),
            (_, Some(path)) => InputSource::File(path),
            _ => InputSource::Stdin,
        })
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Text(_) => "command-line text".to_string(),
            InputSource::File(path) => path.display().to_string(),
            InputSource::Stdin => "standard input".to_string(),
        }
    }

    /// Read every text from the source. Blocks on file and stdin reads.
    pub fn collect(self) -> Result<Vec<TextItem>, InputError> {
        let texts: Vec<String> = match self {
            InputSource::Text(text) => normalize_line(&text).map(str::to_string).into_iter().collect(),
            InputSource::File(path) => {
                let display = path.display().to_string();
                let file_error = |source| InputError::FileError {
                    path: display.clone(),
                    source,
                };
                let file = File::open(&path).map_err(file_error)?;
                read_lines(BufReader::new(file), StopAt::EndOfStream)
                    .collect::<io::Result<_>>()
                    .map_err(file_error)?
            }
            InputSource::Stdin => {
                let stdin = io::stdin();
                if stdin.is_terminal() {
                    eprintln!("Enter text lines. Submit an empty line to finish:");
                }
                read_lines(stdin.lock(), StopAt::BlankLine)
                    .collect::<io::Result<_>>()
                    .map_err(InputError::StdinError)?
            }
        };

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| TextItem::new(index, text))
            .collect())
    }
}

/// When a line stream ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAt {
    /// Blank lines are skipped; the stream ends at EOF.
    EndOfStream,
    /// The first blank line ends the stream.
    BlankLine,
}

/// Lazy stream of trimmed, non-blank lines.
pub struct Lines<R> {
    reader: R,
    stop_at: StopAt,
    done: bool,
}

pub fn read_lines<R: BufRead>(reader: R, stop_at: StopAt) -> Lines<R> {
    Lines {
        reader,
        stop_at,
        done: false,
    }
}

impl<R: BufRead> Iterator for Lines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        while !self.done {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => self.done = true,
                Ok(_) => match normalize_line(&line) {
                    Some(text) => return Some(Ok(text.to_string())),
                    None if self.stop_at == StopAt::BlankLine => self.done = true,
                    None => {}
                },
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
