//! Per-invocation CLI flags (spec §4.10/§6): which meeting to render, the
//! recording's format (only `presentation` recordings are composed;
//! anything else is a silent no-op), and plain-vs-structured logging.
//! Deployment-wide paths come from the environment instead
//! (`config::EnvConfig`).
//!
//! Manual `std::env::args()` scanning, matching `render_job`/
//! `video_ingestor`'s argument handling rather than pulling in a parser
//! crate the teacher never uses.

#[derive(Debug)]
pub struct Cli {
    pub meeting_id: String,
    pub format: String,
    pub log_stdout: bool,
}

#[derive(Debug)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Cli {
    pub fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ParseError> {
        args.next(); // argv[0]

        let mut meeting_id = None;
        let mut format = None;
        let mut log_stdout = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--meeting-id" => {
                    meeting_id = Some(args.next().ok_or_else(|| {
                        ParseError("--meeting-id requires a value".to_string())
                    })?);
                }
                "--format" => {
                    format = Some(
                        args.next()
                            .ok_or_else(|| ParseError("--format requires a value".to_string()))?,
                    );
                }
                "--log-stdout" => log_stdout = true,
                other => return Err(ParseError(format!("unrecognized argument: {other}"))),
            }
        }

        Ok(Self {
            meeting_id: meeting_id.ok_or_else(|| ParseError("missing --meeting-id".to_string()))?,
            format: format.ok_or_else(|| ParseError("missing --format".to_string()))?,
            log_stdout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(items: &'a [&str]) -> impl Iterator<Item = String> + 'a {
        std::iter::once("compose_job".to_string()).chain(items.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_required_flags() {
        let cli = Cli::parse(args(&["--meeting-id", "abc123", "--format", "presentation"])).unwrap();
        assert_eq!(cli.meeting_id, "abc123");
        assert_eq!(cli.format, "presentation");
        assert!(!cli.log_stdout);
    }

    #[test]
    fn log_stdout_is_a_bare_switch() {
        let cli = Cli::parse(args(&[
            "--meeting-id", "abc123", "--format", "presentation", "--log-stdout",
        ]))
        .unwrap();
        assert!(cli.log_stdout);
    }

    #[test]
    fn missing_meeting_id_is_an_error() {
        assert!(Cli::parse(args(&["--format", "presentation"])).is_err());
    }

    #[test]
    fn unrecognized_flag_is_an_error() {
        assert!(Cli::parse(args(&[
            "--meeting-id", "abc123", "--format", "presentation", "--bogus",
        ]))
        .is_err());
    }
}
