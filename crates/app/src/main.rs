use std::fmt;
use std::str::FromStr;

use quiz_core::model::SessionToken;
use quiz_core::round::{AnswerReason, RoundSettings, RoundSettingsError, SubmittedAnswer};
use services::{AnswerView, Clock, QuestionView, QuizService, SessionStats};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingToken,
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidToken { raw: String },
    InvalidSettings(RoundSettingsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingToken => write!(f, "status needs --token or QUIZ_TOKEN"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidToken { raw } => write!(f, "invalid session token: {raw}"),
            ArgsError::InvalidSettings(err) => write!(f, "invalid round settings: {err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn parse_token(raw: String) -> Result<SessionToken, ArgsError> {
    SessionToken::new(raw.clone()).map_err(|_| ArgsError::InvalidToken { raw })
}

fn env_number<T: FromStr>(var: &'static str) -> Result<Option<T>, ArgsError> {
    std::env::var(var)
        .ok()
        .map(|raw| parse_number(var, raw))
        .transpose()
}

struct Args {
    db_url: String,
    token: Option<SessionToken>,
    settings: RoundSettings,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p quiz-app -- play   [options]");
    eprintln!("  cargo run -p quiz-app -- status --token <token> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     SQLite database (default: sqlite://quiz.sqlite3)");
    eprintln!("  --token <token>       Resume the session issued on an earlier run");
    eprintln!("  --questions <n>       Questions per round (default: 10)");
    eprintln!("  --window <secs>       Seconds to answer each question (default: 30)");
    eprintln!("  --grace <secs>        Extra seconds allowed for slow input (default: 2)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_TOKEN, QUIZ_QUESTION_COUNT, QUIZ_ANSWER_WINDOW_SECS,");
    eprintln!("  QUIZ_GRACE_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Status,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("quiz.sqlite3".into()), normalize_sqlite_url);
        let mut token = std::env::var("QUIZ_TOKEN").ok().map(parse_token).transpose()?;
        let mut question_count = env_number("QUIZ_QUESTION_COUNT")?
            .unwrap_or(RoundSettings::DEFAULT_QUESTION_COUNT);
        let mut window_secs = env_number("QUIZ_ANSWER_WINDOW_SECS")?
            .unwrap_or(RoundSettings::DEFAULT_ANSWER_WINDOW_SECS);
        let mut grace_secs =
            env_number("QUIZ_GRACE_SECS")?.unwrap_or(RoundSettings::DEFAULT_GRACE_SECS);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--token" => token = Some(parse_token(require_value(args, "--token")?)?),
                "--questions" => {
                    question_count = parse_number("--questions", require_value(args, "--questions")?)?;
                }
                "--window" => {
                    window_secs = parse_number("--window", require_value(args, "--window")?)?;
                }
                "--grace" => {
                    grace_secs = parse_number("--grace", require_value(args, "--grace")?)?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let settings = RoundSettings::from_secs(question_count, window_secs, grace_secs)
            .map_err(ArgsError::InvalidSettings)?;

        Ok(Self {
            db_url,
            token,
            settings,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── TERMINAL ROUND ────────────────────────────────────────────────────────────
//

enum Input {
    Answer(i64),
    Quit,
    Retry,
}

fn read_choice(line: &str) -> Input {
    match line.trim() {
        "q" | "quit" => Input::Quit,
        "" | "s" | "skip" => Input::Answer(SubmittedAnswer::SKIP_SENTINEL),
        other => match other.parse::<i64>() {
            // Options are shown 1-based.
            Ok(n) if n >= 1 => Input::Answer(n - 1),
            _ => Input::Retry,
        },
    }
}

fn print_stats(stats: &SessionStats) {
    println!(
        "question {} | correct {} | incorrect {} | {}",
        stats.current_index + 1,
        stats.total_correct,
        stats.total_incorrect,
        if stats.has_active_game { "in progress" } else { "idle" }
    );
}

fn print_question(question: &QuestionView) {
    println!();
    println!("{} ({}s)", question.text, question.time_limit);
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}) {option}", i + 1);
    }
    print!("> ");
    // Prompt only; a failed flush just delays it.
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

fn print_feedback(view: &AnswerView, asked: &QuestionView) {
    let answer = asked
        .options
        .get(view.correct_answer_idx)
        .map_or("?", String::as_str);
    match view.reason {
        AnswerReason::Correct => println!("Correct!"),
        AnswerReason::WrongAnswer => println!("Wrong. The answer was: {answer}"),
        AnswerReason::Timeout => println!("Too slow. The answer was: {answer}"),
        AnswerReason::Skipped => println!("Skipped. The answer was: {answer}"),
    }

    if let Some(round) = &view.completed_round {
        println!();
        println!(
            "Round over: {} correct, {} incorrect out of {} in {}s",
            round.correct, round.incorrect, round.questions, round.elapsed_secs
        );
    }
}

async fn play(svc: &QuizService, token: Option<&SessionToken>) -> Result<(), Box<dyn std::error::Error>> {
    let check_in = svc.check_in(token).await?;
    if check_in.created {
        println!("New session. Resume later with --token {}", check_in.token);
    } else {
        println!("Resuming session.");
    }
    let token = check_in.token;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next = svc.start(&token).await?.next_question;

    while let Some(question) = next.take() {
        print_question(&question);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let answer = match read_choice(&line) {
            Input::Answer(answer) => answer,
            Input::Quit => break,
            Input::Retry => {
                println!("Enter an option number, s to skip or q to quit.");
                next = Some(question);
                continue;
            }
        };

        let view = svc.submit_answer(&token, answer).await?;
        print_feedback(&view, &question);
        next = view.next_question;
    }

    print_stats(&svc.check_status(&token).await?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite in the binary so services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let svc = QuizService::sqlite(&parsed.db_url, Clock::system(), parsed.settings).await?;
    info!(db = %parsed.db_url, questions = svc.settings().question_count(), "quiz ready");

    match cmd {
        Command::Play => play(&svc, parsed.token.as_ref()).await,
        Command::Status => {
            let token = parsed.token.ok_or(ArgsError::MissingToken)?;
            print_stats(&svc.check_status(&token).await?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_are_one_based() {
        assert!(matches!(read_choice("1"), Input::Answer(0)));
        assert!(matches!(read_choice(" 4 "), Input::Answer(3)));
        assert!(matches!(read_choice(""), Input::Answer(-1)));
        assert!(matches!(read_choice("s"), Input::Answer(-1)));
        assert!(matches!(read_choice("q"), Input::Quit));
        assert!(matches!(read_choice("0"), Input::Retry));
        assert!(matches!(read_choice("abc"), Input::Retry));
    }

    #[test]
    fn relative_sqlite_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:data/quiz.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/quiz.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }
}
