//! Verdicts from health-check transcripts.
//!
//! A health check asks the model to answer `HEALTHY` or `UNHEALTHY`, the
//! latter optionally followed by a `$ <command>` line to run next.

use crate::api::logging::emit_command_failed;
use crate::api::TokenSource;
use crate::markup::PROMPT_MARKER;
use crate::runtime::{drive_turn, TurnOutcome};
use crate::state::{ChatSession, RequestTicket};
use crate::tools::{wrap_shell_output, ShellExecutor};
use crate::types::{Role, Turn};
use aho_corasick::{AhoCorasick, MatchKind};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Instructions sent ahead of the first observation of a health check.
pub const HEALTH_PROMPT: &str = "You are a Linux network engineer diagnosing a host.
Reply HEALTHY if the configuration below looks sound.
Otherwise reply UNHEALTHY, then put the one command you want run next on its own line, prefixed with `$ `.

Example:
HEALTHY
All links are up and addressed.

Example:
UNHEALTHY
$ ip -br link show
eth1 has no address; checking link state.
";

/// First user turn of a health check: the prompt plus what `command` printed.
pub fn health_request(command: &str, output: &str) -> String {
    format!(
        "{HEALTH_PROMPT}\nthe following is the output of {command}: {}",
        output.trim_end()
    )
}

/// Result of a [`diagnose`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    /// Verdict of the last reply.
    pub status: HealthStatus,
    /// Commands run on the model's behalf, in order.
    pub commands: Vec<String>,
    /// Completions requested.
    pub rounds: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    #[serde(other)]
    Unknown,
}

impl From<bool> for HealthStatus {
    fn from(healthy: bool) -> Self {
        if healthy {
            Self::Healthy
        } else {
            Self::Unhealthy
        }
    }
}

/// Classifies a decoded transcript by its assistant turns.
///
/// Any `UNHEALTHY` wins. User turns are ignored because the health prompt
/// itself mentions both verdicts.
pub fn classify(turns: &[Turn]) -> HealthStatus {
    let Ok(matcher) = AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["UNHEALTHY", "HEALTHY"])
    else {
        return HealthStatus::Unknown;
    };

    let mut status = HealthStatus::Unknown;
    for turn in turns.iter().filter(|turn| turn.role == Role::Assistant) {
        for found in matcher.find_iter(&turn.content) {
            match found.pattern().as_usize() {
                0 => return HealthStatus::Unhealthy,
                _ => status = HealthStatus::Healthy,
            }
        }
    }
    status
}

/// Parses the `{ "<unix time>": verdict }` index served for past checks.
///
/// Verdicts may be booleans or status strings. Entries that are neither are
/// reported as [`HealthStatus::Unknown`].
pub fn parse_health_index(json: &str) -> Result<BTreeMap<i64, HealthStatus>> {
    let raw: BTreeMap<String, Value> =
        serde_json::from_str(json).context("health index is not a JSON object")?;

    raw.into_iter()
        .map(|(key, value)| {
            let time = key
                .trim()
                .parse::<i64>()
                .with_context(|| format!("health index key '{key}' is not a unix timestamp"))?;
            let status = match value {
                Value::Bool(healthy) => HealthStatus::from(healthy),
                Value::String(text) => {
                    serde_json::from_value(Value::String(text.to_ascii_lowercase()))
                        .unwrap_or(HealthStatus::Unknown)
                }
                _ => HealthStatus::Unknown,
            };
            Ok((time, status))
        })
        .collect()
}

/// The command proposed by the latest reply that gives a verdict, if that
/// verdict is unhealthy. A `$ ` line in a healthy or verdict-less reply does
/// not count.
pub fn follow_up(turns: &[Turn]) -> Option<String> {
    let (status, turn) = turns
        .iter()
        .rev()
        .filter(|turn| turn.role == Role::Assistant)
        .map(|turn| (classify(std::slice::from_ref(turn)), turn))
        .find(|(status, _)| *status != HealthStatus::Unknown)?;

    match status {
        HealthStatus::Unhealthy => suggested_command(&turn.content),
        HealthStatus::Healthy | HealthStatus::Unknown => None,
    }
}

/// Runs a health check conversation.
///
/// `request` is sent as the first user turn. While a reply is `UNHEALTHY`
/// and proposes a command, the command is run through `shell` and its
/// wrapped output becomes the next user turn. Stops on any other reply, a
/// failed command, cancellation, or after `max_rounds` completions.
pub async fn diagnose(
    session: &mut ChatSession,
    source: Arc<dyn TokenSource>,
    shell: &dyn ShellExecutor,
    request: &str,
    max_rounds: usize,
    mut on_submit: impl FnMut(&RequestTicket),
    mut on_token: impl FnMut(&str),
) -> Result<Diagnosis> {
    let mut diagnosis = Diagnosis {
        status: HealthStatus::Unknown,
        commands: Vec::new(),
        rounds: 0,
        cancelled: false,
    };
    let mut input = request.to_string();

    while diagnosis.rounds < max_rounds {
        diagnosis.rounds += 1;

        let mut reply = String::new();
        let outcome = drive_turn(
            session,
            Arc::clone(&source),
            &input,
            |ticket| on_submit(ticket),
            |token| {
                reply.push_str(token);
                on_token(token);
            },
        )
        .await?;

        if outcome == TurnOutcome::Cancelled {
            diagnosis.cancelled = true;
            break;
        }

        let reply = [Turn::assistant(reply)];
        diagnosis.status = classify(&reply);
        if diagnosis.status != HealthStatus::Unhealthy {
            break;
        }
        let Some(command) = suggested_command(&reply[0].content) else {
            break;
        };

        diagnosis.commands.push(command.clone());
        match shell.run(&command) {
            Ok(output) => input = wrap_shell_output(&command, output.trim_end_matches('\n')),
            Err(error) => {
                emit_command_failed(&command, &error);
                break;
            }
        }
    }

    Ok(diagnosis)
}

/// Extracts the command an unhealthy verdict proposes: the rest of the first
/// line that starts with `$ `.
pub fn suggested_command(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim_start)
        .find_map(|line| line.strip_prefix(PROMPT_MARKER)?.strip_prefix(' '))
        .map(str::trim)
        .filter(|command| !command.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock_client::{stop_frame, token_frame, MockCompletionClient};
    use std::cell::RefCell;

    struct RecordingShell {
        commands: RefCell<Vec<String>>,
        fail: bool,
    }

    impl RecordingShell {
        fn new(fail: bool) -> Self {
            Self {
                commands: RefCell::new(Vec::new()),
                fail,
            }
        }
    }

    impl ShellExecutor for RecordingShell {
        fn run(&self, command: &str) -> Result<String> {
            self.commands.borrow_mut().push(command.to_string());
            if self.fail {
                anyhow::bail!("'{command}' exited with 1");
            }
            Ok("eth1 DOWN\n".to_string())
        }
    }

    async fn run_diagnosis(
        mock: &MockCompletionClient,
        shell: &RecordingShell,
        max_rounds: usize,
    ) -> Result<(ChatSession, Diagnosis)> {
        let mut session = ChatSession::new();
        let diagnosis = diagnose(
            &mut session,
            Arc::new(mock.clone()),
            shell,
            "check eth1",
            max_rounds,
            |_| {},
            |_| {},
        )
        .await?;
        Ok((session, diagnosis))
    }

    #[test]
    fn test_classify_prefers_unhealthy() {
        let turns = vec![
            Turn::user("say HEALTHY or UNHEALTHY"),
            Turn::assistant("UNHEALTHY\n$ ip -br link show"),
        ];
        assert_eq!(classify(&turns), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_classify_ignores_prompt_text() {
        let turns = vec![
            Turn::user("If it's UNHEALTHY, say UNHEALTHY"),
            Turn::assistant("HEALTHY\nEverything looks good"),
        ];
        assert_eq!(classify(&turns), HealthStatus::Healthy);
    }

    #[test]
    fn test_classify_later_unhealthy_overrides() {
        let turns = vec![
            Turn::assistant("HEALTHY so far"),
            Turn::user("more output"),
            Turn::assistant("actually UNHEALTHY"),
        ];
        assert_eq!(classify(&turns), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_classify_without_verdict() {
        assert_eq!(classify(&[Turn::assistant("no idea")]), HealthStatus::Unknown);
        assert_eq!(classify(&[]), HealthStatus::Unknown);
    }

    #[test]
    fn test_parse_health_index_accepts_bools_and_strings() {
        let index = parse_health_index(
            r#"{"1700000000": true, "1700000001": false, "1700000002": "Unhealthy", "1700000003": null}"#,
        )
        .expect("valid index");

        assert_eq!(
            index.into_iter().collect::<Vec<_>>(),
            vec![
                (1_700_000_000, HealthStatus::Healthy),
                (1_700_000_001, HealthStatus::Unhealthy),
                (1_700_000_002, HealthStatus::Unhealthy),
                (1_700_000_003, HealthStatus::Unknown),
            ]
        );
    }

    #[test]
    fn test_parse_health_index_rejects_bad_keys() {
        let error = parse_health_index(r#"{"yesterday": true}"#).expect_err("bad key");
        assert!(error.to_string().contains("yesterday"));
        assert!(parse_health_index("[1, 2]").is_err());
    }

    #[test]
    fn test_unknown_status_string_deserializes() {
        let status: HealthStatus = serde_json::from_str("\"degraded\"").expect("string");
        assert_eq!(status, HealthStatus::Unknown);
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).expect("serialize"),
            "\"healthy\""
        );
    }

    #[test]
    fn test_follow_up_needs_verdict_in_same_reply() {
        let unhealthy = vec![
            Turn::user("check"),
            Turn::assistant("UNHEALTHY\n$ ip -br link show"),
        ];
        assert_eq!(follow_up(&unhealthy).as_deref(), Some("ip -br link show"));

        let recovered = vec![
            Turn::assistant("UNHEALTHY\n$ ip -br link show"),
            Turn::user("output"),
            Turn::assistant("HEALTHY\nlinks are fine"),
        ];
        assert_eq!(follow_up(&recovered), None);

        let command_elsewhere = vec![
            Turn::assistant("UNHEALTHY, but I am not sure why"),
            Turn::user("output"),
            Turn::assistant("you could try\n$ ping 8.8.8.8"),
        ];
        assert_eq!(follow_up(&command_elsewhere), None);
    }

    #[test]
    fn test_health_request_embeds_observation() {
        let request = health_request("ip -br addr show", "lo UNKNOWN 127.0.0.1/8\n");
        assert!(request.starts_with(HEALTH_PROMPT));
        assert!(request.ends_with("output of ip -br addr show: lo UNKNOWN 127.0.0.1/8"));
    }

    #[test]
    fn test_suggested_command() {
        assert_eq!(
            suggested_command("UNHEALTHY\n\n```\n$ ip -br link show\n```\n").as_deref(),
            Some("ip -br link show")
        );
        assert_eq!(
            suggested_command("$ ping 8.8.8.8\nlet's check").as_deref(),
            Some("ping 8.8.8.8")
        );
        assert_eq!(suggested_command("HEALTHY\ncosts $5"), None);
        assert_eq!(suggested_command("UNHEALTHY\n$   \n"), None);
    }

    #[tokio::test]
    async fn test_diagnose_feeds_command_output_back() -> Result<()> {
        let mock = MockCompletionClient::new(vec![
            vec![token_frame("UNHEALTHY\n$ ip -br link show"), stop_frame()],
            vec![token_frame("HEALTHY\nlink was just down"), stop_frame()],
        ]);
        let shell = RecordingShell::new(false);

        let (session, diagnosis) = run_diagnosis(&mock, &shell, 5).await?;

        assert_eq!(
            diagnosis,
            Diagnosis {
                status: HealthStatus::Healthy,
                commands: vec!["ip -br link show".to_string()],
                rounds: 2,
                cancelled: false,
            }
        );
        assert_eq!(shell.commands.borrow().as_slice(), ["ip -br link show"]);

        let wrapped = wrap_shell_output("ip -br link show", "eth1 DOWN");
        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].ends_with(&format!("[INST]{wrapped}[/INST]")));

        let turns = session.turns()?;
        assert_eq!(turns[2], Turn::user(wrapped));
        assert_eq!(turns.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_diagnose_stops_after_max_rounds() -> Result<()> {
        let unhealthy = || vec![token_frame("UNHEALTHY\n$ ping -c1 10.0.0.1"), stop_frame()];
        let mock = MockCompletionClient::new(vec![unhealthy(), unhealthy(), unhealthy()]);
        let shell = RecordingShell::new(false);

        let (_, diagnosis) = run_diagnosis(&mock, &shell, 2).await?;

        assert_eq!(diagnosis.rounds, 2);
        assert_eq!(diagnosis.status, HealthStatus::Unhealthy);
        assert_eq!(diagnosis.commands.len(), 2);
        assert_eq!(mock.prompts().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_diagnose_without_command_leaves_shell_alone() -> Result<()> {
        let mock = MockCompletionClient::new(vec![vec![
            token_frame("UNHEALTHY\nno idea what to run"),
            stop_frame(),
        ]]);
        let shell = RecordingShell::new(false);

        let (_, diagnosis) = run_diagnosis(&mock, &shell, 5).await?;

        assert_eq!(diagnosis.status, HealthStatus::Unhealthy);
        assert_eq!(diagnosis.rounds, 1);
        assert!(diagnosis.commands.is_empty());
        assert!(shell.commands.borrow().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_diagnose_stops_when_command_fails() -> Result<()> {
        let mock = MockCompletionClient::new(vec![
            vec![token_frame("UNHEALTHY\n$ ethtool eth1"), stop_frame()],
            vec![token_frame("HEALTHY"), stop_frame()],
        ]);
        let shell = RecordingShell::new(true);

        let (session, diagnosis) = run_diagnosis(&mock, &shell, 5).await?;

        assert_eq!(diagnosis.rounds, 1);
        assert_eq!(diagnosis.commands, vec!["ethtool eth1".to_string()]);
        assert_eq!(mock.prompts().len(), 1);
        assert_eq!(session.turns()?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_diagnose_zero_rounds_sends_nothing() -> Result<()> {
        let mock = MockCompletionClient::new(Vec::new());
        let shell = RecordingShell::new(false);

        let (session, diagnosis) = run_diagnosis(&mock, &shell, 0).await?;

        assert_eq!(diagnosis.rounds, 0);
        assert_eq!(diagnosis.status, HealthStatus::Unknown);
        assert!(mock.prompts().is_empty());
        assert!(session.turns()?.is_empty());
        Ok(())
    }
}
