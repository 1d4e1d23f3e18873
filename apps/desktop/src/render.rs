use client_core::chart::{chart_rows, render_bars};
use engine::ViewMode;
use shared::domain::{HistoryRecord, SessionSnapshot};

const BAR_WIDTH: usize = 30;

pub fn session_header(snapshot: &SessionSnapshot) -> String {
    let presentation = &snapshot.presentation;
    let status = if presentation.is_active {
        "live"
    } else {
        "not started"
    };
    format!(
        "{} [code {}] {} | {} participant(s) | question {}/{}",
        presentation.title,
        presentation.id,
        status,
        snapshot.participant_count,
        presentation.current_question_index + 1,
        presentation.questions.len(),
    )
}

/// Current question with its live results.
pub fn results(snapshot: &SessionSnapshot) -> Vec<String> {
    let mut lines = vec![session_header(snapshot)];
    if let Some(question) = snapshot.presentation.current_question() {
        lines.push(format!("  {}", question.text));
        let rows = chart_rows(question, &snapshot.votes);
        lines.extend(
            render_bars(&rows, BAR_WIDTH)
                .into_iter()
                .map(|bar| format!("    {bar}")),
        );
    }
    lines
}

pub fn history(records: &[HistoryRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["no past sessions yet".to_string()];
    }
    let mut lines = Vec::new();
    for record in records {
        lines.push(format!(
            "{} [{}] archived {}",
            record.presentation.title,
            record.presentation.id,
            record.archived_at.format("%Y-%m-%d %H:%M"),
        ));
        for question in &record.presentation.questions {
            lines.push(format!("  {}", question.text));
            let rows = chart_rows(question, &record.votes);
            lines.extend(
                render_bars(&rows, BAR_WIDTH)
                    .into_iter()
                    .map(|bar| format!("    {bar}")),
            );
        }
    }
    lines
}

/// What a participant sees for a given mode.
pub fn participant_screen(mode: ViewMode, snapshot: Option<&SessionSnapshot>) -> Vec<String> {
    match (mode, snapshot) {
        (ViewMode::ParticipantVote, Some(snapshot)) => {
            let Some(question) = snapshot.presentation.current_question() else {
                return vec!["waiting for the next question".to_string()];
            };
            let mut lines = vec![question.text.clone()];
            lines.extend(
                question
                    .options
                    .iter()
                    .enumerate()
                    .map(|(index, option)| format!("  {}) {}", index + 1, option.text)),
            );
            lines.push("type an option number to vote".to_string());
            lines
        }
        (ViewMode::ParticipantVoted, _) => {
            vec!["thanks, your vote is in. waiting for the next question".to_string()]
        }
        (_, None) => vec!["the session has ended".to_string()],
        _ => vec!["waiting for the presenter to start".to_string()],
    }
}

pub fn print(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::domain::{
        OptionId, PollOption, Presentation, Question, QuestionId, SessionCode, TallyTable,
    };

    fn snapshot(active: bool) -> SessionSnapshot {
        let presentation = Presentation {
            id: SessionCode::from("ABC123"),
            title: "Demo".to_string(),
            questions: vec![Question {
                id: QuestionId::from("q1"),
                text: "Yes?".to_string(),
                options: vec![
                    PollOption {
                        id: OptionId::from("q1-o1"),
                        text: "Yes".to_string(),
                    },
                    PollOption {
                        id: OptionId::from("q1-o2"),
                        text: "No".to_string(),
                    },
                ],
            }],
            current_question_index: 0,
            is_active: active,
            created_at: Utc::now(),
        };
        let mut votes = TallyTable::zeroed_for(&presentation);
        votes.increment(&QuestionId::from("q1"), &OptionId::from("q1-o1"));
        SessionSnapshot {
            presentation,
            votes,
            participants: Vec::new(),
            participant_count: 1,
        }
    }

    #[test]
    fn results_show_header_and_bars() {
        let lines = results(&snapshot(true));
        assert!(lines[0].contains("[code ABC123] live"));
        assert_eq!(lines[1], "  Yes?");
        assert!(lines[2].contains("100%"));
        assert!(lines[3].contains("0%"));
    }

    #[test]
    fn participant_screens_follow_the_mode() {
        let live = snapshot(true);
        let vote = participant_screen(ViewMode::ParticipantVote, Some(&live));
        assert_eq!(vote[1], "  1) Yes");
        let waiting = participant_screen(ViewMode::ParticipantWaiting, Some(&live));
        assert!(waiting[0].contains("waiting for the presenter"));
        let ended = participant_screen(ViewMode::ParticipantWaiting, None);
        assert_eq!(ended[0], "the session has ended");
    }
}
